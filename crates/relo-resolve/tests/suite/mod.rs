mod resolve;
mod shorten;
