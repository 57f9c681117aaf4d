// Integration-test harness for relo-config: one binary for all suites.

mod suite;
