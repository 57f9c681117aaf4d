use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const KEYWORDS: &[&str] = &[
    "package", "import", "class", "interface", "object", "fun", "val", "var", "this", "as",
];

/// Returns `true` if `name` is a plain identifier (ASCII letter or `_`, then alphanumerics).
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&name)
}

/// Lowercase the leading run of capitals, the way generated parameter names are derived from
/// class names (`Outer` -> `outer`, `URLHolder` -> `urlHolder`).
pub fn decapitalize(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let upper_run = chars.iter().take_while(|c| c.is_ascii_uppercase()).count();
    if upper_run == 0 {
        return name.to_string();
    }
    // Keep the last capital of a run when it starts the next word (`URLHolder` -> `urlHolder`).
    let lower_count = if upper_run > 1 && upper_run < chars.len() {
        upper_run - 1
    } else {
        upper_run
    };
    chars
        .iter()
        .enumerate()
        .map(|(idx, c)| {
            if idx < lower_count {
                c.to_ascii_lowercase()
            } else {
                *c
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageNameError {
    #[error("package name is empty")]
    Empty,
    #[error("package segment `{0}` is not a valid identifier")]
    InvalidSegment(String),
}

/// Validate a dotted package name such as `com.example.util`.
pub fn validate_package_name(package: &str) -> Result<(), PackageNameError> {
    if package.trim().is_empty() {
        return Err(PackageNameError::Empty);
    }
    for segment in package.split('.') {
        if !is_valid_identifier(segment) {
            return Err(PackageNameError::InvalidSegment(segment.to_string()));
        }
    }
    Ok(())
}

/// A dotted, fully qualified name: package segments followed by container and declaration
/// names (`a.b.Outer.Inner`).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FqName {
    segments: Vec<String>,
}

impl FqName {
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    pub fn parent(&self) -> Option<FqName> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: impl Into<String>) -> FqName {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    pub fn starts_with(&self, prefix: &FqName) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for FqName {
    type Err = PackageNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(FqName::root());
        }
        validate_package_name(s)?;
        Ok(FqName::new(s.split('.')))
    }
}

impl Serialize for FqName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FqName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decapitalize_handles_acronyms() {
        assert_eq!(decapitalize("Outer"), "outer");
        assert_eq!(decapitalize("URLHolder"), "urlHolder");
        assert_eq!(decapitalize("IO"), "io");
        assert_eq!(decapitalize("already"), "already");
    }

    #[test]
    fn package_validation_rejects_keywords_and_empty_segments() {
        assert!(validate_package_name("a.b.c").is_ok());
        assert_eq!(validate_package_name(""), Err(PackageNameError::Empty));
        assert_eq!(
            validate_package_name("a..b"),
            Err(PackageNameError::InvalidSegment(String::new()))
        );
        assert_eq!(
            validate_package_name("a.class"),
            Err(PackageNameError::InvalidSegment("class".into()))
        );
    }

    #[test]
    fn fq_name_navigation() {
        let name: FqName = "a.b.Outer".parse().unwrap();
        assert_eq!(name.last(), Some("Outer"));
        assert_eq!(name.parent().unwrap().to_string(), "a.b");
        assert!(name.child("Inner").starts_with(&name));
        assert!(FqName::root().parent().is_none());
    }
}
