//! Screen capture domain: public API.
//!
//! The capture mechanics live behind [`CaptureService`]; this module owns
//! the artifact type that flows into the screenshot batch and the target
//! language each artifact is tagged with.

mod file;

pub use file::{encode_data_uri, FileCapture};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Programming language the answer should be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetLanguage {
    Python,
    Java,
    Cpp,
}

impl TargetLanguage {
    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "Python",
            TargetLanguage::Java => "Java",
            TargetLanguage::Cpp => "C++",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for TargetLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "python" | "py" => Ok(TargetLanguage::Python),
            "java" => Ok(TargetLanguage::Java),
            "c++" | "cpp" => Ok(TargetLanguage::Cpp),
            other => Err(format!("Unknown language: {}. Use Python, Java or C++.", other)),
        }
    }
}

/// One captured screenshot waiting in the batch.
///
/// Equality is payload equality: two captures of the same screen are the
/// same item even if they were requested with different languages.
#[derive(Debug, Clone)]
pub struct CaptureItem {
    image: String,
    digest: [u8; 32],
    pub target_language: TargetLanguage,
}

impl CaptureItem {
    /// `image` is a `data:` URI or any other payload the completion
    /// service accepts as an image URL.
    pub fn new(image: impl Into<String>, target_language: TargetLanguage) -> Self {
        let image = image.into();
        let digest = Sha256::digest(image.as_bytes()).into();
        Self {
            image,
            digest,
            target_language,
        }
    }

    pub fn into_image(self) -> String {
        self.image
    }

    /// Value equality of the image payload.
    pub fn same_payload(&self, other: &CaptureItem) -> bool {
        self.digest == other.digest && self.image == other.image
    }
}

/// Produces one image artifact per call.
#[async_trait]
pub trait CaptureService: Send + Sync {
    async fn capture(&self) -> Result<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_parses_loosely() {
        assert_eq!("python".parse::<TargetLanguage>(), Ok(TargetLanguage::Python));
        assert_eq!(" JAVA ".parse::<TargetLanguage>(), Ok(TargetLanguage::Java));
        assert_eq!("c++".parse::<TargetLanguage>(), Ok(TargetLanguage::Cpp));
        assert_eq!("cpp".parse::<TargetLanguage>(), Ok(TargetLanguage::Cpp));
        assert!("cobol".parse::<TargetLanguage>().is_err());
        assert_eq!(TargetLanguage::Cpp.to_string(), "C++");
    }

    #[test]
    fn payload_identity_ignores_language() {
        let a = CaptureItem::new("data:image/png;base64,AAAA", TargetLanguage::Python);
        let b = CaptureItem::new(String::from("data:image/png;base64,AAAA"), TargetLanguage::Java);
        let c = CaptureItem::new("data:image/png;base64,BBBB", TargetLanguage::Python);
        assert!(a.same_payload(&b));
        assert!(!a.same_payload(&c));
    }
}
