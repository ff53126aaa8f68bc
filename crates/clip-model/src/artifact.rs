//! The finished animated image.

use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;

/// Output blob plus the download name presented to the user.
#[derive(Debug, Clone)]
pub struct Artifact {
    bytes: Arc<[u8]>,
    mime: String,
    file_name: String,
}

impl Artifact {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.into(),
            file_name: file_name.into(),
        }
    }

    /// A GIF with a random `gif-new-<suffix>.gif` name.
    pub fn gif(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self::new(bytes, mime, random_file_name("gif-new", "gif"))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn random_file_name(prefix: &str, extension: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(26)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("{prefix}-{suffix}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gif_names_are_random() {
        let a = Artifact::gif(vec![0x47, 0x49, 0x46], "image/gif");
        let b = Artifact::gif(vec![0x47, 0x49, 0x46], "image/gif");
        assert!(a.file_name().starts_with("gif-new-"));
        assert!(a.file_name().ends_with(".gif"));
        assert_eq!(a.file_name().len(), "gif-new-".len() + 26 + ".gif".len());
        assert_ne!(a.file_name(), b.file_name());
        assert_eq!(a.mime(), "image/gif");
    }
}
