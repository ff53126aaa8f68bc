//! Font assets for overlay burn-in.

use std::path::{Path, PathBuf};

use gifnew_common::error::{GifnewError, GifnewResult};

/// A selectable overlay font and the asset that backs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontFamily {
    pub name: &'static str,
    pub file: &'static str,
}

pub const FONT_FAMILIES: &[FontFamily] = &[
    FontFamily { name: "Impact", file: "impact.ttf" },
    FontFamily { name: "Arial", file: "arial.ttf" },
    FontFamily { name: "Helvetica", file: "helvetica.ttf" },
    FontFamily { name: "Times", file: "times.ttf" },
    FontFamily { name: "Courier", file: "courier.ttf" },
    FontFamily { name: "Anton", file: "anton.ttf" },
];

/// Asset used for families outside the catalog.
pub const FALLBACK_FONT_FILE: &str = "arial.ttf";

/// Asset file for a font family (case-insensitive).
pub fn font_file_for(family: &str) -> &'static str {
    FONT_FAMILIES
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(family.trim()))
        .map(|f| f.file)
        .unwrap_or(FALLBACK_FONT_FILE)
}

/// Where font bytes come from.
#[async_trait::async_trait]
pub trait FontSource: Send + Sync {
    /// Fetch `file`. Missing assets are `FontAssetMissing`.
    async fn fetch(&self, file: &str) -> GifnewResult<Vec<u8>>;
}

/// Fonts served from a local directory.
#[derive(Debug, Clone)]
pub struct DirectoryFontSource {
    dir: PathBuf,
}

impl DirectoryFontSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Catalog assets missing from the directory.
    pub fn missing_assets(&self) -> Vec<&'static str> {
        FONT_FAMILIES
            .iter()
            .map(|f| f.file)
            .filter(|file| !self.dir.join(file).is_file())
            .collect()
    }
}

#[async_trait::async_trait]
impl FontSource for DirectoryFontSource {
    async fn fetch(&self, file: &str) -> GifnewResult<Vec<u8>> {
        match tokio::fs::read(self.dir.join(file)).await {
            Ok(bytes) if !bytes.is_empty() => Ok(bytes),
            Ok(_) => Err(GifnewError::FontAssetMissing {
                file: file.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GifnewError::FontAssetMissing {
                    file: file.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(font_file_for("Impact"), "impact.ttf");
        assert_eq!(font_file_for("anton"), "anton.ttf");
        assert_eq!(font_file_for("Comic Sans"), FALLBACK_FONT_FILE);
    }

    #[tokio::test]
    async fn test_directory_source_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("impact.ttf"), b"ttf").unwrap();
        let source = DirectoryFontSource::new(dir.path());

        assert_eq!(source.fetch("impact.ttf").await.unwrap(), b"ttf");
        let err = source.fetch("anton.ttf").await.unwrap_err();
        assert!(matches!(err, GifnewError::FontAssetMissing { .. }));
        assert!(!source.missing_assets().contains(&"impact.ttf"));
        assert!(source.missing_assets().contains(&"anton.ttf"));
    }
}
