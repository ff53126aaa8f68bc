//! Recorder primitive and chunk assembly.

use std::time::Duration;

use gifnew_common::error::{GifnewError, GifnewResult};

use crate::device::StreamHandle;

/// Platform media recorder bound to a live stream.
///
/// Chunks are emitted every `slice` while recording; `stop` flushes the last
/// one and returns everything in order.
#[async_trait::async_trait]
pub trait Recorder: Send {
    async fn start(&mut self, stream: &StreamHandle, slice: Duration) -> GifnewResult<()>;

    async fn stop(&mut self) -> GifnewResult<Vec<Vec<u8>>>;

    /// Container MIME type of the produced bytes.
    fn mime(&self) -> &str;
}

/// Bytes of one finished recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedMedia {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl RecordedMedia {
    /// Concatenate chunks, skipping empty slices.
    pub fn assemble(chunks: Vec<Vec<u8>>, mime: impl Into<String>) -> GifnewResult<Self> {
        let total: usize = chunks.iter().map(Vec::len).sum();
        if total == 0 {
            return Err(GifnewError::capture("recorder produced no data"));
        }
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
            bytes.extend_from_slice(&chunk);
        }
        Ok(Self {
            bytes,
            mime: mime.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_skips_empty_slices() {
        let media =
            RecordedMedia::assemble(vec![vec![1, 2], vec![], vec![3]], "video/webm").unwrap();
        assert_eq!(media.bytes, vec![1, 2, 3]);
        assert_eq!(media.mime, "video/webm");
    }

    #[test]
    fn test_assemble_rejects_empty_recording() {
        assert!(RecordedMedia::assemble(vec![vec![], vec![]], "video/webm").is_err());
    }
}
