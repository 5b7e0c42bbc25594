//! Turning file bytes into indexable text.

use async_trait::async_trait;

use crawler_fs::FileStream;
use crawler_types::FileEntry;

/// Extracts text content from one file.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Read `stream` and return at most `indexed_chars` characters of text.
    async fn extract(
        &self,
        entry: &FileEntry,
        stream: &mut FileStream,
        indexed_chars: Option<usize>,
    ) -> std::io::Result<String>;
}

/// Reads files as UTF-8 text, replacing invalid sequences.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

#[async_trait]
impl ContentExtractor for PlainTextExtractor {
    async fn extract(
        &self,
        _entry: &FileEntry,
        stream: &mut FileStream,
        indexed_chars: Option<usize>,
    ) -> std::io::Result<String> {
        // A char is at most 4 bytes in UTF-8
        let byte_limit = indexed_chars.map(|chars| chars.saturating_mul(4));
        let bytes = stream.read_to_end_limited(byte_limit).await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(match indexed_chars {
            Some(limit) => text.chars().take(limit).collect(),
            None => text.into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(data: &'static [u8]) -> FileStream {
        FileStream::new("/data/a.txt", Box::new(data))
    }

    #[tokio::test]
    async fn test_plain_text_full() {
        let entry = FileEntry::file("a.txt", "/data");
        let text = PlainTextExtractor
            .extract(&entry, &mut stream(b"hello world"), None)
            .await
            .unwrap();
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_plain_text_truncated_on_char_boundary() {
        let entry = FileEntry::file("a.txt", "/data");
        let text = PlainTextExtractor
            .extract(&entry, &mut stream("héllo wörld".as_bytes()), Some(4))
            .await
            .unwrap();
        assert_eq!(text, "héll");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let entry = FileEntry::file("a.bin", "/data");
        let text = PlainTextExtractor
            .extract(&entry, &mut stream(&[b'o', b'k', 0xff]), None)
            .await
            .unwrap();
        assert_eq!(text, "ok\u{fffd}");
    }
}
