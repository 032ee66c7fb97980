//! Byte range reads for genome browser access to BAM/CRAM/VCF files
//!
//! Ranges follow the HTTP convention: `bytes=<start>-<end>` with both ends inclusive and the end
//! optional. The file is opened per request, positioned at `start`, and handed back as a reader
//! limited to the requested length, so nothing beyond the range is read and dropping the reader
//! closes the file.

use std::io::{self, SeekFrom};
use std::path::Path;
use std::str::FromStr;

use log::info;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};

#[derive(Debug, Error)]
pub enum RangeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed range header {0:?}")]
    Syntax(String),

    #[error("range starting at {start} is not satisfiable for {size} bytes")]
    Unsatisfiable { start: u64, size: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A parsed `Range` header, `end` is inclusive and `None` means end of file
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl FromStr for ByteRange {
    type Err = RangeError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let syntax = || RangeError::Syntax(header.to_string());

        let spec = header
            .trim()
            .strip_prefix("bytes")
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('='))
            .ok_or_else(syntax)?;
        let (start, end) = spec.split_once('-').ok_or_else(syntax)?;

        let start = start.trim().parse::<u64>().map_err(|_| syntax())?;
        let end = match end.trim() {
            "" => None,
            end => Some(end.parse::<u64>().map_err(|_| syntax())?),
        };
        Ok(ByteRange { start, end })
    }
}

impl ByteRange {
    /// Inclusive bounds within a file of `size` bytes; an end past EOF is clamped
    pub fn resolve(&self, size: u64) -> Result<(u64, u64), RangeError> {
        let last = size.checked_sub(1);
        match (last, self.end) {
            (Some(last), end) if self.start <= last => {
                let end = end.unwrap_or(last).min(last);
                if end < self.start {
                    return Err(RangeError::Unsatisfiable { start: self.start, size });
                }
                Ok((self.start, end))
            }
            _ => Err(RangeError::Unsatisfiable { start: self.start, size }),
        }
    }
}

/// An open file positioned for the response body
#[derive(Debug)]
pub struct RangeReply {
    /// full size of the file
    pub total: u64,
    /// inclusive bounds served, `None` for the whole file
    pub span: Option<(u64, u64)>,
    pub body: Take<File>,
}

impl RangeReply {
    pub fn is_partial(&self) -> bool {
        self.span.is_some()
    }

    pub fn content_length(&self) -> u64 {
        match self.span {
            Some((start, end)) => end - start + 1,
            None => self.total,
        }
    }

    /// `Content-Range` header value for partial replies
    pub fn content_range(&self) -> Option<String> {
        self.span
            .map(|(start, end)| format!("bytes {}-{}/{}", start, end, self.total))
    }
}

/// Open `path` for the range in `header`, or the whole file when there is no header
pub async fn open_range(path: &Path, header: Option<&str>) -> Result<RangeReply, RangeError> {
    let not_found = || RangeError::NotFound(path.display().to_string());
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(RangeError::Io(err)),
    };
    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(not_found());
    }
    let total = metadata.len();

    let span = match header {
        Some(header) => Some(header.parse::<ByteRange>()?.resolve(total)?),
        None => None,
    };

    let (start, length) = match span {
        Some((start, end)) => (start, end - start + 1),
        None => (0, total),
    };
    if start > 0 {
        file.seek(SeekFrom::Start(start)).await?;
    }
    info!("Serving {} bytes of {} from offset {}", length, path.display(), start);

    Ok(RangeReply {
        total,
        span,
        body: file.take(length),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hundred_bytes() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reads.bam");
        let bytes: Vec<u8> = (0..100u8).collect();
        std::fs::write(&path, bytes).unwrap();
        (dir, path)
    }

    async fn body(reply: RangeReply) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut body = reply.body;
        body.read_to_end(&mut buf).await.unwrap();
        buf
    }

    #[test]
    fn header_shapes() {
        assert_eq!("bytes=10-19".parse::<ByteRange>().unwrap(), ByteRange { start: 10, end: Some(19) });
        assert_eq!("bytes=90-".parse::<ByteRange>().unwrap(), ByteRange { start: 90, end: None });
        assert_eq!(" bytes = 1 - 2 ".parse::<ByteRange>().unwrap(), ByteRange { start: 1, end: Some(2) });
        for bad in ["bytes=abc", "bytes=-5", "items=1-2", "bytes=1-2,4-5", "bytes=1", ""] {
            assert!(matches!(bad.parse::<ByteRange>(), Err(RangeError::Syntax(_))), "{bad}");
        }
    }

    #[tokio::test]
    async fn closed_range() {
        let (_dir, path) = hundred_bytes();
        let reply = open_range(&path, Some("bytes=10-19")).await.unwrap();

        assert!(reply.is_partial());
        assert_eq!(reply.content_length(), 10);
        assert_eq!(reply.content_range().as_deref(), Some("bytes 10-19/100"));
        assert_eq!(body(reply).await, (10..20u8).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn open_ended_range_reads_to_eof() {
        let (_dir, path) = hundred_bytes();
        let reply = open_range(&path, Some("bytes=90-")).await.unwrap();

        assert_eq!(reply.content_range().as_deref(), Some("bytes 90-99/100"));
        assert_eq!(body(reply).await, (90..100u8).collect::<Vec<u8>>());
    }

    #[tokio::test]
    async fn end_past_eof_is_clamped() {
        let (_dir, path) = hundred_bytes();
        let reply = open_range(&path, Some("bytes=95-1000")).await.unwrap();
        assert_eq!(reply.content_range().as_deref(), Some("bytes 95-99/100"));
        assert_eq!(body(reply).await.len(), 5);
    }

    #[tokio::test]
    async fn no_header_is_whole_file() {
        let (_dir, path) = hundred_bytes();
        let reply = open_range(&path, None).await.unwrap();
        assert!(!reply.is_partial());
        assert_eq!(reply.content_range(), None);
        assert_eq!(body(reply).await.len(), 100);
    }

    #[tokio::test]
    async fn errors() {
        let (dir, path) = hundred_bytes();

        assert!(matches!(open_range(&path, Some("bytes=abc")).await, Err(RangeError::Syntax(_))));
        assert!(matches!(
            open_range(&path, Some("bytes=100-")).await,
            Err(RangeError::Unsatisfiable { start: 100, size: 100 })
        ));
        assert!(matches!(open_range(&path, Some("bytes=20-10")).await, Err(RangeError::Unsatisfiable { .. })));
        assert!(matches!(
            open_range(&dir.path().join("missing.bam"), None).await,
            Err(RangeError::NotFound(_))
        ));
        assert!(matches!(open_range(dir.path(), None).await, Err(RangeError::NotFound(_))));
    }
}
