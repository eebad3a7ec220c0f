use sha2::{Digest as _, Sha256};
use std::io::Write;

pub mod auth;
pub mod config;
pub mod domain;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod store;
pub mod test_utils;

/// Errors that short-circuit the HTTP surface rather than being collected as
/// per-row diagnostics. Row-level validation failures are data
/// (`domain::row::RowError`), never exceptions.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("the uploaded file is not a well-formed batch: {0}")]
    FormatInvalid(String),
    #[error("missing required field: {0}")]
    FieldRequired(&'static str),
    #[error("a batch has already been processed for this idempotency key and file")]
    AlreadyProcessed,
    #[error("a batch is already being processed for this idempotency key and file")]
    BeingProcessed,
    #[error("missing or invalid authentication")]
    Unauthorized,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// This trait captures whether a given error is due to corruption in
/// client-provided data, in which case retrying is pointless, or due to an
/// infrastructural failure, in which case the caller may reasonably retry.
pub trait ErrorClassification {
    fn is_retryable(&self) -> bool;
}

impl ErrorClassification for IngestError {
    fn is_retryable(&self) -> bool {
        match self {
            IngestError::Internal(_) => true,
            IngestError::FormatInvalid(_)
            | IngestError::FieldRequired(_)
            | IngestError::AlreadyProcessed
            | IngestError::BeingProcessed
            | IngestError::Unauthorized => false,
        }
    }
}

/// A wrapper-writer that computes a SHA-256 digest over the content it is
/// provided.
pub struct DigestWriter<W: Write> {
    writer: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    pub fn new(writer: W) -> DigestWriter<W> {
        DigestWriter {
            writer,
            hasher: Sha256::new(),
        }
    }

    /// Consumes the DigestWriter and returns the lowercase hex SHA-256
    /// digest of everything written through it.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let result = self.writer.write(buf);
        if let Ok(n) = result {
            self.hasher.update(&buf[..n]);
        }
        result
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Computes the SHA-256 hex digest of a byte slice directly, for callers
/// that already hold the whole upload in memory (the HTTP surface does,
/// since `warp::multipart` buffers parts).
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut writer = DigestWriter::new(std::io::sink());
    writer
        .write_all(bytes)
        .expect("writing to io::sink never fails");
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::digest_bytes;

    #[test]
    fn digest_writer_test() {
        const TEST_STR: &[u8] = b"I expect to be written into sha256";
        const TEST_STR_DIGEST: &str =
            "b1b64ca32c118bfd5d1f40fdb25314468f82c0e9427f4f107ddfa89ce357a3ec"; // verified via sha256sum

        assert_eq!(digest_bytes(TEST_STR), TEST_STR_DIGEST);
        assert_eq!(digest_bytes(b""), digest_bytes(b""));
        assert_ne!(digest_bytes(b"a"), digest_bytes(b"b"));
    }
}
