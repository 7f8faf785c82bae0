//! Attachment encoder: turns a user-selected file into an inline
//! `(mime type, base64)` record.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::types::Attachment;

/// Attachment encoding errors
#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported file type for {}: {mime_type}", path.display())]
    Unsupported { path: PathBuf, mime_type: String },

    #[error("file is empty: {}", .0.display())]
    Empty(PathBuf),
}

/// Encode raw bytes
pub fn encode_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Attachment {
    Attachment::new(mime_type, STANDARD.encode(bytes))
}

/// Guess the MIME type of a path from its extension
pub fn guess_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// Read and encode an image file
pub async fn encode_file(path: impl AsRef<Path>) -> Result<Attachment, AttachmentError> {
    let path = path.as_ref();
    let mime_type = guess_mime_type(path);
    if !mime_type.starts_with("image/") {
        return Err(AttachmentError::Unsupported {
            path: path.to_path_buf(),
            mime_type,
        });
    }

    let bytes = tokio::fs::read(path).await.map_err(|source| AttachmentError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(AttachmentError::Empty(path.to_path_buf()));
    }

    debug!(path = %path.display(), bytes = bytes.len(), %mime_type, "Encoded attachment");
    Ok(encode_bytes(&bytes, mime_type))
}
