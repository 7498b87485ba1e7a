// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment payload storage on the local filesystem.
//!
//! Payloads live outside the database under `<root>/attachments/<id>`; rows
//! only keep the relative pointer. Writes and unlinks are independent
//! filesystem operations, never part of a database transaction.

use std::path::{Component, Path, PathBuf};

use arbor_core::ArborError;
use arbor_core::types::{AttachmentRecord, InlineAttachment, NewAttachment, StoredAttachment};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

/// Directory (relative to the store root) holding attachment files.
pub const ATTACHMENT_DIR: &str = "attachments";

/// Filesystem-backed attachment store.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative pointer to an absolute path under the root.
    ///
    /// Pointers must be `attachments/<name>` with a single plain file name.
    pub fn resolve(&self, pointer: &str) -> Result<PathBuf, ArborError> {
        let path = Path::new(pointer);
        let mut components = path.components();
        let valid = matches!(components.next(), Some(Component::Normal(dir)) if dir == ATTACHMENT_DIR)
            && matches!(components.next(), Some(Component::Normal(_)))
            && components.next().is_none();
        if !valid {
            return Err(ArborError::Validation(format!(
                "invalid attachment pointer `{pointer}`"
            )));
        }
        Ok(self.root.join(path))
    }

    /// Write a payload and return its pointer.
    pub async fn store(
        &self,
        data: &[u8],
        media_type: &str,
    ) -> Result<StoredAttachment, ArborError> {
        let id = uuid::Uuid::new_v4().to_string();
        let file_path = format!("{ATTACHMENT_DIR}/{id}");
        let target = self.resolve(&file_path)?;

        tokio::fs::create_dir_all(self.root.join(ATTACHMENT_DIR))
            .await
            .map_err(io_err)?;
        tokio::fs::write(&target, data).await.map_err(io_err)?;
        debug!(attachment_id = %id, bytes = data.len(), "attachment stored");

        Ok(StoredAttachment {
            id,
            file_path,
            media_type: media_type.to_string(),
        })
    }

    /// Read a payload. A missing file is [`ArborError::NotFound`].
    pub async fn read(&self, pointer: &str) -> Result<Vec<u8>, ArborError> {
        let target = self.resolve(pointer)?;
        tokio::fs::read(&target).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArborError::NotFound {
                    entity: "attachment",
                    id: pointer.to_string(),
                }
            } else {
                io_err(e)
            }
        })
    }

    /// Remove a payload.
    pub async fn delete(&self, pointer: &str) -> Result<(), ArborError> {
        let target = self.resolve(pointer)?;
        tokio::fs::remove_file(&target).await.map_err(io_err)
    }

    /// Remove a payload from synchronous code (the database thread).
    pub fn delete_blocking(&self, pointer: &str) -> Result<(), ArborError> {
        let target = self.resolve(pointer)?;
        std::fs::remove_file(&target).map_err(io_err)
    }

    /// Read a stored attachment and inline it as a `data:` URI.
    pub async fn read_inline(
        &self,
        record: &AttachmentRecord,
    ) -> Result<InlineAttachment, ArborError> {
        let bytes = self.read(&record.file_path).await?;
        Ok(InlineAttachment {
            id: record.id.clone(),
            media_type: record.media_type.clone(),
            data_uri: encode_data_uri(&record.media_type, &bytes),
        })
    }
}

fn io_err(e: std::io::Error) -> ArborError {
    ArborError::Storage {
        source: Box::new(e),
    }
}

/// Build a `data:<media>;base64,<payload>` URI.
pub fn encode_data_uri(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{media_type};base64,{}", STANDARD.encode(bytes))
}

/// Parse an inline image `data:` URI into raw bytes.
///
/// Only `data:image/<subtype>;base64,<payload>` is accepted, where the
/// subtype is alphanumeric (plus `_`, `+`, `.`, `-`).
pub fn decode_data_uri(uri: &str) -> Result<NewAttachment, ArborError> {
    let invalid = |why: &str| ArborError::Validation(format!("invalid attachment data URI: {why}"));

    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| invalid("missing `data:` scheme"))?;
    let (media_type, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| invalid("only base64 payloads are supported"))?;
    let subtype = media_type
        .strip_prefix("image/")
        .ok_or_else(|| invalid("only image attachments are supported"))?;
    let subtype_ok = !subtype.is_empty()
        && subtype
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'));
    if !subtype_ok {
        return Err(invalid("malformed media subtype"));
    }
    if payload.is_empty() {
        return Err(invalid("empty payload"));
    }
    let data = STANDARD
        .decode(payload)
        .map_err(|e| invalid(&format!("bad base64: {e}")))?;

    Ok(NewAttachment {
        media_type: media_type.to_ascii_lowercase(),
        data,
    })
}
