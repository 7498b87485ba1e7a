// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment row helpers.

use arbor_core::types::{AttachmentRecord, StoredAttachment};
use rusqlite::params;
use tracing::warn;

use crate::attachments::AttachmentStore;

pub(crate) fn insert_attachment_row(
    conn: &rusqlite::Connection,
    response_id: &str,
    attachment: &StoredAttachment,
    created_at: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO attachments (id, response_id, file_path, media_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            attachment.id,
            response_id,
            attachment.file_path,
            attachment.media_type,
            created_at,
        ],
    )?;
    Ok(())
}

/// Attachment rows of every response in a conversation.
pub(crate) fn attachment_rows_for_conversation(
    conn: &rusqlite::Connection,
    conversation_id: &str,
) -> rusqlite::Result<Vec<AttachmentRecord>> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.response_id, a.file_path, a.media_type, a.created_at
         FROM attachments a
         JOIN responses r ON r.id = a.response_id
         WHERE r.conversation_id = ?1
         ORDER BY a.created_at ASC, a.id ASC",
    )?;
    let rows = stmt.query_map(params![conversation_id], |row| {
        Ok(AttachmentRecord {
            id: row.get(0)?,
            response_id: row.get(1)?,
            file_path: row.get(2)?,
            media_type: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    rows.collect()
}

/// Unlink each file, logging failures without stopping.
///
/// Returns the number of files removed.
pub(crate) fn unlink_best_effort(store: &AttachmentStore, file_paths: &[String]) -> usize {
    let mut removed = 0;
    for path in file_paths {
        match store.delete_blocking(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!(file_path = %path, error = %e, "failed to delete attachment file"),
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn unlink_continues_past_failures() {
        let dir = tempdir().unwrap();
        let store = AttachmentStore::new(dir.path());
        std::fs::create_dir_all(dir.path().join("attachments")).unwrap();
        std::fs::write(dir.path().join("attachments/one"), b"1").unwrap();
        std::fs::write(dir.path().join("attachments/two"), b"2").unwrap();

        let paths = vec![
            "attachments/one".to_string(),
            "attachments/missing".to_string(),
            "attachments/two".to_string(),
        ];
        assert_eq!(unlink_best_effort(&store, &paths), 2);
        assert!(!dir.path().join("attachments/two").exists());
        assert!(logs_contain("failed to delete attachment file"));
    }
}
