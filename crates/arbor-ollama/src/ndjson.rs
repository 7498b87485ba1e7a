// SPDX-FileCopyrightText: 2026 Arbor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Newline-delimited JSON stream parser for streamed chat replies.
//!
//! The HTTP body is adapted into an `AsyncRead` and framed with
//! [`LinesCodec`], so chunks may split or join lines arbitrarily. Blank
//! lines are skipped and `\r\n` endings are accepted.

use std::pin::Pin;

use arbor_core::ArborError;
use bytes::Bytes;
use futures::future;
use futures::stream::{Stream, StreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::types::ChatChunk;

/// Longest line accepted from the chat stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// A boxed stream of decoded chat chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatChunk, ArborError>> + Send>>;

fn decode_line(line: &str) -> Result<ChatChunk, ArborError> {
    serde_json::from_str(line).map_err(|e| ArborError::Gateway {
        message: format!("malformed chat stream line: {e}"),
        source: Some(Box::new(e)),
    })
}

fn interrupted(e: LinesCodecError) -> ArborError {
    ArborError::Gateway {
        message: format!("chat stream interrupted: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Parse a byte stream into [`ChatChunk`]s, one per non-blank line.
///
/// A malformed line is yielded as an error and parsing continues. A
/// transport error, or a line over [`MAX_LINE_BYTES`], is yielded once and
/// ends the stream.
pub fn parse_ndjson_stream<S, E>(byte_stream: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(byte_stream.map(|r| r.map_err(std::io::Error::other)));
    let lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let chunks = lines
        .scan(false, |ended, line| {
            if *ended {
                return future::ready(None);
            }
            let item = match line {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(decode_line(line.trim())),
                Err(e) => {
                    *ended = true;
                    Some(Err(interrupted(e)))
                }
            };
            future::ready(Some(item))
        })
        .filter_map(future::ready);

    Box::pin(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, std::io::Error>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    async fn collect(
        parts: Vec<Result<Bytes, std::io::Error>>,
    ) -> Vec<Result<ChatChunk, ArborError>> {
        parse_ndjson_stream(futures::stream::iter(parts)).collect().await
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let out = collect(chunks(&[
            "{\"message\":{\"content\":\"Hel\"},\"done\":false}\n{\"message\":",
            "{\"content\":\"lo\"},\"done\":false}\n",
            "\n",
            "{\"done\":true}",
        ]))
        .await;

        let texts: Vec<String> = out
            .iter()
            .map(|r| r.as_ref().unwrap().text().to_string())
            .collect();
        assert_eq!(texts, vec!["Hel", "lo", ""]);
        assert!(out[2].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn malformed_line_is_reported_and_parsing_continues() {
        let out = collect(chunks(&["not json\n", "{\"done\":true}\n"])).await;
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(ArborError::Gateway { .. })));
        assert!(out[1].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn crlf_endings_and_unterminated_tail_are_decoded() {
        let out = collect(chunks(&[
            "{\"message\":{\"content\":\"a\"}}\r\n\r",
            "\n{\"message\":{\"content\":\"b\"},\"done\":true}",
        ]))
        .await;
        let texts: Vec<String> = out
            .iter()
            .map(|r| r.as_ref().unwrap().text().to_string())
            .collect();
        assert_eq!(texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn oversized_line_ends_the_stream() {
        let huge = "x".repeat(MAX_LINE_BYTES + 1);
        let parts = vec![
            Ok(Bytes::from(huge)),
            Ok(Bytes::from_static(b"\n{\"done\":true}\n")),
        ];
        let out = collect(parts).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(ArborError::Gateway { .. })));
    }

    #[tokio::test]
    async fn transport_error_ends_the_stream() {
        let parts = vec![
            Ok(Bytes::from_static(b"{\"message\":{\"content\":\"a\"}}\n")),
            Err(std::io::Error::other("reset")),
            Ok(Bytes::from_static(b"{\"done\":true}\n")),
        ];
        let out = collect(parts).await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(ArborError::Gateway { .. })));
    }
}
