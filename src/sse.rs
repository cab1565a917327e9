//! Line framing for streaming completion bodies.
//!
//! This module turns the raw byte stream of a streaming response into a
//! stream of text fragments. Two framings are accepted on the same line
//! reader: server-sent events (`data: {...}` lines, ending at
//! `data: [DONE]`) and newline-delimited JSON (one chunk object per line).

use std::io;

use bytes::Bytes;
use futures::future;
use futures::stream::{Stream, StreamExt, TryStreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::types::CompletionChunk;

/// Longest line accepted from a backend before the stream is failed.
const MAX_LINE_LENGTH: usize = 1 << 20;

/// What a single body line contributes to the stream.
#[derive(Debug)]
enum Line {
    Fragment(String),
    Skip,
    Done,
    Failed(Error),
}

/// Process a stream of bytes into a stream of non-empty text fragments.
///
/// The returned stream ends at `[DONE]` or at the end of the body, and
/// yields an error for transport failures, invalid UTF-8, undecodable
/// chunks, and in-band error chunks.
pub fn process_chunks<S, E>(byte_stream: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let reader = StreamReader::new(byte_stream.map_err(io::Error::other));
    FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH))
        .map(|line| match line {
            Ok(line) => decode_line(&line),
            Err(err) => Line::Failed(line_error(err)),
        })
        .take_while(|line| future::ready(!matches!(line, Line::Done)))
        .filter_map(|line| {
            future::ready(match line {
                Line::Fragment(fragment) => Some(Ok(fragment)),
                Line::Failed(err) => Some(Err(err)),
                Line::Skip | Line::Done => None,
            })
        })
}

/// Decode one line of a response body.
fn decode_line(line: &str) -> Line {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return Line::Skip;
    }
    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| line.starts_with(field))
    {
        return Line::Skip;
    }

    let payload = line.strip_prefix("data:").map_or(line, str::trim_start);
    if payload == "[DONE]" {
        return Line::Done;
    }

    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => match chunk.into_fragment() {
            Ok(Some(fragment)) => Line::Fragment(fragment),
            Ok(None) => Line::Skip,
            Err(err) => Line::Failed(err),
        },
        Err(err) => Line::Failed(Error::serialization(
            format!("Malformed chunk in stream: '{payload}'"),
            Some(Box::new(err)),
        )),
    }
}

fn line_error(err: LinesCodecError) -> Error {
    match err {
        LinesCodecError::MaxLineLengthExceeded => Error::streaming(
            format!("Line in stream exceeds {MAX_LINE_LENGTH} bytes"),
            None,
        ),
        LinesCodecError::Io(err) if err.kind() == io::ErrorKind::InvalidData => {
            Error::encoding(format!("Invalid UTF-8 in stream: {err}"), Some(Box::new(err)))
        }
        LinesCodecError::Io(err) => {
            Error::streaming(format!("Error in HTTP stream: {err}"), Some(Box::new(err)))
        }
    }
}
