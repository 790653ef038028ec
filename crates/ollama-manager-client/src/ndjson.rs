//! Newline-delimited JSON decoding for streamed daemon responses
//!
//! The daemon writes one JSON object per line. Chunks from the network do not
//! respect line boundaries, so bytes are buffered until a full line is seen.

use std::time::Duration;

use futures::{stream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{error::DaemonError, models::ErrorBody, Result};

struct LineReader<S> {
    bytes: S,
    buffer: Vec<u8>,
    idle_timeout: Duration,
    finished: bool,
}

impl<S> LineReader<S> {
    fn pop_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).trim().to_string())
    }

    fn take_rest(&mut self) -> String {
        let rest = std::mem::take(&mut self.buffer);
        String::from_utf8_lossy(&rest).trim().to_string()
    }
}

/// Decode a byte stream into typed events.
///
/// An `{"error": ...}` line becomes [`DaemonError::Remote`]; a line that is
/// not valid JSON for `T` becomes [`DaemonError::Malformed`]. If no bytes
/// arrive for `idle_timeout` the stream yields [`DaemonError::Timeout`] and
/// ends. A transport error also ends the stream.
pub fn decode<T, S, B, E>(bytes: S, idle_timeout: Duration) -> stream::BoxStream<'static, Result<T>>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<DaemonError> + Send + 'static,
{
    let reader = LineReader {
        bytes,
        buffer: Vec::new(),
        idle_timeout,
        finished: false,
    };

    stream::unfold(reader, |mut reader| async move {
        loop {
            if let Some(line) = reader.pop_line() {
                if line.is_empty() {
                    continue;
                }
                return Some((parse_line::<T>(&line), reader));
            }

            if reader.finished {
                let rest = reader.take_rest();
                if rest.is_empty() {
                    return None;
                }
                return Some((parse_line::<T>(&rest), reader));
            }

            match tokio::time::timeout(reader.idle_timeout, reader.bytes.next()).await {
                Ok(Some(Ok(chunk))) => reader.buffer.extend_from_slice(chunk.as_ref()),
                Ok(Some(Err(err))) => {
                    reader.finished = true;
                    reader.buffer.clear();
                    return Some((Err(err.into()), reader));
                }
                Ok(None) => reader.finished = true,
                Err(_) => {
                    debug!("No stream data for {:?}, giving up", reader.idle_timeout);
                    reader.finished = true;
                    reader.buffer.clear();
                    return Some((
                        Err(DaemonError::Timeout(format!(
                            "no data from daemon for {}s",
                            reader.idle_timeout.as_secs()
                        ))),
                        reader,
                    ));
                }
            }
        }
    })
    .boxed()
}

fn parse_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    if let Ok(body) = serde_json::from_str::<ErrorBody>(line) {
        return Err(DaemonError::Remote(body.error));
    }

    serde_json::from_str::<T>(line).map_err(|e| {
        debug!("Failed to parse stream line '{}': {}", line, e);
        DaemonError::Malformed(format!("{}: {}", e, line))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PullEvent;

    fn chunks(parts: &[&str]) -> impl Stream<Item = std::result::Result<Vec<u8>, DaemonError>> + Send + Unpin {
        let owned: Vec<_> = parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_lines_split_across_chunks() {
        let bytes = chunks(&[
            "{\"status\":\"pulling manifest\"}\n{\"sta",
            "tus\":\"success\"}\n",
        ]);
        let events: Vec<Result<PullEvent>> = decode(bytes, Duration::from_secs(5)).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].as_ref().unwrap().status, "pulling manifest");
        assert!(events[1].as_ref().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let bytes = chunks(&["\n\n{\"status\":\"success\"}"]);
        let events: Vec<Result<PullEvent>> = decode(bytes, Duration::from_secs(5)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(events[0].as_ref().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_error_line() {
        let bytes = chunks(&["{\"error\":\"pull model manifest: file does not exist\"}\n"]);
        let events: Vec<Result<PullEvent>> = decode(bytes, Duration::from_secs(5)).collect().await;
        assert_eq!(
            events[0],
            Err(DaemonError::Remote(
                "pull model manifest: file does not exist".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_garbage_line() {
        let bytes = chunks(&["not json\n"]);
        let events: Vec<Result<PullEvent>> = decode(bytes, Duration::from_secs(5)).collect().await;
        assert!(matches!(events[0], Err(DaemonError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let bytes = stream::iter(vec![
            Ok(b"{\"status\":\"pulling manifest\"}\n".to_vec()),
            Err(DaemonError::Unreachable {
                url: "http://localhost:11434/api/pull".to_string(),
                message: "connection reset".to_string(),
            }),
            Ok(b"{\"status\":\"success\"}\n".to_vec()),
        ]);
        let events: Vec<Result<PullEvent>> = decode(bytes, Duration::from_secs(5)).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Err(DaemonError::Unreachable { .. })));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let bytes = stream::pending::<std::result::Result<Vec<u8>, DaemonError>>();
        let events: Vec<Result<PullEvent>> =
            decode(bytes, Duration::from_millis(20)).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(DaemonError::Timeout(_))));
    }
}
