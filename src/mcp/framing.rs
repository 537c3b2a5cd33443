//! `Content-Length` framing for JSON-RPC messages over a byte stream.
//!
//! Each message looks like:
//!
//! ```text
//! Content-Length: 47\r\n
//! \r\n
//! {"jsonrpc":"2.0","method":"ping","id":1}
//! ```

use std::io;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt as _, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _,
};

use crate::prelude::*;

/// The largest message body we accept, in bytes.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024 * 1024;

/// Reads framed messages from a buffered byte stream.
pub struct FrameReader<R> {
    reader: R,

    /// Set after a frame we couldn't read the body of. Until we see the
    /// next `Content-Length` header, input is discarded.
    resyncing: bool,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    /// Wrap a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            resyncing: false,
        }
    }

    /// Read the next message payload.
    ///
    /// Returns `Ok(None)` at the end of input: either the stream closed
    /// cleanly between messages, or the headers had no usable length. If the
    /// stream closes in the middle of a message, the error wraps an
    /// [`io::Error`] of kind [`io::ErrorKind::UnexpectedEof`].
    ///
    /// An unusable `Content-Length` is a non-I/O error. The body of that
    /// frame is then skipped, up to the next `Content-Length` header.
    pub async fn read_message(&mut self) -> Result<Option<Vec<u8>>> {
        let mut content_length = None;
        let mut bad_length = None;
        let mut saw_header_bytes = false;
        let mut line = Vec::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_until(b'\n', &mut line)
                .await
                .context("failed to read message header")?;
            if read == 0 {
                if self.resyncing {
                    debug!("Input ended while skipping a bad message");
                    return Ok(None);
                }
                if saw_header_bytes {
                    return Err(anyhow::Error::new(io::Error::from(
                        io::ErrorKind::UnexpectedEof,
                    ))
                    .context("input ended in the middle of message headers"));
                }
                return Ok(None);
            }
            saw_header_bytes = true;

            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\r', '\n']);
            let mut header = line.split_once(':');
            let mut is_length_header =
                header.is_some_and(|(key, _)| key.trim().eq_ignore_ascii_case("content-length"));
            if self.resyncing {
                // A skipped body has no line ending, so the next header may
                // be glued onto the end of it.
                let Some(start) = find_content_length_header(line) else {
                    continue;
                };
                debug!("Found the next message after a bad one");
                self.resyncing = false;
                header = line[start..].split_once(':');
                is_length_header = true;
            }
            if line.is_empty() {
                break;
            }
            let Some((_, value)) = header else {
                trace!(line, "Ignoring header line without a colon");
                continue;
            };
            if is_length_header {
                let value = value.trim();
                match value.parse::<usize>() {
                    Ok(length) if length <= MAX_MESSAGE_BYTES => {
                        content_length = Some(length);
                    }
                    Ok(length) => {
                        bad_length = Some(format!(
                            "{length} bytes is more than the limit of {MAX_MESSAGE_BYTES}"
                        ));
                    }
                    Err(_) => bad_length = Some(format!("{value:?}")),
                }
            }
        }

        // Finish the headers before failing, and skip the body we can't read.
        if let Some(problem) = bad_length {
            self.resyncing = true;
            return Err(anyhow!("invalid Content-Length: {problem}"));
        }

        let length = match content_length {
            Some(length) if length > 0 => length,
            _ => {
                debug!("Message headers had no Content-Length, treating as end of input");
                return Ok(None);
            }
        };
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(length as u64)
            .read_to_end(&mut payload)
            .await
            .with_context(|| format!("failed to read {length}-byte message body"))?;
        if payload.len() < length {
            return Err(anyhow::Error::new(io::Error::from(io::ErrorKind::UnexpectedEof))
                .context(format!(
                    "input ended after {} bytes of a {length}-byte message body",
                    payload.len()
                )));
        }
        trace!(length, "Read message");
        Ok(Some(payload))
    }
}

/// Find the last `Content-Length:` header in `line`, ignoring case.
fn find_content_length_header(line: &str) -> Option<usize> {
    line.to_ascii_lowercase().rfind("content-length:")
}
