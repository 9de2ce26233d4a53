use std::io;

use bytes::BytesMut;
use serde_json::Value;

use super::Chunks;

/// The longest line the reader accepts before giving up.
pub const MAX_LINE_SIZE: usize = 1024 * 1024;

#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    InvalidJson(serde_json::Error),
    LineTooLong,
}

/// A type for reading newline-delimited JSON values from a chunk stream.
///
/// Lines that don't start with `{` are not part of the protocol (the router
/// prints status lines like "Service not running, starting service..." on
/// the same stream), so they are skipped.
pub struct JsonLines {
    buf: BytesMut,
    chunks: Chunks,
    eof: bool,
}

impl JsonLines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
            eof: false,
        }
    }

    pub async fn next_value(&mut self) -> Result<Option<Value>, Error> {
        loop {
            // Consume complete lines in the buffer before reading more.
            if let Some(value) = self.try_parse_line()? {
                return Ok(Some(value));
            }
            if self.eof {
                return self.parse_remaining();
            }

            match self.chunks.next_chunk().await.map_err(Error::Io)? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }

    fn try_parse_line(&mut self) -> Result<Option<Value>, Error> {
        loop {
            let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n')
            else {
                if self.buf.len() > MAX_LINE_SIZE {
                    return Err(Error::LineTooLong);
                }
                return Ok(None);
            };
            if eol_idx > MAX_LINE_SIZE {
                return Err(Error::LineTooLong);
            }

            let line = self.buf.split_to(eol_idx + 1);
            if let Some(value) = parse_line(&line[..eol_idx])? {
                return Ok(Some(value));
            }
        }
    }

    fn parse_remaining(&mut self) -> Result<Option<Value>, Error> {
        let rest = self.buf.split();
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<Value>, Error> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }
    if line[0] != b'{' {
        debug!("skipping non-protocol line: {}", String::from_utf8_lossy(line));
        return Ok(None);
    }
    serde_json::from_slice(line)
        .map(Some)
        .map_err(Error::InvalidJson)
}
