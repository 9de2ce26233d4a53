#[cfg(test)]
use std::collections::VecDeque;
use std::io;

use bytes::{Bytes, BytesMut};
use tokio::io::AsyncReadExt;
use tokio::process::ChildStdout;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// An adapter for streaming byte chunks.
pub enum Chunks {
    Stdout(ChildStdout),
    #[cfg(test)]
    VecDeque(VecDeque<Bytes>),
}

impl Chunks {
    pub fn from_stdout(stdout: ChildStdout) -> Self {
        Chunks::Stdout(stdout)
    }

    #[cfg(test)]
    pub fn from_vec_deque(vec: VecDeque<Bytes>) -> Self {
        Chunks::VecDeque(vec)
    }

    #[inline]
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, io::Error> {
        match self {
            Chunks::Stdout(stdout) => {
                let mut buf = BytesMut::with_capacity(READ_CHUNK_SIZE);
                if stdout.read_buf(&mut buf).await? == 0 {
                    return Ok(None);
                }
                Ok(Some(buf.freeze()))
            }
            #[cfg(test)]
            Chunks::VecDeque(vec) => {
                let chunk = vec.pop_front();
                Ok(chunk)
            }
        }
    }
}
