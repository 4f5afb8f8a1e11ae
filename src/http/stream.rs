//! Buffered byte pump between an upstream body and the client.

use std::io;
use std::num::NonZeroUsize;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("read from source failed: {0}")]
    Read(#[source] io::Error),

    #[error("no data from source within {0:?}")]
    ReadTimeout(Duration),

    #[error("write to sink failed: {0}")]
    Write(#[source] io::Error),
}

impl CopyError {
    /// The sink went away, usually a client that disconnected mid-transfer.
    pub fn is_sink_closed(&self) -> bool {
        matches!(
            self,
            CopyError::Write(e) if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset | io::ErrorKind::WriteZero
            )
        )
    }
}

/// Copies a source to a sink through one reusable fixed-size buffer.
#[derive(Debug, Clone, Copy)]
pub struct StreamCopier {
    buffer_size: NonZeroUsize,
    read_timeout: Option<Duration>,
}

impl StreamCopier {
    pub fn new(buffer_size: NonZeroUsize) -> Self {
        Self {
            buffer_size,
            read_timeout: None,
        }
    }

    /// Fail a read that produces nothing within `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size.get()
    }

    /// Pump `source` into `sink` until end-of-stream.
    ///
    /// Every byte read before end-of-stream is written. A failed read stops
    /// the copy without forwarding anything more. The sink is flushed before
    /// a successful return. Returns the number of bytes copied.
    pub async fn copy<R, W>(&self, source: &mut R, sink: &mut W) -> Result<u64, CopyError>
    where
        R: AsyncRead + Unpin + ?Sized,
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut buf = vec![0u8; self.buffer_size.get()];
        let mut copied = 0u64;

        loop {
            let n = self.read_chunk(source, &mut buf).await?;
            if n == 0 {
                break;
            }
            sink.write_all(&buf[..n]).await.map_err(CopyError::Write)?;
            copied += n as u64;
        }

        sink.flush().await.map_err(CopyError::Write)?;
        Ok(copied)
    }

    async fn read_chunk<R>(&self, source: &mut R, buf: &mut [u8]) -> Result<usize, CopyError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, source.read(buf))
                .await
                .map_err(|_| CopyError::ReadTimeout(timeout))?
                .map_err(CopyError::Read),
            None => source.read(buf).await.map_err(CopyError::Read),
        }
    }
}
