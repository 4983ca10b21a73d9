use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::debug;

use crate::types::SCRATCH;

/// Transport seam to the IMP link layer.
///
/// Outbound frames carry 12 bytes of driver scratch before the leader; the
/// driver transmits `words` 16-bit words starting at the leader. Received
/// messages are delivered leader first.
#[async_trait]
pub trait ImpDriver {
    async fn send(&mut self, frame: &[u8], words: usize) -> io::Result<()>;

    /// Wait for the next message; returns its length in words.
    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Signal a host readiness transition to the IMP.
    async fn host_ready(&mut self, up: bool) -> io::Result<()>;
}

/// IMP driver over a TCP connection to an IMP emulator, each message
/// prefixed with its big-endian 16-bit word count.
pub struct TcpImp {
    stream: TcpStream,
    pending: Vec<u8>,
}

impl TcpImp {
    pub async fn connect<A>(addr: A, connect_timeout: Duration) -> io::Result<Self>
    where
        A: ToSocketAddrs,
    {
        let stream = match timeout(connect_timeout, TcpStream::connect(addr)).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "IMP connection timed out",
                ))
            }
        };
        Ok(Self {
            stream,
            pending: Vec::new(),
        })
    }

    /// Pop one whole message off the reassembly buffer, if present.
    fn take_message(&mut self, buf: &mut [u8]) -> io::Result<Option<usize>> {
        if self.pending.len() < 2 {
            return Ok(None);
        }
        let words = u16::from_be_bytes([self.pending[0], self.pending[1]]) as usize;
        let len = 2 * words;
        if len > buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "IMP message larger than the receive buffer",
            ));
        }
        if self.pending.len() < 2 + len {
            return Ok(None);
        }
        buf[..len].copy_from_slice(&self.pending[2..2 + len]);
        self.pending.drain(..2 + len);
        Ok(Some(words))
    }
}

#[async_trait]
impl ImpDriver for TcpImp {
    async fn send(&mut self, frame: &[u8], words: usize) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;

        let body = &frame[SCRATCH..SCRATCH + 2 * words];
        self.stream.write_all(&(words as u16).to_be_bytes()).await?;
        self.stream.write_all(body).await
    }

    async fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(words) = self.take_message(buf)? {
                return Ok(words);
            }
            // readable can produce a false positive, which is why we need
            // to check for WouldBlock when calling try_read.
            self.stream.readable().await?;
            let mut chunk = [0u8; 4096];
            match self.stream.try_read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "IMP connection closed",
                    ))
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(ref err) if err.kind() == io::ErrorKind::WouldBlock => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn host_ready(&mut self, up: bool) -> io::Result<()> {
        debug!(up, "host ready");
        Ok(())
    }
}
