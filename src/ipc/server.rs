//! Stream publisher: TCP listener accepting one client + line framing.

use std::io::{self, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::{debug, info};

use crate::pipeline::StopSignal;

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:5555";

/// Sleep between accept attempts while no client is waiting.
const ACCEPT_POLL: Duration = Duration::from_millis(50);

/// Listener for the single downstream consumer.
pub struct PublisherListener {
    listener: TcpListener,
    addr: SocketAddr,
}

impl PublisherListener {
    /// Bind the listener socket (non-blocking).
    pub fn bind(addr: &str) -> anyhow::Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("failed to bind {}", addr))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        info!(%addr, "publisher listening");
        Ok(Self { listener, addr })
    }

    #[cfg(test)]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for exactly one client. `None` when `stop` is raised first.
    pub fn accept_one(&self, stop: &StopSignal) -> anyhow::Result<Option<TcpStream>> {
        loop {
            if stop.is_raised() {
                debug!("stop requested while waiting for client");
                return Ok(None);
            }
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_nodelay(true)?;
                    info!(%peer, "client connected");
                    return Ok(Some(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("accept failed"),
            }
        }
    }
}

/// Writes one JSON document per line to a connected stream.
pub struct StreamPublisher<W: Write> {
    writer: W,
    buf: Vec<u8>,
    sent: u64,
}

impl<W: Write> StreamPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buf: Vec::with_capacity(4096),
            sent: 0,
        }
    }

    /// Serialize `message` and send it followed by `\n`.
    pub fn publish<T: Serialize>(&mut self, message: &T) -> io::Result<()> {
        self.buf.clear();
        serde_json::to_writer(&mut self.buf, message).map_err(io::Error::from)?;
        self.buf.push(b'\n');
        self.writer.write_all(&self.buf)?;
        self.writer.flush()?;
        self.sent += 1;
        Ok(())
    }

    /// Messages sent so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.writer
    }
}
