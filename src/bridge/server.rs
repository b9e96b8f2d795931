//! Reader connection multiplexer
//!
//! One listening socket, one thread per accepted reader connection, one
//! shared card transport. The transport serializes exchanges itself, so any
//! number of readers can come and go.

use std::io;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info};

use crate::backend::ApduTransport;
use crate::bridge::{ReaderProtocol, ReaderSession};

/// Accept loop for reader connections
pub struct BridgeServer {
    listener: TcpListener,
    protocol: ReaderProtocol,
    transport: Arc<dyn ApduTransport>,
    reader_timeout: Duration,
}

impl BridgeServer {
    /// Bind the listening socket; serving starts with [`run`](Self::run)
    pub fn bind(
        listen: &str,
        protocol: ReaderProtocol,
        transport: Arc<dyn ApduTransport>,
        reader_timeout: Duration,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(listen)?;
        info!("listening for readers on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            protocol,
            transport,
            reader_timeout,
        })
    }

    /// Address the server actually bound to
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve reader connections until the listener fails
    pub fn run(&self) -> io::Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => self.spawn_session(stream),
                Err(e) => {
                    // Transient accept failures happen under fd pressure;
                    // only a broken listener ends the loop.
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::ConnectionAborted
                    {
                        continue;
                    }
                    error!("accept failed: {e}");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn spawn_session(&self, mut stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        info!("reader connected from {peer}");

        // A dead reader must not pin its thread forever
        if let Err(e) = stream.set_read_timeout(Some(self.reader_timeout)) {
            error!("cannot set read timeout for {peer}: {e}");
            return;
        }

        let protocol = self.protocol.clone();
        let transport = Arc::clone(&self.transport);
        thread::spawn(move || {
            let mut session = ReaderSession::new(protocol, transport.as_ref());
            session.run(&mut stream);
            info!("reader session for {peer} ended");
        });
    }
}
