//! Transports from a producer to the gateway.

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tracing::info;
use wire::TransportError;

/// Sends one encoded record to the gateway.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, record: &str) -> Result<(), TransportError>;
}

// ------------------------------------------------------------------ //
//  StreamLink                                                         //
// ------------------------------------------------------------------ //

/// Long-lived TCP connection, one newline-terminated record per send.
///
/// A failed connect or write drops the connection; the next send dials
/// again. Records are never buffered across a reconnect.
#[derive(Debug)]
pub struct StreamLink {
    addr: String,
    stream: Option<TcpStream>,
}

impl StreamLink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connected(&mut self) -> Result<&mut TcpStream, TransportError> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = TcpStream::connect(&self.addr)
                    .await
                    .map_err(|source| TransportError::Connect {
                        addr: self.addr.clone(),
                        source,
                    })?;
                info!(addr = %self.addr, "connected to gateway");
                stream
            }
        };
        Ok(self.stream.insert(stream))
    }
}

#[async_trait]
impl Link for StreamLink {
    async fn send(&mut self, record: &str) -> Result<(), TransportError> {
        let mut line = String::with_capacity(record.len() + 1);
        line.push_str(record);
        line.push('\n');

        let stream = self.connected().await?;
        if let Err(source) = stream.write_all(line.as_bytes()).await {
            self.stream = None;
            return Err(TransportError::Send {
                addr: self.addr.clone(),
                source,
            });
        }
        Ok(())
    }
}

// ------------------------------------------------------------------ //
//  DatagramLink                                                       //
// ------------------------------------------------------------------ //

/// Unconnected UDP socket; each send is one datagram to the gateway.
#[derive(Debug)]
pub struct DatagramLink {
    socket: UdpSocket,
    target: String,
}

impl DatagramLink {
    pub async fn bind(target: impl Into<String>) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|source| TransportError::Bind {
                addr: "0.0.0.0:0".to_string(),
                source,
            })?;
        Ok(Self {
            socket,
            target: target.into(),
        })
    }
}

#[async_trait]
impl Link for DatagramLink {
    async fn send(&mut self, record: &str) -> Result<(), TransportError> {
        self.socket
            .send_to(record.as_bytes(), self.target.as_str())
            .await
            .map(|_| ())
            .map_err(|source| TransportError::Send {
                addr: self.target.clone(),
                source,
            })
    }
}
