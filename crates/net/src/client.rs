//! Minimal TCP client for the hostel protocol
//!
//! Sequential request/response only; used by integration tests and small
//! admin tooling. Server pushes (`Notify`, `ServerShutdown`) arrive
//! interleaved and can be drained with `recv`.

use std::net::SocketAddr;

use tokio::io::{ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tracing::info;

use crate::error::Result;
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Client handle for network operations
pub struct Client {
    reader: ReadHalf<TcpStream>,
    writer: WriteHalf<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        info!(addr = %addr, "Connecting to server");
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);
        Ok(Client { reader, writer })
    }

    /// Send a request without waiting for the reply
    pub async fn send(&mut self, request: Request) -> Result<()> {
        write_frame(&mut self.writer, &request).await
    }

    /// Receive the next frame from the server
    pub async fn recv(&mut self) -> Result<Response> {
        read_frame(&mut self.reader).await
    }

    /// Send a request and wait for the next frame
    pub async fn request(&mut self, request: Request) -> Result<Response> {
        self.send(request).await?;
        self.recv().await
    }
}
