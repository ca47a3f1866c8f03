//! Dorma Network Library
//!
//! TCP request/response protocol for the hostel service.
//!
//! # Architecture
//!
//! - **Server**: owns the database, authenticates connections and gates
//!   every request through the permission matrix
//! - **Client**: sequential request/response handle
//! - **Protocol**: length-prefixed JSON messages
//!
//! # Usage
//!
//! ```ignore
//! // Operator starts the server
//! let server = Server::start(7420, db, 24).await?;
//!
//! // Client connects and must log in first
//! let mut client = Client::connect(server.addr()).await?;
//! let reply = client.request(Request::Login { email, password }).await?;
//! ```

pub mod auth;
pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::Client;
pub use error::{Error, Result};
pub use protocol::{ErrorCode, Request, Response};
pub use server::Server;

/// Default port for Dorma servers
pub const DEFAULT_PORT: u16 = 7420;
