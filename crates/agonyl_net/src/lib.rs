//! The session fabric shared by every process: a TCP server with a session
//! registry, a bounded single-writer channel per connection, and a
//! reconnecting client for long-lived peer links.

mod client;
mod id;
mod server;
mod session;

pub use client::{PeerClient, PeerHandler, RECONNECT_DELAY};
pub use id::IdGenerator;
pub use server::{SessionHandler, TcpServer};
pub use session::{SendError, Session, SESSION_SEND_CAPACITY};
