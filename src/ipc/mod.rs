//! Control socket: newline-delimited JSON over a Unix domain socket.

mod client;
mod protocol;
mod server;

pub use client::ControlClient;
pub use protocol::{decode_line, encode_line, Request, Response, VersionInfo};
pub use server::ControlServer;
