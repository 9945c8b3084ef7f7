//! Downstream publishing: message schema and the TCP stream server.

pub mod message;
pub mod server;

pub use message::FramePacket;
pub use server::{PublisherListener, StreamPublisher, DEFAULT_BIND};
