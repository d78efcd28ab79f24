//! インメモリ Repository 実装

pub mod channel;
pub mod connection;
pub mod message;

pub use channel::InMemoryChannelRepository;
pub use connection::InMemoryConnectionRepository;
pub use message::InMemoryMessageRepository;
