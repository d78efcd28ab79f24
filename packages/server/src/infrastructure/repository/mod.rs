//! Repository の実装
//!
//! - `inmemory`: HashMap を使ったインメモリ実装
//! - 将来的に: `postgres` など共有ストア

pub mod inmemory;

pub use inmemory::{
    InMemoryChannelRepository, InMemoryConnectionRepository, InMemoryMessageRepository,
};
