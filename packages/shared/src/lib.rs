//! Hiroba の server / テストで共有するユーティリティ。

pub mod logger;
pub mod time;
