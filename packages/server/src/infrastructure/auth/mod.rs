//! 権限判定の実装

pub mod static_privilege;

pub use static_privilege::StaticPrivilegeChecker;
