//! Time-related utilities with clock abstraction for testability.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{FixedOffset, TimeZone, Utc};

/// JST is UTC+9
const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Get current Unix timestamp in JST (milliseconds)
    fn now_jst_millis(&self) -> i64;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_jst_millis(&self) -> i64 {
        get_jst_timestamp()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: i64,
}

impl FixedClock {
    /// Create a new fixed clock with the given timestamp
    pub fn new(fixed_time_millis: i64) -> Self {
        Self {
            fixed_time: fixed_time_millis,
        }
    }
}

impl Clock for FixedClock {
    fn now_jst_millis(&self) -> i64 {
        self.fixed_time
    }
}

/// 手動で進められる時計（タイムアウト系のテスト用）
///
/// Reaper / Sentinel のように「経過時間」で判定するロジックを、
/// 実時間を待たずに検証するために使う。
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a new manual clock starting at the given timestamp
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    /// 時計を `millis` ミリ秒進める
    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    /// 時計を指定時刻に合わせる
    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_jst_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn jst_offset() -> Option<FixedOffset> {
    FixedOffset::east_opt(JST_OFFSET_SECS)
}

/// Get current Unix timestamp in JST (milliseconds)
///
/// Unix タイムスタンプはタイムゾーンに依存しないので、UTC の現在時刻と同じ値になる。
pub fn get_jst_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert Unix timestamp (milliseconds) to JST RFC 3339 format
///
/// 範囲外のタイムスタンプは空文字列ではなく `None` として扱う。
pub fn timestamp_to_jst_rfc3339(timestamp_millis: i64) -> Option<String> {
    let seconds = timestamp_millis.div_euclid(1000);
    let nanos = (timestamp_millis.rem_euclid(1000) * 1_000_000) as u32;
    jst_offset()?
        .timestamp_opt(seconds, nanos)
        .single()
        .map(|dt| dt.to_rfc3339())
}
