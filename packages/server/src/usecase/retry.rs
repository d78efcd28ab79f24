//! ストア操作の時間制限と、一時的なエラーの再試行

use std::{future::Future, time::Duration};

use crate::domain::RepositoryError;

/// ストア操作を `limit` で打ち切る
pub async fn bounded<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, RepositoryError>>,
) -> Result<T, RepositoryError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(RepositoryError::Timeout),
    }
}

/// `operation` を最大 `max_retries` 回まで再試行する
///
/// 再試行するのは `RepositoryError::is_transient` なエラーだけ。
/// 恒久的なエラーと、再試行を使い切った最後のエラーはそのまま返す。
pub async fn with_retry<T, F, Fut>(
    label: &str,
    max_retries: u32,
    backoff: Duration,
    mut operation: F,
) -> Result<T, RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                tracing::debug!(operation = label, attempt, "Transient store error, retrying: {}", e);
                tokio::time::sleep(backoff * attempt).await;
            }
            Err(e) => return Err(e),
        }
    }
}
