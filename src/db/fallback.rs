//! Ordered candidate chains.
//!
//! Used where a dialect difference is resolved by trying alternatives in a fixed
//! order: row sampling syntaxes, and Oracle's upper-case identifier retry.

use crate::error::{DbError, DbResult};
use std::future::Future;
use tracing::debug;

/// Try each candidate in order. The first success wins and is returned with its
/// index; if all fail, the last failure is returned.
pub async fn first_success<C, T, F, Fut>(candidates: &[C], mut attempt: F) -> DbResult<(usize, T)>
where
    F: FnMut(&C) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut last_err = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        match attempt(candidate).await {
            Ok(value) => return Ok((idx, value)),
            Err(e) => {
                debug!(candidate = idx, error = %e, "Candidate failed, trying next");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| DbError::internal("No candidates to try")))
}

/// Try each candidate in order until one yields a non-empty result.
///
/// Errors are not retried: the first failure is returned immediately. When every
/// candidate comes back empty, the empty result is returned.
pub async fn first_non_empty<C, T, F, Fut>(candidates: &[C], mut attempt: F) -> DbResult<Vec<T>>
where
    F: FnMut(&C) -> Fut,
    Fut: Future<Output = DbResult<Vec<T>>>,
{
    for candidate in candidates {
        let items = attempt(candidate).await?;
        if !items.is_empty() {
            return Ok(items);
        }
    }
    Ok(Vec::new())
}
