/*
Copyright 2024-2025 The Canonica Authors

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

     https://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! The retry policy of §4.11: bounded exponential backoff over a single
//! retryable operation. Authorization, planning, and constraint errors never
//! reach here — they are fatal at their own layer.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled).min(self.max_backoff)
    }
}

/// The outcome of a retried operation: every attempted error plus a pointer
/// to the one that ended the loop (§4.11 "last error pointer").
#[derive(Debug)]
pub struct RetryExhausted {
    pub history: Vec<AdapterError>,
}

impl RetryExhausted {
    /// Unwraps to the underlying cause (§4.11).
    pub fn last_error(&self) -> &AdapterError {
        self.history.last().expect("retry history is never empty")
    }
}

impl std::fmt::Display for RetryExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry exhausted after {} attempt(s): {}", self.history.len(), self.last_error())
    }
}

impl std::error::Error for RetryExhausted {}

/// Retries `op` under bounded exponential backoff. Stops on the first
/// non-retryable error, on a cancelled `ctx`, or once `max_attempts` is
/// spent; either way the full attempt history is preserved.
pub async fn retry<F, Fut, T>(ctx: &CancellationToken, policy: &RetryPolicy, mut op: F) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AdapterError>>,
{
    let mut history = Vec::new();

    for attempt in 0..policy.max_attempts {
        if ctx.is_cancelled() {
            history.push(AdapterError::ContextCancelled);
            return Err(RetryExhausted { history });
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                history.push(err);
                if !retryable {
                    return Err(RetryExhausted { history });
                }
                if attempt + 1 < policy.max_attempts {
                    tokio::select! {
                        _ = tokio::time::sleep(policy.backoff_for(attempt)) => {}
                        _ = ctx.cancelled() => {
                            history.push(AdapterError::ContextCancelled);
                            return Err(RetryExhausted { history });
                        }
                    }
                }
            }
        }
    }

    Err(RetryExhausted { history })
}
