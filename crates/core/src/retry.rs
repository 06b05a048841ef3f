//! Generic retry-with-verification executor.
//!
//! Remote torrent clients acknowledge commands before applying them, so every
//! state-changing call is followed by a delayed post-condition check. The
//! executor owns that loop: run, wait, verify, back off, repeat.

use std::future::Future;

use thiserror::Error;
use tracing::warn;

use crate::config::RetryConfig;

/// Errors produced when a retried operation keeps failing with transport
/// errors. Verification that never turns true is not an error (see
/// [`RetryExecutor::run`]).
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("failed to {operation} after {attempts} attempts: {source}")]
    Exhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Runs operations with delayed verification and exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute `operation`, sleep the verification delay, then evaluate
    /// `verify` against remote state.
    ///
    /// `verify` returning `false` triggers a backoff-and-retry cycle; once
    /// attempts are exhausted the call resolves to `Ok(false)`. An `Err`
    /// from either closure is retried the same way and resolves to
    /// [`RetryError::Exhausted`] when attempts run out.
    ///
    /// Verification predicates must tolerate duplicate application: the
    /// operation may be re-issued after it already took effect.
    pub async fn run<Op, OpFut, V, VFut, E>(
        &self,
        name: &str,
        mut operation: Op,
        mut verify: V,
    ) -> Result<bool, RetryError>
    where
        Op: FnMut() -> OpFut,
        OpFut: Future<Output = Result<(), E>>,
        V: FnMut() -> VFut,
        VFut: Future<Output = Result<bool, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let cfg = &self.config;
        let mut delay = cfg.initial_delay();

        for attempt in 1..=cfg.max_attempts {
            let outcome = async {
                operation().await?;
                tokio::time::sleep(cfg.verification_delay()).await;
                verify().await
            }
            .await;

            match outcome {
                Ok(true) => return Ok(true),
                Ok(false) => {
                    if attempt == cfg.max_attempts {
                        return Ok(false);
                    }
                    warn!(
                        "{}: verification failed, attempt {}/{}",
                        name, attempt, cfg.max_attempts
                    );
                }
                Err(e) => {
                    if attempt == cfg.max_attempts {
                        return Err(RetryError::Exhausted {
                            operation: name.to_string(),
                            attempts: cfg.max_attempts,
                            source: Box::new(e),
                        });
                    }
                    warn!("{}: attempt {} failed: {}", name, attempt, e);
                }
            }

            tokio::time::sleep(delay).await;
            delay = delay.mul_f64(cfg.backoff_factor).min(cfg.max_delay());
        }

        Ok(false)
    }
}
