//! ============================================================================
//! Retry Logic - Exponential Backoff & Confirmation Polling
//! ============================================================================
//! Provides:
//! - Exponential backoff with jitter for transient RPC failures
//! - Receipt polling bounded by a confirmation timeout
//! - Error classification (retryable vs permanent)
//! ============================================================================

use crate::chain::{ChainClient, ChainError, TxHash};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Configuration for retry and confirmation behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts for a retryable read
    pub max_read_retries: u32,
    /// Base delay between retries (will be multiplied by 2^attempt)
    pub base_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// First receipt polling interval, doubled on each miss
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this long
    pub confirm_timeout_secs: u64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_read_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 10000,
            poll_interval_ms: 1000,
            confirm_timeout_secs: 120,
            jitter: true,
        }
    }
}

/// Outcome of waiting for a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined and succeeded
    Confirmed { hash: TxHash, block_number: Option<u64> },
    /// Mined and reverted
    Reverted(TxHash),
    /// Not mined before the timeout (may still confirm)
    TimedOut(TxHash),
}

impl Confirmation {
    pub fn hash(&self) -> TxHash {
        match self {
            Self::Confirmed { hash, .. } | Self::Reverted(hash) | Self::TimedOut(hash) => *hash,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed { .. })
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorKind {
    /// Error is likely transient, should retry
    Retryable,
    /// Error is permanent, don't retry
    Permanent,
    /// Nonce clash with another pending transaction
    NonceConflict,
    /// Rate limited, back off more aggressively
    RateLimited,
}

/// Classify an RPC error message to determine if retry is appropriate
pub fn classify_error(error: &str) -> ErrorKind {
    let lower = error.to_lowercase();

    if lower.contains("nonce too low")
        || lower.contains("replacement transaction underpriced")
        || lower.contains("already known")
    {
        return ErrorKind::NonceConflict;
    }

    if lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        return ErrorKind::RateLimited;
    }

    if lower.contains("insufficient funds")
        || lower.contains("execution reverted")
        || lower.contains("invalid signature")
        || lower.contains("invalid sender")
        || lower.contains("gas required exceeds")
        || lower.contains("user rejected")
        || lower.contains("user denied")
    {
        return ErrorKind::Permanent;
    }

    if lower.contains("connection")
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("network")
        || lower.contains("temporar")
        || lower.contains("try again")
    {
        return ErrorKind::Retryable;
    }

    // Default to retryable for unknown errors
    ErrorKind::Retryable
}

/// Classify a structured chain error
pub fn classify_chain_error(error: &ChainError) -> ErrorKind {
    match error {
        ChainError::Rpc(msg) => classify_error(msg),
        ChainError::Revert(_) | ChainError::Decode(_) | ChainError::NoSigner => {
            ErrorKind::Permanent
        }
    }
}

/// Calculate delay with exponential backoff and optional jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    backoff(config.base_delay_ms, attempt, config)
}

/// Receipt polling delay for the given miss count
pub fn poll_delay(attempt: u32, config: &RetryConfig) -> Duration {
    backoff(config.poll_interval_ms, attempt, config)
}

fn backoff(base_ms: u64, attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = 2u64.saturating_pow(attempt.min(63));
    let capped_delay = base_ms.saturating_mul(multiplier).min(config.max_delay_ms);

    let final_delay = if config.jitter {
        // Add random jitter (0-50% of delay)
        let jitter_factor = 1.0 + rand::random::<f64>() * 0.5;
        (capped_delay as f64 * jitter_factor) as u64
    } else {
        capped_delay
    };

    Duration::from_millis(final_delay)
}

/// Run a chain read, retrying transient failures up to `max_read_retries`
/// extra times. Permanent errors are returned immediately.
pub async fn retry_read<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T, ChainError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChainError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let kind = classify_chain_error(&e);
                if kind == ErrorKind::Permanent || attempt >= config.max_read_retries {
                    return Err(e);
                }

                let delay = match kind {
                    ErrorKind::RateLimited => Duration::from_millis(config.max_delay_ms),
                    _ => calculate_delay(attempt, config),
                };
                debug!(
                    "Read attempt {} failed ({:?}): {} - retrying in {:?}",
                    attempt + 1,
                    kind,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Poll for a receipt until it is mined or the timeout elapses
pub async fn wait_for_confirmation(
    chain: &dyn ChainClient,
    hash: TxHash,
    config: &RetryConfig,
) -> Confirmation {
    info!("Waiting for confirmation of {:#x}", hash);

    let deadline = Instant::now() + Duration::from_secs(config.confirm_timeout_secs);
    let mut attempt = 0u32;

    loop {
        match chain.transaction_receipt(hash).await {
            Ok(Some(receipt)) if receipt.success => {
                info!(
                    "Transaction confirmed: {:#x} (poll attempt {})",
                    hash,
                    attempt + 1
                );
                return Confirmation::Confirmed {
                    hash,
                    block_number: receipt.block_number,
                };
            }
            Ok(Some(_)) => {
                warn!("Transaction reverted on-chain: {:#x}", hash);
                return Confirmation::Reverted(hash);
            }
            Ok(None) => {
                debug!("Transaction not yet mined (attempt {})", attempt + 1);
            }
            Err(e) => {
                // Continue polling on RPC errors
                warn!("Error fetching receipt (attempt {}): {}", attempt + 1, e);
            }
        }

        let now = Instant::now();
        if now >= deadline {
            warn!(
                "Confirmation polling timed out for {:#x} after {} attempts",
                hash,
                attempt + 1
            );
            return Confirmation::TimedOut(hash);
        }

        sleep(poll_delay(attempt, config).min(deadline - now)).await;
        attempt += 1;
    }
}
