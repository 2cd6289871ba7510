//! ============================================================================
//! Submit Module - Subscription action submission and confirmation
//! ============================================================================
//! - `SubscriptionSubmitter`: subscribe / withdraw / register writes
//! - Allowance top-up before subscribe
//! - Receipt polling with exponential backoff and a timeout
//! ============================================================================

mod retry;
mod submitter;

pub use retry::{
    calculate_delay, classify_chain_error, classify_error, poll_delay, retry_read,
    wait_for_confirmation, Confirmation, ErrorKind, RetryConfig,
};
pub use submitter::{
    confirmation_result, translate_reason, ApprovalMode, SubscribeOptions, SubscribeSubmission,
    SubscriptionSubmitter, TxError,
};
