//! ============================================================================
//! Access Module - Subscription-gated access to premium content
//! ============================================================================
//! - `AccessResolver`: does a subscriber hold an ACTIVE subscription to a
//!   creator? Fail-closed on any chain error.
//! - `ContentGate`: free / owner / subscriber / denied decision for one read
//!
//! ## Usage
//! ```rust,ignore
//! use onezap_core::access::{AccessRequest, AccessResolver, ContentGate};
//!
//! let gate = ContentGate::new(AccessResolver::new(chain.clone()));
//! let access = gate.evaluate(&request).await?;
//! if access.grants_body() { /* include body */ }
//! ```
//! ============================================================================

mod gate;
mod resolver;
mod types;

pub use gate::ContentGate;
pub use resolver::AccessResolver;
pub use types::{
    format_token_amount, subscription_price, AccessRequest, ContentAccess, GateError,
    DEFAULT_TOKEN_DECIMALS, SUBSCRIPTION_PRICE_UNITS,
};
