//! ============================================================================
//! Auth Module - Wallet sessions and sign-in
//! ============================================================================
//! - Session resolution from cookie, bearer token or trusted wallet header
//! - Signed-message wallet sign-in with single-use nonces
//! ============================================================================

mod session;
mod siwe;

pub use session::{
    IdentitySource, RequestCredentials, SessionIdentity, SessionProvider, StoreSessionProvider,
    SESSION_COOKIE, WALLET_HEADER,
};
pub use siwe::{generate_nonce, sign_in_message, SignIn, SignInError, NONCE_LENGTH};
