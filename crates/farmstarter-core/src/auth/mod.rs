//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `TokenStore`: persistent slot for the bearer credential (file, keychain
//!   or memory)
//! - `decode`: claim extraction from the credential, without verification
//! - `SessionManager`: the single owner of the current `Session`
//!
//! Sessions are derived from the stored token at startup and dropped as soon
//! as the token's `exp` claim has passed.

pub mod claims;
pub mod clock;
pub mod session;
pub mod token_store;

pub use claims::{decode, Claims, DecodeError};
pub use clock::{Clock, FixedClock, SystemClock};
pub use session::{LogoutNotice, Session, SessionManager, LOGOUT_MESSAGE, LOGOUT_NOTICE_DURATION};
pub use token_store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
