//! Data models for API entities.
//!
//! - `User`: account as returned by the users endpoints
//! - `NewUser`, `RegisteredUser`: registration request and response
//! - `SignInRequest`, `TokenResponse`: sign-in request and response

pub mod user;

pub use user::{NewUser, RegisteredUser, SignInRequest, TokenResponse, User};
