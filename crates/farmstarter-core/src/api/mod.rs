//! REST API client module for the FARM Starter backend.
//!
//! This module provides the `ApiClient` for registering accounts, signing
//! in and out, and fetching users. Authenticated calls carry the access
//! token as an `Authorization: Bearer` header.

pub mod client;
pub mod error;

pub use client::{ApiClient, AuthApi};
pub use error::{AuthError, Operation};
