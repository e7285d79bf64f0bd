//! Client core for the FARM Starter API.
//!
//! - `api`: HTTP client for registration, sign-in/out and user fetches
//! - `auth`: token storage, claim decoding and the session manager
//! - `routes`: route table and the guard protecting signed-in views
//! - `forms`: client-side checks applied before credentials are sent
//! - `config`: persisted settings and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod forms;
pub mod models;
pub mod routes;

pub use api::{ApiClient, AuthApi, AuthError};
pub use auth::{Claims, Session, SessionManager, TokenStore};
pub use config::Config;
pub use routes::{Resolution, RouteGuard, RouteTable, View};
