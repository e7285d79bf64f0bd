//! Route protection.
//!
//! This module provides:
//! - `guard`: the pure decision for one view given the current session
//! - `RouteGuard`: the same decision kept in step with a `SessionManager`
//! - `RouteTable`: ordered, nestable routes mapping paths to views

pub mod guard;
pub mod table;

pub use guard::{guard, Access, Decision, RouteGuard, SIGNIN_PATH};
pub use table::{Resolution, Route, RouteTable, View};
