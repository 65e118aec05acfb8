//! HTTP surface for the intake core.
//!
//! Route handlers live in `routes.rs`, shared state in `state.rs`, wire
//! types in `api_types.rs`, bearer-token gates in `auth.rs`, background
//! cadences in `tasks.rs`. `main.rs` only wires these together.

pub mod api_types;
pub mod auth;
pub mod routes;
pub mod state;
pub mod tasks;
