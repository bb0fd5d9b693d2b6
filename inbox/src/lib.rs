//! Notification state synchronizer for the alumni network client.
//!
//! Keeps a local notification list and unread counter consistent with the
//! remote notification store under polling and user-driven mutation.

pub mod badge;
pub mod cache;
pub mod cli;
pub mod config;
pub mod errors;
pub mod filter;
pub mod models;
pub mod sync;
pub mod transport;
