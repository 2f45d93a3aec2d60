//! API handlers for Ballot.

pub mod auth;
pub mod health;
pub mod root;
