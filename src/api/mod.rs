//! GrowDesk REST API: client wrapper, wire types and service wrappers.

pub mod api_types;
pub mod auth;
pub mod cache;
pub mod client;
pub mod tickets;
pub mod types;
pub mod users;
