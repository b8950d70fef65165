//! Domain types and DTOs
//!
//! These types define the data structures for TécnicoYa entities and the
//! pure state-transition rules the route handlers enforce.

pub mod jobs;
pub mod memberships;
pub mod messages;
pub mod notifications;
pub mod quotes;
pub mod requests;
pub mod reviews;
pub mod users;
