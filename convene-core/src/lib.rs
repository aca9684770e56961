//! Convene Core Library
//!
//! Core functionality for Convene - fair meeting points for groups.
//!
//! # Modules
//!
//! - [`geometry`]: Minimum enclosing circle and great-circle helpers
//! - [`location`]: Location and address fuzzing for privacy
//! - [`meeting`]: Meeting events, participants, and change events
//! - [`replica`]: The client-side replica and its change application
//! - [`vote`]: Optimistic venue voting
//! - [`service`]: Contracts for the external meeting service
//! - [`sync`]: Real-time synchronization against the service

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![deny(unsafe_code)]

pub mod geometry;
pub mod location;
pub mod meeting;
pub mod replica;
pub mod service;
pub mod sync;
pub mod vote;
