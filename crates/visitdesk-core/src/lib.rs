//! Core types and trait definitions for the visitdesk reception API.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::VisitStore`]; mail transports
//! implement [`notice::Mailer`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod lifecycle;
pub mod notice;
pub mod person;
pub mod store;
pub mod visit;

pub use error::{Classify, Error, Fault, Result};
