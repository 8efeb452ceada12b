//! DeliveryOS Core - Shared domain types.
//!
//! This crate provides the types shared by the integration engine and the
//! command-line tooling:
//! - `integration` - Upstream commerce API client, response cache and order sync
//! - `cli` - Operator commands for connections, orders and migrations
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, upstream status enums and money amounts

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
