//! No Waste Food Network Core - Shared domain types.
//!
//! This crate provides the types shared by every No Waste component:
//! - `server` - HTTP service owning the request ledger and role views
//! - `cli` - Command-line tools for migrations, accounts and ledger snapshots
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. Donation form validation, catalog filtering and the
//! pickup request state machine live here so that every caller applies the
//! same rules.
//!
//! # Modules
//!
//! - [`types`] - Ids, emails, contact numbers, quantities, roles, statuses,
//!   donations, pickup requests and the ledger snapshot format

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
