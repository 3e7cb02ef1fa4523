//! Core types for the No Waste Food Network.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod donation;
pub mod email;
pub mod id;
pub mod lenient;
pub mod quantity;
pub mod request;
pub mod role;
pub mod snapshot;
pub mod status;
pub mod user;
pub mod validation;

pub use contact::{ContactError, ContactNumber};
pub use donation::{Donation, DonationDraft, DonationFilter, DonationForm, DonationId};
pub use email::{Email, EmailError};
pub use id::*;
pub use quantity::{Quantity, QuantityError};
pub use request::{LedgerScope, PickupRequest};
pub use role::Role;
pub use snapshot::{LedgerSnapshot, SnapshotError};
pub use status::*;
pub use user::User;
pub use validation::ValidationErrors;
