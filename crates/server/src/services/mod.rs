//! Business logic services.

pub mod auth;
pub mod identity;
pub mod session;
pub mod submission;

pub use auth::{AuthError, AuthService};
pub use identity::{AuthEvent, Identity, IdentityError, IdentityProvider};
pub use session::{LogoutOutcome, RemoteSignOut, SessionStore};
pub use submission::{EchoBook, SubmissionError, SubmissionService};
