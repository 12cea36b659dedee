//! Authentication module: password login + JWT
//!
//! Provides:
//! - JWT token encoding/decoding (`jwt` submodule)
//! - bcrypt password hashing (`password` submodule)
//! - Bearer middleware and `AuthUser` extractor
//! - `Mailer` seam for recovery mail

pub mod extractor;
pub mod jwt;
pub mod mailer;
pub mod middleware;
pub mod password;

pub use extractor::AuthUser;
pub use mailer::{LogMailer, Mailer};
