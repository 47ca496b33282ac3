//! Authentication primitives.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- token signing and verification.
//! - [`session`] -- session issuing, validation with renewal, and logout.
//! - [`cookie`] -- the session cookie on the wire.

pub mod cookie;
pub mod jwt;
pub mod password;
pub mod session;
