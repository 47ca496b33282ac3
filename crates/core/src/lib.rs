//! Domain types shared by every FleetWise crate.
//!
//! - [`error`] -- the domain error taxonomy.
//! - [`types`] -- primary key and timestamp aliases.
//! - [`session`] -- session identifiers, the session store seam, and the
//!   renewal constants.
//! - [`signup`] -- credential field rules applied on registration.

pub mod error;
pub mod session;
pub mod signup;
pub mod types;
