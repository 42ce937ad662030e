//! Shared utilities.
//!
//! - [`email`]: SMTP delivery of password reset links

pub mod email;
