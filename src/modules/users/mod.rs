//! Admin management of identities.

pub mod controller;
pub mod model;
pub mod router;
pub mod service;
