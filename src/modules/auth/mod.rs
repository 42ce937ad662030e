//! Login, admin provisioning, and password management.

pub mod controller;
pub mod model;
pub mod router;
pub mod service;
