//! Course catalog, materials, and the enrollment workflow.

pub mod controller;
pub mod enrollment;
pub mod model;
pub mod router;
pub mod service;
