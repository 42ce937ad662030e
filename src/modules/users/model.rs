//! Identity models, shared with the CLI through `campus-models`.

pub use campus_models::users::*;
