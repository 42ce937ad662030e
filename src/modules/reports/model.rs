pub use campus_models::reports::*;
