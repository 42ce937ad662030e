pub use campus_models::teachers::*;
