pub use campus_models::conversations::*;
