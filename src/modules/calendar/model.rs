pub use campus_models::calendar::*;
