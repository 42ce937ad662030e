//! # Campus CLI
//!
//! Database seeding utilities for Campus development and testing.
//!
//! ```ignore
//! use campus_cli::seeder::{seed_all, SeedConfig};
//!
//! seed_all(&pool, SeedConfig::new(5, 50, 10)).await?;
//! ```

pub mod seeder;
