//! Database seeding with fake teachers, students and courses.
//!
//! - [`users`]: identities plus teacher and student profiles
//! - [`courses`]: courses and teacher assignments
//! - [`models`]: seed rows and [`SeedConfig`]
//!
//! Rows are generated in parallel with Rayon and inserted with `UNNEST`
//! batches. Every seeded account shares one bcrypt hash of
//! [`SEED_PASSWORD`], computed once at a low cost.

pub mod courses;
pub mod models;
pub mod users;

pub use models::SeedConfig;

use std::time::Instant;

use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

/// Domain used by every seeded email; `clear-seed` matches on it.
pub const SEED_EMAIL_DOMAIN: &str = "seed.campus.test";
/// Category attached to every seeded course.
pub const SEED_CATEGORY: &str = "seeded";
pub const SEED_PASSWORD: &str = "password123";

fn hash_seed_password() -> anyhow::Result<String> {
    bcrypt::hash(SEED_PASSWORD, 4).context("Failed to hash seed password")
}

fn run_tag() -> String {
    Uuid::new_v4().simple().to_string()[..6].to_string()
}

pub async fn seed_all(db: &PgPool, config: SeedConfig) -> anyhow::Result<()> {
    let start_time = Instant::now();

    println!("🌱 Starting database seeding...");
    println!("   - Teachers: {}", config.teachers);
    println!("   - Students: {}", config.students);
    println!("   - Courses: {}", config.courses);

    let password_hash = hash_seed_password()?;
    let tag = run_tag();

    let teacher_ids = users::seed_teachers(db, config.teachers, &tag, &password_hash).await?;
    users::seed_students(db, config.students, &tag, &password_hash).await?;
    courses::seed_courses(db, config.courses, &teacher_ids).await?;

    println!(
        "\n✅ Seeded {} users and {} courses in {:?}",
        config.total_users(),
        config.courses,
        start_time.elapsed()
    );
    println!("   Password for all seeded accounts: {SEED_PASSWORD}");
    Ok(())
}

/// Removes seeded courses first, then seeded identities and profiles.
pub async fn clear_all(db: &PgPool) -> anyhow::Result<()> {
    let start_time = Instant::now();
    println!("🧹 Clearing seeded data...");

    courses::clear_courses(db).await?;
    users::clear_users(db).await?;

    println!("\n✅ Seeded data cleared in {:?}", start_time.elapsed());
    Ok(())
}
