//! Teacher and student seeding.
//!
//! Identities and their role profiles are generated in parallel, then
//! inserted with one `UNNEST` statement per chunk.

use std::collections::HashMap;
use std::time::Instant;

use anyhow::Context;
use campus_core::Role;
use campus_models::{StudentId, TeacherId, UserId};
use fake::Fake;
use fake::faker::name::en::{FirstName, LastName};
use rand::seq::SliceRandom;
use rayon::prelude::*;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::SEED_EMAIL_DOMAIN;
use super::models::UserSeed;

const BATCH_SIZE: usize = 1000;

const SPECIALTIES: &[&str] = &[
    "Mathematics",
    "Physics",
    "Chemistry",
    "Biology",
    "Computer Science",
    "History",
    "Literature",
    "Economics",
    "Philosophy",
    "Music",
];

/// Emails carry a per-run tag so repeated seeds never collide.
fn seed_email(first: &str, last: &str, prefix: &str, idx: usize, run_tag: &str) -> String {
    let clean = |s: &str| {
        s.chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    };
    format!(
        "{}.{}+{prefix}{idx}.{run_tag}@{SEED_EMAIL_DOMAIN}",
        clean(first),
        clean(last)
    )
}

/// Ten uppercase alphanumerics, matching `^[A-Z0-9]{8,12}$`.
pub fn enrollment_number() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
}

fn generate_user(prefix: &str, idx: usize, run_tag: &str, profile_value: String) -> UserSeed {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();

    UserSeed {
        email: seed_email(&first_name, &last_name, prefix, idx, run_tag),
        full_name: format!("{first_name} {last_name}"),
        profile_value,
    }
}

pub fn generate_teachers(count: usize, run_tag: &str) -> Vec<UserSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let specialty = SPECIALTIES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or("General Studies");
            generate_user("teacher", idx, run_tag, specialty.to_string())
        })
        .collect()
}

pub fn generate_students(count: usize, run_tag: &str) -> Vec<UserSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| generate_user("student", idx, run_tag, enrollment_number()))
        .collect()
}

/// Inserts identities with the given role, returning ids keyed by email.
async fn insert_identities(
    tx: &mut Transaction<'_, Postgres>,
    users: &[UserSeed],
    role: Role,
    password_hash: &str,
) -> anyhow::Result<HashMap<String, UserId>> {
    let names: Vec<&str> = users.iter().map(|u| u.full_name.as_str()).collect();
    let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();

    let rows: Vec<(UserId, String)> = sqlx::query_as(
        r#"
        INSERT INTO users (full_name, email, password_hash, role)
        SELECT t.full_name, t.email, $3, $4
        FROM UNNEST($1::text[], $2::text[]) AS t(full_name, email)
        RETURNING id, email
        "#,
    )
    .bind(&names)
    .bind(&emails)
    .bind(password_hash)
    .bind(role)
    .fetch_all(&mut **tx)
    .await
    .context("Failed to insert seed identities")?;

    Ok(rows.into_iter().map(|(id, email)| (email, id)).collect())
}

fn owner_ids(users: &[UserSeed], ids: &HashMap<String, UserId>) -> anyhow::Result<Vec<Uuid>> {
    users
        .iter()
        .map(|u| {
            ids.get(&u.email)
                .map(|id| id.into_inner())
                .with_context(|| format!("No identity returned for {}", u.email))
        })
        .collect()
}

pub async fn seed_teachers(
    db: &PgPool,
    count: usize,
    run_tag: &str,
    password_hash: &str,
) -> anyhow::Result<Vec<TeacherId>> {
    let start_time = Instant::now();
    println!("🧑‍🏫 Seeding {count} teachers...");

    let teachers = generate_teachers(count, run_tag);
    let mut tx = db.begin().await?;
    let mut teacher_ids = Vec::with_capacity(count);

    for chunk in teachers.chunks(BATCH_SIZE) {
        let ids = insert_identities(&mut tx, chunk, Role::Teacher, password_hash).await?;
        let user_ids = owner_ids(chunk, &ids)?;
        let specialties: Vec<&str> = chunk.iter().map(|t| t.profile_value.as_str()).collect();

        let inserted: Vec<TeacherId> = sqlx::query_scalar(
            r#"
            INSERT INTO teachers (user_id, specialty)
            SELECT * FROM UNNEST($1::uuid[], $2::text[])
            RETURNING id
            "#,
        )
        .bind(&user_ids)
        .bind(&specialties)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to insert teacher profiles")?;
        teacher_ids.extend(inserted);
    }

    tx.commit().await?;
    println!(
        "   ✓ Inserted {} teachers in {:?}",
        teacher_ids.len(),
        start_time.elapsed()
    );
    Ok(teacher_ids)
}

pub async fn seed_students(
    db: &PgPool,
    count: usize,
    run_tag: &str,
    password_hash: &str,
) -> anyhow::Result<Vec<StudentId>> {
    let start_time = Instant::now();
    println!("🎓 Seeding {count} students...");

    let students = generate_students(count, run_tag);
    let mut tx = db.begin().await?;
    let mut student_ids = Vec::with_capacity(count);

    for chunk in students.chunks(BATCH_SIZE) {
        let ids = insert_identities(&mut tx, chunk, Role::Student, password_hash).await?;
        let user_ids = owner_ids(chunk, &ids)?;
        let numbers: Vec<&str> = chunk.iter().map(|s| s.profile_value.as_str()).collect();

        let inserted: Vec<StudentId> = sqlx::query_scalar(
            r#"
            INSERT INTO students (user_id, enrollment_number)
            SELECT * FROM UNNEST($1::uuid[], $2::text[])
            RETURNING id
            "#,
        )
        .bind(&user_ids)
        .bind(&numbers)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to insert student profiles")?;
        student_ids.extend(inserted);
    }

    tx.commit().await?;
    println!(
        "   ✓ Inserted {} students in {:?}",
        student_ids.len(),
        start_time.elapsed()
    );
    Ok(student_ids)
}

/// Deletes seeded identities together with their profiles.
pub async fn clear_users(db: &PgPool) -> anyhow::Result<u64> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded users...");

    let pattern = format!("%@{SEED_EMAIL_DOMAIN}");
    let mut tx = db.begin().await?;

    sqlx::query("DELETE FROM students WHERE user_id IN (SELECT id FROM users WHERE email LIKE $1)")
        .bind(&pattern)
        .execute(&mut *tx)
        .await
        .context("Failed to delete seeded students")?;
    sqlx::query("DELETE FROM teachers WHERE user_id IN (SELECT id FROM users WHERE email LIKE $1)")
        .bind(&pattern)
        .execute(&mut *tx)
        .await
        .context("Failed to delete seeded teachers")?;
    let deleted = sqlx::query("DELETE FROM users WHERE email LIKE $1")
        .bind(&pattern)
        .execute(&mut *tx)
        .await
        .context("Failed to delete seeded users")?
        .rows_affected();

    tx.commit().await?;
    println!("   ✓ Deleted {deleted} users in {:?}", start_time.elapsed());
    Ok(deleted)
}
