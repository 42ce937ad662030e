//! Course seeding.

use std::time::Instant;

use anyhow::Context;
use campus_models::{CourseId, CourseStatus, TeacherId};
use chrono::{Duration, Utc};
use fake::Fake;
use fake::faker::lorem::en::{Sentence, Word};
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use sqlx::PgPool;
use uuid::Uuid;

use super::SEED_CATEGORY;
use super::models::CourseSeed;

const CATEGORIES: &[&str] = &["science", "humanities", "languages", "arts", "technology"];

const STATUSES: &[CourseStatus] = &[
    CourseStatus::Planning,
    CourseStatus::OpenEnrollment,
    CourseStatus::OpenEnrollment,
    CourseStatus::Active,
];

fn status_label(status: CourseStatus) -> &'static str {
    match status {
        CourseStatus::Planning => "planning",
        CourseStatus::OpenEnrollment => "open_enrollment",
        CourseStatus::Active => "active",
        CourseStatus::Completed => "completed",
        CourseStatus::Cancelled => "cancelled",
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn generate_courses(count: usize, teacher_ids: &[TeacherId]) -> Vec<CourseSeed> {
    let today = Utc::now().date_naive();

    (0..count)
        .into_par_iter()
        .map(|idx| {
            let mut rng = rand::thread_rng();
            let topic: String = Word().fake();
            let start_date = today + Duration::days(rng.gen_range(0..60));
            let end_date = start_date + Duration::days(rng.gen_range(30..120));

            CourseSeed {
                name: format!("{} {}", capitalize(&topic), 100 + idx),
                description: Sentence(6..12).fake(),
                teacher_id: teacher_ids.choose(&mut rng).copied(),
                total_hours: rng.gen_range(10..=120),
                start_date,
                end_date,
                status: STATUSES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(CourseStatus::Planning),
                capacity: rng.gen_range(10..=40),
                category: CATEGORIES
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or("general")
                    .to_string(),
            }
        })
        .collect()
}

/// Inserts courses and their `teacher_courses` assignments.
pub async fn seed_courses(
    db: &PgPool,
    count: usize,
    teacher_ids: &[TeacherId],
) -> anyhow::Result<Vec<CourseId>> {
    let start_time = Instant::now();
    println!("📚 Seeding {count} courses...");

    let courses = generate_courses(count, teacher_ids);

    let names: Vec<&str> = courses.iter().map(|c| c.name.as_str()).collect();
    let descriptions: Vec<&str> = courses.iter().map(|c| c.description.as_str()).collect();
    let teachers: Vec<Option<Uuid>> = courses
        .iter()
        .map(|c| c.teacher_id.map(TeacherId::into_inner))
        .collect();
    let hours: Vec<i32> = courses.iter().map(|c| c.total_hours).collect();
    let starts: Vec<_> = courses.iter().map(|c| c.start_date).collect();
    let ends: Vec<_> = courses.iter().map(|c| c.end_date).collect();
    let statuses: Vec<&str> = courses.iter().map(|c| status_label(c.status)).collect();
    let capacities: Vec<i32> = courses.iter().map(|c| c.capacity).collect();
    let categories: Vec<&str> = courses.iter().map(|c| c.category.as_str()).collect();

    let mut tx = db.begin().await?;

    let ids: Vec<CourseId> = sqlx::query_scalar(
        r#"
        INSERT INTO courses (name, description, teacher_id, total_hours, start_date, end_date,
                             status, capacity, categories)
        SELECT t.name, t.description, t.teacher_id, t.total_hours, t.start_date, t.end_date,
               t.status::course_status, t.capacity, ARRAY[t.category, $10]
        FROM UNNEST($1::text[], $2::text[], $3::uuid[], $4::int4[], $5::date[], $6::date[],
                    $7::text[], $8::int4[], $9::text[])
            AS t(name, description, teacher_id, total_hours, start_date, end_date,
                 status, capacity, category)
        RETURNING id
        "#,
    )
    .bind(&names)
    .bind(&descriptions)
    .bind(&teachers)
    .bind(&hours)
    .bind(&starts)
    .bind(&ends)
    .bind(&statuses)
    .bind(&capacities)
    .bind(&categories)
    .bind(SEED_CATEGORY)
    .fetch_all(&mut *tx)
    .await
    .context("Failed to insert seed courses")?;

    sqlx::query(
        r#"
        INSERT INTO teacher_courses (teacher_id, course_id)
        SELECT teacher_id, id FROM courses
        WHERE id = ANY($1::uuid[]) AND teacher_id IS NOT NULL
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&ids)
    .execute(&mut *tx)
    .await
    .context("Failed to assign seed courses")?;

    tx.commit().await?;
    println!(
        "   ✓ Inserted {} courses in {:?}",
        ids.len(),
        start_time.elapsed()
    );
    Ok(ids)
}

/// Deletes courses tagged with the seed category. Roster, materials and
/// teacher assignments cascade.
pub async fn clear_courses(db: &PgPool) -> anyhow::Result<u64> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded courses...");

    let deleted = sqlx::query("DELETE FROM courses WHERE $1 = ANY(categories)")
        .bind(SEED_CATEGORY)
        .execute(db)
        .await
        .context("Failed to delete seeded courses")?
        .rows_affected();

    println!("   ✓ Deleted {deleted} courses in {:?}", start_time.elapsed());
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_courses_are_well_formed() {
        let teachers = vec![TeacherId::new(), TeacherId::new()];
        let courses = generate_courses(25, &teachers);

        assert_eq!(courses.len(), 25);
        for course in &courses {
            assert!(course.start_date <= course.end_date);
            assert!((10..=120).contains(&course.total_hours));
            assert!((10..=40).contains(&course.capacity));
            assert!(
                course
                    .teacher_id
                    .is_some_and(|id| teachers.contains(&id))
            );
        }
    }

    #[test]
    fn test_courses_without_teachers() {
        let courses = generate_courses(3, &[]);
        assert!(courses.iter().all(|c| c.teacher_id.is_none()));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("algebra"), "Algebra");
        assert_eq!(capitalize(""), "");
    }
}
