//! Seed rows and seeding configuration.

use campus_models::{CourseStatus, TeacherId};
use chrono::NaiveDate;

/// An identity about to be inserted, with the profile column of its role.
pub struct UserSeed {
    pub full_name: String,
    pub email: String,
    /// `enrollment_number` for students, `specialty` for teachers.
    pub profile_value: String,
}

pub struct CourseSeed {
    pub name: String,
    pub description: String,
    pub teacher_id: Option<TeacherId>,
    pub total_hours: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: CourseStatus,
    pub capacity: i32,
    pub category: String,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedConfig {
    pub teachers: usize,
    pub students: usize,
    pub courses: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            teachers: 5,
            students: 50,
            courses: 10,
        }
    }
}

impl SeedConfig {
    pub fn new(teachers: usize, students: usize, courses: usize) -> Self {
        Self {
            teachers,
            students,
            courses,
        }
    }

    pub fn total_users(&self) -> usize {
        self.teachers + self.students
    }
}
