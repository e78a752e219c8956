pub mod core;
pub mod curriculum;
pub mod enrollments;
pub mod grades;
pub mod migration;
pub mod programs;
pub mod semesters;
pub mod settings;
pub mod students;
