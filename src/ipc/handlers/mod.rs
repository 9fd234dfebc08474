pub mod analytics;
pub mod core;
pub mod marks;
pub mod setup;
pub mod students;
pub mod subjects;
