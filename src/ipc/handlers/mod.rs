pub mod analytics;
pub mod backup_exchange;
pub mod core;
pub mod grades;
pub mod insights;
pub mod reports;
pub mod selection;
pub mod students;
pub mod subjects;
