pub mod assistant;
pub mod document_service;
pub mod document_store;
pub mod notifier;
pub mod review_reminders;
pub mod task_service;
pub mod team_service;
