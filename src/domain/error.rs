use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid due date input: {0}")]
    InvalidDueDateInput(String),
    #[error("invalid reminder input: {0}")]
    InvalidReminderInput(String),
}
