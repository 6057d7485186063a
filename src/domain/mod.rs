pub mod due_instant;
pub mod error;
pub mod filter;
pub mod models;
pub mod reminder;
