pub mod lead_db;
pub mod search_attempt_db;
