pub mod instagram;
pub mod lead;
pub mod search_attempt;
