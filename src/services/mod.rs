pub mod apify;
pub mod deduplicator;
pub mod google_maps;
pub mod normalizer;
pub mod persistence;
pub mod sheets;
pub mod staging;

pub use apify::*;
pub use deduplicator::*;
pub use google_maps::*;
pub use normalizer::*;
pub use persistence::*;
pub use sheets::*;
pub use staging::*;

use crate::error::ProviderError;

pub const MAX_QUERY_LEN: usize = 255;

/// Rejects unusable queries before any network call goes out.
pub fn validate_query(provider: &str, query: &str) -> Result<(), ProviderError> {
    if query.trim().is_empty() {
        return Err(ProviderError::InvalidQuery {
            provider: provider.to_string(),
            reason: "query is empty".to_string(),
        });
    }
    if query.len() > MAX_QUERY_LEN {
        return Err(ProviderError::InvalidQuery {
            provider: provider.to_string(),
            reason: format!("query exceeds {} characters", MAX_QUERY_LEN),
        });
    }
    Ok(())
}
