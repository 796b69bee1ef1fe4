use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::domain::lead::LeadSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, sqlx::Type)]
#[sqlx(type_name = "SearchProvider", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum SearchProvider {
    GoogleMaps,
    Tiktok,
    Instagram,
}

impl SearchProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            SearchProvider::GoogleMaps => "Google Maps",
            SearchProvider::Tiktok => "TikTok",
            SearchProvider::Instagram => "Instagram",
        }
    }

    /// Which source tag leads found through this provider carry.
    pub fn lead_source(&self) -> LeadSource {
        match self {
            SearchProvider::GoogleMaps => LeadSource::GoogleMaps,
            SearchProvider::Tiktok => LeadSource::ApifyTiktok,
            SearchProvider::Instagram => LeadSource::ApifyInstagram,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "AttemptStatus", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl AttemptStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            AttemptStatus::Pending => "Pending",
            AttemptStatus::Running => "Running",
            AttemptStatus::Done => "Done",
            AttemptStatus::Failed => "Failed",
        }
    }
}

/// Audit record of one user-initiated search. Terminal once done or failed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SearchAttempt {
    pub id: Uuid,
    pub query_text: String,
    pub provider: SearchProvider,
    pub status: AttemptStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
