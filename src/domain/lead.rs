use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "LeadSource", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    GoogleMaps,
    ApifyTiktok,
    ApifyInstagram,
    Manual,
}

impl LeadSource {
    /// Parses the value the list-filter form sends; empty means no filter.
    pub fn parse(value: &str) -> Option<LeadSource> {
        match value {
            "google_maps" => Some(LeadSource::GoogleMaps),
            "apify_tiktok" => Some(LeadSource::ApifyTiktok),
            "apify_instagram" => Some(LeadSource::ApifyInstagram),
            "manual" => Some(LeadSource::Manual),
            _ => None,
        }
    }

    pub fn form_value(&self) -> &'static str {
        match self {
            LeadSource::GoogleMaps => "google_maps",
            LeadSource::ApifyTiktok => "apify_tiktok",
            LeadSource::ApifyInstagram => "apify_instagram",
            LeadSource::Manual => "manual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LeadSource::GoogleMaps => "Google Maps",
            LeadSource::ApifyTiktok => "Apify TikTok",
            LeadSource::ApifyInstagram => "Apify Instagram",
            LeadSource::Manual => "Manual Entry",
        }
    }
}

/// A discovered café business, normalized from whichever provider found it.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub name: String,
    pub city: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub instagram_handle: Option<String>,
    pub tiktok_handle: Option<String>,
    pub source: LeadSource,
    pub external_id: Option<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    /// The key duplicates are detected by: the provider's stable id when it
    /// gave us one, else the social handle, else normalized name+city.
    pub fn natural_key(&self) -> String {
        if let Some(external_id) = self.external_id.as_deref().filter(|id| !id.is_empty()) {
            return external_id.to_string();
        }
        if let Some(handle) = self.social_handle() {
            return handle.to_lowercase();
        }
        let city = self.city.as_deref().unwrap_or("");
        format!("{}|{}", squash(&self.name), squash(city))
    }

    /// Instagram handle first, TikTok as the fallback.
    pub fn social_handle(&self) -> Option<&str> {
        self.instagram_handle
            .as_deref()
            .filter(|h| !h.is_empty())
            .or_else(|| self.tiktok_handle.as_deref().filter(|h| !h.is_empty()))
    }

    /// Export predicate: only leads with a social handle go to the sheet.
    pub fn has_social_handle(&self) -> bool {
        self.social_handle().is_some()
    }

    pub fn instagram_url(&self) -> Option<String> {
        self.instagram_handle
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| format!("https://www.instagram.com/{}/", h))
    }

    pub fn tiktok_url(&self) -> Option<String> {
        self.tiktok_handle
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(|h| format!("https://www.tiktok.com/@{}", h))
    }
}

fn squash(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_lead() -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: "Blue Bottle Coffee".to_string(),
            city: None,
            address: None,
            website: None,
            instagram_handle: None,
            tiktok_handle: None,
            source: LeadSource::GoogleMaps,
            external_id: None,
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn natural_key_prefers_external_id() {
        let lead = Lead {
            external_id: Some("ChIJN1t_tDeuEmsR".to_string()),
            instagram_handle: Some("bluebottle".to_string()),
            ..bare_lead()
        };
        assert_eq!(lead.natural_key(), "ChIJN1t_tDeuEmsR");
    }

    #[test]
    fn natural_key_falls_back_to_handle() {
        let lead = Lead {
            external_id: Some("".to_string()),
            tiktok_handle: Some("BlueBottle".to_string()),
            ..bare_lead()
        };
        assert_eq!(lead.natural_key(), "bluebottle");
    }

    #[test]
    fn natural_key_falls_back_to_name_city() {
        let lead = Lead {
            name: "Blue  Bottle   Coffee".to_string(),
            city: Some("Tokyo".to_string()),
            ..bare_lead()
        };
        assert_eq!(lead.natural_key(), "blue bottle coffee|tokyo");
    }

    #[test]
    fn export_predicate_needs_a_handle() {
        assert!(!bare_lead().has_social_handle());

        let lead = Lead {
            instagram_handle: Some("bluebottle".to_string()),
            ..bare_lead()
        };
        assert!(lead.has_social_handle());
        assert_eq!(
            lead.instagram_url().unwrap(),
            "https://www.instagram.com/bluebottle/"
        );
    }
}
