use chrono::Utc;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use crate::{
    domain::{
        instagram,
        lead::{Lead, LeadSource},
    },
    error::NormalizeError,
    services::google_maps::PlaceRecord,
};

/// Raw provider output, tagged by the provider that produced it. Each
/// variant gets its own field mapping; nothing else in the pipeline needs
/// to know which provider a record came from.
#[derive(Debug, Clone)]
pub enum RawRecord {
    Place(PlaceRecord),
    TikTok(Value),
    Instagram(Value),
}

pub fn normalize(raw: &RawRecord) -> Result<Lead, NormalizeError> {
    match raw {
        RawRecord::Place(place) => normalize_place(place),
        RawRecord::TikTok(item) => normalize_tiktok(item),
        RawRecord::Instagram(item) => normalize_instagram(item),
    }
}

/// Normalizes a whole batch. A malformed record is logged and skipped;
/// its siblings still go through.
pub fn normalize_batch(records: &[RawRecord]) -> Vec<Lead> {
    records
        .iter()
        .filter_map(|raw| match normalize(raw) {
            Ok(lead) => Some(lead),
            Err(e) => {
                log::error!("Skipping raw record: {}", e);
                None
            }
        })
        .collect()
}

fn normalize_place(place: &PlaceRecord) -> Result<Lead, NormalizeError> {
    let name = non_empty(place.name.as_deref())
        .ok_or(NormalizeError::MalformedRecord { field: "name" })?;

    Ok(Lead {
        id: Uuid::new_v4(),
        name,
        city: non_empty(place.city.as_deref()),
        address: non_empty(place.address.as_deref()),
        website: valid_website(place.website.as_deref()),
        instagram_handle: non_empty(place.instagram_handle.as_deref()),
        tiktok_handle: None,
        source: LeadSource::GoogleMaps,
        external_id: non_empty(place.place_id.as_deref()),
        notes: String::new(),
        created_at: Utc::now(),
    })
}

fn normalize_tiktok(item: &Value) -> Result<Lead, NormalizeError> {
    let username = string_at(item, &["/authorMeta/name", "/author"])
        .ok_or(NormalizeError::MalformedRecord { field: "username" })?;

    let name = string_at(item, &["/authorMeta/name", "/nickname"]).unwrap_or(username.clone());
    let bio = string_at(item, &["/authorMeta/signature", "/signature"]);
    let instagram_handle = bio.as_deref().and_then(instagram::handle_from_text);

    Ok(Lead {
        id: Uuid::new_v4(),
        name,
        city: string_at(item, &["/location"]),
        address: None,
        website: None,
        instagram_handle,
        tiktok_handle: Some(username.clone()),
        source: LeadSource::ApifyTiktok,
        external_id: Some(username),
        notes: String::new(),
        created_at: Utc::now(),
    })
}

fn normalize_instagram(item: &Value) -> Result<Lead, NormalizeError> {
    let username = string_at(item, &["/username"])
        .ok_or(NormalizeError::MalformedRecord { field: "username" })?;

    let name = string_at(item, &["/full_name", "/fullName"]).unwrap_or(username.clone());

    Ok(Lead {
        id: Uuid::new_v4(),
        name,
        city: string_at(item, &["/location"]),
        address: None,
        website: None,
        instagram_handle: Some(username.clone()),
        tiktok_handle: None,
        source: LeadSource::ApifyInstagram,
        external_id: Some(username),
        notes: String::new(),
        created_at: Utc::now(),
    })
}

// First non-empty string found at any of the JSON pointer paths.
fn string_at(item: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| item.pointer(pointer))
        .filter_map(|value| value.as_str())
        .find_map(|s| non_empty(Some(s)))
}

// Providers occasionally hand back junk in the website field; anything that
// does not parse as an absolute URL with a host is dropped.
fn valid_website(value: Option<&str>) -> Option<String> {
    let candidate = non_empty(value)?;
    match Url::parse(&candidate) {
        Ok(parsed) if parsed.host_str().is_some() => Some(candidate),
        _ => None,
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn place_record_maps_every_field() {
        let place = PlaceRecord {
            name: Some("Blue Bottle Coffee".to_string()),
            address: Some("1-4-8 Meguro, Tokyo".to_string()),
            city: Some("Tokyo".to_string()),
            place_id: Some("ChIJN1t_tDeuEmsR".to_string()),
            website: Some("https://bluebottlecoffee.jp".to_string()),
            instagram_handle: Some("bluebottlejapan".to_string()),
        };

        let lead = normalize(&RawRecord::Place(place)).unwrap();
        assert_eq!(lead.name, "Blue Bottle Coffee");
        assert_eq!(lead.city.as_deref(), Some("Tokyo"));
        assert_eq!(lead.external_id.as_deref(), Some("ChIJN1t_tDeuEmsR"));
        assert_eq!(lead.instagram_handle.as_deref(), Some("bluebottlejapan"));
        assert_eq!(lead.source, LeadSource::GoogleMaps);
        assert_eq!(lead.tiktok_handle, None);
    }

    #[test]
    fn place_without_name_is_malformed_not_defaulted() {
        let place = PlaceRecord {
            name: Some("   ".to_string()),
            ..PlaceRecord::default()
        };
        assert_eq!(
            normalize(&RawRecord::Place(place)),
            Err(NormalizeError::MalformedRecord { field: "name" })
        );
    }

    #[test]
    fn junk_website_values_are_dropped() {
        let place = PlaceRecord {
            name: Some("Corner Cafe".to_string()),
            website: Some("ask at the counter".to_string()),
            ..PlaceRecord::default()
        };
        let lead = normalize(&RawRecord::Place(place)).unwrap();
        assert_eq!(lead.website, None);
    }

    #[test]
    fn tiktok_item_pulls_instagram_from_bio() {
        let item = json!({
            "authorMeta": {
                "name": "tokyomatcha",
                "nickname": "Tokyo Matcha Stand",
                "signature": "best matcha in shibuya. IG: @tokyo.matcha",
                "fans": 12800,
            }
        });

        let lead = normalize(&RawRecord::TikTok(item)).unwrap();
        assert_eq!(lead.name, "tokyomatcha");
        assert_eq!(lead.tiktok_handle.as_deref(), Some("tokyomatcha"));
        assert_eq!(lead.instagram_handle.as_deref(), Some("tokyo.matcha"));
        assert_eq!(lead.external_id.as_deref(), Some("tokyomatcha"));
        assert_eq!(lead.source, LeadSource::ApifyTiktok);
    }

    #[test]
    fn tiktok_item_falls_back_to_flat_fields() {
        let item = json!({
            "author": "slowpour_coffee",
            "nickname": "Slow Pour",
            "signature": "no socials here",
        });

        let lead = normalize(&RawRecord::TikTok(item)).unwrap();
        assert_eq!(lead.name, "Slow Pour");
        assert_eq!(lead.tiktok_handle.as_deref(), Some("slowpour_coffee"));
        assert_eq!(lead.instagram_handle, None);
    }

    #[test]
    fn tiktok_item_without_username_is_malformed() {
        let item = json!({ "nickname": "Anonymous Cafe" });
        assert_eq!(
            normalize(&RawRecord::TikTok(item)),
            Err(NormalizeError::MalformedRecord { field: "username" })
        );
    }

    #[test]
    fn instagram_item_maps_username_and_name() {
        let item = json!({
            "username": "cafe_kitsune",
            "fullName": "Café Kitsuné",
            "biography": "paris + tokyo",
        });

        let lead = normalize(&RawRecord::Instagram(item)).unwrap();
        assert_eq!(lead.name, "Café Kitsuné");
        assert_eq!(lead.instagram_handle.as_deref(), Some("cafe_kitsune"));
        assert_eq!(lead.external_id.as_deref(), Some("cafe_kitsune"));
        assert_eq!(lead.source, LeadSource::ApifyInstagram);
    }

    #[test]
    fn batch_skips_malformed_and_keeps_the_rest() {
        let records = vec![
            RawRecord::Instagram(json!({ "username": "first.cafe" })),
            RawRecord::Instagram(json!({ "fullName": "No Username Cafe" })),
            RawRecord::Instagram(json!({ "username": "third.cafe" })),
        ];

        let leads = normalize_batch(&records);
        let names: Vec<&str> = leads.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["first.cafe", "third.cafe"]);
    }
}
