use std::collections::HashSet;

use itertools::Itertools;

use crate::domain::lead::Lead;

/// Drops candidates whose natural key is already persisted and collapses
/// in-batch ties to their first occurrence. Input order is preserved;
/// nothing is mutated, so the same input against the same snapshot always
/// yields the same output.
pub fn dedupe(candidates: Vec<Lead>, existing_keys: &HashSet<String>) -> Vec<Lead> {
    candidates
        .into_iter()
        .filter(|lead| !existing_keys.contains(&lead.natural_key()))
        .unique_by(|lead| lead.natural_key())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::lead::LeadSource;

    use super::*;

    fn handle_lead(handle: &str) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: format!("Cafe {}", handle),
            city: None,
            address: None,
            website: None,
            instagram_handle: Some(handle.to_string()),
            tiktok_handle: None,
            source: LeadSource::ApifyInstagram,
            external_id: Some(handle.to_string()),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn known_keys_are_dropped_and_order_kept() {
        let candidates: Vec<Lead> = (0..20).map(|i| handle_lead(&format!("cafe{}", i))).collect();
        let existing: HashSet<String> =
            ["cafe3", "cafe7", "cafe11"].iter().map(|k| k.to_string()).collect();

        let fresh = dedupe(candidates, &existing);

        assert_eq!(fresh.len(), 17);
        let keys: Vec<String> = fresh.iter().map(|l| l.natural_key()).collect();
        assert!(!keys.contains(&"cafe3".to_string()));
        let mut sorted = keys.clone();
        sorted.sort_by_key(|k| k.trim_start_matches("cafe").parse::<u32>().unwrap());
        // Input was already in ascending order, so output must be too.
        assert_eq!(keys, sorted);
    }

    #[test]
    fn in_batch_ties_collapse_to_first() {
        let mut first = handle_lead("samecafe");
        first.name = "First Occurrence".to_string();
        let mut second = handle_lead("samecafe");
        second.name = "Second Occurrence".to_string();

        let fresh = dedupe(vec![first, second, handle_lead("other")], &HashSet::new());

        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh[0].name, "First Occurrence");
    }

    #[test]
    fn dedupe_is_idempotent() {
        let candidates: Vec<Lead> = ["a", "b", "a", "c"].iter().map(|h| handle_lead(h)).collect();
        let existing: HashSet<String> = HashSet::from(["b".to_string()]);

        let once = dedupe(candidates.clone(), &existing);
        let twice = dedupe(once.clone(), &existing);

        assert_eq!(once, twice);
    }
}
