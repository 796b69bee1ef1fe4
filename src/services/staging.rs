use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use uuid::Uuid;

use crate::{domain::lead::Lead, error::StagingError};

const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);
const MAX_ENTRIES: usize = 256;

struct StagedEntry {
    // None once confirmed: the tombstone lets a second confirm answer
    // AlreadyConsumed instead of NotFound.
    leads: Option<Vec<Lead>>,
    staged_at: Instant,
    seq: u64,
}

/// Session-scoped holding pen for normalized, deduplicated candidates,
/// keyed by search attempt. Entries are single-consume and bounded both in
/// age and count; one attempt's entry never disturbs another's.
pub struct StagingStore {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<Uuid, StagedEntry>>,
    next_seq: Mutex<u64>,
}

impl Default for StagingStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_TTL, MAX_ENTRIES)
    }
}

impl StagingStore {
    pub fn with_limits(ttl: Duration, max_entries: usize) -> Self {
        StagingStore {
            ttl,
            max_entries,
            entries: Mutex::new(HashMap::new()),
            next_seq: Mutex::new(0),
        }
    }

    pub fn put(&self, attempt_id: Uuid, leads: Vec<Lead>) {
        let seq = {
            let mut next_seq = self.next_seq.lock().unwrap();
            *next_seq += 1;
            *next_seq
        };

        let mut entries = self.entries.lock().unwrap();
        sweep(&mut entries, self.ttl);

        if entries.len() >= self.max_entries && !entries.contains_key(&attempt_id) {
            let oldest = entries.iter().min_by_key(|(_, e)| e.seq).map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                log::info!("Staging store full, evicting oldest entry {}", oldest);
            }
        }

        entries.insert(
            attempt_id,
            StagedEntry {
                leads: Some(leads),
                staged_at: Instant::now(),
                seq,
            },
        );
    }

    pub fn get(&self, attempt_id: Uuid) -> Result<Vec<Lead>, StagingError> {
        let mut entries = self.entries.lock().unwrap();
        sweep(&mut entries, self.ttl);

        let entry = entries.get(&attempt_id).ok_or(StagingError::NotFound)?;
        entry
            .leads
            .clone()
            .ok_or(StagingError::AlreadyConsumed)
    }

    /// Hands back the selected subset and invalidates the entry. Indices
    /// outside the staged range are ignored; staged order is kept.
    pub fn confirm(
        &self,
        attempt_id: Uuid,
        selected: &[usize],
    ) -> Result<Vec<Lead>, StagingError> {
        let mut entries = self.entries.lock().unwrap();
        sweep(&mut entries, self.ttl);

        let entry = entries.get_mut(&attempt_id).ok_or(StagingError::NotFound)?;
        let leads = entry.leads.take().ok_or(StagingError::AlreadyConsumed)?;

        Ok(leads
            .into_iter()
            .enumerate()
            .filter(|(i, _)| selected.contains(i))
            .map(|(_, lead)| lead)
            .collect())
    }
}

fn sweep(entries: &mut HashMap<Uuid, StagedEntry>, ttl: Duration) {
    entries.retain(|_, entry| entry.staged_at.elapsed() < ttl);
}
