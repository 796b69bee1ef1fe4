use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    dal::{lead_db, search_attempt_db},
    domain::{lead::Lead, search_attempt::AttemptStatus},
};

/// What came out of committing one confirmed batch.
#[derive(Debug)]
pub struct SaveOutcome {
    /// The leads that actually made it into storage, for the export step.
    pub inserted: Vec<Lead>,
    pub skipped_duplicate: usize,
}

impl SaveOutcome {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }
}

/// Commits the user-confirmed candidates. Each insert re-checks natural-key
/// uniqueness at the storage layer, so a lead persisted by a concurrent
/// search between staging and confirmation is skipped, not duplicated.
/// Marks the originating attempt done afterwards.
pub async fn save_confirmed_leads(
    pool: &PgPool,
    attempt_id: Uuid,
    leads: Vec<Lead>,
) -> Result<SaveOutcome, sqlx::Error> {
    let mut inserted = Vec::new();
    let mut skipped_duplicate = 0;

    for lead in leads {
        if lead_db::insert_lead(pool, &lead).await? {
            inserted.push(lead);
        } else {
            log::info!(
                "Lead already persisted, skipping: {} ({})",
                lead.name,
                lead.natural_key()
            );
            skipped_duplicate += 1;
        }
    }

    search_attempt_db::update_status(pool, attempt_id, AttemptStatus::Done).await?;

    Ok(SaveOutcome {
        inserted,
        skipped_duplicate,
    })
}

/// Terminal transition for a search that died before anything was staged.
pub async fn mark_attempt_failed(pool: &PgPool, attempt_id: Uuid) {
    if let Err(e) = search_attempt_db::update_status(pool, attempt_id, AttemptStatus::Failed).await
    {
        log::error!("Could not mark attempt {} failed: {:?}", attempt_id, e);
    }
}
