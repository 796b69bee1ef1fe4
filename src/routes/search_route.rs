use actix_web::{get, post, web, HttpResponse};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::{
    dal::{lead_db, search_attempt_db},
    domain::{
        lead::Lead,
        search_attempt::{AttemptStatus, SearchAttempt, SearchProvider},
    },
    error::ProviderError,
    services::{
        dedupe, normalize_batch, persistence, ApifyClient, GoogleMapsClient, PollProgress,
        RawRecord, SearchType, SheetsClient, SocialPlatform, StagingStore,
    },
};

#[derive(Template)]
#[template(path = "maps_search.html")]
struct MapsSearchTemplate {
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "social_search.html")]
struct SocialSearchTemplate {
    error: Option<String>,
}

#[derive(Template)]
#[template(path = "results.html")]
struct ResultsTemplate {
    attempt_id: Uuid,
    query: String,
    provider_name: &'static str,
    candidates: Vec<Lead>,
    suppressed_duplicates: usize,
}

#[derive(Template)]
#[template(path = "confirm.html")]
struct ConfirmTemplate {
    inserted: usize,
    skipped_duplicate: usize,
    export_note: String,
}

#[get("/maps")]
async fn maps_search_page() -> HttpResponse {
    HttpResponse::Ok().body(MapsSearchTemplate { error: None }.render().unwrap())
}

#[get("/social")]
async fn social_search_page() -> HttpResponse {
    HttpResponse::Ok().body(SocialSearchTemplate { error: None }.render().unwrap())
}

fn default_operator() -> String {
    "staff".to_string()
}

#[derive(Deserialize)]
struct MapsSearchForm {
    query: String,
    #[serde(default = "default_operator")]
    created_by: String,
}

#[post("/maps")]
async fn maps_search(
    form: web::Form<MapsSearchForm>,
    pool: web::Data<PgPool>,
    maps_client: web::Data<GoogleMapsClient>,
    staging: web::Data<StagingStore>,
) -> HttpResponse {
    let attempt = match begin_attempt(
        &pool,
        &form.query,
        SearchProvider::GoogleMaps,
        &form.created_by,
    )
    .await
    {
        Ok(attempt) => attempt,
        Err(response) => return response,
    };

    let mut places = match maps_client.search_places(&form.query).await {
        Ok(places) => places,
        Err(e) => return fail_maps_search(&pool, attempt.id, e).await,
    };

    maps_client.enrich_places(&mut places).await;

    let raw_records: Vec<RawRecord> = places.into_iter().map(RawRecord::Place).collect();
    stage_and_preview(&pool, &staging, &attempt, raw_records).await
}

#[derive(Deserialize)]
struct SocialSearchForm {
    query: String,
    platform: SocialPlatform,
    search_type: SearchType,
    #[serde(default = "default_operator")]
    created_by: String,
}

#[post("/social")]
async fn social_search(
    form: web::Form<SocialSearchForm>,
    pool: web::Data<PgPool>,
    apify_client: web::Data<ApifyClient>,
    staging: web::Data<StagingStore>,
) -> HttpResponse {
    let provider = match form.platform {
        SocialPlatform::Tiktok => SearchProvider::Tiktok,
        SocialPlatform::Instagram => SearchProvider::Instagram,
    };
    let query_text = format!("{}: {}", form.search_type.display_name(), form.query);

    let attempt = match begin_attempt(&pool, &query_text, provider, &form.created_by).await {
        Ok(attempt) => attempt,
        Err(response) => return response,
    };

    // Poll-loop progress lands here so surfacing it never blocks the loop.
    let (progress_sender, mut progress_receiver) = mpsc::unbounded_channel::<PollProgress>();
    let query_for_log = form.query.clone();
    tokio::spawn(async move {
        while let Some(progress) = progress_receiver.recv().await {
            log::info!(
                "\"{}\" job check #{}: {}",
                query_for_log,
                progress.checks,
                progress.status
            );
        }
    });

    let items = match apify_client
        .run_search(
            &form.query,
            form.platform,
            form.search_type,
            Some(progress_sender),
        )
        .await
    {
        Ok(items) => items,
        Err(e) => return fail_social_search(&pool, attempt.id, e).await,
    };

    let raw_records: Vec<RawRecord> = items
        .into_iter()
        .map(|item| match form.platform {
            SocialPlatform::Tiktok => RawRecord::TikTok(item),
            SocialPlatform::Instagram => RawRecord::Instagram(item),
        })
        .collect();

    stage_and_preview(&pool, &staging, &attempt, raw_records).await
}

#[post("/confirm")]
async fn confirm_selection(
    form: web::Form<Vec<(String, String)>>,
    pool: web::Data<PgPool>,
    staging: web::Data<StagingStore>,
    sheets: web::Data<SheetsClient>,
) -> HttpResponse {
    // Checkbox forms repeat the "selected" key, so the body arrives as
    // bare pairs rather than a struct.
    let mut attempt_id = None;
    let mut selected: Vec<usize> = Vec::new();
    for (key, value) in form.into_inner() {
        match key.as_str() {
            "attempt_id" => attempt_id = Uuid::parse_str(&value).ok(),
            "selected" => {
                if let Ok(index) = value.parse::<usize>() {
                    selected.push(index);
                }
            }
            _ => {}
        }
    }

    let Some(attempt_id) = attempt_id else {
        return HttpResponse::BadRequest().body("Missing or invalid attempt id");
    };

    let confirmed = match staging.confirm(attempt_id, &selected) {
        Ok(leads) => leads,
        Err(e) => return HttpResponse::Gone().body(e.to_string()),
    };

    let outcome = match persistence::save_confirmed_leads(&pool, attempt_id, confirmed).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Persisting confirmed leads failed: {:?}", e);
            return HttpResponse::InternalServerError().body("Could not save leads");
        }
    };

    let export_note = run_export_trigger(&pool, &sheets, attempt_id, &outcome.inserted).await;

    HttpResponse::Ok().body(
        ConfirmTemplate {
            inserted: outcome.inserted_count(),
            skipped_duplicate: outcome.skipped_duplicate,
            export_note,
        }
        .render()
        .unwrap(),
    )
}

/// Best-effort: whatever happens here is reported in the flash text but
/// never changes the persistence outcome.
async fn run_export_trigger(
    pool: &PgPool,
    sheets: &SheetsClient,
    attempt_id: Uuid,
    inserted: &[Lead],
) -> String {
    if inserted.is_empty() {
        return "Nothing new to export.".to_string();
    }
    if !sheets.auto_export_enabled() {
        return "Auto-export is disabled.".to_string();
    }

    let (query, provider_name) = match search_attempt_db::get_attempt(pool, attempt_id).await {
        Ok(Some(attempt)) => (attempt.query_text, attempt.provider.display_name()),
        _ => ("Export".to_string(), "Unknown"),
    };

    match sheets.export_to_new_tab(inserted, &query, provider_name).await {
        Ok(Some(export)) => format!(
            "Exported {} lead(s) to tab \"{}\".",
            export.rows_exported, export.tab_name
        ),
        Ok(None) => "No saved lead had a social handle, nothing exported.".to_string(),
        Err(e) => {
            log::error!("Auto-export to sheets failed: {:?}", e);
            format!("Leads saved, but the sheet export failed: {}", e)
        }
    }
}

async fn begin_attempt(
    pool: &PgPool,
    query_text: &str,
    provider: SearchProvider,
    created_by: &str,
) -> Result<SearchAttempt, HttpResponse> {
    let created_by = if created_by.trim().is_empty() {
        default_operator()
    } else {
        created_by.trim().to_string()
    };

    let attempt = SearchAttempt {
        id: Uuid::new_v4(),
        query_text: query_text.to_string(),
        provider,
        status: AttemptStatus::Pending,
        created_by,
        created_at: Utc::now(),
    };

    if let Err(e) = search_attempt_db::insert_attempt(pool, &attempt).await {
        log::error!("Could not record search attempt: {:?}", e);
        return Err(HttpResponse::InternalServerError().body("Could not record search attempt"));
    }

    if let Err(e) =
        search_attempt_db::update_status(pool, attempt.id, AttemptStatus::Running).await
    {
        log::error!("Could not mark attempt running: {:?}", e);
    }

    Ok(attempt)
}

/// Normalize, dedupe against what is already persisted, stage, preview.
async fn stage_and_preview(
    pool: &PgPool,
    staging: &StagingStore,
    attempt: &SearchAttempt,
    raw_records: Vec<RawRecord>,
) -> HttpResponse {
    let candidates = normalize_batch(&raw_records);

    let existing_keys = match lead_db::get_natural_keys(pool, attempt.provider.lead_source()).await
    {
        Ok(keys) => keys,
        Err(e) => {
            log::error!("Could not read persisted keys: {:?}", e);
            persistence::mark_attempt_failed(pool, attempt.id).await;
            return HttpResponse::InternalServerError().body("Could not check for duplicates");
        }
    };

    let found = candidates.len();
    let fresh = dedupe(candidates, &existing_keys);
    let suppressed_duplicates = found - fresh.len();

    log::info!(
        "\"{}\": {} normalized, {} already persisted, {} staged",
        attempt.query_text,
        found,
        suppressed_duplicates,
        fresh.len()
    );

    staging.put(attempt.id, fresh.clone());

    HttpResponse::Ok().body(
        ResultsTemplate {
            attempt_id: attempt.id,
            query: attempt.query_text.clone(),
            provider_name: attempt.provider.display_name(),
            candidates: fresh,
            suppressed_duplicates,
        }
        .render()
        .unwrap(),
    )
}

async fn fail_maps_search(pool: &PgPool, attempt_id: Uuid, error: ProviderError) -> HttpResponse {
    log::error!("Google Maps search failed: {}", error);
    persistence::mark_attempt_failed(pool, attempt_id).await;
    HttpResponse::Ok().body(
        MapsSearchTemplate {
            error: Some(error.to_string()),
        }
        .render()
        .unwrap(),
    )
}

async fn fail_social_search(pool: &PgPool, attempt_id: Uuid, error: ProviderError) -> HttpResponse {
    log::error!("Apify search failed: {}", error);
    persistence::mark_attempt_failed(pool, attempt_id).await;
    HttpResponse::Ok().body(
        SocialSearchTemplate {
            error: Some(error.to_string()),
        }
        .render()
        .unwrap(),
    )
}
