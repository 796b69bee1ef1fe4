use actix_web::{get, web, HttpResponse};
use askama::Template;
use sqlx::PgPool;

use crate::{
    dal::{
        lead_db::{self, LeadFilter, SourceCount},
        search_attempt_db,
    },
    domain::{lead::Lead, search_attempt::SearchAttempt},
};

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    total_leads: i64,
    source_stats: Vec<SourceCount>,
    latest_leads: Vec<Lead>,
    recent_searches: Vec<SearchAttempt>,
}

#[get("/dashboard")]
async fn dashboard(pool: web::Data<PgPool>) -> HttpResponse {
    let total_leads = lead_db::count_leads(&pool, &LeadFilter::default())
        .await
        .unwrap_or(0);
    let source_stats = lead_db::count_by_source(&pool).await.unwrap_or(vec![]);
    let latest_leads = lead_db::latest_leads(&pool, 10).await.unwrap_or(vec![]);
    let recent_searches = search_attempt_db::recent_attempts(&pool, 5)
        .await
        .unwrap_or(vec![]);

    HttpResponse::Ok().body(
        DashboardTemplate {
            total_leads,
            source_stats,
            latest_leads,
            recent_searches,
        }
        .render()
        .unwrap(),
    )
}
