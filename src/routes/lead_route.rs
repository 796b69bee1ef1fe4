use actix_web::{get, post, web, HttpResponse};
use askama::Template;
use serde::Deserialize;
use sqlx::PgPool;

use crate::{
    dal::lead_db::{self, LeadFilter, PAGE_SIZE},
    domain::lead::{Lead, LeadSource},
    services::SheetsClient,
};

#[derive(Template)]
#[template(path = "leads.html")]
struct LeadsTemplate {
    leads: Vec<Lead>,
    total: i64,
    page: i64,
    has_prev: bool,
    has_next: bool,
    source_value: String,
    city_value: String,
    flash: Option<String>,
}

#[derive(Deserialize)]
struct LeadListQuery {
    source: Option<String>,
    city: Option<String>,
    page: Option<i64>,
}

fn build_filter(source: &Option<String>, city: &Option<String>) -> LeadFilter {
    LeadFilter {
        source: source.as_deref().and_then(LeadSource::parse),
        city: city
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string),
    }
}

#[get("")]
async fn lead_list(query: web::Query<LeadListQuery>, pool: web::Data<PgPool>) -> HttpResponse {
    let filter = build_filter(&query.source, &query.city);
    let page = query.page.unwrap_or(1).max(1);

    render_lead_list(&pool, &filter, page, &query.source, &query.city, None).await
}

#[derive(Deserialize)]
struct ExportForm {
    source: Option<String>,
    city: Option<String>,
}

/// Manual export of the filtered list onto the configured sheet tab,
/// replacing its contents. Best-effort, like the auto-export.
#[post("/export")]
async fn export_leads(
    form: web::Form<ExportForm>,
    pool: web::Data<PgPool>,
    sheets: web::Data<SheetsClient>,
) -> HttpResponse {
    let filter = build_filter(&form.source, &form.city);

    let flash = match lead_db::get_all_leads(&pool, &filter).await {
        Ok(leads) => match sheets.replace_sheet(&leads).await {
            Ok(export) => format!(
                "Exported {} lead(s) to \"{}\".",
                export.rows_exported, export.tab_name
            ),
            Err(e) => {
                log::error!("Manual export failed: {:?}", e);
                format!("Export failed: {}", e)
            }
        },
        Err(e) => {
            log::error!("Could not load leads for export: {:?}", e);
            "Could not load leads for export.".to_string()
        }
    };

    render_lead_list(&pool, &filter, 1, &form.source, &form.city, Some(flash)).await
}

async fn render_lead_list(
    pool: &PgPool,
    filter: &LeadFilter,
    page: i64,
    source: &Option<String>,
    city: &Option<String>,
    flash: Option<String>,
) -> HttpResponse {
    let leads = lead_db::get_leads(pool, filter, page).await.unwrap_or(vec![]);
    let total = lead_db::count_leads(pool, filter).await.unwrap_or(0);

    HttpResponse::Ok().body(
        LeadsTemplate {
            has_prev: page > 1,
            has_next: page * PAGE_SIZE < total,
            leads,
            total,
            page,
            source_value: source.clone().unwrap_or_default(),
            city_value: city.clone().unwrap_or_default(),
            flash,
        }
        .render()
        .unwrap(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_parses_source_and_trims_city() {
        let filter = build_filter(
            &Some("apify_tiktok".to_string()),
            &Some("  Tokyo ".to_string()),
        );
        assert_eq!(filter.source, Some(LeadSource::ApifyTiktok));
        assert_eq!(filter.city.as_deref(), Some("Tokyo"));
    }

    #[test]
    fn blank_filter_values_mean_no_filter() {
        let filter = build_filter(&Some("".to_string()), &Some("   ".to_string()));
        assert_eq!(filter.source, None);
        assert_eq!(filter.city, None);
    }
}
