use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{bail, Context};
use serde_json::json;

use crate::{configuration::SheetsSettings, domain::lead::Lead};

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const TAB_QUERY_LEN: usize = 30;

const HEADER_ROW: [&str; 11] = [
    "Name",
    "City",
    "Address",
    "Website",
    "Instagram Handle",
    "Instagram URL",
    "TikTok Handle",
    "TikTok URL",
    "Source",
    "Date Added",
    "Notes",
];

#[derive(Debug)]
pub struct ExportOutcome {
    pub tab_name: String,
    pub rows_exported: usize,
    pub spreadsheet_url: String,
}

/// Google Sheets export collaborator. Everything here is best-effort: the
/// caller reports failures but never lets them touch persistence results.
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
    sheet_name: String,
    auto_export: bool,
    tab_counter: AtomicU32,
}

impl SheetsClient {
    pub fn new(settings: SheetsSettings) -> Self {
        SheetsClient {
            client: reqwest::Client::new(),
            base_url: SHEETS_BASE_URL.to_string(),
            spreadsheet_id: settings.spreadsheet_id,
            access_token: settings.access_token,
            sheet_name: settings.sheet_name,
            auto_export: settings.auto_export,
            tab_counter: AtomicU32::new(0),
        }
    }

    pub fn auto_export_enabled(&self) -> bool {
        self.auto_export && !self.spreadsheet_id.is_empty()
    }

    pub fn spreadsheet_url(&self) -> String {
        format!(
            "https://docs.google.com/spreadsheets/d/{}",
            self.spreadsheet_id
        )
    }

    /// The export trigger: just-inserted leads that pass the export
    /// predicate (a social handle is present) land on a fresh tab named
    /// after the search. Returns None when nothing qualified.
    pub async fn export_to_new_tab(
        &self,
        inserted: &[Lead],
        query: &str,
        source_name: &str,
    ) -> anyhow::Result<Option<ExportOutcome>> {
        let exportable: Vec<&Lead> = inserted.iter().filter(|l| l.has_social_handle()).collect();
        if exportable.is_empty() {
            return Ok(None);
        }
        if self.spreadsheet_id.is_empty() {
            bail!("no spreadsheet configured");
        }

        let tab_name = self.next_tab_name(query, source_name);
        self.add_sheet_tab(&tab_name).await?;
        self.write_rows(&tab_name, &exportable).await?;

        Ok(Some(ExportOutcome {
            tab_name,
            rows_exported: exportable.len(),
            spreadsheet_url: self.spreadsheet_url(),
        }))
    }

    /// Manual export of the current lead list onto the configured sheet,
    /// replacing whatever was there.
    pub async fn replace_sheet(&self, leads: &[Lead]) -> anyhow::Result<ExportOutcome> {
        if self.spreadsheet_id.is_empty() {
            bail!("no spreadsheet configured");
        }

        let all: Vec<&Lead> = leads.iter().collect();
        self.clear_range(&self.sheet_name).await?;
        self.write_rows(&self.sheet_name, &all).await?;

        Ok(ExportOutcome {
            tab_name: self.sheet_name.clone(),
            rows_exported: all.len(),
            spreadsheet_url: self.spreadsheet_url(),
        })
    }

    // "matcha café Tokyo - Google Maps (3)"; the counter disambiguates
    // repeated searches within one process lifetime.
    fn next_tab_name(&self, query: &str, source_name: &str) -> String {
        let n = self.tab_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let short_query: String = query.chars().take(TAB_QUERY_LEN).collect();
        format!("{} - {} ({})", short_query.trim(), source_name, n)
    }

    async fn add_sheet_tab(&self, tab_name: &str) -> anyhow::Result<()> {
        let url = format!("{}/{}:batchUpdate", self.base_url, self.spreadsheet_id);
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": tab_name,
                        "gridProperties": { "frozenRowCount": 1 },
                    }
                }
            }]
        });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("add-sheet request failed")?;

        ensure_success(response, "add-sheet").await
    }

    async fn write_rows(&self, tab_name: &str, leads: &[&Lead]) -> anyhow::Result<()> {
        let url = format!(
            "{}/{}/values/{}!A1?valueInputOption=RAW",
            self.base_url, self.spreadsheet_id, tab_name
        );
        let body = json!({ "values": lead_rows(leads) });

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("write-rows request failed")?;

        ensure_success(response, "write-rows").await
    }

    async fn clear_range(&self, tab_name: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/{}/values/{}!A:Z:clear",
            self.base_url, self.spreadsheet_id, tab_name
        );

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({}))
            .send()
            .await
            .context("clear request failed")?;

        ensure_success(response, "clear").await
    }
}

async fn ensure_success(response: reqwest::Response, step: &str) -> anyhow::Result<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    bail!("sheets {} call returned HTTP {}: {}", step, status, body)
}

/// Filters to the leads the export predicate accepts. Exposed separately so
/// callers can report "n of m qualified" without exporting.
pub fn exportable_leads<'a>(leads: &'a [Lead]) -> Vec<&'a Lead> {
    leads.iter().filter(|l| l.has_social_handle()).collect()
}

fn lead_rows(leads: &[&Lead]) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(leads.len() + 1);
    rows.push(HEADER_ROW.iter().map(|h| h.to_string()).collect());

    for lead in leads {
        rows.push(vec![
            lead.name.clone(),
            lead.city.clone().unwrap_or_default(),
            lead.address.clone().unwrap_or_default(),
            lead.website.clone().unwrap_or_default(),
            lead.instagram_handle.clone().unwrap_or_default(),
            lead.instagram_url().unwrap_or_default(),
            lead.tiktok_handle.clone().unwrap_or_default(),
            lead.tiktok_url().unwrap_or_default(),
            lead.source.display_name().to_string(),
            lead.created_at.format("%Y-%m-%d %H:%M").to_string(),
            lead.notes.clone(),
        ]);
    }

    rows
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use crate::domain::lead::LeadSource;

    use super::*;

    fn maps_lead(name: &str, instagram: Option<&str>) -> Lead {
        Lead {
            id: Uuid::new_v4(),
            name: name.to_string(),
            city: Some("Tokyo".to_string()),
            address: None,
            website: None,
            instagram_handle: instagram.map(|h| h.to_string()),
            tiktok_handle: None,
            source: LeadSource::GoogleMaps,
            external_id: Some(format!("place-{}", name)),
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    fn test_client() -> SheetsClient {
        SheetsClient::new(crate::configuration::SheetsSettings {
            spreadsheet_id: "sheet-id".to_string(),
            access_token: "token".to_string(),
            sheet_name: "Sheet1".to_string(),
            auto_export: true,
        })
    }

    #[test]
    fn export_predicate_keeps_only_leads_with_handles() {
        // 15 search results, 7 of them with a social handle.
        let mut leads = Vec::new();
        for i in 0..7 {
            leads.push(maps_lead(&format!("with{}", i), Some("handle")));
        }
        for i in 0..8 {
            leads.push(maps_lead(&format!("without{}", i), None));
        }

        assert_eq!(exportable_leads(&leads).len(), 7);
    }

    #[test]
    fn tab_names_carry_a_disambiguating_counter() {
        let client = test_client();
        assert_eq!(
            client.next_tab_name("matcha café Tokyo", "Google Maps"),
            "matcha café Tokyo - Google Maps (1)"
        );
        assert_eq!(
            client.next_tab_name("matcha café Tokyo", "Google Maps"),
            "matcha café Tokyo - Google Maps (2)"
        );
    }

    #[test]
    fn long_queries_are_truncated_in_tab_names() {
        let client = test_client();
        let query = "a very long search query about specialty coffee roasters";
        let tab_name = client.next_tab_name(query, "Instagram");
        assert_eq!(tab_name, "a very long search query about - Instagram (1)");
    }

    #[test]
    fn rows_include_header_and_derived_urls() {
        let lead = maps_lead("Blue Bottle", Some("bluebottlejapan"));
        let rows = lead_rows(&[&lead]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "Name");
        assert_eq!(rows[1][0], "Blue Bottle");
        assert_eq!(rows[1][5], "https://www.instagram.com/bluebottlejapan/");
        assert_eq!(rows[1][8], "Google Maps");
    }
}
