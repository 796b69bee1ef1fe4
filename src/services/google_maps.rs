use std::time::Duration;

use fake_user_agent::get_rua;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::{domain::instagram, error::ProviderError, services::validate_query};

const PROVIDER_NAME: &str = "Google Maps";

const TEXT_SEARCH_URL: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";
const DETAILS_URL: &str = "https://maps.googleapis.com/maps/api/place/details/json";

/// One raw place as the provider shaped it. Normalization happens later;
/// nothing here is guaranteed to be present.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaceRecord {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub place_id: Option<String>,
    pub website: Option<String>,
    pub instagram_handle: Option<String>,
}

#[derive(Clone)]
pub struct GoogleMapsClient {
    client: reqwest::Client,
    api_key: String,
    search_url: String,
    details_url: String,
}

#[derive(Serialize)]
struct SearchQuery<'a> {
    query: &'a str,
    key: &'a str,
}

#[derive(Serialize)]
struct DetailsQuery<'a> {
    place_id: &'a str,
    fields: &'a str,
    key: &'a str,
}

#[derive(Deserialize)]
struct PlacesResponse {
    status: String,
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<RawPlace>,
}

#[derive(Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<RawPlace>,
}

#[derive(Deserialize, Default)]
struct RawPlace {
    name: Option<String>,
    formatted_address: Option<String>,
    place_id: Option<String>,
    website: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Deserialize)]
struct AddressComponent {
    long_name: Option<String>,
    #[serde(default)]
    types: Vec<String>,
}

impl GoogleMapsClient {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        GoogleMapsClient {
            client,
            api_key,
            search_url: TEXT_SEARCH_URL.to_string(),
            details_url: DETAILS_URL.to_string(),
        }
    }

    /// One Places Text Search request. Empty and oversized queries are
    /// rejected before any network call goes out.
    pub async fn search_places(&self, query: &str) -> Result<Vec<PlaceRecord>, ProviderError> {
        validate_query(PROVIDER_NAME, query)?;

        let response = self
            .client
            .get(&self.search_url)
            .query(&SearchQuery {
                query,
                key: &self.api_key,
            })
            .send()
            .await
            .map_err(|e| network_failure(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                provider: PROVIDER_NAME.to_string(),
                detail: "HTTP 429".to_string(),
            });
        }

        let body: PlacesResponse = response
            .json()
            .await
            .map_err(|e| network_failure(format!("bad response body: {}", e)))?;

        match body.status.as_str() {
            "OK" | "ZERO_RESULTS" => {}
            other => return Err(status_error(other, body.error_message)),
        }

        Ok(body.results.into_iter().map(place_record).collect())
    }

    /// Per-record Place Details lookup for the website, then a best-effort
    /// crawl of that website for an Instagram link. Lookup failures leave
    /// the record as-is; the search result still counts.
    pub async fn enrich_places(&self, records: &mut [PlaceRecord]) {
        for record in records.iter_mut() {
            let Some(place_id) = record.place_id.clone() else {
                continue;
            };

            if let Some(details) = self.place_details(&place_id).await {
                if details.website.is_some() {
                    record.website = details.website;
                }
                if record.city.is_none() {
                    record.city = details.city;
                }
            }

            if record.instagram_handle.is_none() {
                if let Some(website) = record.website.clone() {
                    record.instagram_handle = self.instagram_from_website(&website).await;
                }
            }
        }
    }

    async fn place_details(&self, place_id: &str) -> Option<PlaceRecord> {
        let response = self
            .client
            .get(&self.details_url)
            .query(&DetailsQuery {
                place_id,
                fields: "name,formatted_address,website,address_components",
                key: &self.api_key,
            })
            .send()
            .await;

        let response = match response {
            Ok(res) => res,
            Err(e) => {
                log::error!("Place details request failed for {}: {:?}", place_id, e);
                return None;
            }
        };

        match response.json::<DetailsResponse>().await {
            Ok(body) if body.status == "OK" => body.result.map(place_record),
            Ok(body) => {
                log::error!("Place details returned {} for {}", body.status, place_id);
                None
            }
            Err(e) => {
                log::error!("Place details body unreadable for {}: {:?}", place_id, e);
                None
            }
        }
    }

    /// Fetches a café's website and hunts for an Instagram handle in its
    /// anchors, visible text and meta tags. Absence is not an error.
    pub async fn instagram_from_website(&self, website_url: &str) -> Option<String> {
        let response = self
            .client
            .get(website_url)
            .header(reqwest::header::USER_AGENT, get_rua())
            .send()
            .await;

        let response = match response {
            Ok(res) => res,
            Err(e) => {
                log::error!("Error fetching website {}: {:?}", website_url, e);
                return None;
            }
        };

        let html_content = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                log::error!("Error reading website {}: {:?}", website_url, e);
                return None;
            }
        };

        extract_instagram_from_html(&html_content)
    }
}

fn extract_instagram_from_html(html_content: &str) -> Option<String> {
    let a_tag_selector = Selector::parse("a").unwrap();
    let meta_selector = Selector::parse("meta").unwrap();

    let html_document = Html::parse_document(html_content);

    for a_tag in html_document.select(&a_tag_selector) {
        if let Some(href) = a_tag.value().attr("href") {
            if let Some(handle) = instagram::handle_from_url(href) {
                return Some(handle);
            }
        }
    }

    let page_text: String = html_document.root_element().text().collect();
    if let Some(handle) = instagram::handle_from_url(&page_text) {
        return Some(handle);
    }

    for meta_tag in html_document.select(&meta_selector) {
        if let Some(content) = meta_tag.value().attr("content") {
            if let Some(handle) = instagram::handle_from_url(content) {
                return Some(handle);
            }
        }
    }

    None
}

fn place_record(place: RawPlace) -> PlaceRecord {
    let city = extract_city(&place.address_components);
    PlaceRecord {
        name: place.name,
        address: place.formatted_address,
        city,
        place_id: place.place_id,
        website: place.website,
        instagram_handle: None,
    }
}

// City is the locality component, falling back to the province level.
fn extract_city(components: &[AddressComponent]) -> Option<String> {
    for wanted in ["locality", "administrative_area_level_1"] {
        for component in components {
            if component.types.iter().any(|t| t == wanted) {
                if let Some(name) = component.long_name.clone() {
                    return Some(name);
                }
            }
        }
    }
    None
}

fn network_failure(detail: String) -> ProviderError {
    ProviderError::NetworkFailure {
        provider: PROVIDER_NAME.to_string(),
        detail,
    }
}

fn status_error(status: &str, error_message: Option<String>) -> ProviderError {
    let detail = match error_message {
        Some(message) => format!("{}: {}", status, message),
        None => status.to_string(),
    };
    match status {
        "REQUEST_DENIED" => ProviderError::AuthenticationFailure {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
        "OVER_QUERY_LIMIT" => ProviderError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
        _ => ProviderError::ProviderRejected {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instagram_found_in_anchor() {
        let html = r#"
            <html><body>
                <footer class="social">
                    <a href="https://twitter.com/bluebottle">Twitter</a>
                    <a href="https://www.instagram.com/bluebottlejapan/">Instagram</a>
                </footer>
            </body></html>
        "#;
        assert_eq!(
            extract_instagram_from_html(html).as_deref(),
            Some("bluebottlejapan")
        );
    }

    #[test]
    fn instagram_found_in_page_text() {
        let html = r#"<html><body><p>Find us at instagram.com/tokyo.matcha for updates</p></body></html>"#;
        assert_eq!(
            extract_instagram_from_html(html).as_deref(),
            Some("tokyo.matcha")
        );
    }

    #[test]
    fn instagram_found_in_meta_content() {
        let html = r#"
            <html><head>
                <meta property="og:see_also" content="https://instagram.com/cafe_kitsune/">
            </head><body><p>hello</p></body></html>
        "#;
        assert_eq!(
            extract_instagram_from_html(html).as_deref(),
            Some("cafe_kitsune")
        );
    }

    #[test]
    fn no_instagram_anywhere() {
        let html = r#"<html><body><a href="https://example.com">home</a></body></html>"#;
        assert_eq!(extract_instagram_from_html(html), None);
    }
}
