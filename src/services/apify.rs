use std::{future::Future, time::Duration};

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

use crate::{configuration::ApifySettings, error::ProviderError, services::validate_query};

const PROVIDER_NAME: &str = "Apify";

const APIFY_BASE_URL: &str = "https://api.apify.com/v2";
const RESULTS_LIMIT: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialPlatform {
    Tiktok,
    Instagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Profile,
    Hashtag,
    Place,
}

impl SearchType {
    pub fn display_name(&self) -> &'static str {
        match self {
            SearchType::Profile => "profile",
            SearchType::Hashtag => "hashtag",
            SearchType::Place => "place",
        }
    }
}

/// One status check's worth of poll-loop state, for UI feedback. Sent over
/// an unbounded channel so surfacing never blocks the loop.
#[derive(Debug, Clone)]
pub struct PollProgress {
    pub status: String,
    pub checks: u32,
}

#[derive(Clone)]
pub struct ApifyClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
    tiktok_actor: String,
    instagram_actor: String,
    poll_interval: Duration,
    max_wait: Duration,
}

#[derive(Deserialize)]
struct RunEnvelope {
    data: Option<RunData>,
}

#[derive(Deserialize)]
struct RunData {
    id: Option<String>,
    status: Option<String>,
}

impl ApifyClient {
    pub fn new(settings: ApifySettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        ApifyClient {
            client,
            token: settings.token,
            base_url: APIFY_BASE_URL.to_string(),
            tiktok_actor: settings.tiktok_actor,
            instagram_actor: settings.instagram_actor,
            // interval() panics on zero, so a broken config floors at 1s
            poll_interval: Duration::from_secs(settings.poll_interval_secs.max(1)),
            max_wait: Duration::from_secs(settings.max_wait_secs),
        }
    }

    /// Starts the actor run for the requested platform and search type and
    /// waits for it through the poll loop, then pulls the dataset items.
    pub async fn run_search(
        &self,
        query: &str,
        platform: SocialPlatform,
        search_type: SearchType,
        progress: Option<UnboundedSender<PollProgress>>,
    ) -> Result<Vec<Value>, ProviderError> {
        let run_id = self.start_actor_run(query, platform, search_type).await?;
        self.wait_for_run_completion(&run_id, progress).await?;
        self.fetch_dataset_items(&run_id).await
    }

    /// One request that starts a remote job and hands back its id.
    pub async fn start_actor_run(
        &self,
        query: &str,
        platform: SocialPlatform,
        search_type: SearchType,
    ) -> Result<String, ProviderError> {
        validate_query(PROVIDER_NAME, query)?;

        let actor_id = match platform {
            SocialPlatform::Tiktok => &self.tiktok_actor,
            SocialPlatform::Instagram => &self.instagram_actor,
        };
        let url = format!("{}/acts/{}/runs", self.base_url, actor_id);
        let payload = build_run_payload(query, platform, search_type);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| network_failure(e.to_string()))?;

        let envelope: RunEnvelope = check_response(response).await?.json().await.map_err(|e| {
            network_failure(format!("bad run response body: {}", e))
        })?;

        envelope
            .data
            .and_then(|data| data.id)
            .ok_or_else(|| ProviderError::ProviderRejected {
                provider: PROVIDER_NAME.to_string(),
                detail: "no run id in response".to_string(),
            })
    }

    /// Bounded poll loop: one status check per interval until the run is
    /// terminal or the wait budget runs out. On timeout the remote run is
    /// left to finish on its own; the provider has no cancel endpoint.
    pub async fn wait_for_run_completion(
        &self,
        run_id: &str,
        progress: Option<UnboundedSender<PollProgress>>,
    ) -> Result<(), ProviderError> {
        poll_until_terminal(self.poll_interval, self.max_wait, progress, || {
            self.fetch_run_status(run_id)
        })
        .await
        .map(|_| ())
    }

    async fn fetch_run_status(&self, run_id: &str) -> Result<String, ProviderError> {
        let url = format!("{}/actor-runs/{}", self.base_url, run_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| network_failure(e.to_string()))?;

        let envelope: RunEnvelope = check_response(response).await?.json().await.map_err(|e| {
            network_failure(format!("bad status response body: {}", e))
        })?;

        envelope
            .data
            .and_then(|data| data.status)
            .ok_or_else(|| network_failure("no status in response".to_string()))
    }

    pub async fn fetch_dataset_items(&self, run_id: &str) -> Result<Vec<Value>, ProviderError> {
        let url = format!("{}/actor-runs/{}/dataset/items", self.base_url, run_id);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| network_failure(e.to_string()))?;

        check_response(response)
            .await?
            .json::<Vec<Value>>()
            .await
            .map_err(|e| network_failure(format!("bad dataset body: {}", e)))
    }
}

/// The generic poll loop. Ticks immediately, then once per interval; always
/// performs at least one status check and never overruns the budget by more
/// than one interval.
pub async fn poll_until_terminal<F, Fut>(
    interval: Duration,
    budget: Duration,
    progress: Option<UnboundedSender<PollProgress>>,
    mut fetch_status: F,
) -> Result<String, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<String, ProviderError>>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let deadline = tokio::time::Instant::now() + budget;
    let mut checks: u32 = 0;

    loop {
        ticker.tick().await;

        let status = fetch_status().await?;
        checks += 1;
        log::info!("Job status check #{}: {}", checks, status);

        if let Some(sender) = progress.as_ref() {
            // Receiver may be gone; the poll loop does not care.
            let _ = sender.send(PollProgress {
                status: status.clone(),
                checks,
            });
        }

        match status.as_str() {
            "SUCCEEDED" => return Ok(status),
            "FAILED" | "ABORTED" | "TIMED-OUT" => {
                return Err(ProviderError::JobFailed {
                    provider: PROVIDER_NAME.to_string(),
                    status,
                })
            }
            _ => {}
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(ProviderError::Timeout {
                provider: PROVIDER_NAME.to_string(),
                budget_secs: budget.as_secs(),
            });
        }
    }
}

// Each actor family wants its own input shape; mirrors what the actors
// document for profile, hashtag and place searches.
fn build_run_payload(query: &str, platform: SocialPlatform, search_type: SearchType) -> Value {
    match platform {
        SocialPlatform::Tiktok => match search_type {
            SearchType::Profile => {
                let profiles: Vec<String> = query
                    .replace(',', " ")
                    .split_whitespace()
                    .map(|p| p.to_string())
                    .collect();
                json!({ "profiles": profiles, "resultsLimit": RESULTS_LIMIT })
            }
            SearchType::Hashtag => {
                let hashtag = query.trim().trim_start_matches('#');
                json!({ "hashtags": [hashtag], "resultsPerPage": RESULTS_LIMIT })
            }
            SearchType::Place => {
                json!({ "search": query.trim(), "resultsLimit": RESULTS_LIMIT })
            }
        },
        SocialPlatform::Instagram => {
            let (search, search_type_name) = match search_type {
                SearchType::Profile => {
                    let usernames: Vec<String> = query
                        .replace(',', " ")
                        .split_whitespace()
                        .map(|u| u.to_string())
                        .collect();
                    (usernames.join(" "), "user")
                }
                SearchType::Hashtag => {
                    (query.trim().trim_start_matches('#').to_string(), "hashtag")
                }
                SearchType::Place => (query.trim().to_string(), "place"),
            };
            json!({
                "search": search,
                "searchType": search_type_name,
                "resultsLimit": RESULTS_LIMIT,
            })
        }
    }
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let detail = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    let detail = format!("HTTP {}: {}", status, detail);

    Err(match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationFailure {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
        429 => ProviderError::RateLimited {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
        _ => ProviderError::ProviderRejected {
            provider: PROVIDER_NAME.to_string(),
            detail,
        },
    })
}

fn network_failure(detail: String) -> ProviderError {
    ProviderError::NetworkFailure {
        provider: PROVIDER_NAME.to_string(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use tokio::sync::mpsc;

    use super::*;

    fn scripted_statuses(
        statuses: &'static [&'static str],
    ) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<Result<String, ProviderError>>)
    {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let fetch = move || {
            let i = calls_clone.fetch_add(1, Ordering::SeqCst) as usize;
            let status = statuses[i.min(statuses.len() - 1)];
            std::future::ready(Ok(status.to_string()))
        };
        (calls, fetch)
    }

    #[tokio::test(start_paused = true)]
    async fn poller_times_out_with_bounded_checks() {
        let (calls, fetch) = scripted_statuses(&["RUNNING"]);

        let result = poll_until_terminal(
            Duration::from_secs(5),
            Duration::from_secs(30),
            None,
            fetch,
        )
        .await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        // Checks land at t = 0, 5, ..., 30: seven of them, never more.
        assert_eq!(calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_always_checks_at_least_once() {
        let (calls, fetch) = scripted_statuses(&["RUNNING"]);

        let result =
            poll_until_terminal(Duration::from_secs(5), Duration::ZERO, None, fetch).await;

        assert!(matches!(result, Err(ProviderError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_stops_on_success_and_reports_progress() {
        let (calls, fetch) = scripted_statuses(&["RUNNING", "RUNNING", "SUCCEEDED"]);
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let result = poll_until_terminal(
            Duration::from_secs(5),
            Duration::from_secs(300),
            Some(sender),
            fetch,
        )
        .await;

        assert_eq!(result.unwrap(), "SUCCEEDED");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let mut seen = Vec::new();
        while let Ok(progress) = receiver.try_recv() {
            seen.push((progress.checks, progress.status));
        }
        assert_eq!(
            seen,
            vec![
                (1, "RUNNING".to_string()),
                (2, "RUNNING".to_string()),
                (3, "SUCCEEDED".to_string()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poller_surfaces_job_failure() {
        let (_, fetch) = scripted_statuses(&["RUNNING", "ABORTED"]);

        let result = poll_until_terminal(
            Duration::from_secs(5),
            Duration::from_secs(300),
            None,
            fetch,
        )
        .await;

        match result {
            Err(ProviderError::JobFailed { status, .. }) => assert_eq!(status, "ABORTED"),
            other => panic!("expected JobFailed, got {:?}", other),
        }
    }

    #[test]
    fn tiktok_profile_payload_splits_usernames() {
        let payload = build_run_payload(
            "bluebottle, sey.coffee",
            SocialPlatform::Tiktok,
            SearchType::Profile,
        );
        assert_eq!(
            payload["profiles"],
            serde_json::json!(["bluebottle", "sey.coffee"])
        );
        assert_eq!(payload["resultsLimit"], 20);
    }

    #[test]
    fn tiktok_hashtag_payload_strips_hash() {
        let payload =
            build_run_payload("#matchacafe", SocialPlatform::Tiktok, SearchType::Hashtag);
        assert_eq!(payload["hashtags"], serde_json::json!(["matchacafe"]));
    }

    #[test]
    fn instagram_place_payload_sets_search_type() {
        let payload = build_run_payload("Tokyo", SocialPlatform::Instagram, SearchType::Place);
        assert_eq!(payload["search"], "Tokyo");
        assert_eq!(payload["searchType"], "place");
    }

    #[test]
    fn instagram_profile_payload_joins_usernames() {
        let payload = build_run_payload(
            "bluebottle,sey.coffee",
            SocialPlatform::Instagram,
            SearchType::Profile,
        );
        assert_eq!(payload["search"], "bluebottle sey.coffee");
        assert_eq!(payload["searchType"], "user");
    }
}
