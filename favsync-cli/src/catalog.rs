//! Favorites listing from the catalog's `/posts.json` endpoint.
//!
//! The service allows one request per second; 5xx answers are retried with
//! exponential backoff.

use std::thread::sleep;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use favsync_core::{AssetId, CatalogPost};

pub const USER_AGENT: &str = concat!("favsync/", env!("CARGO_PKG_VERSION"));

/// Largest page the service hands out.
pub const PAGE_LIMIT: usize = 320;
const MIN_INTERVAL: Duration = Duration::from_secs(1);
const MAX_RETRIES: u32 = 5;
const BACKOFF_BASE: Duration = Duration::from_millis(100);

#[derive(Debug, Deserialize)]
struct PostsPage {
    posts: Vec<CatalogPost>,
}

pub struct CatalogClient {
    agent: ureq::Agent,
    base_url: String,
    login: String,
    api_key: String,
    last_request: Option<Instant>,
}

impl CatalogClient {
    pub fn new(base_url: &str, login: &str, api_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(60))
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            login: login.to_string(),
            api_key: api_key.to_string(),
            last_request: None,
        }
    }

    /// Every post `user` has favorited, newest first.
    pub fn favorites(&mut self, user: &str) -> Result<Vec<CatalogPost>> {
        tracing::info!(user, "fetching favorites");
        let query = favorites_query(user);
        let posts = collect_pages(|before| self.fetch_page(&query, before))?;
        tracing::info!(count = posts.len(), "fetched favorites");
        Ok(posts)
    }

    fn fetch_page(&mut self, tags: &str, before: Option<AssetId>) -> Result<Vec<CatalogPost>> {
        let url = format!("{}/posts.json", self.base_url);
        let mut attempt = 0;
        loop {
            self.throttle();
            let mut request = self
                .agent
                .get(&url)
                .query("tags", tags)
                .query("limit", &PAGE_LIMIT.to_string())
                .query("login", &self.login)
                .query("api_key", &self.api_key);
            if let Some(id) = before {
                request = request.query("page", &format!("b{id}"));
            }
            tracing::debug!(url, ?before, attempt, "GET");

            match request.call() {
                Ok(response) => {
                    let page: PostsPage = response
                        .into_json()
                        .context("catalog returned an unreadable post list")?;
                    tracing::debug!(count = page.posts.len(), "got page");
                    return Ok(page.posts);
                }
                Err(ureq::Error::Status(code, _)) if code >= 500 && attempt < MAX_RETRIES => {
                    let wait = backoff(attempt);
                    tracing::warn!(code, ?wait, "catalog server error, retrying");
                    sleep(wait);
                    attempt += 1;
                }
                Err(ureq::Error::Status(code, response)) => {
                    let text = response.into_string().unwrap_or_default();
                    bail!("catalog returned {code}: {text}");
                }
                Err(err) => return Err(err).context("catalog request failed"),
            }
        }
    }

    fn throttle(&mut self) {
        if let Some(last) = self.last_request {
            let wait = throttle_delay(last.elapsed());
            if !wait.is_zero() {
                sleep(wait);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// `fav:<user> order:id_desc`
pub fn favorites_query(user: &str) -> String {
    format!("fav:{user} order:id_desc")
}

/// Pull pages until an empty one, each page starting below the last id
/// seen.
pub fn collect_pages<F>(mut fetch: F) -> Result<Vec<CatalogPost>>
where
    F: FnMut(Option<AssetId>) -> Result<Vec<CatalogPost>>,
{
    let mut posts: Vec<CatalogPost> = Vec::new();
    loop {
        let before = posts.last().map(|post| post.id);
        let batch = fetch(before)?;
        if batch.is_empty() {
            return Ok(posts);
        }
        posts.extend(batch);
    }
}

fn throttle_delay(elapsed: Duration) -> Duration {
    MIN_INTERVAL.saturating_sub(elapsed)
}

fn backoff(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempt)
}
