use crate::config::SelectorConfig;
use crate::model::{Extraction, ProgressToken, ScraperError};
use crate::parser::{FeedParser, Parser};
use crate::scraper::traits::PageDriver;
use crate::utils::encode_query;

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Page driver over a paginated HTML feed: each `advance` moves to the next page.
pub struct HtmlFeedDriver {
    client: Client,
    url_template: String,
    parser: FeedParser,
}

pub struct FeedHandle {
    query: String,
    page: u32,
    visible: Vec<Extraction>,
}

impl HtmlFeedDriver {
    pub fn new(
        url_template: &str,
        user_agent: &str,
        selectors: &SelectorConfig,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| ScraperError::HttpError(e.to_string()))?;
        let parser = FeedParser::new(selectors)?.with_base_url(&build_url(url_template, "", 1))?;

        Ok(Self {
            client,
            url_template: url_template.to_string(),
            parser,
        })
    }

    fn page_url(&self, handle: &FeedHandle) -> String {
        build_url(&self.url_template, &handle.query, handle.page)
    }

    async fn fetch(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScraperError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ScraperError::InvalidResponse(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| ScraperError::HttpError(e.to_string()))
    }
}

fn build_url(template: &str, query: &str, page: u32) -> String {
    template
        .replace("{query}", &encode_query(query))
        .replace("{page}", &page.to_string())
}

#[async_trait::async_trait]
impl PageDriver for HtmlFeedDriver {
    type Handle = FeedHandle;

    async fn request_load(&self, query: &str) -> Result<FeedHandle, ScraperError> {
        Ok(FeedHandle {
            query: query.to_string(),
            page: 1,
            visible: Vec::new(),
        })
    }

    /// Fetches the current page. On failure the previous window stays visible.
    async fn wait_ready(&self, handle: &mut FeedHandle, timeout: Duration) -> bool {
        let url = self.page_url(handle);
        debug!("Fetching {}", url);

        let fetched = tokio::time::timeout(timeout, self.fetch(&url))
            .await
            .unwrap_or(Err(ScraperError::Timeout));
        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                warn!("Fetch failed for {}: {}", url, e);
                return false;
            }
        };

        match self.parser.parse(&body) {
            Ok(visible) => {
                handle.visible = visible;
                true
            }
            Err(e) => {
                warn!("Parse failed for {}: {}", url, e);
                false
            }
        }
    }

    async fn extract_visible(&self, handle: &FeedHandle) -> Result<Vec<Extraction>, ScraperError> {
        Ok(handle.visible.clone())
    }

    async fn progress_signal(&self, handle: &FeedHandle) -> ProgressToken {
        ProgressToken::of_window(handle.visible.iter().map(|e| e.text.as_str()))
    }

    async fn advance(&self, handle: &mut FeedHandle) -> Result<(), ScraperError> {
        handle.page += 1;
        Ok(())
    }
}
