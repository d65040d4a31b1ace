// Feed collector: bounded, dedup-aware state machine over a page driver
use crate::dedup::DedupStore;
use crate::model::{Extraction, ProgressToken, RawItem};
use crate::scraper::PageDriver;
use crate::utils::canonical_timestamp;

use chrono::Utc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct CollectorSettings {
    pub target_count: usize,
    pub max_attempts: u32,
    pub per_request_timeout: Duration,
    pub require_source_url: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Requesting,
    Extracting,
    Evaluating,
    Stalled,
    Done,
    Aborted,
}

/// Why a run stopped. Only `TargetReached` means the target was met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    FeedStalled,
    BudgetExhausted,
}

#[derive(Debug)]
pub struct CollectionOutcome {
    pub items: Vec<RawItem>,
    pub termination: Termination,
    /// Number of Requesting cycles that were started.
    pub attempts: u32,
    pub timeouts: u32,
    pub noise: u32,
    pub duplicates: u32,
}

/// State owned by exactly one collection run.
#[derive(Default)]
struct RunContext {
    dedup: DedupStore,
    items: Vec<RawItem>,
    attempts: u32,
    timeouts: u32,
    noise: u32,
    duplicates: u32,
    last_token: Option<ProgressToken>,
    unchanged_cycles: u32,
    /// Whether the current cycle's content became ready in time.
    ready: bool,
}

pub struct FeedCollector<'a, D: PageDriver> {
    driver: &'a D,
    settings: CollectorSettings,
}

impl<'a, D: PageDriver> FeedCollector<'a, D> {
    pub fn new(driver: &'a D, settings: CollectorSettings) -> Self {
        Self { driver, settings }
    }

    /// Runs one collection for `query`. Never fails: driver problems are
    /// absorbed and the run ends in a terminal state with whatever was accepted.
    pub async fn collect(&self, query: &str) -> CollectionOutcome {
        let mut ctx = RunContext::default();
        let mut handle: Option<D::Handle> = None;
        let mut state = CollectorState::Idle;

        let termination = loop {
            debug!("[{}] state {:?}", query, state);
            state = match state {
                CollectorState::Idle => {
                    handle = self.load(query).await;
                    CollectorState::Requesting
                }
                CollectorState::Requesting => {
                    if ctx.attempts >= self.settings.max_attempts {
                        CollectorState::Aborted
                    } else {
                        ctx.attempts += 1;
                        if handle.is_none() {
                            handle = self.load(query).await;
                        }
                        ctx.ready = match handle.as_mut() {
                            Some(h) => self.wait(h).await,
                            None => false,
                        };
                        if handle.is_some() && !ctx.ready {
                            ctx.timeouts += 1;
                            debug!("[{}] content not ready, extracting anyway", query);
                        }
                        CollectorState::Extracting
                    }
                }
                CollectorState::Extracting => {
                    if let Some(h) = handle.as_ref() {
                        let candidates = self.extract(h).await;
                        self.absorb(&mut ctx, candidates);
                    }
                    CollectorState::Evaluating
                }
                CollectorState::Evaluating => {
                    if ctx.items.len() >= self.settings.target_count {
                        CollectorState::Done
                    } else if !ctx.ready {
                        // slow or failed load: retry the same position, stall tracking untouched
                        CollectorState::Requesting
                    } else {
                        match handle.as_mut() {
                            Some(h) => {
                                let token = self.progress(h).await;
                                if token.is_none() || ctx.last_token == token {
                                    ctx.unchanged_cycles += 1;
                                    CollectorState::Stalled
                                } else {
                                    ctx.last_token = token;
                                    ctx.unchanged_cycles = 0;
                                    self.advance(h).await;
                                    CollectorState::Requesting
                                }
                            }
                            None => CollectorState::Requesting,
                        }
                    }
                }
                CollectorState::Stalled => {
                    if ctx.unchanged_cycles >= 2 {
                        CollectorState::Done
                    } else {
                        // one extra cycle to absorb slow-loading content
                        CollectorState::Requesting
                    }
                }
                CollectorState::Done => {
                    if ctx.items.len() >= self.settings.target_count {
                        break Termination::TargetReached;
                    }
                    break Termination::FeedStalled;
                }
                CollectorState::Aborted => break Termination::BudgetExhausted,
            };
        };

        info!(
            "[{}] collection finished: {:?}, {} unique items after {} attempts ({} timeouts, {} noise, {} duplicates)",
            query,
            termination,
            ctx.dedup.len(),
            ctx.attempts,
            ctx.timeouts,
            ctx.noise,
            ctx.duplicates
        );

        CollectionOutcome {
            items: ctx.items,
            termination,
            attempts: ctx.attempts,
            timeouts: ctx.timeouts,
            noise: ctx.noise,
            duplicates: ctx.duplicates,
        }
    }

    async fn load(&self, query: &str) -> Option<D::Handle> {
        match timeout(self.settings.per_request_timeout, self.driver.request_load(query)).await {
            Ok(Ok(handle)) => Some(handle),
            Ok(Err(e)) => {
                warn!("[{}] load request failed: {}", query, e);
                None
            }
            Err(_) => {
                warn!("[{}] load request timed out", query);
                None
            }
        }
    }

    /// The driver receives the timeout too, but the collector enforces it regardless.
    async fn wait(&self, handle: &mut D::Handle) -> bool {
        let limit = self.settings.per_request_timeout;
        timeout(limit, self.driver.wait_ready(handle, limit))
            .await
            .unwrap_or(false)
    }

    async fn extract(&self, handle: &D::Handle) -> Vec<Extraction> {
        match timeout(self.settings.per_request_timeout, self.driver.extract_visible(handle)).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!("Extraction failed: {}", e);
                Vec::new()
            }
            Err(_) => {
                warn!("Extraction timed out");
                Vec::new()
            }
        }
    }

    /// A signal that cannot be read in time counts as no progress.
    async fn progress(&self, handle: &D::Handle) -> Option<ProgressToken> {
        timeout(self.settings.per_request_timeout, self.driver.progress_signal(handle))
            .await
            .ok()
    }

    async fn advance(&self, handle: &mut D::Handle) {
        match timeout(self.settings.per_request_timeout, self.driver.advance(handle)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Advance failed: {}", e),
            Err(_) => warn!("Advance timed out"),
        }
    }

    fn absorb(&self, ctx: &mut RunContext, candidates: Vec<Extraction>) {
        for candidate in candidates {
            if ctx.items.len() >= self.settings.target_count {
                break;
            }
            if candidate.text.trim().is_empty()
                || (self.settings.require_source_url && candidate.url.is_none())
            {
                ctx.noise += 1;
                continue;
            }
            if !ctx.dedup.accept(&candidate.text) {
                ctx.duplicates += 1;
                continue;
            }
            ctx.items.push(RawItem {
                text: candidate.text,
                author: candidate.author,
                author_url: candidate.author_url,
                timestamp_iso: candidate.timestamp_iso.as_deref().map(canonical_timestamp),
                source_url: candidate.url,
                discovered_at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::model::ScraperError;
    use crate::scraper::HtmlFeedDriver;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn settings(target: usize, max_attempts: u32) -> CollectorSettings {
        CollectorSettings {
            target_count: target,
            max_attempts,
            per_request_timeout: Duration::from_millis(50),
            require_source_url: false,
        }
    }

    /// Replays one scripted window per cycle; the progress token is the cycle index
    /// unless `frozen` pins it.
    struct ScriptedDriver {
        windows: Vec<Vec<Extraction>>,
        frozen: bool,
        requests: AtomicU32,
    }

    impl ScriptedDriver {
        fn new(windows: Vec<Vec<&str>>) -> Self {
            Self {
                windows: windows
                    .into_iter()
                    .map(|w| {
                        w.into_iter()
                            .map(|text| Extraction {
                                text: text.to_string(),
                                ..Extraction::default()
                            })
                            .collect()
                    })
                    .collect(),
                frozen: false,
                requests: AtomicU32::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl PageDriver for ScriptedDriver {
        type Handle = usize;

        async fn request_load(&self, _query: &str) -> Result<usize, ScraperError> {
            Ok(0)
        }

        async fn wait_ready(&self, _handle: &mut usize, _timeout: Duration) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn extract_visible(&self, handle: &usize) -> Result<Vec<Extraction>, ScraperError> {
            Ok(self.windows.get(*handle).cloned().unwrap_or_default())
        }

        async fn progress_signal(&self, handle: &usize) -> ProgressToken {
            if self.frozen {
                ProgressToken(0)
            } else {
                ProgressToken((*handle).min(self.windows.len()) as u64)
            }
        }

        async fn advance(&self, handle: &mut usize) -> Result<(), ScraperError> {
            *handle += 1;
            Ok(())
        }
    }

    /// Never becomes ready and keeps reporting new progress.
    struct HangingDriver {
        counter: Mutex<u64>,
    }

    #[async_trait::async_trait]
    impl PageDriver for HangingDriver {
        type Handle = ();

        async fn request_load(&self, _query: &str) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn wait_ready(&self, _handle: &mut (), _timeout: Duration) -> bool {
            std::future::pending::<bool>().await
        }

        async fn extract_visible(&self, _handle: &()) -> Result<Vec<Extraction>, ScraperError> {
            Err(ScraperError::Timeout)
        }

        async fn progress_signal(&self, _handle: &()) -> ProgressToken {
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            ProgressToken(*counter)
        }

        async fn advance(&self, _handle: &mut ()) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    /// Load always fails.
    struct BrokenDriver;

    #[async_trait::async_trait]
    impl PageDriver for BrokenDriver {
        type Handle = ();

        async fn request_load(&self, _query: &str) -> Result<(), ScraperError> {
            Err(ScraperError::HttpError("connection refused".into()))
        }

        async fn wait_ready(&self, _handle: &mut (), _timeout: Duration) -> bool {
            true
        }

        async fn extract_visible(&self, _handle: &()) -> Result<Vec<Extraction>, ScraperError> {
            Ok(Vec::new())
        }

        async fn progress_signal(&self, _handle: &()) -> ProgressToken {
            ProgressToken(0)
        }

        async fn advance(&self, _handle: &mut ()) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    /// Each page stays not ready for `slow_waits` waits after loading; content
    /// and progress only change once it is ready.
    struct SlowDriver {
        pages: Vec<&'static str>,
        slow_waits: u32,
    }

    struct SlowHandle {
        page: usize,
        pending: u32,
        shown: Option<usize>,
    }

    #[async_trait::async_trait]
    impl PageDriver for SlowDriver {
        type Handle = SlowHandle;

        async fn request_load(&self, _query: &str) -> Result<SlowHandle, ScraperError> {
            Ok(SlowHandle {
                page: 0,
                pending: self.slow_waits,
                shown: None,
            })
        }

        async fn wait_ready(&self, handle: &mut SlowHandle, _timeout: Duration) -> bool {
            if handle.pending > 0 {
                handle.pending -= 1;
                return false;
            }
            handle.shown = Some(handle.page);
            true
        }

        async fn extract_visible(&self, handle: &SlowHandle) -> Result<Vec<Extraction>, ScraperError> {
            Ok(handle
                .shown
                .and_then(|page| self.pages.get(page))
                .map(|text| {
                    vec![Extraction {
                        text: text.to_string(),
                        ..Extraction::default()
                    }]
                })
                .unwrap_or_default())
        }

        async fn progress_signal(&self, handle: &SlowHandle) -> ProgressToken {
            ProgressToken(handle.shown.map_or(0, |page| page as u64 + 1))
        }

        async fn advance(&self, handle: &mut SlowHandle) -> Result<(), ScraperError> {
            handle.page += 1;
            handle.pending = self.slow_waits;
            Ok(())
        }
    }

    /// Ready at once, but extraction and scrolling never finish. The progress
    /// signal either hangs too or reports something new each time.
    struct StuckDriver {
        signal_hangs: bool,
        counter: Mutex<u64>,
    }

    #[async_trait::async_trait]
    impl PageDriver for StuckDriver {
        type Handle = ();

        async fn request_load(&self, _query: &str) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn wait_ready(&self, _handle: &mut (), _timeout: Duration) -> bool {
            true
        }

        async fn extract_visible(&self, _handle: &()) -> Result<Vec<Extraction>, ScraperError> {
            std::future::pending().await
        }

        async fn progress_signal(&self, _handle: &()) -> ProgressToken {
            if self.signal_hangs {
                return std::future::pending().await;
            }
            let mut counter = self.counter.lock().unwrap();
            *counter += 1;
            ProgressToken(*counter)
        }

        async fn advance(&self, _handle: &mut ()) -> Result<(), ScraperError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stops_at_target_in_discovery_order() {
        let driver = ScriptedDriver::new(vec![
            vec!["alpha", "beta"],
            vec!["beta", "gamma", "delta"],
            vec!["epsilon"],
        ]);
        let outcome = FeedCollector::new(&driver, settings(3, 10)).collect("q").await;

        assert_eq!(outcome.termination, Termination::TargetReached);
        let texts: Vec<&str> = outcome.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta", "gamma"]);
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn duplicate_render_survives_once() {
        let driver = ScriptedDriver::new(vec![vec![
            "What are you building today?",
            "what are you building   today?",
        ]]);
        let outcome = FeedCollector::new(&driver, settings(5, 10)).collect("q").await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.duplicates, 1);
    }

    #[tokio::test]
    async fn blank_candidates_count_as_noise() {
        let driver = ScriptedDriver::new(vec![vec!["", "   ", "real post"]]);
        let outcome = FeedCollector::new(&driver, settings(1, 10)).collect("q").await;

        assert_eq!(outcome.items.len(), 1);
        assert_eq!(outcome.noise, 2);
    }

    #[tokio::test]
    async fn missing_url_is_noise_when_required() {
        let driver = ScriptedDriver::new(vec![vec!["no link here"]]);
        let mut cfg = settings(1, 3);
        cfg.require_source_url = true;
        let outcome = FeedCollector::new(&driver, cfg).collect("q").await;

        assert!(outcome.items.is_empty());
        assert!(outcome.noise >= 1);
    }

    #[tokio::test]
    async fn stalled_feed_gets_one_extra_cycle_then_stops() {
        let mut driver = ScriptedDriver::new(vec![vec!["only post"]]);
        driver.frozen = true;
        let outcome = FeedCollector::new(&driver, settings(10, 50)).collect("q").await;

        assert_eq!(outcome.termination, Termination::FeedStalled);
        assert_eq!(outcome.items.len(), 1);
        // first cycle sets the token, second and third see it unchanged
        assert_eq!(outcome.attempts, 3);
        assert_eq!(driver.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_feed_stalls_with_partial_results() {
        let driver = ScriptedDriver::new(vec![vec!["a"], vec!["b"]]);
        let outcome = FeedCollector::new(&driver, settings(10, 50)).collect("q").await;

        assert_eq!(outcome.termination, Termination::FeedStalled);
        assert_eq!(outcome.items.len(), 2);
        assert!(outcome.attempts <= 50);
    }

    #[tokio::test]
    async fn hanging_driver_is_bounded_by_attempt_budget() {
        let driver = HangingDriver {
            counter: Mutex::new(0),
        };
        let outcome = FeedCollector::new(&driver, settings(5, 4)).collect("q").await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.timeouts, 4);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn never_exceeds_max_attempts() {
        for max in 1..=6 {
            let windows = (0..20).map(|_| vec!["same"]).collect();
            let driver = ScriptedDriver::new(windows);
            let outcome = FeedCollector::new(&driver, settings(100, max)).collect("q").await;
            assert!(outcome.attempts <= max);
            assert_eq!(driver.requests.load(Ordering::SeqCst), outcome.attempts);
        }
    }

    #[tokio::test]
    async fn failing_loads_are_absorbed() {
        let outcome = FeedCollector::new(&BrokenDriver, settings(1, 3)).collect("q").await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn timestamps_are_canonicalized() {
        let mut driver = ScriptedDriver::new(vec![]);
        driver.windows = vec![vec![Extraction {
            text: "dated".into(),
            author: Some("@bob".into()),
            author_url: Some("https://feed.example.org/bob".into()),
            timestamp_iso: Some("2025-03-01T10:15:00.000Z".into()),
            url: Some("https://feed.example.org/bob/1".into()),
        }]];
        let outcome = FeedCollector::new(&driver, settings(1, 2)).collect("q").await;

        let item = &outcome.items[0];
        assert_eq!(item.timestamp_iso.as_deref(), Some("2025-03-01T10:15:00+00:00"));
        assert_eq!(item.author.as_deref(), Some("@bob"));
    }

    #[tokio::test]
    async fn slow_pages_are_retried_not_treated_as_stalls() {
        let driver = SlowDriver {
            pages: vec!["first", "second", "third"],
            slow_waits: 2,
        };
        let outcome = FeedCollector::new(&driver, settings(3, 20)).collect("q").await;

        assert_eq!(outcome.termination, Termination::TargetReached);
        let texts: Vec<&str> = outcome.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        // two slow waits before each of the three pages
        assert_eq!(outcome.timeouts, 6);
        assert_eq!(outcome.attempts, 9);
    }

    #[tokio::test]
    async fn slow_pages_still_respect_attempt_budget() {
        let driver = SlowDriver {
            pages: vec!["first", "second", "third"],
            slow_waits: 2,
        };
        let outcome = FeedCollector::new(&driver, settings(3, 5)).collect("q").await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.items.len(), 1);
    }

    #[tokio::test]
    async fn hanging_progress_signal_ends_as_stall() {
        let driver = StuckDriver {
            signal_hangs: true,
            counter: Mutex::new(0),
        };
        let outcome = FeedCollector::new(&driver, settings(5, 10)).collect("q").await;

        assert_eq!(outcome.termination, Termination::FeedStalled);
        assert_eq!(outcome.attempts, 2);
        assert!(outcome.items.is_empty());
    }

    #[tokio::test]
    async fn hanging_extract_and_advance_are_bounded_by_attempt_budget() {
        let driver = StuckDriver {
            signal_hangs: false,
            counter: Mutex::new(0),
        };
        let outcome = FeedCollector::new(&driver, settings(5, 4)).collect("q").await;

        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.attempts, 4);
        assert!(outcome.items.is_empty());
    }

    /// Minimal HTTP feed: the first request gets a 503, then `?page=1` and
    /// `?page=2` each carry one post and later pages are empty.
    async fn serve_flaky_feed(listener: TcpListener) {
        let mut served = 0u32;
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let mut read = 0;
            while read < buf.len() && !buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf[read..]).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => read += n,
                }
            }
            let request = String::from_utf8_lossy(&buf[..read]).to_string();
            let path = request.split_whitespace().nth(1).unwrap_or("").to_string();
            let page = path.rsplit("page=").next().unwrap_or("");
            served += 1;

            let (status, body) = if served == 1 {
                ("503 Service Unavailable", String::new())
            } else {
                let post = match page {
                    "1" => "<li><p>first page post</p></li>",
                    "2" => "<li><p>second page post</p></li>",
                    _ => "",
                };
                ("200 OK", format!("<html><body><ul>{post}</ul></body></html>"))
            };
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    }

    #[tokio::test]
    async fn failed_first_fetch_does_not_skip_the_first_page() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_flaky_feed(listener));

        let selectors = SelectorConfig {
            item: "li".into(),
            text: "p".into(),
            author: None,
            time: None,
            link: None,
        };
        let driver = HtmlFeedDriver::new(
            &format!("http://{addr}/feed?q={{query}}&page={{page}}"),
            "test-agent",
            &selectors,
        )
        .unwrap();
        let mut cfg = settings(5, 10);
        cfg.per_request_timeout = Duration::from_secs(2);
        let outcome = FeedCollector::new(&driver, cfg).collect("rust").await;

        let texts: Vec<&str> = outcome.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["first page post", "second page post"]);
        assert_eq!(outcome.termination, Termination::FeedStalled);
        assert_eq!(outcome.timeouts, 1);
    }
}
