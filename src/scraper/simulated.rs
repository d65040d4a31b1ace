use crate::model::{Extraction, ProgressToken, ScraperError};
use crate::scraper::traits::PageDriver;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory feed that behaves like a virtualised infinite scroll: overlapping
/// windows, shuffled render order and occasional duplicate renders.
pub struct SimulatedFeed {
    posts: Vec<String>,
    window: usize,
    step: usize,
    duplicate_rate: f64,
    rng: Mutex<StdRng>,
}

pub struct SimHandle {
    cursor: usize,
    visible: Vec<Extraction>,
}

impl SimulatedFeed {
    pub fn new(posts: Vec<String>, window: usize, step: usize, duplicate_rate: f64, seed: u64) -> Self {
        Self {
            posts,
            window: window.max(1),
            step: step.max(1),
            duplicate_rate: duplicate_rate.clamp(0.0, 1.0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn loaded(&self, handle: &SimHandle) -> usize {
        (handle.cursor + self.window).min(self.posts.len())
    }

    fn render(&self, cursor: usize) -> Vec<Extraction> {
        let end = (cursor + self.window).min(self.posts.len());
        let start = cursor.min(end);
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());

        let mut rendered = Vec::new();
        for (offset, post) in self.posts[start..end].iter().enumerate() {
            let extraction = Extraction {
                text: post.clone(),
                author: Some(format!("@user{}", start + offset)),
                author_url: Some(format!("sim://user/{}", start + offset)),
                timestamp_iso: None,
                url: Some(format!("sim://post/{}", start + offset)),
            };
            if rng.random_bool(self.duplicate_rate) {
                rendered.push(Extraction {
                    text: format!("  {}  ", post.to_uppercase()),
                    ..extraction.clone()
                });
            }
            rendered.push(extraction);
        }
        rendered.shuffle(&mut *rng);
        rendered
    }
}

#[async_trait::async_trait]
impl PageDriver for SimulatedFeed {
    type Handle = SimHandle;

    async fn request_load(&self, _query: &str) -> Result<SimHandle, ScraperError> {
        Ok(SimHandle {
            cursor: 0,
            visible: Vec::new(),
        })
    }

    async fn wait_ready(&self, handle: &mut SimHandle, _timeout: Duration) -> bool {
        handle.visible = self.render(handle.cursor);
        true
    }

    async fn extract_visible(&self, handle: &SimHandle) -> Result<Vec<Extraction>, ScraperError> {
        Ok(handle.visible.clone())
    }

    async fn progress_signal(&self, handle: &SimHandle) -> ProgressToken {
        ProgressToken(self.loaded(handle) as u64)
    }

    async fn advance(&self, handle: &mut SimHandle) -> Result<(), ScraperError> {
        handle.cursor = (handle.cursor + self.step).min(self.posts.len());
        Ok(())
    }
}
