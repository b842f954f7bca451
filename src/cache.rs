use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

/// Read-through cache holding one value for at most `ttl`.
#[derive(Debug)]
pub struct TtlCache<T> {
    entry: Option<(T, DateTime<Utc>)>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        TtlCache { entry: None, ttl }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.entry.as_ref().map(|(_, at)| *at)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    /// Returns the cached value, refreshing it through `fetcher` when stale.
    /// A failed fetch keeps whatever was cached before.
    pub async fn get_or_refresh<F, Fut, E>(
        &mut self,
        now: DateTime<Utc>,
        fetcher: F,
    ) -> Result<&T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ttl = self.ttl;
        let entry = match self.entry.take() {
            Some(entry) if now - entry.1 < ttl => {
                debug!("cache hit");
                entry
            }
            previous => {
                debug!("cache miss, refreshing");
                match fetcher().await {
                    Ok(value) => (value, now),
                    Err(err) => {
                        self.entry = previous;
                        return Err(err);
                    }
                }
            }
        };

        Ok(&self.entry.insert(entry).0)
    }
}
