use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use prost::Message;
use tracing::info;

use crate::{error::TransitError, realtime::fetch::Fetcher, realtime::gtfs_rt::FeedMessage};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeedId(String);

impl FeedId {
    pub fn new(str: &str) -> Self {
        Self(str.to_owned())
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeedSource {
    pub id: FeedId,
    pub url: String,
}

impl FeedSource {
    pub fn new(id: &str, url: impl Into<String>) -> Self {
        Self {
            id: FeedId::new(id),
            url: url.into(),
        }
    }
}

struct Snapshot {
    fetched_at: Instant,
    feed: Arc<FeedMessage>,
}

/// One real-time feed and the last copy of it that decoded cleanly.
pub struct FeedHandle {
    source: FeedSource,
    snapshot: tokio::sync::Mutex<Option<Snapshot>>,
}

impl FeedHandle {
    fn new(source: FeedSource) -> Self {
        Self {
            source,
            snapshot: tokio::sync::Mutex::new(None),
        }
    }

    /// The cached feed, refetched first when older than `max_age`.
    ///
    /// The lock is held across the fetch so concurrent callers share one request.
    async fn latest(
        &self,
        fetcher: &Fetcher,
        max_age: Duration,
    ) -> Result<Arc<FeedMessage>, TransitError> {
        let mut snapshot = self.snapshot.lock().await;

        if let Some(s) = snapshot.as_ref() {
            if s.fetched_at.elapsed() < max_age {
                return Ok(Arc::clone(&s.feed));
            }
        }

        let now = Instant::now();
        let bytes = fetcher.get_bytes(&self.source.url).await?;
        let feed = Arc::new(FeedMessage::decode(bytes.as_slice())?);
        info!(
            feed = %self.source.id,
            entities = feed.entity.len(),
            "Fetched feed in {:?}",
            now.elapsed()
        );

        *snapshot = Some(Snapshot {
            fetched_at: Instant::now(),
            feed: Arc::clone(&feed),
        });

        Ok(feed)
    }

    #[cfg(test)]
    async fn prime(&self, feed: FeedMessage) {
        *self.snapshot.lock().await = Some(Snapshot {
            fetched_at: Instant::now(),
            feed: Arc::new(feed),
        });
    }
}

/// Feed handles keyed by feed id, created on first use and kept for the life of
/// the process.
pub struct FeedCache {
    fetcher: Fetcher,
    max_age: Duration,
    handles: Mutex<HashMap<FeedId, Arc<FeedHandle>>>,
}

impl FeedCache {
    pub fn new(fetcher: Fetcher, max_age: Duration) -> Self {
        Self {
            fetcher,
            max_age,
            handles: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    fn handle(&self, source: &FeedSource) -> Arc<FeedHandle> {
        let mut handles = self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            handles
                .entry(source.id.clone())
                .or_insert_with(|| Arc::new(FeedHandle::new(source.clone()))),
        )
    }

    pub async fn latest(&self, source: &FeedSource) -> Result<Arc<FeedMessage>, TransitError> {
        self.handle(source).latest(&self.fetcher, self.max_age).await
    }

    #[cfg(test)]
    pub async fn prime(&self, source: &FeedSource, feed: FeedMessage) {
        self.handle(source).prime(feed).await;
    }

    #[cfg(test)]
    fn handle_count(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or_default()
    }
}
