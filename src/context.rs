use std::time::Instant;

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::{
    config::Config,
    modes::{ferry::FerryNetwork, subway::SubwayNetwork},
    network::hub::{builtin_hubs, read_hub_file, TransferHub},
    realtime::{
        feed::{FeedCache, FeedSource},
        fetch::Fetcher,
    },
};

/// Everything a tool call needs: static data loaded once at startup and the
/// shared real-time feed cache.
pub struct AppContext {
    pub tz: Tz,
    pub gbfs_base_url: String,
    pub subway: SubwayNetwork,
    pub ferry: FerryNetwork,
    pub hubs: Vec<TransferHub>,
    pub feeds: FeedCache,
}

impl AppContext {
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let tz = config.tz()?;
        let fetcher = Fetcher::new(&config.user_agent, config.request_timeout())
            .context("Failed to build HTTP client")?;

        let now = Instant::now();
        let subway =
            SubwayNetwork::read(&config.subway_stations, config.mta_feed_base_url.as_str())?;
        info!(
            stations = subway.stations().len(),
            "Read subway stations in {:?}",
            now.elapsed()
        );

        let now = Instant::now();
        let ferry = FerryNetwork::read(
            &config.ferry_schedule,
            FeedSource::new("ferry-trip-updates", config.ferry_trip_updates_url.as_str()),
            FeedSource::new("ferry-alerts", config.ferry_alerts_url.as_str()),
        )?;
        info!(stops = ferry.stops().len(), "Read ferry schedule in {:?}", now.elapsed());

        let hubs = match &config.transfer_hubs {
            Some(path) => read_hub_file(path)?,
            None => builtin_hubs()?,
        };
        info!(hubs = hubs.len(), "Loaded transfer hubs");

        Ok(Self {
            tz,
            gbfs_base_url: config.gbfs_base_url.clone(),
            subway,
            ferry,
            hubs,
            feeds: FeedCache::new(fetcher, config.feed_max_age()),
        })
    }

    pub fn fetcher(&self) -> &Fetcher {
        self.feeds.fetcher()
    }

    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// Fixture networks with every upstream pointed at a closed local port.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        use std::time::Duration;

        use crate::modes::{ferry, subway};

        Self {
            tz: chrono_tz::America::New_York,
            gbfs_base_url: "http://127.0.0.1:9/gbfs".to_owned(),
            subway: subway::fixtures::network(),
            ferry: ferry::fixtures::network(),
            hubs: builtin_hubs().unwrap(),
            feeds: FeedCache::new(
                Fetcher::new("test", Duration::from_millis(200)).unwrap(),
                Duration::from_secs(60),
            ),
        }
    }
}
