use std::{path::PathBuf, time::Duration};

use anyhow::anyhow;
use chrono_tz::Tz;

/// Data locations and upstream endpoints. Every option can also be set from
/// the environment.
#[derive(clap::Args, Debug, Clone)]
pub struct Config {
    /// MTA "Subway Stations and Complexes" CSV
    #[arg(
        long,
        env = "NYC_TRANSIT_SUBWAY_STATIONS",
        default_value = "data/MTA_Subway_Stations_and_Complexes.csv"
    )]
    pub subway_stations: PathBuf,

    /// Pre-built ferry schedule JSON
    #[arg(long, env = "NYC_TRANSIT_FERRY_SCHEDULE", default_value = "data/ferry_data.json")]
    pub ferry_schedule: PathBuf,

    /// Replacement transfer hub table (hub_id,name,lines); the built-in table is used otherwise
    #[arg(long, env = "NYC_TRANSIT_TRANSFER_HUBS")]
    pub transfer_hubs: Option<PathBuf>,

    /// GBFS base URL for Citi Bike station information and status
    #[arg(
        long,
        env = "NYC_TRANSIT_GBFS_BASE_URL",
        default_value = "https://gbfs.lyft.com/gbfs/2.3/bkn/en"
    )]
    pub gbfs_base_url: String,

    #[arg(
        long,
        env = "NYC_TRANSIT_FERRY_TRIP_UPDATES_URL",
        default_value = "http://nycferry.connexionz.net/rtt/public/utility/gtfsrealtime.aspx/tripupdate"
    )]
    pub ferry_trip_updates_url: String,

    #[arg(
        long,
        env = "NYC_TRANSIT_FERRY_ALERTS_URL",
        default_value = "http://nycferry.connexionz.net/rtt/public/utility/gtfsrealtime.aspx/alert"
    )]
    pub ferry_alerts_url: String,

    /// Subway GTFS-realtime URL prefix; each feed appends its own suffix
    #[arg(
        long,
        env = "NYC_TRANSIT_MTA_FEED_BASE_URL",
        default_value = "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs"
    )]
    pub mta_feed_base_url: String,

    /// Per-request timeout for upstream calls, in seconds
    #[arg(long, env = "NYC_TRANSIT_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// How long a fetched real-time feed is reused before refetching, in seconds
    #[arg(long, env = "NYC_TRANSIT_FEED_MAX_AGE_SECS", default_value_t = 30)]
    pub feed_max_age_secs: u64,

    /// Time zone for human-readable times
    #[arg(long, env = "NYC_TRANSIT_TIMEZONE", default_value = "America/New_York")]
    pub timezone: String,

    #[arg(long, env = "NYC_TRANSIT_USER_AGENT", default_value = "nyc-transit-tools/0.1")]
    pub user_agent: String,
}

impl Config {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn feed_max_age(&self) -> Duration {
        Duration::from_secs(self.feed_max_age_secs)
    }

    pub fn tz(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("Unknown time zone {:?}: {}", self.timezone, e))
    }
}
