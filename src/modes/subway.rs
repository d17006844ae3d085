//! MTA subway: station complexes from the open-data CSV, arrivals from the
//! per-line-group GTFS-realtime feeds.

use std::{collections::BTreeSet, fs::File, io::Read, path::Path};

use anyhow::Context;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use geo_types::Point;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    modes::Reply,
    network::{
        hub::TransferHub,
        matcher::{match_routes, MatchPolicy, Reachability, RouteMatch, RouteOption},
        stop::{RouteId, ServedStop, StopId},
    },
    realtime::{feed::FeedCache, feed::FeedSource, stop_events},
    spatial::{
        distance::{round2, walk_minutes},
        lat_lon,
        proximity::{find_nearby, NearbyResult},
        Located,
    },
};

const ROUTE_SEARCH_RADIUS_KM: f64 = 0.8;
const ROUTE_STATIONS_PER_SIDE: usize = 4;
const ARRIVALS_KEPT: usize = 15;
const TRAINS_SHOWN: usize = 10;
const SUGGESTIONS_SHOWN: usize = 3;

const POLICY: MatchPolicy = MatchPolicy {
    reachability: Reachability::SharedLabel,
    group_direct_routes: true,
};

/// One GTFS-realtime feed and the lines it carries.
#[derive(Debug, PartialEq, Eq)]
pub struct FeedGroup {
    pub key: &'static str,
    /// Appended to the feed base URL.
    pub suffix: &'static str,
    pub lines: &'static [&'static str],
}

pub const FEED_GROUPS: [FeedGroup; 8] = [
    FeedGroup {
        key: "ace",
        suffix: "-ace",
        lines: &["A", "C", "E"],
    },
    FeedGroup {
        key: "g",
        suffix: "-g",
        lines: &["G"],
    },
    FeedGroup {
        key: "jz",
        suffix: "-jz",
        lines: &["J", "Z"],
    },
    FeedGroup {
        key: "nqrw",
        suffix: "-nqrw",
        lines: &["N", "Q", "R", "W"],
    },
    FeedGroup {
        key: "1234567s",
        suffix: "",
        lines: &["1", "2", "3", "4", "5", "6", "7", "S"],
    },
    FeedGroup {
        key: "l",
        suffix: "-l",
        lines: &["L"],
    },
    FeedGroup {
        key: "bdfm",
        suffix: "-bdfm",
        lines: &["B", "D", "F", "M"],
    },
    FeedGroup {
        key: "sir",
        suffix: "-si",
        lines: &["SIR"],
    },
];

/// Feed groups carrying any of `routes`, in table order and without repeats.
pub fn feeds_for_routes<'a, I>(routes: I) -> Vec<&'static FeedGroup>
where
    I: IntoIterator<Item = &'a RouteId>,
{
    let mut needed = BTreeSet::new();
    for route in routes {
        if let Some(i) = FEED_GROUPS.iter().position(|g| g.lines.contains(&route.as_str())) {
            needed.insert(i);
        }
    }

    needed.into_iter().map(|i| &FEED_GROUPS[i]).collect()
}

#[derive(Deserialize)]
struct StationRecord {
    #[serde(rename = "Complex ID")]
    complex_id: u32,
    #[serde(rename = "Stop Name")]
    stop_name: String,
    #[serde(rename = "Latitude")]
    latitude: f64,
    #[serde(rename = "Longitude")]
    longitude: f64,
    #[serde(rename = "GTFS Stop IDs")]
    gtfs_stop_ids: String,
    #[serde(rename = "Daytime Routes")]
    daytime_routes: String,
}

/// A station complex: one or more platforms sharing a name and transfers.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: StopId,
    pub complex_id: u32,
    pub name: String,
    pub coord: Point<f64>,
    pub gtfs_stop_ids: Vec<StopId>,
    pub routes: BTreeSet<RouteId>,
}

impl From<StationRecord> for Station {
    fn from(record: StationRecord) -> Self {
        Self {
            id: StopId::new(&record.complex_id.to_string()),
            complex_id: record.complex_id,
            name: record.stop_name,
            coord: lat_lon(record.latitude, record.longitude),
            gtfs_stop_ids: record
                .gtfs_stop_ids
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(StopId::new)
                .collect(),
            routes: record.daytime_routes.split_whitespace().map(RouteId::new).collect(),
        }
    }
}

impl Station {
    /// Platform ids with both direction suffixes, as the feeds report them.
    pub fn directional_stop_ids(&self) -> Vec<StopId> {
        self.gtfs_stop_ids
            .iter()
            .flat_map(|id| ["N", "S"].map(|d| StopId::new(&format!("{id}{d}"))))
            .collect()
    }
}

impl Located for Station {
    fn location(&self) -> Point<f64> {
        self.coord
    }
}

impl ServedStop for Station {
    fn id(&self) -> &StopId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn route_ids(&self) -> BTreeSet<&RouteId> {
        self.routes.iter().collect()
    }
}

fn read_stations<R: Read>(rdr: R) -> anyhow::Result<Vec<Station>> {
    let mut stations = vec![];
    for (i, record) in csv::Reader::from_reader(rdr).deserialize::<StationRecord>().enumerate() {
        let record = record.with_context(|| format!("Bad station row {}", i + 1))?;
        stations.push(record.into());
    }

    Ok(stations)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Uptown,
    Downtown,
}

impl Direction {
    pub fn of_stop(stop_id: &StopId) -> Self {
        if stop_id.as_str().ends_with('N') {
            Direction::Uptown
        } else {
            Direction::Downtown
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub route: Option<RouteId>,
    pub direction: Direction,
    pub arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextTrain {
    pub route: Option<RouteId>,
    pub direction: Direction,
    pub arrival_time: String,
    pub minutes_away: i64,
}

/// Trains with a predicted arrival, soonest first.
pub fn next_trains(arrivals: &[Arrival], now: DateTime<Tz>) -> Vec<NextTrain> {
    arrivals
        .iter()
        .filter_map(|a| {
            let at = a.arrival?;
            Some(NextTrain {
                route: a.route.clone(),
                direction: a.direction,
                arrival_time: at.with_timezone(&now.timezone()).format("%I:%M %p").to_string(),
                minutes_away: (at - now.with_timezone(&Utc)).num_seconds() / 60,
            })
        })
        .take(TRAINS_SHOWN)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationOption {
    pub complex_id: u32,
    pub station_name: String,
    pub distance_km: f64,
    pub walk_time_mins: u32,
    pub next_trains: Vec<NextTrain>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationSummary {
    pub complex_id: u32,
    pub station_name: String,
    pub distance_km: f64,
    pub lines: Vec<RouteId>,
}

impl StationSummary {
    fn of(n: &NearbyResult<'_, Station>) -> Self {
        Self {
            complex_id: n.stop.complex_id,
            station_name: n.stop.name.clone(),
            distance_km: round2(n.distance_km),
            lines: n.stop.routes.iter().cloned().collect(),
        }
    }
}

fn suggestions(nearby: &[NearbyResult<'_, Station>]) -> Vec<StationSummary> {
    nearby
        .iter()
        .take(SUGGESTIONS_SHOWN)
        .map(StationSummary::of)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubwayRouteOption {
    #[serde(flatten)]
    pub option: RouteOption,
    pub walk_to_origin_mins: i64,
    pub walk_from_dest_mins: i64,
    pub total_walk_mins: i64,
}

fn rounded_minutes(km: f64) -> i64 {
    walk_minutes(km).round() as i64
}

impl From<RouteOption> for SubwayRouteOption {
    fn from(option: RouteOption) -> Self {
        Self {
            walk_to_origin_mins: rounded_minutes(option.origin.distance_km),
            walk_from_dest_mins: rounded_minutes(option.dest.distance_km),
            total_walk_mins: rounded_minutes(option.total_walk_km()),
            option,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubwayNetwork {
    stations: Vec<Station>,
    feed_base_url: String,
}

impl SubwayNetwork {
    pub fn new(stations: Vec<Station>, feed_base_url: impl Into<String>) -> Self {
        Self {
            stations,
            feed_base_url: feed_base_url.into(),
        }
    }

    pub fn read<P: AsRef<Path>>(path: P, feed_base_url: impl Into<String>) -> anyhow::Result<Self> {
        let f = File::open(&path)
            .with_context(|| format!("Failed to open station list {}", path.as_ref().display()))?;
        Ok(Self::new(read_stations(f)?, feed_base_url))
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn source(&self, group: &FeedGroup) -> FeedSource {
        FeedSource::new(group.key, format!("{}{}", self.feed_base_url, group.suffix))
    }

    /// Upcoming arrivals at every platform of `station`, soonest first with
    /// unpredicted arrivals last. A feed that cannot be fetched is skipped.
    pub async fn arrivals(&self, feeds: &FeedCache, station: &Station) -> Vec<Arrival> {
        let targets = station.directional_stop_ids();
        let mut arrivals = vec![];

        for group in feeds_for_routes(&station.routes) {
            let feed = match feeds.latest(&self.source(group)).await {
                Ok(feed) => feed,
                Err(e) => {
                    warn!(
                        feed = group.key,
                        station = %station.name,
                        error = %e,
                        "Skipping subway feed"
                    );
                    continue;
                }
            };

            arrivals.extend(stop_events(&feed, &targets).into_iter().map(|event| Arrival {
                route: event.route_id,
                direction: Direction::of_stop(&event.stop_id),
                arrival: event.arrival,
            }));
        }

        arrivals.sort_by_key(|a| (a.arrival.is_none(), a.arrival));
        arrivals.truncate(ARRIVALS_KEPT);
        arrivals
    }

    pub async fn nearby_options(
        &self,
        feeds: &FeedCache,
        query: Point<f64>,
        radius_km: f64,
        max_stations: usize,
        now: DateTime<Tz>,
    ) -> Vec<StationOption> {
        let mut options = vec![];

        for n in find_nearby(&self.stations, query, radius_km).into_iter().take(max_stations) {
            let arrivals = self.arrivals(feeds, n.stop).await;
            options.push(StationOption {
                complex_id: n.stop.complex_id,
                station_name: n.stop.name.clone(),
                distance_km: round2(n.distance_km),
                walk_time_mins: walk_minutes(n.distance_km) as u32,
                next_trains: next_trains(&arrivals, now),
            });
        }

        options
    }

    pub fn route_options(
        &self,
        hubs: &[TransferHub],
        origin: Point<f64>,
        dest: Point<f64>,
        max_options: usize,
    ) -> Reply {
        let mut origins = find_nearby(&self.stations, origin, ROUTE_SEARCH_RADIUS_KM);
        let mut dests = find_nearby(&self.stations, dest, ROUTE_SEARCH_RADIUS_KM);
        origins.truncate(ROUTE_STATIONS_PER_SIDE);
        dests.truncate(ROUTE_STATIONS_PER_SIDE);

        match match_routes(&origins, &dests, hubs, POLICY) {
            RouteMatch::NoStops(_) => {
                Reply::text("No nearby subway stations found for this route.")
            }
            RouteMatch::NoRoutes => Reply::Json(json!({
                "message": "No subway routes found between these locations.",
                "suggestions": {
                    "closest_origin_stations": suggestions(&origins),
                    "closest_dest_stations": suggestions(&dests),
                }
            })),
            RouteMatch::Options(options) => {
                let shown: Vec<SubwayRouteOption> =
                    options.into_iter().take(max_options).map(SubwayRouteOption::from).collect();
                Reply::json(&shown)
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    use super::{fixtures::*, *};
    use crate::{
        network::hub::builtin_hubs,
        realtime::{fetch::Fetcher, fixtures as rt},
    };

    fn feeds() -> FeedCache {
        let fetcher = Fetcher::new("test", Duration::from_millis(200)).unwrap();
        FeedCache::new(fetcher, Duration::from_secs(60))
    }

    fn routes(ids: &[&str]) -> Vec<RouteId> {
        ids.iter().map(|s| RouteId::new(s)).collect()
    }

    #[test]
    fn test_read_stations() {
        let stations = network().stations().to_vec();
        assert_eq!(stations.len(), 5);

        let times_sq = &stations[0];
        assert_eq!(times_sq.complex_id, 611);
        assert_eq!(times_sq.id, StopId::new("611"));
        assert_eq!(times_sq.gtfs_stop_ids.len(), 5);
        assert_eq!(times_sq.gtfs_stop_ids[3], StopId::new("A27"));
        assert_eq!(times_sq.routes.len(), 12);
    }

    #[test]
    fn test_directional_stop_ids() {
        let network = network();
        let union_sq = &network.stations()[2];
        assert_eq!(
            union_sq.directional_stop_ids(),
            ["635N", "635S", "L03N", "L03S", "R20N", "R20S"].map(StopId::new).to_vec()
        );
    }

    #[test]
    fn test_feed_selection() {
        fn keys(ids: &[&str]) -> Vec<&'static str> {
            feeds_for_routes(&routes(ids)).iter().map(|g| g.key).collect()
        }

        assert_eq!(keys(&["A", "C", "E"]), vec!["ace"]);
        assert_eq!(keys(&["L", "4", "N", "6"]), vec!["nqrw", "1234567s", "l"]);
        assert_eq!(keys(&["SIR"]), vec!["sir"]);
        assert!(keys(&["X"]).is_empty());
    }

    #[test]
    fn test_feed_urls() {
        let network = network();
        assert_eq!(network.source(&FEED_GROUPS[0]).url, "http://127.0.0.1:9/nyct%2Fgtfs-ace");
        assert_eq!(network.source(&FEED_GROUPS[4]).url, "http://127.0.0.1:9/nyct%2Fgtfs");
        assert_eq!(network.source(&FEED_GROUPS[7]).url, "http://127.0.0.1:9/nyct%2Fgtfs-si");
    }

    #[test]
    fn test_direction_from_suffix() {
        assert_eq!(Direction::of_stop(&StopId::new("A27N")), Direction::Uptown);
        assert_eq!(Direction::of_stop(&StopId::new("A27S")), Direction::Downtown);
        assert_eq!(Direction::of_stop(&StopId::new("A27")), Direction::Downtown);
    }

    #[tokio::test]
    async fn test_arrivals_sorted_with_missing_last() {
        let network = network();
        let feeds = feeds();
        let ace = network.source(&FEED_GROUPS[0]);
        feeds
            .prime(
                &ace,
                rt::feed(vec![
                    rt::trip("a1", "A", None, vec![rt::call("A31S", Some(1_700_000_900), None)]),
                    rt::trip("c1", "C", None, vec![rt::call("A31N", None, None)]),
                    rt::trip("e1", "E", None, vec![rt::call("A31N", Some(1_700_000_300), None)]),
                    rt::trip("e2", "E", None, vec![rt::call("A27N", Some(1_700_000_100), None)]),
                ]),
            )
            .await;

        let arrivals = network.arrivals(&feeds, &network.stations()[3]).await;

        let seen: Vec<(Option<&str>, Direction, bool)> = arrivals
            .iter()
            .map(|a| (a.route.as_ref().map(RouteId::as_str), a.direction, a.arrival.is_some()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (Some("E"), Direction::Uptown, true),
                (Some("A"), Direction::Downtown, true),
                (Some("C"), Direction::Uptown, false),
            ]
        );
    }

    #[tokio::test]
    async fn test_unreachable_feeds_are_skipped() {
        let network = network();
        let arrivals = network.arrivals(&feeds(), &network.stations()[4]).await;
        assert!(arrivals.is_empty());
    }

    #[test]
    fn test_next_trains_formatting() {
        // 2023-11-14 22:13:20 UTC is 17:13:20 in New York
        let now = New_York.timestamp_opt(1_700_000_000, 0).unwrap();
        let arrivals = vec![
            Arrival {
                route: Some(RouteId::new("E")),
                direction: Direction::Uptown,
                arrival: DateTime::from_timestamp(1_700_000_330, 0),
            },
            Arrival {
                route: Some(RouteId::new("C")),
                direction: Direction::Uptown,
                arrival: None,
            },
        ];

        let trains = next_trains(&arrivals, now);
        assert_eq!(
            trains,
            vec![NextTrain {
                route: Some(RouteId::new("E")),
                direction: Direction::Uptown,
                arrival_time: "05:18 PM".to_owned(),
                minutes_away: 5,
            }]
        );
    }

    #[tokio::test]
    async fn test_nearby_options() {
        let network = network();
        let feeds = feeds();
        let now = New_York.timestamp_opt(1_700_000_000, 0).unwrap();
        let at_18_st = lat_lon(40.74104, -73.997871);

        let options = network.nearby_options(&feeds, at_18_st, 0.5, 10, now).await;

        let ids: Vec<u32> = options.iter().map(|o| o.complex_id).collect();
        assert_eq!(ids, vec![318, 163]);
        assert_eq!(options[0].distance_km, 0.0);
        assert_eq!(options[0].walk_time_mins, 0);
        assert_eq!(options[1].distance_km, 0.32);
        assert_eq!(options[1].walk_time_mins, 3);
        assert!(options[1].next_trains.is_empty());

        let limited = network.nearby_options(&feeds, at_18_st, 0.5, 1, now).await;
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_route_options_direct_and_transfer() {
        let network = network();
        let hubs = builtin_hubs().unwrap();
        let times_sq = lat_lon(40.757308, -73.987156);
        let union_sq = lat_lon(40.735736, -73.990568);
        let first_av = lat_lon(40.730953, -73.981628);

        let Reply::Json(direct) = network.route_options(&hubs, times_sq, union_sq, 5) else {
            panic!("expected options");
        };
        assert_eq!(direct[0]["type"], "direct");
        assert_eq!(
            direct[0]["description"],
            concat!(
                "Take N/Q/R/W from Times Sq-42 St/Port Authority Bus Terminal ",
                "directly to 14 St-Union Sq"
            )
        );
        assert_eq!(direct[0]["routes"], json!(["N", "Q", "R", "W"]));
        assert_eq!(direct[0]["total_walk_mins"], 0);

        // 18 St (1/2/3) and 1 Av (L) share nothing; 14 St/6 Av joins them
        let eighteenth_st = lat_lon(40.74104, -73.997871);
        let Reply::Json(transfer) = network.route_options(&hubs, eighteenth_st, first_av, 5) else {
            panic!("expected options");
        };
        let descriptions: Vec<&str> = transfer
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|o| o["description"].as_str())
            .collect();
        let expected = "Take 1/2/3 from 18 St to 14 St/6 Av, transfer to L to 1 Av";
        assert!(descriptions.contains(&expected));
        assert!(descriptions.len() <= 5);
    }

    #[test]
    fn test_route_options_without_stations() {
        let network = network();
        let nowhere = lat_lon(41.5, -75.0);
        assert_eq!(
            network.route_options(&[], nowhere, lat_lon(40.757308, -73.987156), 5),
            Reply::text("No nearby subway stations found for this route.")
        );
    }

    #[test]
    fn test_route_options_fall_back_to_suggestions() {
        let network = network();
        let eighteenth_st = lat_lon(40.74104, -73.997871);
        let first_av = lat_lon(40.730953, -73.981628);
        let Reply::Json(v) = network.route_options(&[], eighteenth_st, first_av, 5) else {
            panic!("expected suggestions");
        };

        assert_eq!(v["message"], "No subway routes found between these locations.");
        assert_eq!(v["suggestions"]["closest_origin_stations"][0]["complex_id"], 318);
        assert_eq!(v["suggestions"]["closest_dest_stations"][0]["complex_id"], 120);
    }
}
