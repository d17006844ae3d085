//! NYC Ferry: static schedule JSON plus GTFS-realtime trip updates and alerts.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::Context;
use chrono::DateTime;
use chrono_tz::Tz;
use geo_types::Point;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::TransitError,
    modes::Reply,
    network::{
        matcher::{
            match_routes, Connection, MatchPolicy, Reachability, RouteMatch, RouteOption, Side,
        },
        stop::{RouteId, ServedStop, StopId},
    },
    realtime::{alerts, feed::FeedCache, feed::FeedSource, stop_events},
    schedule::{aggregate_departures, ScheduledRoute},
    spatial::{distance::round2, lat_lon, proximity::find_nearby, proximity::NearbyResult, Located},
};

const ROUTE_OPTIONS_SHOWN: usize = 5;
const SUGGESTIONS_SHOWN: usize = 3;

/// A ferry only reaches the landings listed after this stop on the route.
const POLICY: MatchPolicy = MatchPolicy {
    reachability: Reachability::DestinationList,
    group_direct_routes: false,
};

#[derive(Deserialize)]
struct FerryFile {
    stops: BTreeMap<StopId, FerryStopRecord>,
}

#[derive(Deserialize)]
struct FerryStopRecord {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(default)]
    routes: BTreeMap<RouteId, ScheduledRoute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FerryStop {
    pub id: StopId,
    pub name: String,
    pub coord: Point<f64>,
    pub routes: BTreeMap<RouteId, ScheduledRoute>,
}

impl Located for FerryStop {
    fn location(&self) -> Point<f64> {
        self.coord
    }
}

impl ServedStop for FerryStop {
    fn id(&self) -> &StopId {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn route_ids(&self) -> BTreeSet<&RouteId> {
        self.routes.keys().collect()
    }

    fn destinations(&self, route: &RouteId) -> Option<&[StopId]> {
        self.routes.get(route).map(|r| r.destinations.as_slice())
    }
}

/// Ferry landings ordered by stop id.
#[derive(Debug, Clone)]
pub struct FerryNetwork {
    stops: Vec<FerryStop>,
    trip_updates: FeedSource,
    alerts: FeedSource,
}

fn read_ferry_data<R: Read>(rdr: R) -> anyhow::Result<Vec<FerryStop>> {
    let file: FerryFile = serde_json::from_reader(rdr).context("Malformed ferry schedule")?;

    Ok(file
        .stops
        .into_iter()
        .map(|(id, s)| FerryStop {
            id,
            name: s.name,
            coord: lat_lon(s.lat, s.lon),
            routes: s.routes,
        })
        .collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FerryStopSummary {
    pub stop_id: StopId,
    pub name: String,
    pub distance_km: f64,
    pub routes: Vec<RouteId>,
}

impl FerryStopSummary {
    fn of(n: &NearbyResult<'_, FerryStop>) -> Self {
        Self {
            stop_id: n.stop.id.clone(),
            name: n.stop.name.clone(),
            distance_km: round2(n.distance_km),
            routes: n.stop.routes.keys().cloned().collect(),
        }
    }
}

fn suggestions(nearby: &[NearbyResult<'_, FerryStop>]) -> Vec<FerryStopSummary> {
    nearby
        .iter()
        .take(SUGGESTIONS_SHOWN)
        .map(FerryStopSummary::of)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FerryRouteOption {
    #[serde(flatten)]
    pub option: RouteOption,
    pub route_name: Option<String>,
    pub total_walk_distance_km: f64,
}

impl FerryNetwork {
    pub fn new(stops: Vec<FerryStop>, trip_updates: FeedSource, alerts: FeedSource) -> Self {
        Self {
            stops,
            trip_updates,
            alerts,
        }
    }

    pub fn read<P: AsRef<Path>>(
        path: P,
        trip_updates: FeedSource,
        alerts: FeedSource,
    ) -> anyhow::Result<Self> {
        let f = File::open(&path)
            .with_context(|| format!("Failed to open ferry schedule {}", path.as_ref().display()))?;
        let stops = read_ferry_data(BufReader::new(f))?;
        Ok(Self::new(stops, trip_updates, alerts))
    }

    pub fn stops(&self) -> &[FerryStop] {
        &self.stops
    }

    pub fn stop(&self, id: &StopId) -> Option<&FerryStop> {
        self.stops.iter().find(|s| &s.id == id)
    }

    /// Exact stop id first, then the first stop whose name contains `query`
    /// ignoring case.
    pub fn lookup(&self, query: &str) -> Result<&FerryStop, TransitError> {
        let id = StopId::new(query);
        let needle = id.as_str().to_lowercase();

        self.stop(&id)
            .or_else(|| self.stops.iter().find(|s| s.name.to_lowercase().contains(&needle)))
            .ok_or_else(|| {
                TransitError::NotFound(format!(
                    "Stop '{query}' not found. Try a stop ID or partial name."
                ))
            })
    }

    pub fn nearby(&self, query: Point<f64>, radius_km: f64) -> Vec<FerryStopSummary> {
        find_nearby(&self.stops, query, radius_km)
            .iter()
            .map(FerryStopSummary::of)
            .collect()
    }

    pub async fn departures(&self, feeds: &FeedCache, query: &str, now: DateTime<Tz>) -> Reply {
        let stop = match self.lookup(query) {
            Ok(stop) => stop,
            Err(e) => return Reply::text(e.to_string()),
        };

        let realtime = feeds
            .latest(&self.trip_updates)
            .await
            .map(|feed| stop_events(&feed, std::slice::from_ref(&stop.id)));

        let view = aggregate_departures(
            &stop.id,
            &stop.name,
            &stop.routes,
            |id| self.stop(id).map(|s| s.name.clone()),
            realtime,
            now,
        );

        Reply::json(&view)
    }

    pub fn route_options(&self, origin: Point<f64>, dest: Point<f64>, radius_km: f64) -> Reply {
        let origins = find_nearby(&self.stops, origin, radius_km);
        let dests = find_nearby(&self.stops, dest, radius_km);

        match match_routes(&origins, &dests, &[], POLICY) {
            RouteMatch::NoStops(Side::Origin) => Reply::text(format!(
                "No ferry stops found within {radius_km}km of origin location."
            )),
            RouteMatch::NoStops(Side::Destination) => Reply::text(format!(
                "No ferry stops found within {radius_km}km of destination location."
            )),
            RouteMatch::NoRoutes => Reply::Json(json!({
                "message": "No direct ferry routes found between these locations.",
                "suggestions": {
                    "closest_origin_stops": suggestions(&origins),
                    "closest_dest_stops": suggestions(&dests),
                }
            })),
            RouteMatch::Options(options) => {
                let total = options.len();
                let shown: Vec<FerryRouteOption> = options
                    .into_iter()
                    .take(ROUTE_OPTIONS_SHOWN)
                    .map(|option| self.describe_option(option))
                    .collect();

                Reply::Json(json!({
                    "route_options": shown,
                    "total_options_found": total,
                }))
            }
        }
    }

    fn describe_option(&self, option: RouteOption) -> FerryRouteOption {
        let route_name = match &option.connection {
            Connection::Direct { routes } => routes.first().and_then(|route| {
                self.stop(&option.origin.stop_id)
                    .and_then(|s| s.routes.get(route))
                    .map(|r| r.route_name.clone())
            }),
            Connection::Transfer { .. } => None,
        };

        FerryRouteOption {
            total_walk_distance_km: round2(option.total_walk_km()),
            route_name,
            option,
        }
    }

    pub async fn alerts(&self, feeds: &FeedCache) -> Reply {
        match feeds.latest(&self.alerts).await {
            Ok(feed) => {
                let alerts = alerts(&feed);
                Reply::Json(json!({ "count": alerts.len(), "alerts": alerts }))
            }
            Err(e) => Reply::Json(e.to_json()),
        }
    }
}
