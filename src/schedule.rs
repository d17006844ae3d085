//! Static schedules merged with whatever real-time data is available for a stop.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    error::TransitError,
    network::stop::{RouteId, StopId},
    realtime::StopEvent,
};

/// Static departure times listed per day type.
const STATIC_TIMES_SHOWN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekdays,
    Weekends,
}

impl DayType {
    pub fn for_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekends,
            _ => DayType::Weekdays,
        }
    }
}

/// Departure times (`HH:MM:SS`, may run past 24:00) bucketed by day type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulePatterns {
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub weekends: Vec<String>,
}

impl SchedulePatterns {
    fn first(&self, n: usize) -> SchedulePatterns {
        SchedulePatterns {
            weekdays: self.weekdays.iter().take(n).cloned().collect(),
            weekends: self.weekends.iter().take(n).cloned().collect(),
        }
    }
}

/// A route as seen from one stop: where it goes next and when it leaves.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScheduledRoute {
    pub route_name: String,
    #[serde(default)]
    pub destinations: Vec<StopId>,
    #[serde(default)]
    pub schedule_patterns: SchedulePatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealtimeDeparture {
    pub trip_id: Option<String>,
    pub route_id: Option<RouteId>,
    pub vehicle_id: Option<String>,
    pub arrival_time: Option<String>,
    pub departure_time: Option<String>,
    /// Absent when the feed reports no delay or a delay of exactly zero.
    pub delay_minutes: Option<i64>,
}

impl RealtimeDeparture {
    fn new(event: StopEvent, tz: Tz) -> Self {
        let local = |t: Option<DateTime<chrono::Utc>>| {
            t.map(|t| t.with_timezone(&tz).format("%H:%M").to_string())
        };

        Self {
            trip_id: event.trip_id,
            route_id: event.route_id,
            vehicle_id: event.vehicle_id,
            arrival_time: local(event.arrival),
            departure_time: local(event.departure),
            delay_minutes: event
                .arrival_delay_secs
                .filter(|d| *d != 0)
                .map(|d| i64::from(d).div_euclid(60)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Destination {
    pub stop_id: StopId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteDepartures {
    pub route_id: RouteId,
    pub route_name: String,
    pub destinations: Vec<Destination>,
    pub static_schedules: SchedulePatterns,
    pub real_time: Vec<RealtimeDeparture>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopDepartures {
    pub stop_id: StopId,
    pub stop_name: String,
    pub today: DayType,
    pub real_time_departures: Vec<RealtimeDeparture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_time_unavailable: Option<String>,
    pub routes: Vec<RouteDepartures>,
}

/// Keeps one event per trip; a later update for the same trip replaces the
/// earlier one in place.
fn latest_per_trip(events: Vec<StopEvent>) -> Vec<StopEvent> {
    let mut index: HashMap<Option<String>, usize> = HashMap::new();
    let mut kept: Vec<StopEvent> = vec![];

    for event in events {
        match index.get(&event.trip_id) {
            Some(&i) => kept[i] = event,
            None => {
                index.insert(event.trip_id.clone(), kept.len());
                kept.push(event);
            }
        }
    }

    kept
}

/// Builds the departures view for one stop.
///
/// `realtime` is whatever the feed layer produced; an error only empties the
/// real-time lists and is reported in `real_time_unavailable`.
pub fn aggregate_departures<'a, R, N>(
    stop_id: &StopId,
    stop_name: &str,
    routes: R,
    name_of: N,
    realtime: Result<Vec<StopEvent>, TransitError>,
    now: DateTime<Tz>,
) -> StopDepartures
where
    R: IntoIterator<Item = (&'a RouteId, &'a ScheduledRoute)>,
    N: Fn(&StopId) -> Option<String>,
{
    let tz = now.timezone();
    let (events, real_time_unavailable) = match realtime {
        Ok(events) => (latest_per_trip(events), None),
        Err(e) => (vec![], Some(e.to_string())),
    };
    let real_time_departures: Vec<RealtimeDeparture> =
        events.into_iter().map(|e| RealtimeDeparture::new(e, tz)).collect();

    let routes = routes
        .into_iter()
        .map(|(route_id, route)| RouteDepartures {
            route_id: route_id.clone(),
            route_name: route.route_name.clone(),
            destinations: route
                .destinations
                .iter()
                .filter_map(|id| {
                    name_of(id).map(|name| Destination {
                        stop_id: id.clone(),
                        name,
                    })
                })
                .collect(),
            static_schedules: route.schedule_patterns.first(STATIC_TIMES_SHOWN),
            real_time: real_time_departures
                .iter()
                .filter(|d| d.route_id.as_ref() == Some(route_id))
                .cloned()
                .collect(),
        })
        .collect();

    StopDepartures {
        stop_id: stop_id.clone(),
        stop_name: stop_name.to_owned(),
        today: DayType::for_date(now.date_naive()),
        real_time_departures,
        real_time_unavailable,
        routes,
    }
}
