pub mod feed;
pub mod fetch;
pub mod gtfs_rt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    network::stop::{RouteId, StopId},
    realtime::gtfs_rt::{cause_name, effect_name, FeedMessage},
};

/// A trip's predicted call at one stop.
#[derive(Debug, Clone, PartialEq)]
pub struct StopEvent {
    pub trip_id: Option<String>,
    pub route_id: Option<RouteId>,
    pub vehicle_id: Option<String>,
    pub stop_id: StopId,
    pub arrival: Option<DateTime<Utc>>,
    pub departure: Option<DateTime<Utc>>,
    pub arrival_delay_secs: Option<i32>,
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}

/// Every stop-time update in the feed's trip updates that names one of `stops`.
pub fn stop_events(feed: &FeedMessage, stops: &[StopId]) -> Vec<StopEvent> {
    let mut events = vec![];

    for trip_update in feed.entity.iter().filter_map(|e| e.trip_update.as_ref()) {
        let trip = &trip_update.trip;

        for update in &trip_update.stop_time_update {
            let Some(stop_id) = update.stop_id.as_deref().map(StopId::new) else {
                continue;
            };
            if !stops.contains(&stop_id) {
                continue;
            }

            events.push(StopEvent {
                trip_id: trip.trip_id.clone(),
                route_id: trip.route_id.as_deref().map(RouteId::new),
                vehicle_id: trip_update.vehicle.as_ref().and_then(|v| v.id.clone()),
                stop_id,
                arrival: timestamp(update.arrival.as_ref().and_then(|a| a.time)),
                departure: timestamp(update.departure.as_ref().and_then(|d| d.time)),
                arrival_delay_secs: update.arrival.as_ref().and_then(|a| a.delay),
            });
        }
    }

    events
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub id: String,
    pub cause: Option<&'static str>,
    pub effect: Option<&'static str>,
    pub header_text: String,
    pub description_text: String,
    pub affected_routes: Vec<RouteId>,
    pub affected_stops: Vec<StopId>,
}

pub fn alerts(feed: &FeedMessage) -> Vec<AlertSummary> {
    feed.entity
        .iter()
        .filter_map(|entity| {
            let alert = entity.alert.as_ref()?;
            let text = |t: &Option<gtfs_rt::TranslatedString>| {
                t.as_ref().and_then(|t| t.english()).unwrap_or_default().to_owned()
            };

            Some(AlertSummary {
                id: entity.id.clone(),
                cause: alert.cause.map(cause_name),
                effect: alert.effect.map(effect_name),
                header_text: text(&alert.header_text),
                description_text: text(&alert.description_text),
                affected_routes: alert
                    .informed_entity
                    .iter()
                    .filter_map(|e| e.route_id.as_deref().map(RouteId::new))
                    .collect(),
                affected_stops: alert
                    .informed_entity
                    .iter()
                    .filter_map(|e| e.stop_id.as_deref().map(StopId::new))
                    .collect(),
            })
        })
        .collect()
}
