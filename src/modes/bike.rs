//! Citi Bike availability from the public GBFS feeds.

use std::collections::HashMap;

use geo_types::Point;
use serde::Deserialize;
use tracing::warn;

use crate::{
    error::TransitError,
    modes::Reply,
    network::stop::StopId,
    realtime::fetch::Fetcher,
    spatial::{lat_lon, proximity::find_nearby, proximity::NearbyResult, Located},
};

const NEARBY_SHOWN: usize = 3;
const ROUTE_STATIONS_SHOWN: usize = 2;

#[derive(Deserialize)]
struct Envelope<T> {
    data: StationList<T>,
}

#[derive(Deserialize)]
struct StationList<T> {
    stations: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationInformation {
    pub station_id: StopId,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationStatus {
    pub station_id: StopId,
    #[serde(default)]
    pub num_bikes_available: u32,
    #[serde(default)]
    pub num_ebikes_available: u32,
    #[serde(default)]
    pub num_docks_available: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BikeStation {
    pub id: StopId,
    pub name: String,
    pub coord: Point<f64>,
    pub bikes: u32,
    pub ebikes: u32,
    pub docks: u32,
}

impl BikeStation {
    pub fn classic_bikes(&self) -> u32 {
        self.bikes.saturating_sub(self.ebikes)
    }
}

impl Located for BikeStation {
    fn location(&self) -> Point<f64> {
        self.coord
    }
}

/// Station information joined with live status; stations missing from the status
/// feed report zero of everything.
pub fn join_status(info: Vec<StationInformation>, status: Vec<StationStatus>) -> Vec<BikeStation> {
    let status: HashMap<StopId, StationStatus> = status
        .into_iter()
        .map(|s| (s.station_id.clone(), s))
        .collect();

    info.into_iter()
        .map(|i| {
            let s = status.get(&i.station_id);
            BikeStation {
                coord: lat_lon(i.lat, i.lon),
                bikes: s.map_or(0, |s| s.num_bikes_available),
                ebikes: s.map_or(0, |s| s.num_ebikes_available),
                docks: s.map_or(0, |s| s.num_docks_available),
                id: i.station_id,
                name: i.name,
            }
        })
        .collect()
}

pub async fn fetch_stations(
    fetcher: &Fetcher,
    base_url: &str,
) -> Result<Vec<BikeStation>, TransitError> {
    let base_url = base_url.trim_end_matches('/');
    let info_url = format!("{base_url}/station_information.json");
    let status_url = format!("{base_url}/station_status.json");

    let (info, status) = tokio::try_join!(
        fetcher.get_json::<Envelope<StationInformation>>(&info_url),
        fetcher.get_json::<Envelope<StationStatus>>(&status_url),
    )?;

    if info.data.stations.is_empty() {
        return Err(TransitError::NoDataAvailable("Citi Bike station list is empty".to_owned()));
    }

    Ok(join_status(info.data.stations, status.data.stations))
}

pub fn describe_nearby(nearby: &[NearbyResult<'_, BikeStation>]) -> String {
    if nearby.is_empty() {
        return "No citi bike stations found nearby or data unavailable.".to_owned();
    }

    let with_bikes: Vec<_> = nearby.iter().filter(|n| n.stop.bikes > 0).collect();
    if with_bikes.is_empty() {
        return format!(
            "Found {} stations nearby, but no bikes available right now.",
            nearby.len()
        );
    }

    let mut out = format!("Found {} stations with bikes available:\n\n", with_bikes.len());
    for n in with_bikes.iter().take(NEARBY_SHOWN) {
        let s = n.stop;
        out.push_str(&format!(
            "• {}\n  Distance: {:.2}km\n  Classic bikes: {} | E-Bikes available: {}\n",
            s.name,
            n.distance_km,
            s.classic_bikes(),
            s.ebikes
        ));
        out.push_str(&format!("  Docks available: {}\n\n", s.docks));
    }

    out
}

pub fn describe_route(
    pickup: &[NearbyResult<'_, BikeStation>],
    dropoff: &[NearbyResult<'_, BikeStation>],
) -> String {
    if pickup.is_empty() || dropoff.is_empty() {
        return "No Citi Bike stations found for this route or data unavailable.".to_owned();
    }

    let with_bikes: Vec<_> = pickup.iter().filter(|n| n.stop.bikes > 0).collect();
    let with_docks: Vec<_> = dropoff.iter().filter(|n| n.stop.docks > 0).collect();

    if with_bikes.is_empty() {
        return "No bikes available at pickup locations.".to_owned();
    }
    if with_docks.is_empty() {
        return "No dock space available at destination.".to_owned();
    }

    let mut out = String::from("**PICKUP OPTIONS:**\n\n");
    for n in with_bikes.iter().take(ROUTE_STATIONS_SHOWN) {
        let s = n.stop;
        out.push_str(&format!(
            "• {} ({:.2}km away)\n  Classic: {} | E-bikes: {}\n\n",
            s.name,
            n.distance_km,
            s.classic_bikes(),
            s.ebikes
        ));
    }

    out.push_str("**DROPOFF OPTIONS:**\n\n");
    for n in with_docks.iter().take(ROUTE_STATIONS_SHOWN) {
        let s = n.stop;
        out.push_str(&format!(
            "• {} ({:.2}km away)\n  Docks available: {}\n\n",
            s.name, n.distance_km, s.docks
        ));
    }

    out
}

fn unavailable(e: &TransitError) -> Reply {
    warn!(error = %e, "Citi Bike data unavailable");
    Reply::text(format!("No citi bike stations found nearby or data unavailable ({e})."))
}

pub async fn find_bikes_nearby(
    fetcher: &Fetcher,
    base_url: &str,
    query: Point<f64>,
    radius_km: f64,
) -> Reply {
    match fetch_stations(fetcher, base_url).await {
        Ok(stations) => Reply::text(describe_nearby(&find_nearby(&stations, query, radius_km))),
        Err(e) => unavailable(&e),
    }
}

pub async fn route_options(
    fetcher: &Fetcher,
    base_url: &str,
    origin: Point<f64>,
    dest: Point<f64>,
    radius_km: f64,
) -> Reply {
    match fetch_stations(fetcher, base_url).await {
        Ok(stations) => Reply::text(describe_route(
            &find_nearby(&stations, origin, radius_km),
            &find_nearby(&stations, dest, radius_km),
        )),
        Err(e) => unavailable(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &str = r#"{"last_updated": 1, "ttl": 5, "data": {"stations": [
        {"station_id": "a1", "name": "E 17 St & Broadway", "lat": 40.73705, "lon": -73.99009,
         "capacity": 50},
        {"station_id": "a2", "name": "Broadway & E 14 St", "lat": 40.73455, "lon": -73.99074},
        {"station_id": 3, "name": "Union Sq E & E 16 St", "lat": 40.73626, "lon": -73.98972},
        {"station_id": "far", "name": "Far Rockaway", "lat": 40.60, "lon": -73.75}
    ]}}"#;

    const STATUS: &str = r#"{"data": {"stations": [
        {"station_id": "a1", "num_bikes_available": 7, "num_ebikes_available": 2,
         "num_docks_available": 0},
        {"station_id": "a2", "num_bikes_available": 0, "num_docks_available": 12},
        {"station_id": "3", "num_bikes_available": 3, "num_ebikes_available": 3,
         "num_docks_available": 1}
    ]}}"#;

    fn stations() -> Vec<BikeStation> {
        let info: Envelope<StationInformation> = serde_json::from_str(INFO).unwrap();
        let status: Envelope<StationStatus> = serde_json::from_str(STATUS).unwrap();
        join_status(info.data.stations, status.data.stations)
    }

    #[test]
    fn test_join_status() {
        let stations = stations();
        assert_eq!(stations.len(), 4);
        assert_eq!(stations[0].classic_bikes(), 5);
        assert_eq!(stations[1].ebikes, 0);
        assert_eq!(stations[2].id, StopId::new("3"));
        assert_eq!(stations[2].classic_bikes(), 0);
        assert_eq!((stations[3].bikes, stations[3].docks), (0, 0));
    }

    #[test]
    fn test_describe_nearby() {
        let stations = stations();
        let union_sq = lat_lon(40.7359, -73.9906);
        let text = describe_nearby(&find_nearby(&stations, union_sq, 0.5));

        assert!(text.starts_with("Found 2 stations with bikes available:"));
        assert!(text.contains("• E 17 St & Broadway"));
        assert!(text.contains("Classic bikes: 5 | E-Bikes available: 2"));
        assert!(!text.contains("Broadway & E 14 St"));
        assert!(!text.contains("Far Rockaway"));
    }

    #[test]
    fn test_describe_nearby_without_bikes() {
        let stations = stations();
        let only_empty = find_nearby(&stations[1..2], lat_lon(40.73455, -73.99074), 0.1);
        assert_eq!(
            describe_nearby(&only_empty),
            "Found 1 stations nearby, but no bikes available right now."
        );
        assert_eq!(
            describe_nearby(&[]),
            "No citi bike stations found nearby or data unavailable."
        );
    }

    #[test]
    fn test_describe_route() {
        let stations = stations();
        let here = lat_lon(40.7359, -73.9906);
        let nearby = find_nearby(&stations, here, 0.5);

        let text = describe_route(&nearby, &nearby);
        assert!(text.starts_with("**PICKUP OPTIONS:**"));
        let dropoff = text.split("**DROPOFF OPTIONS:**").nth(1).unwrap();
        assert!(dropoff.contains("Broadway & E 14 St"));
        assert!(!dropoff.contains("E 17 St & Broadway"));

        let far = find_nearby(&stations, lat_lon(40.60, -73.75), 0.1);
        assert_eq!(describe_route(&nearby, &far), "No dock space available at destination.");
        assert_eq!(describe_route(&far, &nearby), "No bikes available at pickup locations.");
        assert_eq!(
            describe_route(&[], &nearby),
            "No Citi Bike stations found for this route or data unavailable."
        );
    }
}
