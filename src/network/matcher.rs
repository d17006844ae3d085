//! Direct and single-transfer route options between two sets of nearby stops.
//!
//! Candidates on each side come from the proximity search. A pair of stops is
//! joined directly when they share a route the policy accepts as reaching the
//! destination; otherwise each transfer hub is tried as a single change point.

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use serde::Serialize;

use crate::{
    network::{
        hub::TransferHub,
        stop::{RouteId, ServedStop, StopId},
    },
    spatial::proximity::NearbyResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// A shared route label is taken as proof the destination can be reached.
    SharedLabel,
    /// The destination must appear in the origin's destination list for the route.
    DestinationList,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPolicy {
    pub reachability: Reachability,
    /// One direct option listing every matching route, instead of one per route.
    pub group_direct_routes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Endpoint {
    pub stop_id: StopId,
    pub name: String,
    pub distance_km: f64,
}

impl Endpoint {
    fn of<S: ServedStop>(nearby: &NearbyResult<'_, S>) -> Self {
        Self {
            stop_id: nearby.stop.id().clone(),
            name: nearby.stop.name().to_owned(),
            distance_km: nearby.distance_km,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Connection {
    Direct {
        routes: Vec<RouteId>,
    },
    Transfer {
        hub_id: StopId,
        hub_name: String,
        first_leg: Vec<RouteId>,
        second_leg: Vec<RouteId>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteOption {
    #[serde(flatten)]
    pub connection: Connection,
    pub description: String,
    pub origin: Endpoint,
    pub dest: Endpoint,
}

impl RouteOption {
    pub fn is_direct(&self) -> bool {
        matches!(self.connection, Connection::Direct { .. })
    }

    pub fn total_walk_km(&self) -> f64 {
        self.origin.distance_km + self.dest.distance_km
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Origin,
    Destination,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    /// Nothing to match from: one side had no candidate stops.
    NoStops(Side),
    /// Both sides had stops but no option joins them.
    NoRoutes,
    Options(Vec<RouteOption>),
}

fn join_routes<'a>(routes: impl IntoIterator<Item = &'a RouteId>) -> String {
    routes.into_iter().map(RouteId::as_str).join("/")
}

fn direct_option<S: ServedStop>(
    origin: &NearbyResult<'_, S>,
    dest: &NearbyResult<'_, S>,
    routes: Vec<RouteId>,
) -> RouteOption {
    let description = format!(
        "Take {} from {} directly to {}",
        join_routes(&routes),
        origin.stop.name(),
        dest.stop.name()
    );

    RouteOption {
        connection: Connection::Direct { routes },
        description,
        origin: Endpoint::of(origin),
        dest: Endpoint::of(dest),
    }
}

fn transfer_option<S: ServedStop>(
    origin: &NearbyResult<'_, S>,
    dest: &NearbyResult<'_, S>,
    hub: &TransferHub,
    first_leg: Vec<RouteId>,
    second_leg: Vec<RouteId>,
) -> RouteOption {
    let description = format!(
        "Take {} from {} to {}, transfer to {} to {}",
        join_routes(&first_leg),
        origin.stop.name(),
        hub.name,
        join_routes(&second_leg),
        dest.stop.name()
    );

    RouteOption {
        connection: Connection::Transfer {
            hub_id: hub.id.clone(),
            hub_name: hub.name.clone(),
            first_leg,
            second_leg,
        },
        description,
        origin: Endpoint::of(origin),
        dest: Endpoint::of(dest),
    }
}

fn reachable_routes<S: ServedStop>(
    origin: &S,
    dest: &S,
    shared: &BTreeSet<&RouteId>,
    reachability: Reachability,
) -> Vec<RouteId> {
    shared
        .iter()
        .filter(|route| match reachability {
            Reachability::SharedLabel => true,
            Reachability::DestinationList => origin
                .destinations(route)
                .is_some_and(|stops| stops.contains(dest.id())),
        })
        .map(|route| (*route).clone())
        .collect()
}

/// Ranked, deduplicated route options between two candidate sets.
///
/// Direct options come first, then transfers; each group is ordered by total
/// walking distance. Pass an empty hub slice to skip transfers entirely.
pub fn match_routes<S: ServedStop>(
    origins: &[NearbyResult<'_, S>],
    dests: &[NearbyResult<'_, S>],
    hubs: &[TransferHub],
    policy: MatchPolicy,
) -> RouteMatch {
    if origins.is_empty() {
        return RouteMatch::NoStops(Side::Origin);
    }
    if dests.is_empty() {
        return RouteMatch::NoStops(Side::Destination);
    }

    let mut options = vec![];
    let mut unjoined = vec![];

    for origin in origins {
        let origin_routes = origin.stop.route_ids();

        for dest in dests {
            let dest_routes = dest.stop.route_ids();
            let shared: BTreeSet<&RouteId> =
                origin_routes.intersection(&dest_routes).copied().collect();
            let routes = reachable_routes(origin.stop, dest.stop, &shared, policy.reachability);

            if routes.is_empty() {
                unjoined.push((origin, dest));
            } else if policy.group_direct_routes {
                options.push(direct_option(origin, dest, routes));
            } else {
                for route in routes {
                    options.push(direct_option(origin, dest, vec![route]));
                }
            }
        }
    }

    for (origin, dest) in unjoined {
        let origin_routes = origin.stop.route_ids();
        let dest_routes = dest.stop.route_ids();

        for hub in hubs {
            let first_leg: Vec<RouteId> = hub
                .lines
                .iter()
                .filter(|line| origin_routes.contains(line))
                .cloned()
                .collect();
            let second_leg: Vec<RouteId> = hub
                .lines
                .iter()
                .filter(|line| dest_routes.contains(line))
                .cloned()
                .collect();

            if !first_leg.is_empty() && !second_leg.is_empty() {
                options.push(transfer_option(origin, dest, hub, first_leg, second_leg));
            }
        }
    }

    let mut seen = HashSet::new();
    let mut options: Vec<RouteOption> = options
        .into_iter()
        .filter(|o| seen.insert(o.description.clone()))
        .collect();

    if options.is_empty() {
        return RouteMatch::NoRoutes;
    }

    options.sort_by(|a, b| {
        b.is_direct()
            .cmp(&a.is_direct())
            .then(a.total_walk_km().total_cmp(&b.total_walk_km()))
    });

    RouteMatch::Options(options)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use geo_types::Point;

    use super::*;
    use crate::spatial::{lat_lon, Located};

    struct TestStop {
        id: StopId,
        name: String,
        at: Point<f64>,
        routes: BTreeMap<RouteId, Option<Vec<StopId>>>,
    }

    impl Located for TestStop {
        fn location(&self) -> Point<f64> {
            self.at
        }
    }

    impl ServedStop for TestStop {
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
            self.routes.get(route)?.as_deref()
        }
    }

    fn stop(id: &str, routes: &[(&str, Option<&[&str]>)]) -> TestStop {
        TestStop {
            id: StopId::new(id),
            name: format!("Stop {id}"),
            at: lat_lon(40.0, -73.0),
            routes: routes
                .iter()
                .map(|(r, dests)| {
                    (
                        RouteId::new(r),
                        dests.map(|d| d.iter().map(|s| StopId::new(s)).collect()),
                    )
                })
                .collect(),
        }
    }

    fn lines(ids: &[&str]) -> BTreeSet<RouteId> {
        ids.iter().map(|s| RouteId::new(s)).collect()
    }

    fn hub(id: &str, ids: &[&str]) -> TransferHub {
        TransferHub {
            id: StopId::new(id),
            name: format!("Hub {id}"),
            lines: lines(ids),
        }
    }

    fn near(stop: &TestStop, distance_km: f64) -> NearbyResult<'_, TestStop> {
        NearbyResult { stop, distance_km }
    }

    const SUBWAY: MatchPolicy = MatchPolicy {
        reachability: Reachability::SharedLabel,
        group_direct_routes: true,
    };

    const FERRY: MatchPolicy = MatchPolicy {
        reachability: Reachability::DestinationList,
        group_direct_routes: false,
    };

    fn options(m: RouteMatch) -> Vec<RouteOption> {
        match m {
            RouteMatch::Options(o) => o,
            other => panic!("expected options, got {other:?}"),
        }
    }

    #[test]
    fn test_single_transfer_through_hub() {
        let a = stop("a", &[("1", None), ("2", None)]);
        let b = stop("b", &[("3", None), ("4", None)]);
        let hubs = vec![hub("h", &["1", "3"])];

        let found = options(match_routes(&[near(&a, 0.1)], &[near(&b, 0.2)], &hubs, SUBWAY));

        assert_eq!(found.len(), 1);
        assert!(!found[0].is_direct());
        assert_eq!(
            found[0].connection,
            Connection::Transfer {
                hub_id: StopId::new("h"),
                hub_name: "Hub h".to_owned(),
                first_leg: vec![RouteId::new("1")],
                second_leg: vec![RouteId::new("3")],
            }
        );
        assert_eq!(found[0].description, "Take 1 from Stop a to Hub h, transfer to 3 to Stop b");
        assert!((found[0].total_walk_km() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_no_direct_option_for_disjoint_routes() {
        let a = stop("a", &[("1", None)]);
        let b = stop("b", &[("2", None)]);

        assert_eq!(
            match_routes(&[near(&a, 0.1)], &[near(&b, 0.1)], &[], SUBWAY),
            RouteMatch::NoRoutes
        );
    }

    #[test]
    fn test_shared_label_groups_lines() {
        let a = stop("a", &[("A", None), ("C", None), ("E", None)]);
        let b = stop("b", &[("C", None), ("A", None)]);

        let hubs = [hub("h", &["A", "G"])];
        let found = options(match_routes(&[near(&a, 0.1)], &[near(&b, 0.1)], &hubs, SUBWAY));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description, "Take A/C from Stop a directly to Stop b");
    }

    #[test]
    fn test_destination_list_requires_reachability() {
        let a = stop("a", &[("ER", Some(&["c"])), ("SB", Some(&["b"]))]);
        let b = stop("b", &[("ER", Some(&[])), ("SB", Some(&[]))]);

        let found = options(match_routes(&[near(&a, 0.1)], &[near(&b, 0.1)], &[], FERRY));

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].connection, Connection::Direct { routes: vec![RouteId::new("SB")] });
    }

    #[test]
    fn test_destination_list_without_reachable_route() {
        let a = stop("a", &[("ER", Some(&["c"]))]);
        let b = stop("b", &[("ER", Some(&["a"]))]);

        assert_eq!(
            match_routes(&[near(&a, 0.1)], &[near(&b, 0.1)], &[], FERRY),
            RouteMatch::NoRoutes
        );
    }

    #[test]
    fn test_no_stops_signal() {
        let a = stop("a", &[("1", None)]);

        assert_eq!(
            match_routes::<TestStop>(&[], &[near(&a, 0.1)], &[], SUBWAY),
            RouteMatch::NoStops(Side::Origin)
        );
        assert_eq!(
            match_routes::<TestStop>(&[near(&a, 0.1)], &[], &[], SUBWAY),
            RouteMatch::NoStops(Side::Destination)
        );
    }

    #[test]
    fn test_direct_ranked_before_transfer_then_by_walk() {
        let o1 = stop("o1", &[("1", None)]);
        let o2 = stop("o2", &[("A", None)]);
        let d1 = stop("d1", &[("1", None)]);
        let d2 = stop("d2", &[("L", None)]);
        let hubs = vec![hub("h1", &["A", "L"]), hub("h2", &["1", "L"])];

        let found = options(match_routes(
            &[near(&o2, 0.05), near(&o1, 0.4)],
            &[near(&d2, 0.1), near(&d1, 0.5)],
            &hubs,
            SUBWAY,
        ));

        let kinds: Vec<bool> = found.iter().map(RouteOption::is_direct).collect();
        assert_eq!(kinds, vec![true, false, false]);
        assert_eq!(found[0].description, "Take 1 from Stop o1 directly to Stop d1");

        let walks: Vec<f64> = found[1..].iter().map(RouteOption::total_walk_km).collect();
        assert!(walks.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(found[1].description, "Take A from Stop o2 to Hub h1, transfer to L to Stop d2");
    }

    #[test]
    fn test_duplicate_descriptions_collapse() {
        let a = stop("a", &[("1", None)]);
        let b = stop("b", &[("3", None)]);
        let hubs = vec![hub("h", &["1", "3"]), hub("h", &["1", "3"])];

        let found = options(match_routes(&[near(&a, 0.1)], &[near(&b, 0.1)], &hubs, SUBWAY));
        assert_eq!(found.len(), 1);
    }
}
