//! The tool catalogue and dispatch shared by the MCP and HTTP surfaces.

pub mod args;
pub mod http;
pub mod jrpc;
pub mod mcp;

use geo_types::Point;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::{
    context::AppContext,
    modes::{bike, Reply},
    spatial::lat_lon,
    tools::args::Args,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Number,
    Integer,
    Id,
}

#[derive(Clone, Copy)]
struct Param {
    name: &'static str,
    kind: Kind,
    description: &'static str,
    default: Option<f64>,
}

const fn required(name: &'static str, kind: Kind, description: &'static str) -> Param {
    Param {
        name,
        kind,
        description,
        default: None,
    }
}

const fn optional(
    name: &'static str,
    kind: Kind,
    description: &'static str,
    default: f64,
) -> Param {
    Param {
        name,
        kind,
        description,
        default: Some(default),
    }
}

struct ToolDef {
    name: &'static str,
    description: &'static str,
    params: &'static [Param],
}

const ROUTE_ENDS: [Param; 4] = [
    required("origin_lat", Kind::Number, "Starting latitude"),
    required("origin_lon", Kind::Number, "Starting longitude"),
    required("dest_lat", Kind::Number, "Destination latitude"),
    required("dest_lon", Kind::Number, "Destination longitude"),
];

const TOOLS: &[ToolDef] = &[
    ToolDef {
        name: "find_bikes_nearby",
        description: "Find available Citi Bike stations near a location",
        params: &[
            required("latitude", Kind::Number, "Latitude of the location"),
            required("longitude", Kind::Number, "Longitude of the location"),
            optional("radius_km", Kind::Number, "Search radius in kilometers", 0.5),
        ],
    },
    ToolDef {
        name: "get_citibike_route_options",
        description: "Find Citi Bike pickup and dropoff options for a route",
        params: &[
            ROUTE_ENDS[0],
            ROUTE_ENDS[1],
            ROUTE_ENDS[2],
            ROUTE_ENDS[3],
            optional("radius_km", Kind::Number, "Search radius in kilometers", 0.5),
        ],
    },
    ToolDef {
        name: "find_ferry_stops_nearby",
        description: "Find NYC Ferry stops near a location",
        params: &[
            required("latitude", Kind::Number, "Latitude of the location"),
            required("longitude", Kind::Number, "Longitude of the location"),
            optional("radius_km", Kind::Number, "Search radius in kilometers", 1.0),
        ],
    },
    ToolDef {
        name: "get_ferry_departures",
        description: "Get scheduled and real-time departures for a ferry stop",
        params: &[required(
            "stop_name_or_id",
            Kind::Id,
            "Stop id, or part of the stop name",
        )],
    },
    ToolDef {
        name: "get_ferry_route_options",
        description: "Find direct ferry routes between two locations",
        params: &[
            ROUTE_ENDS[0],
            ROUTE_ENDS[1],
            ROUTE_ENDS[2],
            ROUTE_ENDS[3],
            optional("radius_km", Kind::Number, "Search radius around each end in kilometers", 1.0),
        ],
    },
    ToolDef {
        name: "get_ferry_alerts",
        description: "Get current NYC Ferry service alerts",
        params: &[],
    },
    ToolDef {
        name: "get_nearby_subway_options",
        description: "Find nearby subway stations and their next trains",
        params: &[
            required("lat", Kind::Number, "Starting latitude"),
            required("lon", Kind::Number, "Starting longitude"),
            optional("radius_km", Kind::Number, "Search radius in kilometers", 0.5),
            optional("max_stations", Kind::Integer, "Maximum number of stations to return", 10.0),
        ],
    },
    ToolDef {
        name: "get_subway_route_options",
        description: "Find subway routes between two locations, with single transfers",
        params: &[
            ROUTE_ENDS[0],
            ROUTE_ENDS[1],
            ROUTE_ENDS[2],
            ROUTE_ENDS[3],
            optional(
                "max_options",
                Kind::Integer,
                "Maximum number of route options to return",
                5.0,
            ),
        ],
    },
];

impl Param {
    fn schema(&self) -> Value {
        let (kind, default) = match self.kind {
            Kind::Number => (json!("number"), self.default.map(Value::from)),
            Kind::Integer => (json!("integer"), self.default.map(|d| Value::from(d as i64))),
            Kind::Id => (json!(["string", "integer"]), None),
        };

        let mut schema = json!({ "type": kind, "description": self.description });
        if let Some(default) = default {
            schema["default"] = default;
        }
        schema
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolInfo {
    fn of(def: &ToolDef) -> Self {
        let properties: Map<String, Value> = def
            .params
            .iter()
            .map(|p| (p.name.to_owned(), p.schema()))
            .collect();
        let required: Vec<&str> = def
            .params
            .iter()
            .filter(|p| p.default.is_none())
            .map(|p| p.name)
            .collect();

        Self {
            name: def.name,
            description: def.description,
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

pub fn catalogue() -> Vec<ToolInfo> {
    TOOLS.iter().map(ToolInfo::of).collect()
}

/// Runs one tool. Domain misses ("no stops found", upstream outages) are normal
/// replies; only an unknown tool or unusable arguments are errors.
pub async fn call(
    ctx: &AppContext,
    name: &str,
    arguments: &Map<String, Value>,
) -> Result<Reply, ToolError> {
    debug!(tool = name, "Calling tool");
    let args = Args::new(arguments);

    let reply = match name {
        "find_bikes_nearby" => {
            let at = lat_lon(args.number("latitude")?, args.number("longitude")?);
            let radius_km = args.number_or("radius_km", 0.5)?;
            bike::find_bikes_nearby(ctx.fetcher(), &ctx.gbfs_base_url, at, radius_km).await
        }
        "get_citibike_route_options" => {
            let (origin, dest) = route_ends(&args)?;
            bike::route_options(
                ctx.fetcher(),
                &ctx.gbfs_base_url,
                origin,
                dest,
                args.number_or("radius_km", 0.5)?,
            )
            .await
        }
        "find_ferry_stops_nearby" => {
            let at = lat_lon(args.number("latitude")?, args.number("longitude")?);
            Reply::json(&ctx.ferry.nearby(at, args.number_or("radius_km", 1.0)?))
        }
        "get_ferry_departures" => {
            ctx.ferry
                .departures(&ctx.feeds, &args.id("stop_name_or_id")?, ctx.now())
                .await
        }
        "get_ferry_route_options" => {
            let (origin, dest) = route_ends(&args)?;
            ctx.ferry.route_options(origin, dest, args.number_or("radius_km", 1.0)?)
        }
        "get_ferry_alerts" => ctx.ferry.alerts(&ctx.feeds).await,
        "get_nearby_subway_options" => {
            let at = lat_lon(args.number("lat")?, args.number("lon")?);
            let options = ctx
                .subway
                .nearby_options(
                    &ctx.feeds,
                    at,
                    args.number_or("radius_km", 0.5)?,
                    args.count_or("max_stations", 10)?,
                    ctx.now(),
                )
                .await;
            Reply::json(&options)
        }
        "get_subway_route_options" => {
            let (origin, dest) = route_ends(&args)?;
            ctx.subway
                .route_options(&ctx.hubs, origin, dest, args.count_or("max_options", 5)?)
        }
        _ => return Err(ToolError::UnknownTool(name.to_owned())),
    };

    Ok(reply)
}

fn route_ends(args: &Args<'_>) -> Result<(Point<f64>, Point<f64>), ToolError> {
    Ok((
        lat_lon(args.number("origin_lat")?, args.number("origin_lon")?),
        lat_lon(args.number("dest_lat")?, args.number("dest_lon")?),
    ))
}
