//! Model Context Protocol server over newline-delimited JSON-RPC on stdio.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    context::AppContext,
    tools::{
        self,
        jrpc::{Error, Request, Response, JSONRPC_VERSION},
        ToolError,
    },
};

const PROTOCOL_VERSION: &str = "2025-06-18";

#[derive(Debug, Deserialize)]
struct ToolCallParams {
    name: String,
    #[serde(default)]
    arguments: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl ToolCallResult {
    fn text(text: String, is_error: bool) -> Self {
        Self {
            content: vec![ToolContent { r#type: "text", text }],
            is_error,
        }
    }
}

fn initialize() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

async fn call_tool(ctx: &AppContext, params: Option<Value>, id: Value) -> Response {
    let params: ToolCallParams = match serde_json::from_value(params.unwrap_or(Value::Null)) {
        Ok(p) => p,
        Err(e) => return Response::err(Error::invalid_params(e.to_string()), id),
    };

    let result = match tools::call(ctx, &params.name, &params.arguments).await {
        Ok(reply) => ToolCallResult::text(reply.into_text(), false),
        Err(ToolError::UnknownTool(name)) => {
            return Response::err(Error::invalid_params(format!("Unknown tool: {name}")), id);
        }
        Err(e) => ToolCallResult::text(e.to_string(), true),
    };

    Response::new(json!(result), id)
}

/// Handles one request; notifications produce no response.
pub async fn dispatch(ctx: &AppContext, request: Request) -> Option<Response> {
    if request.is_notification() {
        debug!(method = %request.method, "Notification");
        return None;
    }
    let Request { method, params, id, .. } = request;
    let id = id.unwrap_or(Value::Null);

    let response = match method.as_str() {
        "initialize" => Response::new(initialize(), id),
        "ping" => Response::new(json!({}), id),
        "tools/list" => Response::new(json!({ "tools": tools::catalogue() }), id),
        "tools/call" => call_tool(ctx, params, id).await,
        other => Response::err(Error::method_not_found(other), id),
    };

    Some(response)
}

/// Parses and handles one line of input.
pub async fn handle_line(ctx: &AppContext, line: &str) -> Option<Response> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Some(Response::err(Error::parse_error(e.to_string()), Value::Null)),
    };

    let id = value.get("id").cloned().unwrap_or(Value::Null);
    match serde_json::from_value::<Request>(value) {
        Ok(request) if request.jsonrpc != JSONRPC_VERSION => Some(Response::err(
            Error::invalid_request(format!("Unsupported jsonrpc version {:?}", request.jsonrpc)),
            id,
        )),
        Ok(request) => dispatch(ctx, request).await,
        Err(e) => Some(Response::err(Error::invalid_request(e.to_string()), id)),
    }
}

/// Serves requests from stdin until it closes. Logs go to stderr; stdout carries
/// only protocol messages.
pub async fn serve_stdio(ctx: &AppContext) -> anyhow::Result<()> {
    info!("Serving MCP on stdio");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let Some(response) = handle_line(ctx, &line).await else {
            continue;
        };

        if let Some(e) = &response.error {
            warn!(error = %e, "Request failed");
        }

        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    info!("stdin closed");
    Ok(())
}
