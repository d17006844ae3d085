use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::{
    context::AppContext,
    modes::Reply,
    tools::{self, ToolError},
};

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(list_tools).service(call_tool);
}

#[get("/tools")]
async fn list_tools() -> impl Responder {
    HttpResponse::Ok().json(json!({ "tools": tools::catalogue() }))
}

/// Runs a tool with the JSON object body as its arguments. A missing or
/// non-JSON body counts as no arguments.
#[post("/tools/{name}")]
async fn call_tool(
    ctx: web::Data<AppContext>,
    name: web::Path<String>,
    body: Option<web::Json<Map<String, Value>>>,
) -> HttpResponse {
    let arguments = body.map(web::Json::into_inner).unwrap_or_default();

    match tools::call(&ctx, &name, &arguments).await {
        Ok(Reply::Json(v)) => HttpResponse::Ok().json(v),
        Ok(Reply::Text(t)) => HttpResponse::Ok().content_type("text/plain; charset=utf-8").body(t),
        Err(e @ ToolError::UnknownTool(_)) => {
            HttpResponse::NotFound().json(json!({ "error": e.to_string() }))
        }
        Err(e) => HttpResponse::BadRequest().json(json!({ "error": e.to_string() })),
    }
}

pub async fn serve(ctx: AppContext, address: &str, port: u16) -> std::io::Result<()> {
    let ctx = web::Data::new(ctx);
    info!(address, port, "Serving tools over HTTP");

    HttpServer::new(move || App::new().app_data(ctx.clone()).configure(config))
        .bind((address, port))?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use actix_web::{http::StatusCode, test};

    use super::*;

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(AppContext::for_tests()))
                    .configure(config),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_list_tools() {
        let app = app!();
        let req = test::TestRequest::get().uri("/tools").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["tools"].as_array().unwrap().len(), 8);
    }

    #[actix_web::test]
    async fn test_call_json_tool() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/tools/find_ferry_stops_nearby")
            .set_json(json!({"latitude": 40.70325, "longitude": -74.00661, "radius_km": 0.5}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body[0]["stop_id"], "87");
    }

    #[actix_web::test]
    async fn test_call_text_tool() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/tools/get_ferry_departures")
            .set_json(json!({"stop_name_or_id": "Atlantis"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(body, "Stop 'Atlantis' not found. Try a stop ID or partial name.");
    }

    #[actix_web::test]
    async fn test_tool_errors() {
        let app = app!();

        let req = test::TestRequest::post().uri("/tools/teleport").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/tools/find_ferry_stops_nearby")
            .set_json(json!({"latitude": "north", "longitude": -74.0}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Invalid argument latitude: expected a number, got \"north\"");
    }
}
