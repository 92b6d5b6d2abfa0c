use std::time::Duration;

use axum_test::TestServer;
use http::{header, HeaderName, HeaderValue, StatusCode};
use serde_json::{json, Value};
use switchyard_lib::{HandlerError, HandlerResult, Method, RequestContext, RouteDefinition};
use switchyard_server::{registrar, Registrar, Server, ServerConfig};

fn config() -> ServerConfig {
    ServerConfig::default()
        .with_port(0)
        .with_metrics_path(None)
}

fn server(config: ServerConfig, registrars: Vec<Registrar>) -> TestServer {
    let server = Server::new(config, registrars).expect("server initializes");
    TestServer::new(server.router().expect("router")).expect("test server")
}

fn inventory() -> Registrar {
    registrar(|routes| {
        routes.register(RouteDefinition::new("/ping", |_ctx: RequestContext| async {
            HandlerResult::Ok(Some(json!("pong")))
        }))?;

        routes.register(
            RouteDefinition::new("/items", |ctx: RequestContext| async move {
                ctx.response().set_status(StatusCode::CREATED);
                HandlerResult::Ok(Some(ctx.input().clone()))
            })
            .method(Method::Post)
            .description("Create an item.")
            .input_schema(json!({
                "type": "object",
                "required": ["name", "qty"],
                "properties": {
                    "name": { "type": "string" },
                    "qty": { "type": "number" }
                }
            })),
        )?;

        routes.register(
            RouteDefinition::new("/secret", |_ctx: RequestContext| async {
                HandlerResult::Ok(Some(json!({ "code": 42 })))
            })
            .private(true),
        )?;

        routes.register(RouteDefinition::new("/boom", |_ctx: RequestContext| async {
            HandlerResult::Err(HandlerError::msg("warehouse offline"))
        }))?;

        routes.register(
            RouteDefinition::new("/echo", |ctx: RequestContext| async move {
                HandlerResult::Ok(Some(json!({
                    "method": ctx.method().as_str(),
                    "input": ctx.input(),
                })))
            })
            .method(Method::All),
        )
    })
}

#[tokio::test]
async fn ping_returns_pong() {
    let server = server(config(), vec![inventory()]);

    let response = server.get("/ping").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!("pong"));
}

#[tokio::test]
async fn invalid_item_is_unprocessable() {
    let server = server(config(), vec![inventory()]);

    let response = server.post("/items").json(&json!({ "name": "x" })).await;

    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response.json::<Value>();
    assert_eq!(body["name"], "InputValidationError");
    assert_eq!(body["count"], 1);
    assert!(body["data"][0]["message"].as_str().unwrap().contains("qty"));
}

#[tokio::test]
async fn handler_status_is_kept() {
    let server = server(config(), vec![inventory()]);

    let response = server
        .post("/items")
        .json(&json!({ "name": "bolt", "qty": 12 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["qty"], 12);
}

#[tokio::test]
async fn query_values_override_body_and_are_coerced() {
    let server = server(config(), vec![inventory()]);

    let response = server
        .post("/items")
        .add_query_param("qty", "7")
        .json(&json!({ "name": "bolt", "qty": 1 }))
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["qty"], 7);
}

#[tokio::test]
async fn handler_errors_are_500_with_message() {
    let server = server(config(), vec![inventory()]);

    let response = server.get("/boom").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.json::<Value>();
    assert_eq!(body["name"], "HandlerError");
    assert_eq!(body["message"], "warehouse offline");
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn stack_is_exposed_when_configured() {
    let server = server(config().with_expose_stack(true), vec![inventory()]);

    let body = server.get("/boom").await.json::<Value>();

    assert!(body["stack"].as_str().unwrap().contains("warehouse offline"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let server = server(config(), vec![inventory()]);

    let response = server
        .post("/items")
        .text("{\"name\":")
        .content_type("application/json")
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["name"], "BodyParseError");
}

#[tokio::test]
async fn all_routes_answer_every_method() {
    let server = server(config(), vec![inventory()]);

    let put = server.put("/echo").json(&json!({ "a": 1 })).await;
    let delete = server.delete("/echo").await;

    assert_eq!(put.json::<Value>()["method"], "PUT");
    assert_eq!(put.json::<Value>()["input"], json!({ "a": 1 }));
    assert_eq!(delete.json::<Value>()["method"], "DELETE");
}

#[tokio::test]
async fn unregistered_method_is_rejected_by_the_router() {
    let server = server(config(), vec![inventory()]);

    let response = server.delete("/ping").await;

    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn discovery_lists_public_routes_only() {
    let server = server(config(), vec![inventory()]);

    let first = server.get("/.well-known/routes").await.json::<Value>();
    let second = server.get("/.well-known/routes").await.json::<Value>();

    assert_eq!(first, second);
    let entries = first.as_array().unwrap();
    let paths: Vec<&str> = entries
        .iter()
        .map(|entry| entry["path"].as_str().unwrap())
        .collect();
    assert_eq!(
        paths,
        vec!["/ping", "/items", "/boom", "/echo", "/.well-known/routes"]
    );
    assert!(entries.iter().all(|entry| entry.get("private").is_none()));
    assert!(entries.iter().all(|entry| entry.get("handler").is_none()));
    assert_eq!(entries[1]["description"], "Create an item.");
    assert_eq!(entries[1]["inputSchemaInfo"]["required"], json!(["name", "qty"]));
    assert_eq!(entries[3]["method"], "ALL");
}

#[tokio::test]
async fn prefix_applies_to_routes_but_not_probes() {
    let server = server(config().with_prefix("/api/"), vec![inventory()]);

    assert_eq!(server.get("/api/ping").await.status_code(), StatusCode::OK);
    assert_eq!(server.get("/ping").await.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(
        server.get("/api/.well-known/routes").await.status_code(),
        StatusCode::OK
    );
    assert_eq!(server.get("/health/live").await.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn meta_route_location_is_configurable() {
    let config = config().with_meta_route_at(Method::Post, "/_routes");
    let server = server(config, vec![inventory()]);

    let response = server.post("/_routes").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let listed = response.json::<Value>();
    let last = listed.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["path"], "/_routes");
    assert_eq!(last["method"], "POST");
    assert_eq!(last["description"], "Route info.");
}

#[tokio::test]
async fn slow_handlers_time_out() {
    let slow = registrar(|routes| {
        routes.register(RouteDefinition::new("/slow", |_ctx: RequestContext| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            HandlerResult::Ok(None)
        }))
    });
    let server = server(
        config().with_handler_timeout(Duration::from_millis(25)),
        vec![slow],
    );

    let response = server.get("/slow").await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["name"], "HandlerError");
}

#[tokio::test]
async fn request_id_is_echoed() {
    let server = server(config(), vec![inventory()]);

    let response = server
        .get("/ping")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("trace-me"),
        )
        .await;

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "trace-me"
    );

    let generated = server.get("/ping").await;
    let id = generated.headers().get("x-request-id").unwrap();
    assert_eq!(id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn readiness_reports_route_count() {
    let server = server(config(), vec![inventory()]);

    let response = server.get("/health/ready").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["routes_registered"], 5);
}

#[tokio::test]
async fn readiness_fails_without_routes() {
    let server = server(config(), Vec::new());

    let response = server.get("/health/ready").await;

    assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn form_bodies_are_parsed_and_coerced() {
    let server = server(config(), vec![inventory()]);

    let response = server
        .post("/items")
        .text("name=hex+bolt&qty=3")
        .content_type("application/x-www-form-urlencoded")
        .await;

    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.json::<Value>(), json!({ "name": "hex bolt", "qty": 3 }));
}

#[tokio::test]
async fn options_lists_allowed_methods() {
    let server = server(config(), vec![inventory()]);

    let response = server.method(http::Method::OPTIONS, "/ping").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
    assert_eq!(allow, "GET, HEAD, OPTIONS");
    assert!(response.as_bytes().is_empty());
}

#[tokio::test]
async fn options_routes_and_all_routes_keep_their_handlers() {
    let preflight = registrar(|routes| {
        routes.register(
            RouteDefinition::new("/cors", |_ctx: RequestContext| async {
                HandlerResult::Ok(Some(json!("custom")))
            })
            .method(Method::Options),
        )
    });
    let server = server(config(), vec![inventory(), preflight]);

    let custom = server.method(http::Method::OPTIONS, "/cors").await;
    assert_eq!(custom.json::<Value>(), json!("custom"));

    let echo = server.method(http::Method::OPTIONS, "/echo").await;
    assert_eq!(echo.json::<Value>()["method"], "OPTIONS");
}

#[tokio::test]
async fn handlers_see_the_route_table() {
    let listing = registrar(|routes| {
        routes.register(
            RouteDefinition::new("/routes/private", |ctx: RequestContext| async move {
                let paths: Vec<&str> = ctx.routes().iter().map(|route| route.path()).collect();
                HandlerResult::Ok(Some(json!(paths)))
            })
            .private(true),
        )
    });
    let server = server(config(), vec![inventory(), listing]);

    let response = server.get("/routes/private").await;

    assert_eq!(
        response.json::<Value>(),
        json!([
            "/ping",
            "/items",
            "/secret",
            "/boom",
            "/echo",
            "/routes/private",
            "/.well-known/routes"
        ])
    );
}

#[tokio::test]
async fn readiness_ignores_the_discovery_route() {
    let server = server(config().with_meta_route(false), vec![inventory()]);

    let response = server.get("/health/ready").await;

    assert_eq!(response.json::<Value>()["routes_registered"], 5);
}
