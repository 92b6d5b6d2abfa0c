use std::sync::Arc;

use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use switchyard_lib::{
    describe_routes, HandlerError, HandlerResult, Introspection, Method, Pipeline, RequestContext,
    RequestInput, Route, RouteDefinition, INPUT_VALIDATION_ERROR, OUTPUT_VALIDATION_ERROR,
};

fn resolve(definition: RouteDefinition) -> Route {
    Route::resolve(definition).expect("route resolves")
}

fn items_route() -> Route {
    resolve(
        RouteDefinition::new("/items", |ctx: RequestContext| async move {
            let item: NewItem = ctx.input_as()?;
            HandlerResult::Ok(Some(json!({ "name": item.name, "qty": item.qty, "id": 1 })))
        })
        .method(Method::Post)
        .input_schema(json!({
            "type": "object",
            "required": ["name", "qty"],
            "properties": {
                "name": { "type": "string" },
                "qty": { "type": "number" }
            }
        }))
        .output_schema(json!({
            "type": "object",
            "required": ["id"],
            "properties": { "id": { "type": "integer" } }
        })),
    )
}

#[derive(Debug, Deserialize)]
struct NewItem {
    name: String,
    qty: f64,
}

#[tokio::test]
async fn ping_returns_pong() {
    let route = resolve(RouteDefinition::new("/ping", |_ctx: RequestContext| async {
        HandlerResult::Ok(Some(json!("pong")))
    }));

    let response = Pipeline::default()
        .run(&route, RequestInput::new(http::Method::GET, "/ping"))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!("pong")));
}

#[tokio::test]
async fn missing_required_field_is_rejected_with_details() {
    let route = items_route();
    let input = RequestInput::new(http::Method::POST, "/items").with_body(json!({ "name": "x" }));

    let response = Pipeline::default().run(&route, input).await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.failure, Some(INPUT_VALIDATION_ERROR));
    let body = response.body.expect("error body");
    assert_eq!(body["name"], INPUT_VALIDATION_ERROR);
    assert_eq!(body["status"], 422);
    assert_eq!(body["count"], 1);
    let data = body["data"].as_array().expect("data array");
    assert_eq!(data.len(), 1);
    assert!(data[0]["message"].as_str().unwrap().contains("qty"));
}

#[tokio::test]
async fn valid_input_reaches_the_handler() {
    let route = items_route();
    let input = RequestInput::new(http::Method::POST, "/items")
        .with_body(json!({ "name": "widget", "qty": 3 }));

    let response = Pipeline::default().run(&route, input).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.unwrap()["name"], "widget");
}

#[tokio::test]
async fn query_strings_are_coerced_before_validation() {
    let route = items_route();
    let input = RequestInput::new(http::Method::POST, "/items")
        .with_query("name", "widget")
        .with_query("qty", "4.5");

    let response = Pipeline::default().run(&route, input).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body.unwrap()["qty"], json!(4.5));
}

#[tokio::test]
async fn handler_error_message_is_reported() {
    let route = resolve(RouteDefinition::new("/boom", |_ctx: RequestContext| async {
        HandlerResult::Err(HandlerError::msg("inventory service unreachable"))
    }));

    let response = Pipeline::default()
        .run(&route, RequestInput::new(http::Method::GET, "/boom"))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.unwrap();
    assert_eq!(body["message"], "inventory service unreachable");
    assert_eq!(body["error"]["message"], "inventory service unreachable");
    assert!(body.get("stack").is_none());
}

#[tokio::test]
async fn output_schema_violation_is_a_server_error() {
    let route = resolve(
        RouteDefinition::new("/broken", |_ctx: RequestContext| async {
            HandlerResult::Ok(Some(json!({ "id": "not-a-number" })))
        })
        .output_schema(json!({
            "type": "object",
            "properties": { "id": { "type": "integer" } }
        })),
    );

    let response = Pipeline::default()
        .run(&route, RequestInput::new(http::Method::GET, "/broken"))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.unwrap();
    assert_eq!(body["name"], OUTPUT_VALIDATION_ERROR);
    assert_eq!(body["data"][0]["path"], "/id");
}

#[tokio::test]
async fn query_overrides_body_fields() {
    let route = resolve(RouteDefinition::new("/echo", |ctx: RequestContext| async move {
        HandlerResult::Ok(Some(ctx.input().clone()))
    }));
    let input = RequestInput::new(http::Method::POST, "/echo")
        .with_body(json!({ "color": "red", "size": "L" }))
        .with_query("color", "blue");

    let response = Pipeline::default().run(&route, input).await;

    assert_eq!(
        response.body,
        Some(json!({ "color": "blue", "size": "L" }))
    );
}

#[tokio::test]
async fn raw_input_and_body_stay_available() {
    let route = resolve(
        RouteDefinition::new("/raw", |ctx: RequestContext| async move {
            let raw = Value::Object(ctx.raw_input().clone());
            HandlerResult::Ok(Some(json!({ "raw": raw, "input": ctx.input() })))
        })
        .input_schema(json!({
            "type": "object",
            "properties": { "limit": { "type": "integer" } }
        })),
    );
    let input = RequestInput::new(http::Method::GET, "/raw").with_query("limit", "10");

    let response = Pipeline::default().run(&route, input).await;
    let body = response.body.unwrap();

    assert_eq!(body["raw"]["limit"], "10");
    assert_eq!(body["input"]["limit"], 10);
}

#[tokio::test]
async fn non_object_bodies_are_passed_through_untouched() {
    let route = resolve(RouteDefinition::new("/list", |ctx: RequestContext| async move {
        HandlerResult::Ok(ctx.body().cloned())
    }));
    let input = RequestInput::new(http::Method::POST, "/list").with_body(json!([1, 2, 3]));

    let response = Pipeline::default().run(&route, input).await;

    assert_eq!(response.body, Some(json!([1, 2, 3])));
}

#[tokio::test]
async fn discovery_document_hides_private_routes() {
    let introspection = Introspection::new();
    let routes: Vec<Arc<Route>> = vec![
        Arc::new(items_route()),
        Arc::new(resolve(
            RouteDefinition::new("/secret", |_ctx: RequestContext| async {
                HandlerResult::Ok(Some(json!("hidden")))
            })
            .private(true),
        )),
        Arc::new(resolve(
            introspection.definition(Method::Get, "/.well-known/routes"),
        )),
    ];
    let meta = Arc::clone(&routes[2]);
    introspection.attach(Arc::from(routes.clone()));

    let response = Pipeline::default()
        .run(
            &meta,
            RequestInput::new(http::Method::GET, "/.well-known/routes"),
        )
        .await;
    let listed = response.body.unwrap();
    let paths: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|info| info["path"].as_str().unwrap())
        .collect();

    assert_eq!(paths, vec!["/items", "/.well-known/routes"]);
    assert_eq!(listed[0]["method"], "POST");
    assert_eq!(listed[0]["inputSchemaInfo"]["required"], json!(["name", "qty"]));
    assert_eq!(listed[1]["description"], "Route info.");
    assert_eq!(describe_routes(&routes).len(), 2);
}

#[tokio::test]
async fn handlers_can_read_the_route_table() {
    let count = Arc::new(resolve(RouteDefinition::new(
        "/count",
        |ctx: RequestContext| async move {
            let paths: Vec<&str> = ctx.routes().iter().map(|route| route.path()).collect();
            HandlerResult::Ok(Some(json!(paths)))
        },
    )));
    let routes: Arc<[Arc<Route>]> = Arc::from(vec![Arc::new(items_route()), Arc::clone(&count)]);
    let pipeline = Pipeline::default().with_routes(routes);

    let response = pipeline
        .run(&count, RequestInput::new(http::Method::GET, "/count"))
        .await;

    assert_eq!(response.body, Some(json!(["/items", "/count"])));
}
