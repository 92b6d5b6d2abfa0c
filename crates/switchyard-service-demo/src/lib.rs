//! Demo routes for the Switchyard service binary.
//!
//! - `GET /ping` - liveness-style echo returning `"pong"`
//! - `POST /items` - create an item; input and output are schema checked
//! - `GET /secret` - private route, hidden from route discovery
//! - `ALL /echo` - echoes the method and merged input
//! - `GET /boom` - always fails, to show the error format

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use switchyard_lib::{HandlerError, HandlerResult, Method, RequestContext, RouteDefinition};
use switchyard_server::{registrar, Registrar};
use tracing::info;

/// Request body for `POST /items`.
#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub qty: f64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Stored item returned by `POST /items`.
#[derive(Debug, Serialize)]
pub struct Item {
    pub id: u64,
    pub name: String,
    pub qty: f64,
    pub tags: Vec<String>,
}

pub fn item_input_schema() -> Value {
    json!({
        "type": "object",
        "required": ["name", "qty"],
        "properties": {
            "name": { "type": "string", "minLength": 1 },
            "qty": { "type": "number", "minimum": 0 },
            "tags": { "type": "array", "items": { "type": "string" } }
        }
    })
}

pub fn item_output_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "name", "qty"],
        "properties": {
            "id": { "type": "integer" },
            "name": { "type": "string" },
            "qty": { "type": "number" },
            "tags": { "type": "array", "items": { "type": "string" } }
        }
    })
}

/// All demo registrars, in registration order.
pub fn registrars() -> Vec<Registrar> {
    vec![basics(), items(), diagnostics()]
}

fn basics() -> Registrar {
    registrar(|routes| {
        routes.register(
            RouteDefinition::new("/ping", |_ctx: RequestContext| async {
                HandlerResult::Ok(Some(json!("pong")))
            })
            .description("Reply with pong."),
        )?;

        routes.register(
            RouteDefinition::new("/echo", |ctx: RequestContext| async move {
                HandlerResult::Ok(Some(json!({
                    "method": ctx.method().as_str(),
                    "input": ctx.input(),
                })))
            })
            .method(Method::All)
            .description("Echo the request method and merged input."),
        )
    })
}

fn items() -> Registrar {
    let next_id = Arc::new(AtomicU64::new(1));

    registrar(move |routes| {
        routes.register(
            RouteDefinition::new("/items", move |ctx: RequestContext| {
                let next_id = Arc::clone(&next_id);
                async move {
                    let new: NewItem = ctx.input_as()?;
                    let item = Item {
                        id: next_id.fetch_add(1, Ordering::Relaxed),
                        name: new.name,
                        qty: new.qty,
                        tags: new.tags,
                    };
                    info!(request_id = ctx.request_id(), id = item.id, "item created");

                    ctx.response().set_status(StatusCode::CREATED);
                    Ok(Some(serde_json::to_value(item)?))
                }
            })
            .method(Method::Post)
            .description("Create an item.")
            .input_schema(item_input_schema())
            .output_schema(item_output_schema()),
        )
    })
}

fn diagnostics() -> Registrar {
    registrar(|routes| {
        routes.register(
            RouteDefinition::new("/secret", |_ctx: RequestContext| async {
                HandlerResult::Ok(Some(json!({ "launch_code": "0000" })))
            })
            .private(true),
        )?;

        routes.register(
            RouteDefinition::new("/boom", |_ctx: RequestContext| async {
                HandlerResult::Err(HandlerError::msg("boom"))
            })
            .description("Always fails."),
        )
    })
}
