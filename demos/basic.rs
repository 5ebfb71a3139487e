//! A small menhir API hosted on hyper.
//!
//! Run with:
//!   RUST_LOG=menhir=debug cargo run --example basic
//!
//! Try:
//!   curl 'http://localhost:3000/greet?name=Alice'
//!   curl 'http://localhost:3000/greet?tags=x&tags=y'
//!   curl -X POST http://localhost:3000/greet \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"Al","tags":"x"}'
//!   curl -X DELETE http://localhost:3000/greet
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"email":"a@example.com"}'
//!   curl -X OPTIONS http://localhost:3000/users

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use menhir::schema::{FieldSpec, MaxLength, MinLength, Schema};
use menhir::{
    Action, Allowed, Cors, Endpoint, JsonSchema, Overhead, Pipeline, Request, RequireJson,
    Response, Validator,
};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let api = Arc::new(api()?);
    let addr: SocketAddr = "0.0.0.0:3000".parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "menhir demo listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("accept error: {e}");
                continue;
            }
        };
        let api = Arc::clone(&api);

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let api = Arc::clone(&api);
                async move { dispatch(&api, req).await }
            });
            if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), svc)
                .await
            {
                error!(%peer, "connection error: {e}");
            }
        });
    }
}

fn api() -> Result<Endpoint, menhir::Error> {
    let person = Schema::new([
        FieldSpec::text("name").required().rule(MinLength(1)).rule(MaxLength(40)),
        FieldSpec::text("tags").collection(),
    ])?;

    let new_user = JsonSchema::new(&json!({
        "type": "object",
        "required": ["email"],
        "properties": {
            "email": {"type": "string", "minLength": 3},
            "admin": {"type": "boolean"},
        },
        "additionalProperties": false,
    }))?;

    Ok(Endpoint::new()
        .route(
            "/greet",
            Action::new()
                .get(Pipeline::new(greet).stage(Validator::new(person.clone())))
                .post(Pipeline::new(greet).stage(Validator::new(person))),
        )
        .route(
            "/users",
            Cors::allow_origins("*").wrap(
                Pipeline::new(create_user)
                    .stage(Allowed::new(["POST"])?)
                    .stage(RequireJson)
                    .stage(new_user),
            ),
        ))
}

fn greet(_req: &Request, ov: &mut Overhead) -> Response {
    let Some(record) = ov.record() else {
        return Response::status(http::StatusCode::INTERNAL_SERVER_ERROR);
    };
    let name = record.get_str("name").unwrap_or_default();
    let tags = record.get("tags").cloned().unwrap_or_else(|| json!([]));
    Response::json(json!({"greeting": format!("hello {name}"), "tags": tags}).to_string().into_bytes())
}

fn create_user(_req: &Request, ov: &mut Overhead) -> Response {
    let email = ov.json().and_then(|v| v.get("email")).cloned().unwrap_or_default();
    Response::builder()
        .status(http::StatusCode::CREATED)
        .json(json!({"id": 99, "email": email}).to_string().into_bytes())
}

/// Buffers the body, runs the endpoint and maps fatal errors to `500`.
async fn dispatch(api: &Endpoint, req: hyper::Request<Incoming>) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Ok(Response::status(http::StatusCode::BAD_REQUEST).into_http());
        }
    };

    let req = Request::from(http::Request::from_parts(parts, body));
    let response = match api.handle(&req) {
        Ok(response) => response,
        Err(e) => {
            error!(path = %req.path(), error = %e, "endpoint misconfigured");
            Response::status(http::StatusCode::INTERNAL_SERVER_ERROR)
        }
    };
    Ok(response.into_http())
}
