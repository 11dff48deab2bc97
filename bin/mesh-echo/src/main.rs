//! mesh-echo
//!
//! Minimal workload run behind every routing node: a health endpoint for the
//! container and target group checks, and a dump endpoint echoing what the
//! mesh delivered.

use anyhow::{Context, Result};
use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{self, HeaderValue},
    server::conn::http1,
    service::service_fn,
    HeaderMap, Method, Request, Response, StatusCode, Uri,
};
use hyper_util::rt::tokio::TokioIo;
use serde::Serialize;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info};
use tracing_subscriber::fmt::init as tracing_init;

const DEFAULT_PORT: u16 = 3000;

#[derive(Serialize)]
struct Dump {
    path: String,
    headers: BTreeMap<String, String>,
    env: BTreeMap<String, String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let port = match std::env::var("SERVER_PORT") {
        Ok(value) => value
            .parse::<u16>()
            .with_context(|| format!("Invalid SERVER_PORT: {}", value))?,
        Err(_) => DEFAULT_PORT,
    };

    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let listener = TcpListener::bind(&addr).await?;
    info!("mesh-echo listening on {}", addr);

    loop {
        let (stream, peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, exiting...");
                return Ok(());
            }
        };
        let io = TokioIo::new(stream);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, peer_addr));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving connection from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let env: BTreeMap<String, String> = std::env::vars().collect();
    let response = respond(req.method(), req.uri(), req.headers(), env);

    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    info!(
        "{} \"{} {} {:?}\" {} \"{}\"",
        peer_addr.ip(),
        req.method(),
        req.uri(),
        req.version(),
        response.status().as_u16(),
        user_agent
    );

    Ok(response)
}

fn respond(
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    env: BTreeMap<String, String>,
) -> Response<Full<Bytes>> {
    if method != Method::GET {
        return text(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed\n".to_string());
    }

    match uri.path() {
        "/health" => json(StatusCode::OK, &serde_json::json!({ "status": "OK" })),
        "/dump" => {
            let dump = Dump {
                path: uri
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| uri.path().to_string()),
                headers: headers
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect(),
                env,
            };
            json(StatusCode::OK, &dump)
        }
        _ => text(StatusCode::NOT_FOUND, "Not Found\n".to_string()),
    }
}

fn json<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_string_pretty(value) {
        Ok(body) => {
            let mut response = text(status, body);
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e)),
    }
}

fn text(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response
}
