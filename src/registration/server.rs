// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use super::service::{ClusterRegistration, Registrar};
use crate::error::FleetError;
use anyhow::Context as _;
use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

const CLUSTERS_PATH: &str = "/v1/clusters";
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
enum Route {
    Register,
    Unregister(String),
    MethodNotAllowed,
    NotFound,
}

fn route(method: &Method, path: &str) -> Route {
    let path = path.trim_end_matches('/');
    if path == CLUSTERS_PATH {
        return match *method {
            Method::POST => Route::Register,
            _ => Route::MethodNotAllowed,
        };
    }
    match path.strip_prefix(CLUSTERS_PATH).and_then(|p| p.strip_prefix('/')) {
        Some(name) if !name.is_empty() && !name.contains('/') => match *method {
            Method::DELETE => Route::Unregister(name.to_string()),
            _ => Route::MethodNotAllowed,
        },
        _ => Route::NotFound,
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
    response
}

fn error_response(status: StatusCode, message: impl ToString) -> Response<Full<Bytes>> {
    json_response(status, json!({ "error": message.to_string() }))
}

fn fleet_error_response(err: FleetError) -> Response<Full<Bytes>> {
    let status = match &err {
        FleetError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        FleetError::KubeError(kube::Error::Api(e)) => {
            StatusCode::from_u16(e.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Registration request failed: {}", err);
    } else {
        warn!("Registration request rejected: {}", err);
    }
    error_response(status, err)
}

/// Handle a single registration request
async fn handle<B>(registrar: &Registrar, request: Request<B>) -> Response<Full<Bytes>>
where
    B: hyper::body::Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    debug!("Got http request {} {}", method, path);

    let response = match route(&method, &path) {
        Route::Register => {
            let body = match Limited::new(request.into_body(), MAX_BODY_BYTES).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
            };
            match serde_json::from_slice::<ClusterRegistration>(&body) {
                Ok(registration) => match registrar.register_cluster(&registration).await {
                    Ok(name) => json_response(StatusCode::CREATED, json!({ "name": name })),
                    Err(e) => fleet_error_response(e),
                },
                Err(e) => error_response(StatusCode::BAD_REQUEST, format!("invalid registration: {}", e)),
            }
        }
        Route::Unregister(name) => match registrar.unregister_cluster(&name).await {
            Ok(name) => json_response(StatusCode::OK, json!({ "name": name })),
            Err(e) => fleet_error_response(e),
        },
        Route::MethodNotAllowed => error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
        Route::NotFound => error_response(StatusCode::NOT_FOUND, "not found"),
    };

    debug!(
        "Finished handling {} {} with response status: {}",
        method,
        path,
        response.status()
    );
    response
}

/// Serve the registration endpoint until the listener fails
pub async fn serve(registrar: Registrar, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind registration endpoint on {}", addr))?;
    info!("Registration endpoint listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        let registrar = registrar.clone();

        tokio::spawn(async move {
            let service = service_fn(move |request| {
                let registrar = registrar.clone();
                async move { Ok::<_, Infallible>(handle(&registrar, request).await) }
            });
            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {} closed with error: {}", peer, e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockService;

    const SECRET_PATH: &str = "/api/v1/namespaces/manager-system/secrets/admins-east-secrets";
    const CLUSTER_PATH: &str =
        "/apis/fleet.geeko.me/v1alpha1/namespaces/manager-system/clusters/admins-east";

    fn request(method: Method, path: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn registration_body() -> String {
        json!({
            "name": "admins.east",
            "config": {"host": "https://api.east.example.com", "bearerToken": "s3cr3t"}
        })
        .to_string()
    }

    fn object_json(kind: &str, api_version: &str) -> String {
        json!({
            "apiVersion": api_version,
            "kind": kind,
            "metadata": {"name": "admins-east", "namespace": "manager-system"},
            "spec": {"name": "admins-east", "config": {"host": "https://api.east.example.com"}}
        })
        .to_string()
    }

    #[test]
    fn test_route() {
        assert_eq!(route(&Method::POST, "/v1/clusters"), Route::Register);
        assert_eq!(route(&Method::POST, "/v1/clusters/"), Route::Register);
        assert_eq!(
            route(&Method::DELETE, "/v1/clusters/admins.east"),
            Route::Unregister("admins.east".to_string())
        );
        assert_eq!(route(&Method::GET, "/v1/clusters"), Route::MethodNotAllowed);
        assert_eq!(route(&Method::POST, "/v1/clusters/east"), Route::MethodNotAllowed);
        assert_eq!(route(&Method::DELETE, "/v1/clusters/a/b"), Route::NotFound);
        assert_eq!(route(&Method::GET, "/healthz"), Route::NotFound);
    }

    #[tokio::test]
    async fn test_register() {
        let mock = MockService::new()
            .on_patch(SECRET_PATH, 200, &object_json("Secret", "v1"))
            .on_patch(CLUSTER_PATH, 200, &object_json("Cluster", "fleet.geeko.me/v1alpha1"));
        let registrar = Registrar::new(mock.clone().into_client(), "manager-system");

        let response = handle(
            &registrar,
            request(Method::POST, "/v1/clusters", &registration_body()),
        )
        .await;

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["name"], "admins-east");
        assert_eq!(mock.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_register_with_malformed_body() {
        let mock = MockService::new();
        let registrar = Registrar::new(mock.clone().into_client(), "manager-system");

        let response = handle(&registrar, request(Method::POST, "/v1/clusters", "{\"name\":")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_missing_cluster_is_not_found() {
        let registrar = Registrar::new(MockService::new().into_client(), "manager-system");

        let response = handle(
            &registrar,
            request(Method::DELETE, "/v1/clusters/admins.east", ""),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_unregister() {
        let mock = MockService::new().on_delete(
            CLUSTER_PATH,
            200,
            &object_json("Cluster", "fleet.geeko.me/v1alpha1"),
        );
        let registrar = Registrar::new(mock.clone().into_client(), "manager-system");

        let response = handle(
            &registrar,
            request(Method::DELETE, "/v1/clusters/admins.east", ""),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(mock.calls(), vec![format!("DELETE {}", CLUSTER_PATH)]);
    }
}
