use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use common::{IncidentStatus, NewService, ServicePatch, ServiceStatus};
use serde_json::{json, Value};
use statuspage_client::{ApiClient, ApiError, StatusBackend};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    content_type: Option<String>,
    accept: Option<String>,
    body: Option<Value>,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn service_json(id: &str, org_id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": "API",
        "description": "Public REST API",
        "status": status,
        "orgId": org_id,
        "createdAt": "2024-05-01T10:00:00",
        "updatedAt": null
    })
}

async fn stub(State(log): State<Log>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let header_value = |name: header::HeaderName| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body_json: Option<Value> = serde_json::from_slice(&body).ok();
    log.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: header_value(header::CONTENT_TYPE),
        accept: header_value(header::ACCEPT),
        body: body_json.clone(),
    });

    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => Json(json!({ "status": "healthy" })).into_response(),
        ("GET", ["api", "organizations", org, "services"]) => {
            Json(json!([service_json("svc-1", org, "DEGRADED")])).into_response()
        }
        ("POST", ["api", "organizations", org, "services"]) => {
            let input = body_json.unwrap_or_default();
            let mut created = service_json("svc-new", org, input["status"].as_str().unwrap_or("OPERATIONAL"));
            created["name"] = input["name"].clone();
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("GET", ["api", "services", "svc-1"]) => Json(service_json("svc-1", "org-1", "OPERATIONAL")).into_response(),
        ("PUT", ["api", "services", "svc-1"]) => Json(service_json("svc-1", "org-1", "MAJOR_OUTAGE")).into_response(),
        ("DELETE", ["api", "services", "svc-1"]) => {
            Json(json!({ "message": "Service deleted successfully" })).into_response()
        }
        ("GET", ["api", "organizations", _, "incidents"]) => Json(json!([{
            "id": "inc-1",
            "title": "Elevated errors",
            "description": "Investigating",
            "status": "INVESTIGATING",
            "orgId": "org-1",
            "serviceIds": [],
            "createdAt": "2024-05-01T10:00:00Z"
        }]))
        .into_response(),
        ("GET", ["api", "public", "status", "acme"]) => Json(json!({
            "organization": {
                "id": "org-1",
                "name": "Acme",
                "slug": "acme",
                "clerkOrgId": "org_abc",
                "createdAt": "2024-01-01T00:00:00Z"
            },
            "services": [service_json("svc-1", "org-1", "OPERATIONAL")],
            "incidents": []
        }))
        .into_response(),
        ("POST", ["api", "organizations"]) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": "boom" }))).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found" }))).into_response(),
    }
}

async fn start_stub() -> (ApiClient, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(stub).with_state(log.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = ApiClient::new(&format!("http://{}", addr), Duration::from_secs(5)).unwrap();
    (client, log)
}

fn last(log: &Log) -> Recorded {
    log.lock().unwrap().last().cloned().unwrap()
}

#[tokio::test]
async fn lists_services_with_json_headers() {
    let (client, log) = start_stub().await;

    let services = client.list_services("org-1").await.unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].status, ServiceStatus::Degraded);
    assert_eq!(services[0].org_id, "org-1");
    assert_eq!(services[0].created_at.to_rfc3339(), "2024-05-01T10:00:00+00:00");

    let request = last(&log);
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/api/organizations/org-1/services");
    assert_eq!(request.content_type.as_deref(), Some("application/json"));
    assert_eq!(request.accept.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn create_service_posts_camel_case_body() {
    let (client, log) = start_stub().await;
    let input = NewService {
        name: "Website".into(),
        description: None,
        status: ServiceStatus::PartialOutage,
        org_id: "org-1".into(),
    };

    let created = client.create_service(&input).await.unwrap();
    assert_eq!(created.name, "Website");
    assert_eq!(created.status, ServiceStatus::PartialOutage);

    let request = last(&log);
    assert_eq!(request.method, "POST");
    assert_eq!(request.path, "/api/organizations/org-1/services");
    assert_eq!(
        request.body,
        Some(json!({ "name": "Website", "status": "PARTIAL_OUTAGE", "orgId": "org-1" }))
    );
}

#[tokio::test]
async fn update_sends_only_changed_fields() {
    let (client, log) = start_stub().await;
    let patch = ServicePatch { status: Some(ServiceStatus::MajorOutage), ..Default::default() };

    let updated = client.update_service("svc-1", &patch).await.unwrap();
    assert_eq!(updated.status, ServiceStatus::MajorOutage);

    let request = last(&log);
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/api/services/svc-1");
    assert_eq!(request.body, Some(json!({ "status": "MAJOR_OUTAGE" })));
}

#[tokio::test]
async fn delete_ignores_confirmation_body() {
    let (client, log) = start_stub().await;
    client.delete_service("svc-1").await.unwrap();

    let request = last(&log);
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.body, None);
}

#[tokio::test]
async fn public_status_and_not_found() {
    let (client, log) = start_stub().await;

    let page = client.get_public_status("acme").await.unwrap();
    assert_eq!(page.organization.provider_org_id, "org_abc");
    assert_eq!(page.services.len(), 1);
    assert!(page.incidents.is_empty());

    let err = client.get_public_status("no such org").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(last(&log).path, "/api/public/status/no%20such%20org");

    let err = client.get_service("missing").await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 404, text: "Not Found".into() });
}

#[tokio::test]
async fn server_error_carries_status_text() {
    let (client, _log) = start_stub().await;
    let input = common::NewOrganization {
        name: "Acme".into(),
        slug: "acme".into(),
        provider_org_id: "org_abc".into(),
    };

    let err = client.create_organization(&input).await.unwrap_err();
    assert_eq!(err, ApiError::Status { status: 500, text: "Internal Server Error".into() });
    assert_eq!(err.to_string(), "API Error: Internal Server Error");
}

#[tokio::test]
async fn unknown_status_value_fails_to_decode() {
    let (client, _log) = start_stub().await;
    let err = client.list_incidents("org-1").await.unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)), "got {:?}", err);

    // sanity check that known values do decode
    assert_eq!("RESOLVED".parse::<IncidentStatus>().unwrap(), IncidentStatus::Resolved);
}

#[tokio::test]
async fn health_check() {
    let (client, log) = start_stub().await;
    assert_eq!(client.health().await.unwrap().status, "healthy");
    assert_eq!(last(&log).path, "/health");
}

#[tokio::test]
async fn unreachable_backend_is_a_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "got {:?}", err);
}
