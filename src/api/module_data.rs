// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module data endpoints.
//!
//! - `POST /v1/modules/data` - module-authenticated upsert on a user's behalf.
//! - `GET /v1/modules/data` - read, authorized by module key, bearer token,
//!   both, or neither; rows are filtered by visibility.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use tracing::{debug, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::{
    auth::{AuthError, ModuleKeyHeader, Viewer},
    error::ApiError,
    gateway::{KeyVerifier, ListFilter, ModuleDataStore},
    state::AppState,
    storage::{AuditEvent, AuditEventType, AuditRepository, StoredModuleRecord},
};

/// Module-authenticated write.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDataWriteRequest {
    /// Module writing the record.
    #[serde(default)]
    pub module_id: String,
    /// The module's secret.
    #[serde(default)]
    pub module_key: Option<String>,
    /// User the record belongs to.
    #[serde(default)]
    pub user_id: String,
    /// `public`, `authenticated`, `private` or `admin`; anything else is stored as `private`.
    #[serde(default)]
    pub visibility: Option<String>,
    /// Opaque module-defined JSON (must not be null).
    #[serde(default)]
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ModuleDataQuery {
    /// Module whose records to read.
    #[serde(default)]
    pub module_id: String,
    /// Restrict to one user's record.
    pub user_id: Option<String>,
}

#[utoipa::path(
    post,
    path = "/v1/modules/data",
    request_body = ModuleDataWriteRequest,
    tag = "Module Data",
    responses(
        (status = 204, description = "Record stored"),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Missing or invalid module key"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn write_module_data(
    State(state): State<AppState>,
    Json(request): Json<ModuleDataWriteRequest>,
) -> Result<StatusCode, ApiError> {
    if request.module_id.trim().is_empty() {
        return Err(ApiError::bad_request("moduleId is required").with_code("validation_failed"));
    }

    let storage = state.storage.as_ref();
    let audit = AuditRepository::new(storage);

    let module_key = match request.module_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => {
            audit.record(
                AuditEvent::new(AuditEventType::ModuleAuthFailure)
                    .with_module(&request.module_id)
                    .failed("missing module key"),
            );
            return Err(AuthError::MissingModuleKey.into());
        }
    };

    if !KeyVerifier::new(storage).verify(&request.module_id, module_key) {
        warn!(module_id = %request.module_id, "Rejected module data write: invalid module key");
        audit.record(
            AuditEvent::new(AuditEventType::ModuleAuthFailure)
                .with_module(&request.module_id)
                .failed("invalid module key"),
        );
        return Err(AuthError::InvalidModuleKey.into());
    }

    let record = ModuleDataStore::new(storage).upsert(
        &request.module_id,
        &request.user_id,
        request.visibility.as_deref(),
        request.payload,
    )?;

    info!(
        module_id = %record.module_id,
        user_id = %record.user_id,
        visibility = %record.visibility,
        "Module data written"
    );
    audit.record(
        AuditEvent::new(AuditEventType::RecordWritten)
            .with_module(&record.module_id)
            .with_user(&record.user_id)
            .with_details(serde_json::json!({ "visibility": record.visibility })),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v1/modules/data",
    params(
        ModuleDataQuery,
        ("x-module-key" = Option<String>, Header, description = "Module secret; grants module-scoped reads"),
        ("authorization" = Option<String>, Header, description = "Bearer token identifying the viewer")
    ),
    tag = "Module Data",
    responses(
        (status = 200, body = [StoredModuleRecord]),
        (status = 400, description = "Validation failure"),
        (status = 401, description = "Invalid module key or bearer token"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn list_module_data(
    State(state): State<AppState>,
    Query(params): Query<ModuleDataQuery>,
    ModuleKeyHeader(module_key): ModuleKeyHeader,
    viewer: Result<Viewer, AuthError>,
) -> Result<Json<Vec<StoredModuleRecord>>, ApiError> {
    if params.module_id.trim().is_empty() {
        return Err(ApiError::bad_request("moduleId is required").with_code("validation_failed"));
    }
    let storage = state.storage.as_ref();

    let viewer = match viewer {
        Ok(Viewer(viewer)) => viewer,
        Err(e) => {
            AuditRepository::new(storage).record(
                AuditEvent::new(AuditEventType::IdentityAuthFailure)
                    .with_module(&params.module_id)
                    .failed(e.error_code()),
            );
            return Err(e.into());
        }
    };

    let module_authorized = match module_key.as_deref() {
        None => false,
        Some(key) if KeyVerifier::new(storage).verify(&params.module_id, key) => true,
        Some(_) => {
            warn!(module_id = %params.module_id, "Rejected module data read: invalid module key");
            AuditRepository::new(storage).record(
                AuditEvent::new(AuditEventType::ModuleAuthFailure)
                    .with_module(&params.module_id)
                    .failed("invalid module key"),
            );
            return Err(AuthError::InvalidModuleKey.into());
        }
    };

    let filter = ListFilter {
        user_id: params.user_id.as_deref(),
        module_authorized,
        viewer_id: viewer.as_ref().map(|v| v.user_id.as_str()),
    };
    let records = ModuleDataStore::new(storage).list(&params.module_id, &filter)?;

    debug!(
        module_id = %params.module_id,
        module_authorized,
        viewer = ?filter.viewer_id,
        count = records.len(),
        "Module data listed"
    );
    Ok(Json(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::auth::identity::unsigned_test_token;
    use crate::gateway::rotate_module_key;
    use crate::storage::{FileStorage, StoragePaths};
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn setup() -> (TempDir, AppState) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        rotate_module_key(&storage, "m1", "k1").unwrap();
        (temp, AppState::new(storage))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn write(body: Value) -> Request<Body> {
        Request::post("/v1/modules/data")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn read(query: &str, headers: &[(&str, String)]) -> Request<Body> {
        let mut builder = Request::get(format!("/v1/modules/data?{query}"));
        for (name, value) in headers {
            builder = builder.header(*name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn bearer(user_id: &str) -> (&'static str, String) {
        (
            "authorization",
            format!("Bearer {}", unsigned_test_token(user_id, 9999999999)),
        )
    }

    #[tokio::test]
    async fn end_to_end_private_record_visibility() {
        let (_temp, state) = setup();
        let app = router(state);

        let (status, _) = send(
            &app,
            write(json!({
                "moduleId": "m1",
                "moduleKey": "k1",
                "userId": "u1",
                "visibility": "private",
                "payload": {"foo": 1}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        // No credentials: private row hidden.
        let (status, body) = send(&app, read("moduleId=m1", &[])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));

        // Owner's bearer token.
        let (status, body) = send(&app, read("moduleId=m1", &[bearer("u1")])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["moduleId"], "m1");
        assert_eq!(body[0]["userId"], "u1");
        assert_eq!(body[0]["visibility"], "private");
        assert_eq!(body[0]["payload"], json!({"foo": 1}));
        assert!(body[0]["updatedAt"].is_string());

        // Module key, no bearer token.
        let (status, body) =
            send(&app, read("moduleId=m1", &[("x-module-key", "k1".to_string())])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        // Someone else's bearer token.
        let (_, body) = send(&app, read("moduleId=m1", &[bearer("u2")])).await;
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn write_rejects_bad_or_missing_key() {
        let (_temp, state) = setup();
        let storage = state.storage.clone();
        let app = router(state);

        for key in [json!("wrong"), json!(null), json!("")] {
            let (status, body) = send(
                &app,
                write(json!({
                    "moduleId": "m1",
                    "moduleKey": key,
                    "userId": "u1",
                    "payload": {"x": 1}
                })),
            )
            .await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "key {key}");
            assert!(body["error_code"].is_string());
        }

        // Unknown module looks exactly like a wrong key.
        let (status, body) = send(
            &app,
            write(json!({"moduleId": "ghost", "moduleKey": "k1", "userId": "u1", "payload": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_module_key");

        let stored = crate::storage::ModuleDataRepository::new(&storage)
            .list_by_module("m1")
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn write_validates_fields() {
        let (_temp, state) = setup();
        let app = router(state);

        for body in [
            json!({"moduleKey": "k1", "userId": "u1", "payload": 1}),
            json!({"moduleId": "m1", "moduleKey": "k1", "payload": 1}),
            json!({"moduleId": "m1", "moduleKey": "k1", "userId": "u1"}),
            json!({"moduleId": "m1", "moduleKey": "k1", "userId": "u1", "payload": null}),
        ] {
            let (status, response) = send(&app, write(body.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(response["error_code"], "validation_failed");
        }
    }

    #[tokio::test]
    async fn unknown_visibility_is_stored_private() {
        let (_temp, state) = setup();
        let app = router(state);

        send(
            &app,
            write(json!({
                "moduleId": "m1", "moduleKey": "k1", "userId": "u1",
                "visibility": "everyone", "payload": {"a": true}
            })),
        )
        .await;

        let (_, body) = send(&app, read("moduleId=m1", &[])).await;
        assert_eq!(body, json!([]));
        let (_, body) = send(&app, read("moduleId=m1", &[("x-module-key", "k1".to_string())])).await;
        assert_eq!(body[0]["visibility"], "private");
    }

    #[tokio::test]
    async fn admin_rows_need_module_key() {
        let (_temp, state) = setup();
        let app = router(state);

        send(
            &app,
            write(json!({
                "moduleId": "m1", "moduleKey": "k1", "userId": "u1",
                "visibility": "admin", "payload": {"internal": 1}
            })),
        )
        .await;

        let (_, body) = send(&app, read("moduleId=m1", &[bearer("u1")])).await;
        assert_eq!(body, json!([]));
        let (_, body) = send(&app, read("moduleId=m1", &[("x-module-key", "k1".to_string())])).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_with_invalid_credentials_fails_closed() {
        let (_temp, state) = setup();
        let app = router(state);

        send(
            &app,
            write(json!({
                "moduleId": "m1", "moduleKey": "k1", "userId": "u1",
                "visibility": "public", "payload": 1
            })),
        )
        .await;

        let (status, body) =
            send(&app, read("moduleId=m1", &[("x-module-key", "nope".to_string())])).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error_code"], "invalid_module_key");

        let (status, _) = send(
            &app,
            read("moduleId=m1", &[("authorization", "Bearer garbage".to_string())]),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn read_filters_by_user_and_validates() {
        let (_temp, state) = setup();
        let app = router(state);

        for user in ["u1", "u2"] {
            send(
                &app,
                write(json!({
                    "moduleId": "m1", "moduleKey": "k1", "userId": user,
                    "visibility": "public", "payload": {"user": user}
                })),
            )
            .await;
        }

        let (_, body) = send(&app, read("moduleId=m1&userId=u2", &[])).await;
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["userId"], "u2");

        let (status, _) = send(&app, read("moduleId=m1&userId=", &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, read("userId=u1", &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_module_id_is_rejected_before_credentials() {
        let (_temp, state) = setup();
        let app = router(state);

        let (status, body) = send(
            &app,
            read("moduleId=%20&userId=u1", &[("x-module-key", "k1".to_string())]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "validation_failed");

        let (status, _) = send(&app, read("userId=u1", &[("x-module-key", "k1".to_string())])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            read("userId=u1", &[("authorization", "Bearer garbage".to_string())]),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn writes_are_audited() {
        let (_temp, state) = setup();
        let storage = state.storage.clone();
        let app = router(state);

        send(
            &app,
            write(json!({"moduleId": "m1", "moduleKey": "k1", "userId": "u1", "payload": 1})),
        )
        .await;
        send(
            &app,
            write(json!({"moduleId": "m1", "moduleKey": "bad", "userId": "u1", "payload": 1})),
        )
        .await;

        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let events = AuditRepository::new(&storage)
            .search_by_module("m1", &today)
            .unwrap();
        let types: Vec<_> = events.iter().map(|e| e.event_type.clone()).collect();
        assert!(types.contains(&AuditEventType::ModuleKeyRotated));
        assert!(types.contains(&AuditEventType::RecordWritten));
        assert!(types.contains(&AuditEventType::ModuleAuthFailure));
    }
}
