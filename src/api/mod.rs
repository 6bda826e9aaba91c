// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    gateway::Visibility,
    state::AppState,
    storage::StoredModuleRecord,
};

pub mod health;
pub mod module_data;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route(
            "/modules/data",
            get(module_data::list_module_data).post(module_data::write_module_data),
        )
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        module_data::write_module_data,
        module_data::list_module_data,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            StoredModuleRecord,
            Visibility,
            module_data::ModuleDataWriteRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Module Data", description = "Module-scoped user records"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;
