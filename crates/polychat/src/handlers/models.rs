//! Model listing handler.

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::server::AppState;

#[derive(Serialize)]
pub struct ListModelsResponse {
    models: Vec<ModelSummary>,
    /// True when replies are placeholders because no credential is set.
    demo_mode: bool,
}

#[derive(Serialize)]
pub struct ModelSummary {
    id: &'static str,
    name: &'static str,
    provider: &'static str,
}

/// GET /models
///
/// Models in registration order, for populating a model picker.
pub async fn list_models(State(state): State<AppState>) -> Json<ListModelsResponse> {
    let models = state
        .dispatcher
        .models()
        .list()
        .iter()
        .map(|m| ModelSummary {
            id: m.id,
            name: m.display_name,
            provider: m.provider_name(),
        })
        .collect();

    Json(ListModelsResponse {
        models,
        demo_mode: state.dispatcher.is_demo_mode(),
    })
}
