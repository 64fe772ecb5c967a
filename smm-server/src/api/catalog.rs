use axum::{Json, extract::State, response::IntoResponse};
use kanau::processor::Processor;
use smm_core::entities::services::ListActiveServices;
use smm_sdk::objects::Service;

use super::ApiError;
use crate::state::AppState;

/// `GET /services`: list the active catalog.
///
/// Express eligibility comes from the store settings. Services with
/// inconsistent quantity bounds are skipped.
pub(super) async fn list_services(
    state: State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.processor().process(ListActiveServices).await?;
    let express_enabled = state.settings.read().await.express_enabled;

    let services: Vec<Service> = records
        .into_iter()
        .map(|record| record.into_service(express_enabled))
        .filter(|service| match service.check_bounds() {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(service_id = service.id, error = %e, "Skipping misconfigured service");
                false
            }
        })
        .collect();

    Ok(Json(services))
}

/// `GET /settings`: express pricing and payment polling for the checkout.
pub(super) async fn get_settings(state: State<AppState>) -> impl IntoResponse {
    Json(state.settings.read().await.storefront())
}
