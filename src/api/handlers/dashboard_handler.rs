use axum::{extract::State, response::Json, routing::get, Extension, Router};

use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::DashboardSummary;
use crate::errors::AppResult;

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/", get(summary))
}

/// Expense totals by status for the caller, their team and the company
#[utoipa::path(
    get,
    path = "/dashboard",
    tag = "Dashboard",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummary),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn summary(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Json<DashboardSummary>> {
    let summary = state.services.dashboard().summary(&user).await?;
    Ok(Json(summary))
}
