//! Company handlers.

use axum::{extract::State, response::Json, routing::get, Extension, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::Company;
use crate::errors::AppResult;

/// Company changes. The currency cannot change after signup.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCompanyRequest {
    #[validate(length(min = 1, max = 100, message = "Company name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 60, message = "Country must be 1-60 characters"))]
    pub country: Option<String>,
}

pub fn company_routes() -> Router<AppState> {
    Router::new().route("/", get(get_company).put(update_company))
}

#[utoipa::path(
    get,
    path = "/company",
    tag = "Company",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The caller's company", body = Company),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_company(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Json<Company>> {
    let company = state.services.company().get_company(&user).await?;
    Ok(Json(company))
}

#[utoipa::path(
    put,
    path = "/company",
    tag = "Company",
    security(("bearer_auth" = [])),
    request_body = UpdateCompanyRequest,
    responses(
        (status = 200, description = "Company updated", body = Company),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn update_company(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<UpdateCompanyRequest>,
) -> AppResult<Json<Company>> {
    let company = state
        .services
        .company()
        .update_company(&user, payload.name, payload.country)
        .await?;

    Ok(Json(company))
}
