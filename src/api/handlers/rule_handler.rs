//! Approval rule handlers (admins only).

use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{ApprovalCondition, ApprovalRule, RuleApprover, RuleDefinition};
use crate::errors::AppResult;
use crate::types::{Created, NoContent};

/// Full rule contents; updates replace every field.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RuleRequest {
    #[validate(length(min = 1, max = 100, message = "Rule name must be 1-100 characters"))]
    #[schema(example = "Travel over budget")]
    pub name: String,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    /// Restrict the rule to one expense category
    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    #[schema(example = "Travel")]
    pub category: Option<String>,
    /// Restrict the rule to one submitting employee
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub manager_first: bool,
    #[serde(default)]
    pub sequential: bool,
    #[serde(default)]
    pub condition: ApprovalCondition,
    #[serde(default)]
    pub approvers: Vec<RuleApprover>,
}

impl From<RuleRequest> for RuleDefinition {
    fn from(request: RuleRequest) -> Self {
        RuleDefinition {
            name: request.name,
            description: request.description,
            category: request.category,
            user_id: request.user_id,
            manager_first: request.manager_first,
            sequential: request.sequential,
            condition: request.condition,
            approvers: request.approvers,
        }
    }
}

pub fn rule_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rules).post(create_rule))
        .route("/:id", get(get_rule).put(update_rule).delete(delete_rule))
}

#[utoipa::path(
    get,
    path = "/rules",
    tag = "Rules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "The company's approval rules", body = [ApprovalRule]),
        (status = 403, description = "Admins only")
    )
)]
pub async fn list_rules(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Json<Vec<ApprovalRule>>> {
    let rules = state.services.rules().list_rules(&user).await?;
    Ok(Json(rules))
}

#[utoipa::path(
    post,
    path = "/rules",
    tag = "Rules",
    security(("bearer_auth" = [])),
    request_body = RuleRequest,
    responses(
        (status = 201, description = "Rule created", body = ApprovalRule),
        (status = 400, description = "Invalid rule"),
        (status = 403, description = "Admins only")
    )
)]
pub async fn create_rule(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<RuleRequest>,
) -> AppResult<Created<ApprovalRule>> {
    let rule = state
        .services
        .rules()
        .create_rule(&user, payload.into())
        .await?;

    Ok(Created(rule))
}

#[utoipa::path(
    get,
    path = "/rules/{id}",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 200, description = "Rule", body = ApprovalRule),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Rule not found")
    )
)]
pub async fn get_rule(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApprovalRule>> {
    let rule = state.services.rules().get_rule(&user, id).await?;
    Ok(Json(rule))
}

#[utoipa::path(
    put,
    path = "/rules/{id}",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rule ID")),
    request_body = RuleRequest,
    responses(
        (status = 200, description = "Rule replaced", body = ApprovalRule),
        (status = 400, description = "Invalid rule"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Rule not found")
    )
)]
pub async fn update_rule(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RuleRequest>,
) -> AppResult<Json<ApprovalRule>> {
    let rule = state
        .services
        .rules()
        .update_rule(&user, id, payload.into())
        .await?;

    Ok(Json(rule))
}

#[utoipa::path(
    delete,
    path = "/rules/{id}",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Rule ID")),
    responses(
        (status = 204, description = "Rule deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Rule not found")
    )
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.rules().delete_rule(&user, id).await?;
    Ok(NoContent)
}
