//! Expense handlers: drafts, submission and the approval actions.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::nullable;
use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{Decision, ExpenseResponse, ExpenseScope, ExpenseStatus};
use crate::errors::{AppError, AppResult};
use crate::services::{DraftChanges, ExpenseDraft};
use crate::types::{Created, NoContent, Paginated, PaginatedExpenses, PaginationParams};

/// New draft expense
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExpenseRequest {
    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    #[schema(example = "Client dinner")]
    pub description: String,
    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    #[schema(example = "Food")]
    pub category: String,
    /// Positive, at most two decimal places; string or number
    #[schema(value_type = String, example = "125.50")]
    pub amount: Decimal,
    /// ISO-4217 code the expense was paid in
    #[validate(length(equal = 3, message = "Currency must be a three-letter code"))]
    #[schema(example = "EUR")]
    pub currency: String,
    pub expense_date: NaiveDate,
    #[validate(length(max = 100, message = "Paid by must be at most 100 characters"))]
    #[schema(example = "Corporate card")]
    pub paid_by: Option<String>,
    #[validate(length(max = 500, message = "Remarks must be at most 500 characters"))]
    pub remarks: Option<String>,
}

/// Changes to a draft. `null` clears `paid_by` and `remarks`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateExpenseRequest {
    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: Option<String>,
    #[schema(value_type = Option<String>, example = "99.90")]
    pub amount: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be a three-letter code"))]
    pub currency: Option<String>,
    pub expense_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub paid_by: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, nullable)]
    pub remarks: Option<Option<String>>,
}

/// Optional note on an approval
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct ApproveRequest {
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// A rejection must say why
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RejectRequest {
    #[validate(length(min = 1, max = 1000, message = "A comment of at most 1000 characters is required"))]
    #[schema(example = "Receipt missing")]
    pub comment: String,
}

/// Admin override of a pending expense
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct OverrideRequest {
    pub decision: Decision,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Filters for the expense listing
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpenseListQuery {
    /// `mine` (default), `team` or `company`
    #[serde(default)]
    #[param(value_type = Option<ExpenseScope>)]
    pub scope: ExpenseScope,
    pub status: Option<ExpenseStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl ExpenseListQuery {
    fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            per_page: self.per_page.unwrap_or(defaults.per_page),
        }
    }
}

pub fn expense_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_expenses).post(create_expense))
        .route(
            "/:id",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/:id/submit", post(submit_expense))
        .route("/:id/approve", post(approve_expense))
        .route("/:id/reject", post(reject_expense))
        .route("/:id/override", post(override_expense))
}

pub fn approval_routes() -> Router<AppState> {
    Router::new().route("/pending", get(pending_approvals))
}

/// List expenses visible in a scope
#[utoipa::path(
    get,
    path = "/expenses",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    params(ExpenseListQuery),
    responses(
        (status = 200, description = "Expenses", body = PaginatedExpenses),
        (status = 403, description = "Scope not available to the caller")
    )
)]
pub async fn list_expenses(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<ExpenseListQuery>,
) -> AppResult<Json<Paginated<ExpenseResponse>>> {
    let params = query.pagination();
    let (expenses, total) = state
        .services
        .expenses()
        .list_expenses(&user, query.scope, query.status, params)
        .await?;

    Ok(Json(Paginated::from_params(expenses, &params, total)))
}

/// Create a draft expense
#[utoipa::path(
    post,
    path = "/expenses",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    request_body = CreateExpenseRequest,
    responses(
        (status = 201, description = "Draft created", body = ExpenseResponse),
        (status = 400, description = "Validation error or unsupported currency")
    )
)]
pub async fn create_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<CreateExpenseRequest>,
) -> AppResult<Created<ExpenseResponse>> {
    let expense = state
        .services
        .expenses()
        .create_expense(
            &user,
            ExpenseDraft {
                description: payload.description,
                category: payload.category,
                amount: payload.amount,
                currency: payload.currency,
                expense_date: payload.expense_date,
                paid_by: payload.paid_by,
                remarks: payload.remarks,
            },
        )
        .await?;

    Ok(Created(expense))
}

/// An expense with its approval chain
#[utoipa::path(
    get,
    path = "/expenses/{id}",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Expense", body = ExpenseResponse),
        (status = 403, description = "Not allowed to view this expense"),
        (status = 404, description = "Expense not found")
    )
)]
pub async fn get_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ExpenseResponse>> {
    let expense = state.services.expenses().get_expense(&user, id).await?;
    Ok(Json(expense))
}

/// Update a draft
#[utoipa::path(
    put,
    path = "/expenses/{id}",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body = UpdateExpenseRequest,
    responses(
        (status = 200, description = "Draft updated", body = ExpenseResponse),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Expense is no longer a draft")
    )
)]
pub async fn update_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<UpdateExpenseRequest>,
) -> AppResult<Json<ExpenseResponse>> {
    let expense = state
        .services
        .expenses()
        .update_expense(
            &user,
            id,
            DraftChanges {
                description: payload.description,
                category: payload.category,
                amount: payload.amount,
                currency: payload.currency,
                expense_date: payload.expense_date,
                paid_by: payload.paid_by,
                remarks: payload.remarks,
            },
        )
        .await?;

    Ok(Json(expense))
}

/// Delete a draft
#[utoipa::path(
    delete,
    path = "/expenses/{id}",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Expense is no longer a draft")
    )
)]
pub async fn delete_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<NoContent> {
    state.services.expenses().delete_expense(&user, id).await?;
    Ok(NoContent)
}

/// Submit a draft for approval
#[utoipa::path(
    post,
    path = "/expenses/{id}/submit",
    tag = "Expenses",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    responses(
        (status = 200, description = "Submitted; approved at once when no approver applies", body = ExpenseResponse),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Expense is no longer a draft")
    )
)]
pub async fn submit_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ExpenseResponse>> {
    let expense = state.services.expenses().submit_expense(&user, id).await?;
    Ok(Json(expense))
}

/// Approve an expense awaiting the caller
#[utoipa::path(
    post,
    path = "/expenses/{id}/approve",
    tag = "Approvals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body(content = ApproveRequest, description = "Optional; an empty body approves without a comment"),
    responses(
        (status = 200, description = "Decision recorded", body = ExpenseResponse),
        (status = 403, description = "Caller is not an approver of this expense"),
        (status = 409, description = "Not awaiting the caller's decision")
    )
)]
pub async fn approve_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> AppResult<Json<ExpenseResponse>> {
    // The body is optional; an empty one approves without a comment.
    let payload: ApproveRequest = if body.is_empty() {
        ApproveRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::validation(e.to_string()))?
    };
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let expense = state
        .services
        .expenses()
        .approve(&user, id, payload.comment)
        .await?;

    Ok(Json(expense))
}

/// Reject an expense awaiting the caller
#[utoipa::path(
    post,
    path = "/expenses/{id}/reject",
    tag = "Approvals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Decision recorded", body = ExpenseResponse),
        (status = 400, description = "Comment missing"),
        (status = 403, description = "Caller is not an approver of this expense"),
        (status = 409, description = "Not awaiting the caller's decision")
    )
)]
pub async fn reject_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<RejectRequest>,
) -> AppResult<Json<ExpenseResponse>> {
    let expense = state
        .services
        .expenses()
        .reject(&user, id, payload.comment)
        .await?;

    Ok(Json(expense))
}

/// Force the outcome of a pending expense (admins only)
#[utoipa::path(
    post,
    path = "/expenses/{id}/override",
    tag = "Approvals",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Expense ID")),
    request_body = OverrideRequest,
    responses(
        (status = 200, description = "Expense settled", body = ExpenseResponse),
        (status = 403, description = "Admins only"),
        (status = 409, description = "Expense is not pending")
    )
)]
pub async fn override_expense(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<OverrideRequest>,
) -> AppResult<Json<ExpenseResponse>> {
    let expense = state
        .services
        .expenses()
        .override_decision(&user, id, payload.decision, payload.comment)
        .await?;

    Ok(Json(expense))
}

/// Expenses waiting for the caller's decision
#[utoipa::path(
    get,
    path = "/approvals/pending",
    tag = "Approvals",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Pending approvals, oldest first", body = [ExpenseResponse])
    )
)]
pub async fn pending_approvals(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> AppResult<Json<Vec<ExpenseResponse>>> {
    let expenses = state.services.expenses().pending_approvals(&user).await?;
    Ok(Json(expenses))
}
