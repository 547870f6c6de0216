//! Authentication handlers: signup, login and password resets.

use axum::{extract::State, response::Json, routing::post, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::errors::AppResult;
use crate::services::{Signup, SignupResponse, TokenResponse};
use crate::types::{Accepted, Created, MessageResponse};

/// Company registration with its first administrator
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100, message = "Company name must be 1-100 characters"))]
    #[schema(example = "Acme Corp")]
    pub company_name: String,
    #[validate(length(min = 1, max = 60, message = "Country must be 1-60 characters"))]
    #[schema(example = "India")]
    pub country: String,
    /// ISO-4217 code of the reporting currency
    #[validate(length(equal = 3, message = "Currency must be a three-letter code"))]
    #[schema(example = "INR")]
    pub currency: String,
    /// Administrator display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[schema(example = "Jane Admin")]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "admin@acme.example")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
}

/// User login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "SecurePass123!")]
    pub password: String,
}

/// Request a password reset code
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Set a new password with a mailed code
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[validate(length(equal = 6, message = "Reset code must be 6 digits"))]
    #[schema(example = "042917")]
    pub code: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "NewSecurePass123!", min_length = 8)]
    pub new_password: String,
}

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
}

/// Register a company and its first admin
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Authentication",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Company registered", body = SignupResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> AppResult<Created<SignupResponse>> {
    let response = state
        .services
        .auth()
        .signup(Signup {
            company_name: payload.company_name,
            country: payload.country,
            currency: payload.currency,
            name: payload.name,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok(Created(response))
}

/// Login and get JWT token
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let token = state
        .services
        .auth()
        .login(payload.email, payload.password)
        .await?;

    Ok(Json(token))
}

/// Mail a password reset code
///
/// Answers the same way whether or not the address has an account.
#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    tag = "Authentication",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 202, description = "Reset code sent if the account exists", body = MessageResponse),
        (status = 400, description = "Validation error")
    )
)]
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ForgotPasswordRequest>,
) -> AppResult<Accepted<MessageResponse>> {
    state
        .services
        .auth()
        .request_password_reset(payload.email)
        .await?;

    Ok(Accepted(MessageResponse::new(
        "If the account exists, a reset code has been sent",
    )))
}

/// Reset a password with a mailed code
#[utoipa::path(
    post,
    path = "/auth/password/reset",
    tag = "Authentication",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid, expired or incorrect code")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .auth()
        .reset_password(payload.email, payload.code, payload.new_password)
        .await?;

    Ok(Json(MessageResponse::new("Password has been reset")))
}
