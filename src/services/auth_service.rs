//! Authentication service: company signup, login, tokens and password resets.
//!
//! Password hashing lives in the domain `Password` value object; multi-row
//! writes go through the unit of work.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Notifier;
use crate::config::{Config, OTP_PURPOSE_PASSWORD_RESET, SECONDS_PER_HOUR, TOKEN_TYPE_BEARER};
use crate::domain::currency::{is_currency_code, normalize_code};
use crate::domain::{
    Company, CurrencyConverter, NewCompany, NewOtp, NewUser, OtpCheck, OtpCode, Password, User,
    UserResponse, UserRole,
};
use crate::errors::{AppError, AppResult};
use crate::infra::UnitOfWork;

/// JWT claims payload
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub company_id: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

/// Token response returned after successful authentication
#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    /// JWT access token
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    /// Token type (always "Bearer")
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Token expiration time in seconds
    #[schema(example = 86400)]
    pub expires_in: i64,
}

/// New company with its first administrator
#[derive(Debug, Clone)]
pub struct Signup {
    pub company_name: String,
    pub country: String,
    pub currency: String,
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Result of a successful signup
#[derive(Debug, Serialize, ToSchema)]
pub struct SignupResponse {
    pub company: Company,
    pub user: UserResponse,
    pub token: TokenResponse,
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Create a company and its first admin in one transaction
    async fn signup(&self, signup: Signup) -> AppResult<SignupResponse>;

    /// Login and return JWT token
    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse>;

    /// Verify JWT token and extract claims
    fn verify_token(&self, token: &str) -> AppResult<Claims>;

    /// Resolve a token to its active user
    async fn authenticate(&self, token: &str) -> AppResult<User>;

    /// Mail a reset code to an active account. Unknown addresses succeed silently.
    async fn request_password_reset(&self, email: String) -> AppResult<()>;

    /// Consume a reset code and store the new password
    async fn reset_password(&self, email: String, code: String, new_password: String) -> AppResult<()>;

    async fn change_password(&self, user: &User, current: String, new_password: String) -> AppResult<()>;
}

/// Generate JWT token for a user
fn generate_token(user: &User, config: &Config) -> AppResult<TokenResponse> {
    let now = Utc::now();
    let expires_at = now + Duration::hours(config.jwt_expiration_hours);

    let claims = Claims {
        sub: user.id,
        company_id: user.company_id,
        email: user.email.clone(),
        role: user.role.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret_bytes()),
    )?;

    Ok(TokenResponse {
        access_token: token,
        token_type: TOKEN_TYPE_BEARER.to_string(),
        expires_in: config.jwt_expiration_hours * SECONDS_PER_HOUR,
    })
}

fn verify_token_internal(token: &str, config: &Config) -> AppResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret_bytes()),
        &Validation::default(),
    )?;

    Ok(token_data.claims)
}

/// E-mail addresses are compared trimmed and lower-case.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    config: Config,
    converter: Arc<CurrencyConverter>,
    notifier: Notifier,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        config: Config,
        converter: Arc<CurrencyConverter>,
        notifier: Notifier,
    ) -> Self {
        Self {
            uow,
            config,
            converter,
            notifier,
        }
    }
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn signup(&self, signup: Signup) -> AppResult<SignupResponse> {
        let currency = normalize_code(&signup.currency);
        if !is_currency_code(&currency) || !self.converter.supports(&currency) {
            return Err(AppError::validation(format!(
                "Unsupported currency: {}",
                currency
            )));
        }

        let email = normalize_email(&signup.email);
        let password_hash = Password::new(&signup.password)?.into_string();

        let new_company = NewCompany {
            name: signup.company_name.trim().to_string(),
            country: signup.country.trim().to_string(),
            currency,
        };
        let admin_name = signup.name.trim().to_string();

        let (company, user) = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    // Soft-deleted accounts keep their address reserved
                    if ctx.users().find_by_email_with_deleted(&email).await?.is_some() {
                        return Err(AppError::conflict("User"));
                    }

                    let company = ctx.companies().create(new_company).await?;
                    let user = ctx
                        .users()
                        .create(NewUser {
                            company_id: company.id,
                            email,
                            password_hash,
                            name: admin_name,
                            role: UserRole::Admin,
                            manager_id: None,
                        })
                        .await?;

                    Ok((company, user))
                })
            })
            .await?;

        tracing::info!(company_id = %company.id, user_id = %user.id, "Company registered");

        let token = generate_token(&user, &self.config)?;
        Ok(SignupResponse {
            company,
            user: UserResponse::from(user),
            token,
        })
    }

    async fn login(&self, email: String, password: String) -> AppResult<TokenResponse> {
        let email = normalize_email(&email);

        let Some(user) = self.uow.users().find_by_email(&email).await? else {
            // Same hashing work as a real check, so timing does not reveal accounts
            Password::verify_dummy(&password);
            return Err(AppError::InvalidCredentials);
        };

        if !Password::from_hash(user.password_hash.clone()).verify(&password) {
            return Err(AppError::InvalidCredentials);
        }

        generate_token(&user, &self.config)
    }

    fn verify_token(&self, token: &str) -> AppResult<Claims> {
        verify_token_internal(token, &self.config)
    }

    async fn authenticate(&self, token: &str) -> AppResult<User> {
        let claims = self.verify_token(token)?;

        // Deactivated users and moved accounts lose access before their token expires
        self.uow
            .users()
            .find_by_id(claims.sub)
            .await?
            .filter(|user| user.company_id == claims.company_id)
            .ok_or(AppError::Unauthorized)
    }

    async fn request_password_reset(&self, email: String) -> AppResult<()> {
        let email = normalize_email(&email);

        if self.uow.users().find_by_email(&email).await?.is_none() {
            tracing::debug!("Password reset requested for an unknown address");
            return Ok(());
        }

        let code = OtpCode::generate();
        let now = Utc::now();
        let ttl = Duration::minutes(self.config.otp_ttl_minutes);
        let record = NewOtp::new(&email, OTP_PURPOSE_PASSWORD_RESET, code.hash()?, ttl, now);

        let target = email.clone();
        self.uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    ctx.otps()
                        .consume_outstanding(&target, OTP_PURPOSE_PASSWORD_RESET, now)
                        .await?;
                    ctx.otps().create(record).await?;
                    Ok(())
                })
            })
            .await?;

        self.notifier
            .password_reset_code(&email, code.as_str(), self.config.otp_ttl_minutes)
            .await;

        Ok(())
    }

    async fn reset_password(&self, email: String, code: String, new_password: String) -> AppResult<()> {
        let email = normalize_email(&email);
        let password_hash = Password::new(&new_password)?.into_string();
        let now = Utc::now();

        let check = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    let otp = ctx
                        .otps()
                        .latest_outstanding(&email, OTP_PURPOSE_PASSWORD_RESET)
                        .await?
                        .ok_or_else(|| {
                            AppError::BadRequest("Reset code is invalid or has expired".to_string())
                        })?;

                    if otp.check(&code, now)? == OtpCheck::Mismatch {
                        // Committed so the attempt counts
                        ctx.otps().record_attempt(otp.id).await?;
                        return Ok(OtpCheck::Mismatch);
                    }

                    let user = ctx
                        .users()
                        .find_by_email_with_deleted(&email)
                        .await?
                        .filter(User::is_active)
                        .ok_or_else(|| {
                            AppError::BadRequest("Reset code is invalid or has expired".to_string())
                        })?;

                    ctx.users().update_password(user.id, password_hash).await?;
                    ctx.otps().consume(otp.id, now).await?;

                    tracing::info!(user_id = %user.id, "Password reset");
                    Ok(OtpCheck::Valid)
                })
            })
            .await?;

        match check {
            OtpCheck::Valid => Ok(()),
            OtpCheck::Mismatch => Err(AppError::BadRequest("Reset code is incorrect".to_string())),
        }
    }

    async fn change_password(&self, user: &User, current: String, new_password: String) -> AppResult<()> {
        if !Password::from_hash(user.password_hash.clone()).verify(&current) {
            return Err(AppError::InvalidCredentials);
        }

        let password_hash = Password::new(&new_password)?.into_string();
        self.uow.users().update_password(user.id, password_hash).await?;

        tracing::info!(user_id = %user.id, "Password changed");
        Ok(())
    }
}
