//! One-time codes for password resets.

use argon2::password_hash::rand_core::{OsRng, RngCore};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::password::{hash_secret, verify_secret};
use crate::config::{OTP_DIGITS, OTP_MAX_ATTEMPTS};
use crate::errors::{AppError, AppResult};

/// A freshly generated code. The plain value only lives long enough to be mailed.
pub struct OtpCode {
    code: String,
}

impl std::fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpCode").field("code", &"[REDACTED]").finish()
    }
}

impl OtpCode {
    pub fn generate() -> Self {
        let modulus = 10u32.pow(OTP_DIGITS);
        // Rejection sampling keeps the digits uniform.
        let limit = u32::MAX - (u32::MAX % modulus);
        let value = loop {
            let candidate = OsRng.next_u32();
            if candidate < limit {
                break candidate % modulus;
            }
        };

        Self {
            code: format!("{:0width$}", value, width = OTP_DIGITS as usize),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.code
    }

    pub fn hash(&self) -> AppResult<String> {
        hash_secret(&self.code)
    }
}

/// Stored code
#[derive(Debug, Clone)]
pub struct Otp {
    pub id: Uuid,
    pub email: String,
    pub code_hash: String,
    pub purpose: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Data required to store a code
#[derive(Debug, Clone)]
pub struct NewOtp {
    pub email: String,
    pub code_hash: String,
    pub purpose: String,
    pub expires_at: DateTime<Utc>,
}

impl NewOtp {
    pub fn new(email: &str, purpose: &str, code_hash: String, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            email: email.to_string(),
            code_hash,
            purpose: purpose.to_string(),
            expires_at: now + ttl,
        }
    }
}

/// Result of checking a submitted code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    /// Wrong code; the attempt counts
    Mismatch,
}

impl Otp {
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now && self.attempts < OTP_MAX_ATTEMPTS
    }

    /// Check `code` against this record.
    ///
    /// # Errors
    /// `BadRequest` when the code is expired, consumed or out of attempts.
    pub fn check(&self, code: &str, now: DateTime<Utc>) -> AppResult<OtpCheck> {
        if !self.is_usable(now) {
            return Err(AppError::BadRequest(
                "Reset code is invalid or has expired".to_string(),
            ));
        }

        if verify_secret(code.trim(), &self.code_hash) {
            Ok(OtpCheck::Valid)
        } else {
            Ok(OtpCheck::Mismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(code: &OtpCode, now: DateTime<Utc>) -> Otp {
        Otp {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            code_hash: code.hash().unwrap(),
            purpose: "password_reset".to_string(),
            attempts: 0,
            expires_at: now + Duration::minutes(10),
            consumed_at: None,
            created_at: now,
        }
    }

    #[test]
    fn test_generated_code_shape() {
        for _ in 0..20 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), 6);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_check_matches_code() {
        let now = Utc::now();
        let code = OtpCode::generate();
        let otp = stored(&code, now);

        assert_eq!(otp.check(code.as_str(), now).unwrap(), OtpCheck::Valid);
        let wrong = if code.as_str() == "000000" { "111111" } else { "000000" };
        assert_eq!(otp.check(wrong, now).unwrap(), OtpCheck::Mismatch);
    }

    #[test]
    fn test_expired_consumed_or_exhausted_code_fails() {
        let now = Utc::now();
        let code = OtpCode::generate();

        let expired = stored(&code, now - Duration::minutes(11));
        assert!(expired.check(code.as_str(), now).is_err());

        let consumed = Otp {
            consumed_at: Some(now),
            ..stored(&code, now)
        };
        assert!(consumed.check(code.as_str(), now).is_err());

        let exhausted = Otp {
            attempts: OTP_MAX_ATTEMPTS,
            ..stored(&code, now)
        };
        assert!(exhausted.check(code.as_str(), now).is_err());
    }
}
