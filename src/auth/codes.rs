//! One-time codes: role assignment OTPs and password reset tokens.
//!
//! Only SHA-256 digests are stored; the raw values go out by email.

use chrono::{DateTime, Utc};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::value_objects::Role;

/// Failed guesses allowed before an OTP is discarded.
pub const MAX_OTP_ATTEMPTS: i32 = 5;

/// Password reset token lifetime.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 60;

/// Six-digit numeric code.
pub fn generate_otp() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

/// Digest bound to the user so a code cannot be replayed across accounts.
pub fn hash_otp(user_id: Uuid, code: &str) -> String {
    sha256_hex(format!("{user_id}:{}", code.trim()).as_bytes())
}

/// 32 random bytes, hex encoded.
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_reset_token(token: &str) -> String {
    sha256_hex(token.trim().as_bytes())
}

fn sha256_hex(input: &[u8]) -> String {
    hex::encode(Sha256::digest(input))
}

/// Stored state of a pending role assignment code.
#[derive(Debug, Clone)]
pub struct PendingOtp {
    pub user_id: Uuid,
    pub code_hash: String,
    pub role: Role,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    /// Wrong code; the attempt counter should be bumped.
    Mismatch { remaining: i32 },
    /// Expired or out of attempts; the code should be discarded.
    Spent,
    WrongRole,
}

impl PendingOtp {
    pub fn check(&self, code: &str, role: Role, now: DateTime<Utc>) -> OtpCheck {
        if now >= self.expires_at || self.attempts >= MAX_OTP_ATTEMPTS {
            return OtpCheck::Spent;
        }
        if role != self.role {
            return OtpCheck::WrongRole;
        }
        if hash_otp(self.user_id, code) == self.code_hash {
            OtpCheck::Valid
        } else {
            OtpCheck::Mismatch { remaining: MAX_OTP_ATTEMPTS - self.attempts - 1 }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pending(code: &str, attempts: i32, expires_in: Duration) -> PendingOtp {
        let user_id = Uuid::new_v4();
        PendingOtp { user_id, code_hash: hash_otp(user_id, code), role: Role::Buyer, attempts, expires_at: Utc::now() + expires_in }
    }

    #[test]
    fn test_otp_format() {
        for _ in 0..50 {
            let code = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_otp_check() {
        let otp = pending("123456", 0, Duration::minutes(10));
        let now = Utc::now();
        assert_eq!(otp.check("123456", Role::Buyer, now), OtpCheck::Valid);
        assert_eq!(otp.check(" 123456 ", Role::Buyer, now), OtpCheck::Valid);
        assert_eq!(otp.check("654321", Role::Buyer, now), OtpCheck::Mismatch { remaining: 4 });
        assert_eq!(otp.check("123456", Role::Seller, now), OtpCheck::WrongRole);
    }

    #[test]
    fn test_otp_spent() {
        let expired = pending("123456", 0, Duration::minutes(-1));
        assert_eq!(expired.check("123456", Role::Buyer, Utc::now()), OtpCheck::Spent);
        let exhausted = pending("123456", MAX_OTP_ATTEMPTS, Duration::minutes(10));
        assert_eq!(exhausted.check("123456", Role::Buyer, Utc::now()), OtpCheck::Spent);
    }

    #[test]
    fn test_otp_hash_is_per_user() {
        assert_ne!(hash_otp(Uuid::new_v4(), "111111"), hash_otp(Uuid::new_v4(), "111111"));
    }

    #[test]
    fn test_reset_token() {
        let token = generate_reset_token();
        assert_eq!(token.len(), 64);
        assert_eq!(hash_reset_token(&token), hash_reset_token(&format!(" {token}\n")));
        assert_ne!(hash_reset_token(&token), token);
    }
}
