//! Address book rules: exactly one default once a buyer has any address.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Most addresses a single buyer may keep.
pub const MAX_ADDRESSES: i64 = 20;

/// Whether a newly created address becomes the default.
pub fn default_on_create(existing: i64, requested: bool) -> bool { existing == 0 || requested }

/// Picks the address to promote after the default was deleted: the newest one left.
pub fn successor(remaining: &[(Uuid, DateTime<Utc>)]) -> Option<Uuid> {
    remaining.iter().max_by_key(|(id, created)| (*created, *id)).map(|(id, _)| *id)
}

/// Digits, spaces, `+` and `-`, with at least seven digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits) && phone.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' '))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_first_address_is_default() {
        assert!(default_on_create(0, false));
        assert!(default_on_create(3, true));
        assert!(!default_on_create(3, false));
    }

    #[test]
    fn test_successor_is_newest() {
        let now = Utc::now();
        let (old, new) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(successor(&[(old, now - Duration::days(2)), (new, now)]), Some(new));
        assert_eq!(successor(&[]), None);
    }

    #[test]
    fn test_phone() {
        assert!(is_valid_phone("+1 555-010-9999"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("555-CALL-NOW"));
    }
}
