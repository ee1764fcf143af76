//! NFC tag labels, uid generation, and the access-grant decision.

use chrono::{DateTime, Utc};
use rand::Rng;

/// Display label for the n-th tag registered on an object (1-based):
/// A..Z, then AA, AB and so on.
pub fn sequential_label(mut n: u32) -> String {
    let mut label = String::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        n = (n - 1) / 26;
        label.insert(0, (b'A' + rem as u8) as char);
    }
    label
}

/// Random 7-byte tag uid, colon-separated uppercase hex. The first
/// byte is fixed at 0x02, the manufacturer prefix the readers expect.
pub fn generate_tag_uid() -> String {
    let tail: [u8; 6] = rand::thread_rng().gen();
    let mut parts = vec!["02".to_string()];
    parts.extend(tail.iter().map(|b| format!("{b:02X}")));
    parts.join(":")
}

/// Observed state of an access grant at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantState {
    /// No grant row exists
    Missing,
    /// Grant exists but its expiry is in the past; the caller must
    /// delete the row (expiry is lazy, there is no background sweep)
    Expired,
    /// Grant exists, is not expired, but was switched off
    Inactive,
    /// Grant proves presence
    Active,
}

/// Classify a grant row as of `now`. Expiry wins over the active flag;
/// a grant without an expiry never expires.
pub fn grant_state(
    grant: Option<(bool, Option<DateTime<Utc>>)>,
    now: DateTime<Utc>,
) -> GrantState {
    match grant {
        None => GrantState::Missing,
        Some((_, Some(expires_at))) if expires_at < now => GrantState::Expired,
        Some((true, _)) => GrantState::Active,
        Some((false, _)) => GrantState::Inactive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn labels_follow_spreadsheet_order() {
        assert_eq!(sequential_label(1), "A");
        assert_eq!(sequential_label(2), "B");
        assert_eq!(sequential_label(26), "Z");
        assert_eq!(sequential_label(27), "AA");
        assert_eq!(sequential_label(28), "AB");
        assert_eq!(sequential_label(53), "BA");
        assert_eq!(sequential_label(702), "ZZ");
        assert_eq!(sequential_label(703), "AAA");
    }

    #[test]
    fn uid_has_fixed_prefix_and_seven_hex_bytes() {
        let uid = generate_tag_uid();
        let parts: Vec<&str> = uid.split(':').collect();
        assert_eq!(parts.len(), 7);
        assert_eq!(parts[0], "02");
        for part in parts {
            assert_eq!(part.len(), 2);
            assert!(part.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        }
    }

    #[test]
    fn grant_classification() {
        let now = Utc::now();
        let future = Some(now + Duration::minutes(30));
        let past = Some(now - Duration::minutes(1));

        assert_eq!(grant_state(None, now), GrantState::Missing);
        assert_eq!(grant_state(Some((true, past)), now), GrantState::Expired);
        assert_eq!(grant_state(Some((false, past)), now), GrantState::Expired);
        assert_eq!(grant_state(Some((false, future)), now), GrantState::Inactive);
        assert_eq!(grant_state(Some((true, future)), now), GrantState::Active);
        assert_eq!(grant_state(Some((true, None)), now), GrantState::Active);
    }

    #[test]
    fn expiry_at_exactly_now_is_still_valid() {
        let now = Utc::now();
        assert_eq!(grant_state(Some((true, Some(now))), now), GrantState::Active);
    }
}
