use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Number of characters in a judge access code.
pub const ACCESS_CODE_LEN: usize = 8;

/// How long a freshly issued (or regenerated) access code stays valid.
pub const ACCESS_CODE_TTL_DAYS: i64 = 7;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// generate_access_code
///
/// Draws `ACCESS_CODE_LEN` characters uniformly from `A-Z0-9`.
/// Uniqueness is left to the `judges_access_code_key` constraint; callers retry on collision.
pub fn generate_access_code() -> String {
    let mut rng = rand::thread_rng();
    (0..ACCESS_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Expiry of a code issued at `issued_at`: exactly seven days later.
pub fn access_code_expiry(issued_at: DateTime<Utc>) -> DateTime<Utc> {
    issued_at + Duration::days(ACCESS_CODE_TTL_DAYS)
}

/// Codes are stored upper-case, so sign-in is case-insensitive.
pub fn normalize_access_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Whole days left before `expires_at`, rounded up. Zero or negative once expired.
pub fn days_left(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let remaining_ms = (expires_at - now).num_milliseconds();
    let day_ms = Duration::days(1).num_milliseconds();
    if remaining_ms <= 0 {
        return remaining_ms / day_ms;
    }
    (remaining_ms + day_ms - 1) / day_ms
}
