/// Persisted expiries further out than this are treated as corrupt
pub const MAX_PERSISTED_LIFETIME_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// A portal bearer token and its absolute expiry (epoch milliseconds).
///
/// Tokens are replaced wholesale, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub value: String,
    pub expires_at: i64,
}

impl CachedToken {
    pub fn new(value: impl Into<String>, expires_at: i64) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Usable only while `now < expires_at - buffer`; the boundary itself counts as expired.
    pub fn is_usable_at(&self, now_ms: i64, buffer_ms: i64) -> bool {
        now_ms < self.expires_at.saturating_sub(buffer_ms)
    }

    pub fn is_usable(&self, buffer_ms: i64) -> bool {
        self.is_usable_at(now_ms(), buffer_ms)
    }

    /// First characters of the token, for log lines
    pub fn preview(&self) -> String {
        self.value.chars().take(8).collect()
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
