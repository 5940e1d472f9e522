//! Access tokens and expiry inspection.
//!
//! The session layer never verifies token signatures; that is the
//! server's job. It only peeks at the payload's `exp` claim to decide
//! when to renew. A token whose payload can't be read is treated as
//! already expiring, so it gets renewed before use rather than trusted.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use std::sync::atomic::{AtomicI64, Ordering};

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

// ---------------------------------------------------------------------------
// AccessToken
// ---------------------------------------------------------------------------

/// An opaque, encoded access token (`header.payload.signature`).
///
/// `Debug` and `Display` never print the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The encoded token, as sent in the `Authorization` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Expiry instant in epoch milliseconds, or `None` if the payload
    /// can't be decoded.
    pub fn expires_at_millis(&self) -> Option<i64> {
        decode_expiry_millis(&self.0)
    }

    /// Whether this token should be renewed before use at `now_millis`.
    pub fn is_expiring_soon(&self, now_millis: i64, buffer: Duration) -> bool {
        is_expiring_soon(self.expires_at_millis(), now_millis, buffer)
    }

    /// How long from `now_millis` until proactive renewal should fire.
    ///
    /// `None` when the expiry is unknown or the renewal point has already
    /// passed; the request path renews those on demand.
    pub fn renewal_delay(&self, now_millis: i64, buffer: Duration) -> Option<Duration> {
        let expiry = self.expires_at_millis()?;
        let delay = expiry
            .saturating_sub(now_millis)
            .saturating_sub(buffer_millis(buffer));
        (delay > 0).then(|| Duration::from_millis(delay as u64))
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Expiry math
// ---------------------------------------------------------------------------

/// Reads the `exp` claim (epoch seconds) from the token's middle segment
/// and returns it in epoch milliseconds.
///
/// Accepts both the URL-safe and standard base64 alphabets, with or
/// without padding. Returns `None` on any decoding failure, or when `exp`
/// is missing, not a number, or too large to express in milliseconds.
pub fn decode_expiry_millis(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let bytes = STANDARD_NO_PAD.decode(normalized).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?.as_f64()?;
    let millis = exp * 1000.0;
    // `as` would saturate silently; out-of-range claims count as unknown.
    if !(i64::MIN as f64..i64::MAX as f64).contains(&millis) {
        return None;
    }
    Some(millis as i64)
}

/// `true` if the expiry is unknown, or `now_millis >= expiry - buffer`.
pub fn is_expiring_soon(expires_at_millis: Option<i64>, now_millis: i64, buffer: Duration) -> bool {
    match expires_at_millis {
        None => true,
        Some(expiry) => now_millis >= expiry.saturating_sub(buffer_millis(buffer)),
    }
}

fn buffer_millis(buffer: Duration) -> i64 {
    i64::try_from(buffer.as_millis()).unwrap_or(i64::MAX)
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock time in epoch milliseconds.
///
/// Token expiry is an absolute wall-clock instant, so this can't use
/// `Instant`. Tests swap in [`ManualClock`].
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(now_millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(now_millis),
        }
    }

    pub fn set(&self, now_millis: i64) {
        self.millis.store(now_millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(buffer_millis(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}
