// ============================================================================
// Configuration Constants
// ============================================================================

// Default port values
pub(crate) const DEFAULT_PORT: u16 = 3000;

pub(crate) const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

// Login tokens live for one hour
pub(crate) const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 3600;
pub(crate) const DEFAULT_JWT_ISSUER: &str = "gatekeeper";
pub(crate) const DEV_JWT_SECRET: &str = "supersecretkey";

// Downstream and store call bounds (in milliseconds)
pub(crate) const DEFAULT_BACKEND_SERVICE_URL: &str = "http://localhost:3001";
pub(crate) const DEFAULT_PROTECTED_PREFIX: &str = "/api";
pub(crate) const DEFAULT_PROXY_TIMEOUT_MS: u64 = 30_000;
pub(crate) const DEFAULT_STORE_TIMEOUT_MS: u64 = 500;

// Fallback bucket for routes without a stored config
pub(crate) const DEFAULT_RATE_CAPACITY: f64 = 10.0;
pub(crate) const DEFAULT_RATE_REFILL_RATE: f64 = 1.0;

// Tokens charged per proxied request; every bucket must hold at least this many
pub const REQUEST_COST: f64 = 1.0;

// HTTP request bodies forwarded by the proxy
pub const MAX_REQUEST_BODY_SIZE: usize = 2 * 1024 * 1024; // 2 MB
