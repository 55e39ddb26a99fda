//! Service constants for Tricorder.
//!
//! Cache lifetimes, interlock timing and the default Solana endpoints.
//! Everything tunable at runtime has a default here and an override in the
//! API configuration.

// ═══════════════════════════════════════════════════════════════════════════════
// SERVICE IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Service name, returned by `GET /` and sent in the `x-moon-art` header.
pub const SERVICE_NAME: &str = "tricorder";

/// Default listen address for the HTTP server.
pub const DEFAULT_LISTEN_ADDR: &str = "localhost:8080";

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// How long a successfully fetched transaction stays cached, in seconds.
/// Also used as the HTTP `max-age` for successful responses.
pub const TX_CACHE_MAX_AGE_SECS: u64 = 60;

/// How long a failed fetch is remembered, in seconds.
/// Short enough to allow a retry, long enough to shed load from a failing backend.
pub const NEGATIVE_CACHE_TTL_SECS: u64 = 60;

/// How often the background sweep runs, in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// How long an expired entry may stay resident before the sweep removes it, in seconds.
pub const SWEEP_GRACE_SECS: u64 = 15 * 60;

/// HTTP `max-age` for the invalid-version response, in seconds.
pub const INVALID_VERSION_MAX_AGE_SECS: u64 = 600;

// ═══════════════════════════════════════════════════════════════════════════════
// INTERLOCK TIMING
// ═══════════════════════════════════════════════════════════════════════════════

/// Lower bound of the follower poll interval, in microseconds.
pub const MIN_YIELD_MICROS: u64 = 100;

/// Upper bound (inclusive) of the follower poll interval, in microseconds.
pub const MAX_YIELD_MICROS: u64 = 200;

// ═══════════════════════════════════════════════════════════════════════════════
// SOLANA ENDPOINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Devnet RPC endpoints.
pub const DEVNET_ENDPOINTS: &[&str] = &["https://api.devnet.solana.com"];

/// Public mainnet RPC endpoints, tried in order.
pub const PUBLIC_ENDPOINTS: &[&str] = &[
    "https://explorer-api.mainnet-beta.solana.com/",
    "https://mainnet.rpcpool.com/",
    "https://api.metaplex.solana.com/",
];

/// Environment variable holding `;`-separated private endpoints.
pub const PRIVATE_ENDPOINTS_ENV: &str = "TRICORDER_PRIVATE_ENDPOINTS";

/// Requests per second allowed per public endpoint.
pub const PUBLIC_REQUESTS_PER_ENDPOINT: u32 = 2;

/// Requests per second allowed per CPU when using private endpoints.
pub const PRIVATE_REQUESTS_PER_CPU: u32 = 4;

// ═══════════════════════════════════════════════════════════════════════════════
// SIGNATURES
// ═══════════════════════════════════════════════════════════════════════════════

/// Size of an ed25519 transaction signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// Longest base58 rendering of a 64-byte signature.
pub const MAX_SIGNATURE_LEN: usize = 88;
