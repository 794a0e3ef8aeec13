//! Constants for Waypoint API

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_API_PORT: u16 = 3000;

/// Development server URL
pub const DEV_SERVER_URL: &str = "http://localhost:3000";

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// REQUEST LIMITS
// ============================================================================

/// Longest accepted program name, in characters
pub const MAX_PROGRAM_NAME_LEN: usize = 200;

/// Most topics accepted in one step-videos request
pub const MAX_TOPICS_PER_REQUEST: usize = 20;

// ============================================================================
// BACKGROUND JOBS
// ============================================================================

/// Default interval between expired-entry sweeps (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
