//! Shared constants for end-to-end tests
#![allow(dead_code)]

// ============================================================================
// Test Accounts
// ============================================================================

/// Controller account provisioned with a sha256 hash
pub const TEST_USER: &str = "controller";

pub const TEST_PASS: &str = "controllerpass123";

/// Admin account provisioned with an argon2 hash
pub const ADMIN_USER: &str = "admin";

pub const ADMIN_PASS: &str = "adminpass123";

// ============================================================================
// Test Media
// ============================================================================

pub const MEDIA_1_NAME: &str = "sunrise.jpg";

pub const MEDIA_1_BYTES: &[u8] = b"\xFF\xD8\xFF\xE0 not really a jpeg";

pub const MEDIA_2_NAME: &str = "intro clip.mp4";

pub const MEDIA_2_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake video";

// ============================================================================
// Timing
// ============================================================================

/// Maximum time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Upload limit used by test servers, small enough to exceed cheaply
pub const TEST_MAX_UPLOAD_BYTES: usize = 64 * 1024;
