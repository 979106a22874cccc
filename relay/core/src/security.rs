//! Security Module
//!
//! Validation applied where untrusted input enters the relay:
//! - Oversized or malformed request messages
//! - Request floods
//! - File names that would escape the storage directories
//!
//! # Design Philosophy
//!
//! Validation happens before a stream is opened, so a rejected request gets
//! a plain HTTP error instead of an event stream. All checks fail closed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration limits for the relay
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayLimits {
    /// Maximum size of a single message in bytes (default: 100KB)
    pub max_message_size: usize,
    /// Maximum requests per minute across all clients (default: 30)
    pub max_messages_per_minute: u32,
    /// Maximum upload size in bytes (default: 2GB)
    pub max_upload_bytes: u64,
    /// Maximum file name length in bytes (default: 255)
    pub max_filename_length: usize,
    /// Maximum number of selected files attached to one message (default: 16)
    pub max_selected_files: usize,
}

impl Default for RelayLimits {
    fn default() -> Self {
        Self {
            max_message_size: 100 * 1024, // 100KB
            max_messages_per_minute: 30,
            max_upload_bytes: 2 * 1024 * 1024 * 1024, // 2GB
            max_filename_length: 255,
            max_selected_files: 16,
        }
    }
}

impl RelayLimits {
    /// Apply overrides from a variable lookup
    #[must_use]
    pub fn with_env(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
            fallback: T,
        ) -> T {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(fallback)
        }

        Self {
            max_message_size: parsed(&lookup, "RELAY_MAX_MESSAGE_SIZE", self.max_message_size),
            max_messages_per_minute: parsed(
                &lookup,
                "RELAY_MAX_MESSAGES_PER_MINUTE",
                self.max_messages_per_minute,
            ),
            max_upload_bytes: parsed(&lookup, "RELAY_MAX_UPLOAD_BYTES", self.max_upload_bytes),
            max_filename_length: parsed(
                &lookup,
                "RELAY_MAX_FILENAME_LENGTH",
                self.max_filename_length,
            ),
            max_selected_files: parsed(
                &lookup,
                "RELAY_MAX_SELECTED_FILES",
                self.max_selected_files,
            ),
        }
    }
}

/// Result of input validation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input is invalid with reason
    Invalid(String),
    /// Input was rate limited
    RateLimited(String),
}

impl ValidationResult {
    /// Check if the result indicates valid input
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Get the error message if invalid
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(msg) | Self::RateLimited(msg) => Some(msg),
        }
    }
}

/// Input validator for incoming requests
///
/// Validates user input before processing to prevent:
/// - Oversized messages
/// - Rate limiting bypass
/// - Control character injection
/// - Path traversal through file names
#[derive(Debug)]
pub struct InputValidator {
    limits: RelayLimits,
    /// Message count for rate limiting
    message_count: AtomicU32,
    /// When the current rate limit window started
    window_start: Mutex<Instant>,
}

impl InputValidator {
    /// Create a new input validator with the given limits
    #[must_use]
    pub fn new(limits: RelayLimits) -> Self {
        Self {
            limits,
            message_count: AtomicU32::new(0),
            window_start: Mutex::new(Instant::now()),
        }
    }

    /// Validate a user message and count it against the rate limit
    pub fn validate_message(&self, content: &str) -> ValidationResult {
        // Check rate limit first
        if let result @ ValidationResult::RateLimited(_) = self.check_rate_limit() {
            return result;
        }

        if content.trim().is_empty() {
            return ValidationResult::Invalid("Message is empty".to_string());
        }

        if content.len() > self.limits.max_message_size {
            return ValidationResult::Invalid(format!(
                "Message too large: {} bytes (max: {})",
                content.len(),
                self.limits.max_message_size
            ));
        }

        // Check for control characters (except newline, tab)
        if content
            .chars()
            .any(|c| c.is_control() && c != '\n' && c != '\t' && c != '\r')
        {
            return ValidationResult::Invalid(
                "Message contains invalid control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }

    /// Validate a bare file name (no directories)
    #[must_use]
    pub fn validate_filename(&self, name: &str) -> ValidationResult {
        if name.is_empty() {
            return ValidationResult::Invalid("File name is empty".to_string());
        }

        if name.len() > self.limits.max_filename_length {
            return ValidationResult::Invalid(format!(
                "File name too long: {} bytes (max: {})",
                name.len(),
                self.limits.max_filename_length
            ));
        }

        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return ValidationResult::Invalid(format!("Invalid file name: {name}"));
        }

        if name.chars().any(char::is_control) {
            return ValidationResult::Invalid(
                "File name contains control characters".to_string(),
            );
        }

        ValidationResult::Valid
    }

    /// Check and update rate limit
    fn check_rate_limit(&self) -> ValidationResult {
        let mut window_start = self.window_start.lock();
        let now = Instant::now();

        // Reset window if it's been more than a minute
        if now.duration_since(*window_start) >= Duration::from_secs(60) {
            *window_start = now;
            self.message_count.store(1, Ordering::SeqCst);
            return ValidationResult::Valid;
        }

        let count = self.message_count.fetch_add(1, Ordering::SeqCst) + 1;
        if count > self.limits.max_messages_per_minute {
            return ValidationResult::RateLimited(format!(
                "Rate limit exceeded: {} messages/minute (max: {})",
                count, self.limits.max_messages_per_minute
            ));
        }

        ValidationResult::Valid
    }

    /// Get the current limits
    #[must_use]
    pub fn limits(&self) -> &RelayLimits {
        &self.limits
    }
}
