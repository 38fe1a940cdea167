//! Structured logging field names shared by every folio crate.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (e.g. a backing file could not be removed) |
//! | INFO  | Lifecycle events, completed mutations (note created, image reaped) |
//! | DEBUG | Decision points (image retained, slug disambiguated) |
//! | TRACE | Per-node iteration |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event: "api", "db", "storage", "lifecycle".
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem, e.g. "reaper", "pool", "notes".
pub const COMPONENT: &str = "component";

/// Logical operation name, e.g. "update", "reap", "sync_tags".
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note being operated on.
pub const NOTE_ID: &str = "note_id";

/// Image being operated on.
pub const IMAGE_ID: &str = "image_id";

/// Acting user.
pub const USER_ID: &str = "user_id";

/// Storage path of a backing file.
pub const STORAGE_PATH: &str = "storage_path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of rows returned by a listing.
pub const RESULT_COUNT: &str = "result_count";

/// Number of images removed from a content tree by an update.
pub const REMOVED_COUNT: &str = "removed_count";

/// Number of images actually deleted by the reaper.
pub const REAPED_COUNT: &str = "reaped_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_field_names_are_unique_snake_case() {
        let fields = [
            REQUEST_ID, SUBSYSTEM, COMPONENT, OPERATION, NOTE_ID, IMAGE_ID, USER_ID,
            STORAGE_PATH, DURATION_MS, RESULT_COUNT, REMOVED_COUNT, REAPED_COUNT, POOL_SIZE,
            POOL_IDLE, ERROR_MSG,
        ];
        let unique: HashSet<_> = fields.iter().collect();
        assert_eq!(unique.len(), fields.len());
        for f in fields {
            assert!(f.chars().all(|c| c.is_ascii_lowercase() || c == '_'), "{}", f);
        }
    }
}
