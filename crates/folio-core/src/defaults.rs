//! Centralized default constants for folio.
//!
//! Handlers, repositories, and tests reference these constants instead of
//! repeating magic numbers.

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for note listings.
pub const PAGE_LIMIT: i64 = 10;

/// Largest page size a client may request.
pub const PAGE_LIMIT_MAX: i64 = 100;

/// First page number (pages are 1-based).
pub const FIRST_PAGE: i64 = 1;

// =============================================================================
// NOTES
// =============================================================================

/// Maximum title length in characters.
pub const TITLE_MAX_LEN: usize = 255;

/// Maximum lead (teaser) length in characters.
pub const LEAD_MAX_LEN: usize = 500;

/// Maximum tag name length in characters.
pub const TAG_NAME_MAX_LEN: usize = 255;

/// Node type tag that marks an embedded image in a content tree.
pub const IMAGE_NODE_TYPE: &str = "image";

// =============================================================================
// USERS
// =============================================================================

/// Maximum first/last name and email length.
pub const NAME_MAX_LEN: usize = 255;

/// Maximum username length.
pub const USERNAME_MAX_LEN: usize = 50;

/// Minimum password length.
pub const PASSWORD_MIN_LEN: usize = 8;

/// Maximum bio length.
pub const BIO_MAX_LEN: usize = 500;

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum size of a single uploaded file (10 MiB).
pub const UPLOAD_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Maximum number of files in one upload request.
pub const UPLOAD_MAX_FILES: usize = 5;

/// Length of the random suffix appended to stored upload filenames.
pub const UPLOAD_RANDOM_SUFFIX_LEN: usize = 16;

/// Directory (relative to the storage root) that holds user uploads.
pub const UPLOAD_DIR: &str = "uploads";

/// URL prefix under which the storage root is served.
pub const STORAGE_URL_PREFIX: &str = "/storage";

// =============================================================================
// AUTH TOKENS
// =============================================================================

/// Prefix of every issued bearer token.
pub const TOKEN_PREFIX: &str = "fo_tok_";

/// Length of the random part of a bearer token.
pub const TOKEN_SECRET_LEN: usize = 40;

/// Name recorded for tokens issued by register/login.
pub const TOKEN_NAME_BEARER: &str = "bearer";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_limit_within_max() {
        assert!(PAGE_LIMIT <= PAGE_LIMIT_MAX);
        assert!(FIRST_PAGE >= 1);
    }

    #[test]
    fn test_upload_limits() {
        assert_eq!(UPLOAD_MAX_BYTES, 10_485_760);
        assert_eq!(UPLOAD_MAX_FILES, 5);
    }
}
