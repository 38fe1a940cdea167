//! # folio-core
//!
//! Core types, traits, and the content-image lifecycle for folio.
//!
//! This crate provides the data model and repository traits the other folio
//! crates depend on, plus the pure logic that keeps uploaded images in sync
//! with the notes that embed them: content tree scanning, reference diffing,
//! ownership validation, and orphan reaping.

pub mod content;
pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod slug;
pub mod traits;

// Re-export commonly used types at crate root
pub use content::{image_ids, is_content_tree, removed_image_ids, unique_image_ids};
pub use error::{Error, Result};
pub use file_safety::{
    clean_file_stem, detect_content_type, storage_extension, validate_file, FileVerdict,
};
pub use lifecycle::{reap_orphans, validate_content_ownership, validate_main_visual};
pub use models::*;
pub use slug::{date_slug, slugify};
pub use traits::*;
