//! Content-image lifecycle: ownership validation and orphan reaping.
//!
//! Both halves work against an [`ImageCatalog`], which the database layer
//! binds to the transaction that writes the note. Nothing here touches the
//! storage backend; the reaper returns the storage paths of deleted images so
//! the caller can remove the backing files once the transaction has
//! committed.

use serde_json::Value as JsonValue;
use tracing::{debug, info};

use crate::content::unique_image_ids;
use crate::error::{Error, Result};
use crate::models::ReapedImage;
use crate::traits::ImageCatalog;

/// Request field name reported for images embedded in the content tree.
pub const CONTENT_FIELD: &str = "content";

/// Request field name reported for the main visual.
pub const MAIN_VISUAL_FIELD: &str = "main_visual_id";

/// Check that every image embedded in `content` belongs to `user_id`.
///
/// The whole tree is scanned before anything is written. The first image
/// that is missing or owned by someone else fails the call with
/// [`Error::ImageNotOwned`]. On success the de-duplicated referenced ids are
/// returned, ready to be written to the reference table.
pub async fn validate_content_ownership<C>(
    catalog: &mut C,
    user_id: i64,
    content: &JsonValue,
) -> Result<Vec<i64>>
where
    C: ImageCatalog + ?Sized,
{
    let ids = unique_image_ids(content);
    for &image_id in &ids {
        let owner = catalog.image_owner(image_id).await?;
        if owner != Some(Some(user_id)) {
            debug!(
                subsystem = "lifecycle",
                component = "validator",
                user_id,
                image_id,
                exists = owner.is_some(),
                "Rejected content image reference"
            );
            return Err(Error::ImageNotOwned {
                field: CONTENT_FIELD.to_string(),
                image_id,
            });
        }
    }
    Ok(ids)
}

/// Check that the proposed main visual exists and belongs to `user_id`.
pub async fn validate_main_visual<C>(catalog: &mut C, user_id: i64, image_id: i64) -> Result<()>
where
    C: ImageCatalog + ?Sized,
{
    match catalog.image_owner(image_id).await? {
        None => Err(Error::ImageNotFound(image_id)),
        Some(owner) if owner == Some(user_id) => Ok(()),
        Some(_) => Err(Error::ImageNotOwned {
            field: MAIN_VISUAL_FIELD.to_string(),
            image_id,
        }),
    }
}

/// Delete the images in `removed` that nothing references any more.
///
/// An image is deleted only when it belongs to `user_id`, is no note's main
/// visual, and no note other than `note_id` still embeds it. The reference
/// rows of `note_id` must already reflect its new content. Candidates are
/// locked in ascending id order. Ids that no longer exist are skipped, so a
/// second run over the same ids is a no-op.
pub async fn reap_orphans<C>(
    catalog: &mut C,
    user_id: i64,
    note_id: i64,
    removed: &[i64],
) -> Result<Vec<ReapedImage>>
where
    C: ImageCatalog + ?Sized,
{
    let mut candidates = removed.to_vec();
    candidates.sort_unstable();
    candidates.dedup();

    let mut reaped = Vec::new();
    for image_id in candidates {
        let Some(image) = catalog.lock_image(image_id).await? else {
            debug!(subsystem = "lifecycle", component = "reaper", image_id, "Image already gone");
            continue;
        };

        if image.user_id != Some(user_id) {
            debug!(
                subsystem = "lifecycle",
                component = "reaper",
                image_id,
                user_id,
                "Retained: owned by another user"
            );
            continue;
        }
        if catalog.is_main_visual(image_id).await? {
            debug!(subsystem = "lifecycle", component = "reaper", image_id, "Retained: main visual");
            continue;
        }
        if catalog.is_referenced_elsewhere(image_id, note_id).await? {
            debug!(
                subsystem = "lifecycle",
                component = "reaper",
                image_id,
                note_id,
                "Retained: referenced by another note"
            );
            continue;
        }

        catalog.delete_image(image_id).await?;
        reaped.push(ReapedImage {
            id: image_id,
            storage_path: image.storage_path,
        });
    }

    if !reaped.is_empty() {
        info!(
            subsystem = "lifecycle",
            component = "reaper",
            op = "reap",
            note_id,
            removed_count = removed.len(),
            reaped_count = reaped.len(),
            "Reaped orphaned images"
        );
    }
    Ok(reaped)
}
