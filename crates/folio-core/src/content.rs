//! Content tree scanning.
//!
//! Note content is a rich-text document tree: every node is a JSON object
//! with a `type` tag, optional `attrs`, and an optional ordered `content`
//! array of child nodes. Embedded images are nodes of type `"image"` whose
//! `attrs.image_id` points at an uploaded [`Image`](crate::Image).
//!
//! The scan is lenient. Nodes that do not look like image references
//! (missing `type`, missing or malformed `attrs.image_id`, non-object
//! entries) are skipped without error.

use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::defaults::IMAGE_NODE_TYPE;

/// Collect every image id referenced by `content`, in document order.
///
/// Traversal is depth-first pre-order: a node is inspected before its
/// children, and siblings are visited left to right. The root may be a
/// single node (`{"type": "doc", "content": [...]}`) or an array of nodes.
/// Duplicates are preserved; see [`unique_image_ids`].
///
/// ```
/// use folio_core::content::image_ids;
/// use serde_json::json;
///
/// let doc = json!({"type": "doc", "content": [{"type": "image", "attrs": {"image_id": 7}}]});
/// assert_eq!(image_ids(&doc), vec![7]);
/// ```
pub fn image_ids(content: &JsonValue) -> Vec<i64> {
    let mut ids = Vec::new();
    visit(content, &mut |id| ids.push(id));
    ids
}

/// Image ids referenced by `content`, de-duplicated, in first-occurrence order.
pub fn unique_image_ids(content: &JsonValue) -> Vec<i64> {
    let mut seen = HashSet::new();
    image_ids(content)
        .into_iter()
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Image ids present in `old` but absent from `new`.
///
/// Set difference: each id appears at most once, in the order it first
/// occurs in `old`.
pub fn removed_image_ids(old: &JsonValue, new: &JsonValue) -> Vec<i64> {
    let still_used: HashSet<i64> = image_ids(new).into_iter().collect();
    unique_image_ids(old)
        .into_iter()
        .filter(|id| !still_used.contains(id))
        .collect()
}

/// Whether `content` is shaped like a content tree root (object or array).
pub fn is_content_tree(content: &JsonValue) -> bool {
    content.is_object() || content.is_array()
}

fn visit(value: &JsonValue, on_image: &mut impl FnMut(i64)) {
    match value {
        JsonValue::Array(nodes) => {
            for node in nodes {
                if node.is_object() {
                    visit(node, on_image);
                }
            }
        }
        JsonValue::Object(node) => {
            if node.get("type").and_then(JsonValue::as_str) == Some(IMAGE_NODE_TYPE) {
                if let Some(id) = node
                    .get("attrs")
                    .and_then(|attrs| attrs.get("image_id"))
                    .and_then(parse_image_id)
                {
                    on_image(id);
                }
            }
            if let Some(children) = node.get("content").filter(|c| c.is_array()) {
                visit(children, on_image);
            }
        }
        _ => {}
    }
}

/// Accept integer ids and strings holding a base-10 integer.
fn parse_image_id(value: &JsonValue) -> Option<i64> {
    let id = match value {
        JsonValue::Number(n) => n.as_i64()?,
        JsonValue::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(id: JsonValue) -> JsonValue {
        json!({"type": "image", "attrs": {"image_id": id}})
    }

    #[test]
    fn test_doc_root_with_single_image() {
        let doc = json!({"type": "doc", "content": [image(json!(7))]});
        assert_eq!(image_ids(&doc), vec![7]);
    }

    #[test]
    fn test_array_root() {
        let content = json!([image(json!(1)), {"type": "paragraph"}, image(json!(2))]);
        assert_eq!(image_ids(&content), vec![1, 2]);
    }

    #[test]
    fn test_pre_order_document_order() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [
                    {"type": "text", "text": "intro"},
                    image(json!(10)),
                ]},
                {"type": "blockquote", "content": [
                    {"type": "paragraph", "content": [image(json!(20))]},
                    image(json!(30)),
                ]},
                image(json!(40)),
            ]
        });
        assert_eq!(image_ids(&doc), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_image_node_checked_before_its_children() {
        let doc = json!([{
            "type": "image",
            "attrs": {"image_id": 1},
            "content": [image(json!(2))]
        }]);
        assert_eq!(image_ids(&doc), vec![1, 2]);
    }

    #[test]
    fn test_non_conforming_nodes_are_skipped() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "image"},
                {"type": "image", "attrs": {}},
                {"type": "image", "attrs": {"image_id": null}},
                {"type": "image", "attrs": {"image_id": 1.5}},
                {"type": "image", "attrs": {"image_id": true}},
                {"type": "image", "attrs": {"image_id": "abc"}},
                {"type": "image", "attrs": {"image_id": -4}},
                {"type": "Image", "attrs": {"image_id": 5}},
                {"attrs": {"image_id": 6}},
                {"type": "paragraph", "attrs": {"image_id": 8}},
                "stray string",
                42,
                null,
                {"type": "paragraph", "content": "not an array"},
                image(json!(9)),
            ]
        });
        assert_eq!(image_ids(&doc), vec![9]);
    }

    #[test]
    fn test_string_ids_are_accepted() {
        let doc = json!([image(json!("12")), image(json!(" 13 "))]);
        assert_eq!(image_ids(&doc), vec![12, 13]);
    }

    #[test]
    fn test_scalar_roots_yield_nothing() {
        assert!(image_ids(&json!(null)).is_empty());
        assert!(image_ids(&json!("doc")).is_empty());
        assert!(image_ids(&json!(7)).is_empty());
        assert!(image_ids(&json!({})).is_empty());
        assert!(image_ids(&json!([])).is_empty());
    }

    #[test]
    fn test_duplicates_preserved_then_deduplicated() {
        let doc = json!([image(json!(3)), image(json!(5)), image(json!(3))]);
        assert_eq!(image_ids(&doc), vec![3, 5, 3]);
        assert_eq!(unique_image_ids(&doc), vec![3, 5]);
    }

    #[test]
    fn test_removed_is_set_difference() {
        let old = json!({"type": "doc", "content": [image(json!(3)), image(json!(5))]});
        let new = json!({"type": "doc", "content": [image(json!(5))]});
        assert_eq!(removed_image_ids(&old, &new), vec![3]);
    }

    #[test]
    fn test_removed_has_no_duplicates() {
        let old = json!([image(json!(3)), image(json!(4)), image(json!(3)), image(json!(4))]);
        let new = json!([]);
        assert_eq!(removed_image_ids(&old, &new), vec![3, 4]);
    }

    #[test]
    fn test_removed_ignores_moved_and_added_images() {
        let old = json!([
            {"type": "paragraph", "content": [image(json!(1))]},
            image(json!(2)),
        ]);
        let new = json!([
            image(json!(2)),
            {"type": "blockquote", "content": [image(json!(1))]},
            image(json!(99)),
        ]);
        assert!(removed_image_ids(&old, &new).is_empty());
    }

    #[test]
    fn test_removed_matches_naive_difference() {
        // Every subset of {1..=4} as old and new content.
        for old_mask in 0u8..16 {
            for new_mask in 0u8..16 {
                let ids = |mask: u8| -> Vec<i64> {
                    (1..=4).filter(|i| mask & (1 << (i - 1)) != 0).collect()
                };
                let to_doc = |ids: &[i64]| -> JsonValue {
                    JsonValue::Array(ids.iter().map(|id| image(json!(id))).collect())
                };
                let old_ids = ids(old_mask);
                let new_ids = ids(new_mask);
                let expected: Vec<i64> = old_ids
                    .iter()
                    .copied()
                    .filter(|id| !new_ids.contains(id))
                    .collect();
                assert_eq!(
                    removed_image_ids(&to_doc(&old_ids), &to_doc(&new_ids)),
                    expected
                );
            }
        }
    }

    #[test]
    fn test_is_content_tree() {
        assert!(is_content_tree(&json!({"type": "doc"})));
        assert!(is_content_tree(&json!([])));
        assert!(!is_content_tree(&json!("text")));
        assert!(!is_content_tree(&json!(null)));
    }
}
