//! Query builder for note listing filters.
//!
//! Converts a [`ListNotesRequest`] into a parameterized SQL `WHERE` fragment
//! over the `note n` alias. Tag filters are conjunctive: a note matches only
//! when it carries every requested tag.

use std::collections::BTreeSet;

use folio_core::ListNotesRequest;

use crate::escape_like;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// Single BIGINT parameter.
    BigInt(i64),
    /// Array of BIGINTs (for ANY operations).
    BigIntArray(Vec<i64>),
    /// Text parameter.
    String(String),
    /// Array of text values.
    StringArray(Vec<String>),
}

/// Builds the `WHERE` fragment for a note listing.
///
/// # Example
///
/// ```rust,ignore
/// let req = ListNotesRequest { user_id: Some(4), ..Default::default() };
/// let (sql, params) = NoteFilterQueryBuilder::new(&req, 0).build();
/// // sql: "n.user_id = $1"
/// // params: [QueryParam::BigInt(4)]
/// ```
pub struct NoteFilterQueryBuilder<'a> {
    req: &'a ListNotesRequest,
    param_offset: usize,
}

impl<'a> NoteFilterQueryBuilder<'a> {
    /// Create a builder; placeholders start after `param_offset`.
    pub fn new(req: &'a ListNotesRequest, param_offset: usize) -> Self {
        Self { req, param_offset }
    }

    /// Build the clause and its parameters in placeholder order.
    ///
    /// Returns `("TRUE", [])` when no filter is set.
    pub fn build(&self) -> (String, Vec<QueryParam>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();
        let mut param_idx = self.param_offset;

        if let Some(id) = self.req.id {
            param_idx += 1;
            clauses.push(format!("n.id = ${}", param_idx));
            params.push(QueryParam::BigInt(id));
        }
        if let Some(user_id) = self.req.user_id {
            param_idx += 1;
            clauses.push(format!("n.user_id = ${}", param_idx));
            params.push(QueryParam::BigInt(user_id));
        }
        if let Some(slug) = self.req.slug.as_deref() {
            param_idx += 1;
            clauses.push(format!("n.slug = ${}", param_idx));
            params.push(QueryParam::String(slug.to_string()));
        }
        if let Some(title) = non_blank(self.req.title.as_deref()) {
            param_idx += 1;
            clauses.push(format!("n.title ILIKE ${} ESCAPE '\\'", param_idx));
            params.push(QueryParam::String(format!("%{}%", escape_like(title))));
        }
        if let Some(lead) = non_blank(self.req.lead.as_deref()) {
            param_idx += 1;
            clauses.push(format!("n.lead ILIKE ${} ESCAPE '\\'", param_idx));
            params.push(QueryParam::String(format!("%{}%", escape_like(lead))));
        }

        let tag_ids: BTreeSet<i64> = self.req.tag_ids.iter().copied().collect();
        if !tag_ids.is_empty() {
            let count = tag_ids.len() as i64;
            clauses.push(format!(
                "(SELECT COUNT(DISTINCT nt.tag_id) FROM note_tag nt \
                 WHERE nt.note_id = n.id AND nt.tag_id = ANY(${}::bigint[])) = ${}",
                param_idx + 1,
                param_idx + 2
            ));
            params.push(QueryParam::BigIntArray(tag_ids.into_iter().collect()));
            params.push(QueryParam::BigInt(count));
            param_idx += 2;
        }

        let tag_names: BTreeSet<String> = self
            .req
            .tag_names
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        if !tag_names.is_empty() {
            let count = tag_names.len() as i64;
            clauses.push(format!(
                "(SELECT COUNT(DISTINCT LOWER(t.name)) FROM note_tag nt JOIN tag t ON t.id = nt.tag_id \
                 WHERE nt.note_id = n.id AND LOWER(t.name) = ANY(${}::text[])) = ${}",
                param_idx + 1,
                param_idx + 2
            ));
            params.push(QueryParam::StringArray(tag_names.into_iter().collect()));
            params.push(QueryParam::BigInt(count));
        }

        if clauses.is_empty() {
            ("TRUE".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
