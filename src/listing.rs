//! Search and ordering parameters for list endpoints.
//!
//! `?search=smith` matches a substring of any of the resource's searchable
//! columns; `?ordering=-birth_date` sorts by a whitelisted field, descending
//! when prefixed with `-`.

use serde::Deserialize;

use crate::{Error, Result};

/// Query-string parameters accepted by every list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub ordering: Option<String>,
}

impl ListParams {
    /// Parse from a raw query string (without the leading `?`).
    pub fn from_query(query: Option<&str>) -> Result<Self> {
        let Some(query) = query.filter(|q| !q.is_empty()) else {
            return Ok(Self::default());
        };
        serde_urlencoded::from_str(query)
            .map_err(|e| Error::BadRequest(format!("Invalid query string: {e}")))
    }

    /// `LIKE` pattern for the search term, if one was given. Wildcards in
    /// the term match literally.
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref().map(str::trim)?;
        if term.is_empty() {
            return None;
        }
        let mut pattern = String::with_capacity(term.len() + 2);
        pattern.push('%');
        for c in term.chars() {
            if matches!(c, '%' | '_' | '\\') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        Some(pattern)
    }

    /// SQL `ORDER BY` expression for the requested ordering.
    ///
    /// `fields` maps public field names to column expressions; anything not
    /// listed is rejected.
    pub fn order_by(&self, fields: &[(&str, &str)], default: &str) -> Result<String> {
        let Some(requested) = self.ordering.as_deref().filter(|o| !o.is_empty()) else {
            return Ok(default.to_string());
        };
        let (name, direction) = match requested.strip_prefix('-') {
            Some(name) => (name, "DESC"),
            None => (requested, "ASC"),
        };
        fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, column)| format!("{column} {direction}"))
            .ok_or_else(|| Error::BadRequest(format!("Cannot order by {name}")))
    }
}

/// `(a LIKE ?n ESCAPE '\' OR ...)` over `columns`, or `1` when there are none.
pub fn search_clause(columns: &[&str], placeholder: &str) -> String {
    if columns.is_empty() {
        return "1".to_string();
    }
    let terms: Vec<String> = columns
        .iter()
        .map(|column| format!("{column} LIKE {placeholder} ESCAPE '\\'"))
        .collect();
    format!("({})", terms.join(" OR "))
}
