//! Narrative text normalization.

/// Joins the present, non-blank secondary narratives with single spaces.
///
/// Always returns a string; a record with no secondary text yields `""`.
#[must_use]
pub fn combine_secondary(fields: &[Option<String>]) -> String {
    fields
        .iter()
        .flatten()
        .map(String::as_str)
        .filter(|field| !field.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
