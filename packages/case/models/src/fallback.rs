//! Preference-fallback combinator.
//!
//! Composite columns are built by walking an ordered list of candidate
//! sources and taking the first one that has a value. Final coordinates
//! use it directly (raw before geocoded) and composite classifications use
//! it through [`any_set`].

/// Returns the first present candidate, in order.
#[must_use]
pub fn prefer<T, I>(candidates: I) -> Option<T>
where
    I: IntoIterator<Item = Option<T>>,
{
    candidates.into_iter().flatten().next()
}

/// Whether any flag in the ordered subset is set.
#[must_use]
pub fn any_set<I>(flags: I) -> bool
where
    I: IntoIterator<Item = bool>,
{
    prefer(flags.into_iter().map(|flag| flag.then_some(()))).is_some()
}
