#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Drug-class classification of cause-of-death narratives.
//!
//! Every record is checked against every [`DrugClass`] twice: once in the
//! primary cause narrative and once in the combined secondary narratives.
//! Matching is a case-insensitive substring test against the class's
//! [`Taxonomy`] terms, so a term also hits longer words that contain it.
//! [`CompositeRule`]s then OR selected flags into named summary columns.

pub mod composite;
pub mod taxonomy;
pub mod text;

use case_enrich_case_models::CaseRecord;
use thiserror::Error;

pub use composite::{ClassFlags, CompositeRule, FlagRef, TextSource, validate_composites};
pub use taxonomy::{DrugClass, Taxonomy};
pub use text::combine_secondary;

/// Errors from taxonomy and composite validation.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// A class name that is not a [`DrugClass`].
    #[error("unknown drug class '{0}'")]
    UnknownClass(String),

    /// A flag source other than `primary` or `secondary`.
    #[error("unknown text source '{0}': expected 'primary' or 'secondary'")]
    UnknownTextSource(String),

    /// A flag reference without the `class:source` separator.
    #[error("malformed flag reference '{0}': expected 'class:source'")]
    MalformedFlag(String),

    /// The taxonomy has no entry for a class.
    #[error("taxonomy is missing drug class '{0}'")]
    MissingClass(DrugClass),

    /// A taxonomy class with no search terms.
    #[error("drug class '{0}' has no search terms")]
    EmptyClass(DrugClass),

    /// A taxonomy term that is empty after trimming. It would match every
    /// text.
    #[error("drug class '{class}' has a blank search term")]
    BlankTerm {
        /// The class containing the blank term.
        class: DrugClass,
    },

    /// A composite rule that cannot be evaluated or named.
    #[error("invalid composite '{name}': {reason}")]
    InvalidComposite {
        /// The rule's configured name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Whether `text` contains any of `terms`, ignoring case.
///
/// `terms` must already be lower-cased, as [`Taxonomy`] stores them.
/// Absent text never matches.
#[must_use]
pub fn classify(text: Option<&str>, terms: &[String]) -> bool {
    text.is_some_and(|text| contains_any(&text.to_lowercase(), terms))
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

/// The classification columns for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseClassification {
    pub case_number: String,
    /// The record's secondary narratives joined with spaces.
    pub secondary_combined: String,
    pub primary: ClassFlags,
    pub secondary: ClassFlags,
    /// One value per composite rule, in rule order.
    pub composites: Vec<bool>,
}

impl CaseClassification {
    /// Flags computed from one text source.
    #[must_use]
    pub const fn flags(&self, source: TextSource) -> &ClassFlags {
        match source {
            TextSource::Primary => &self.primary,
            TextSource::Secondary => &self.secondary,
        }
    }
}

/// Classifies one record against every class and composite rule.
#[must_use]
pub fn classify_case(
    record: &CaseRecord,
    taxonomy: &Taxonomy,
    composites: &[CompositeRule],
) -> CaseClassification {
    let secondary_combined = combine_secondary(&record.secondary_causes);
    let primary = ClassFlags::evaluate(taxonomy, record.primary_cause.as_deref());
    let secondary = ClassFlags::evaluate(taxonomy, Some(&secondary_combined));
    let composites = composites
        .iter()
        .map(|rule| rule.evaluate(&primary, &secondary))
        .collect();

    CaseClassification {
        case_number: record.case_number.clone(),
        secondary_combined,
        primary,
        secondary,
        composites,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::test_taxonomy;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn matches_any_term_case_insensitively() {
        let opioids = terms(&["fentanyl", "heroin", "oxycodone"]);
        assert!(classify(
            Some("Death due to fentanyl and heroin toxicity"),
            &opioids
        ));
        assert!(classify(Some("ACUTE OXYCODONE INTOXICATION"), &opioids));
    }

    #[test]
    fn absent_or_unmatched_text_is_false() {
        let opioids = terms(&["fentanyl", "heroin"]);
        assert!(!classify(None, &opioids));
        assert!(!classify(Some(""), &opioids));
        assert!(!classify(Some("Blunt force injuries"), &opioids));
    }

    #[test]
    fn matches_inside_longer_words() {
        assert!(classify(
            Some("Methamphetamine toxicity"),
            &terms(&["amphetamine"])
        ));
    }

    #[test]
    fn classifies_both_sources_and_composites() {
        let taxonomy = test_taxonomy();
        let rule = CompositeRule::new(
            "fentanyl",
            vec![
                "fentanyl:primary".parse().unwrap(),
                "fentanyl_analog:secondary".parse().unwrap(),
            ],
        )
        .unwrap();

        let record = CaseRecord {
            primary_cause: Some("Mixed drug toxicity".to_string()),
            secondary_causes: vec![
                Some("Carfentanil".to_string()),
                None,
                Some("cocaine use".to_string()),
            ],
            ..CaseRecord::new("19-0042")
        };
        let result = classify_case(&record, &taxonomy, &[rule]);

        assert_eq!(result.case_number, "19-0042");
        assert_eq!(result.secondary_combined, "Carfentanil cocaine use");
        assert!(!result.primary.get(DrugClass::Fentanyl));
        assert!(result.secondary.get(DrugClass::FentanylAnalog));
        assert!(result.flags(TextSource::Secondary).get(DrugClass::Cocaine));
        assert!(!result.flags(TextSource::Primary).get(DrugClass::Cocaine));
        assert_eq!(result.composites, [true]);
    }

    #[test]
    fn record_without_narratives_flags_nothing() {
        let result = classify_case(&CaseRecord::new("A"), &test_taxonomy(), &[]);
        assert_eq!(result.secondary_combined, "");
        assert_eq!(result.primary, ClassFlags::default());
        assert_eq!(result.secondary, ClassFlags::default());
        assert!(result.composites.is_empty());
    }
}
