//! The drug-class taxonomy.
//!
//! [`DrugClass`] is the closed set of classes every record is flagged
//! against. A [`Taxonomy`] attaches search terms to each class and is
//! loaded from configuration, so the terms can change without a rebuild
//! while the set of classes (and therefore the output columns) cannot.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator as _};
use strum_macros::{AsRefStr, Display, EnumCount as EnumCountMacro, EnumIter, EnumString};

use crate::ClassifyError;

/// A drug class tracked by the classifier.
///
/// Canonical names are `snake_case` and double as the prefix of the
/// `<class>_primary` / `<class>_secondary` output columns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
    EnumCountMacro,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DrugClass {
    /// Any opioid, natural, semi-synthetic or synthetic.
    Opioid,
    Fentanyl,
    /// Fentanyl analogs and precursors (carfentanil, acetylfentanyl, ...).
    FentanylAnalog,
    Heroin,
    PrescriptionOpioid,
    /// Benzimidazole opioids (isotonitazene, metonitazene, ...).
    Nitazene,
    Cocaine,
    Methamphetamine,
    Benzodiazepine,
    Xylazine,
    Alcohol,
    Cannabinoid,
}

impl DrugClass {
    /// Position of this class in taxonomy order.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Search terms for every [`DrugClass`].
///
/// Terms are stored trimmed and lower-cased. Construction fails unless
/// every class is present with at least one non-blank term, so a loaded
/// taxonomy can always be indexed by any class.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<String>>")]
pub struct Taxonomy {
    terms: Vec<Vec<String>>,
}

impl Taxonomy {
    /// Builds a taxonomy from class names to search terms.
    ///
    /// # Errors
    ///
    /// * [`ClassifyError::UnknownClass`] if a key is not a [`DrugClass`] name
    /// * [`ClassifyError::MissingClass`] if a class has no entry
    /// * [`ClassifyError::EmptyClass`] if a class has no terms
    /// * [`ClassifyError::BlankTerm`] if a term is empty after trimming
    pub fn from_terms(map: BTreeMap<String, Vec<String>>) -> Result<Self, ClassifyError> {
        let mut slots: Vec<Option<Vec<String>>> = vec![None; DrugClass::COUNT];

        for (name, raw_terms) in map {
            let class: DrugClass = name
                .parse()
                .map_err(|_| ClassifyError::UnknownClass(name.clone()))?;

            let terms: Vec<String> = raw_terms
                .iter()
                .map(|term| term.trim().to_lowercase())
                .collect();
            if terms.is_empty() {
                return Err(ClassifyError::EmptyClass(class));
            }
            if terms.iter().any(String::is_empty) {
                return Err(ClassifyError::BlankTerm { class });
            }

            slots[class.index()] = Some(terms);
        }

        let terms = DrugClass::iter()
            .map(|class| slots[class.index()].take().ok_or(ClassifyError::MissingClass(class)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { terms })
    }

    /// Search terms for one class.
    #[must_use]
    pub fn terms(&self, class: DrugClass) -> &[String] {
        &self.terms[class.index()]
    }

    /// Every class with its terms, in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (DrugClass, &[String])> {
        DrugClass::iter().map(|class| (class, self.terms(class)))
    }
}

impl TryFrom<BTreeMap<String, Vec<String>>> for Taxonomy {
    type Error = ClassifyError;

    fn try_from(map: BTreeMap<String, Vec<String>>) -> Result<Self, Self::Error> {
        Self::from_terms(map)
    }
}

/// A complete taxonomy for unit tests: each class matches its own name
/// plus a few common members.
#[cfg(test)]
pub(crate) fn test_taxonomy() -> Taxonomy {
    let mut map: BTreeMap<String, Vec<String>> = DrugClass::iter()
        .map(|class| (class.to_string(), vec![class.to_string().replace('_', " ")]))
        .collect();
    map.insert(
        "opioid".to_string(),
        vec!["fentanyl".into(), "heroin".into(), "oxycodone".into()],
    );
    map.insert(
        "fentanyl_analog".to_string(),
        vec!["acetylfentanyl".into(), "carfentanil".into()],
    );
    map.insert(
        "methamphetamine".to_string(),
        vec!["methamphetamine".into(), "amphetamine".into()],
    );
    Taxonomy::from_terms(map).unwrap()
}
