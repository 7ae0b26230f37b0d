//! Per-class flags and composite classifications built from them.

use std::collections::BTreeSet;
use std::str::FromStr;

use case_enrich_case_models::fallback::any_set;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator as _};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

use crate::taxonomy::{DrugClass, Taxonomy};
use crate::{ClassifyError, classify};

/// Which narrative text a flag was computed from.
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TextSource {
    /// The primary cause-of-death narrative.
    Primary,
    /// All secondary narratives joined into one text.
    Secondary,
}

/// One boolean per [`DrugClass`] for a single text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassFlags([bool; DrugClass::COUNT]);

impl ClassFlags {
    /// Flags every class whose terms appear in `text`, using [`classify`]
    /// per class. Absent text flags nothing.
    #[must_use]
    pub fn evaluate(taxonomy: &Taxonomy, text: Option<&str>) -> Self {
        let mut flags = Self::default();
        for (class, terms) in taxonomy.iter() {
            flags.set(class, classify(text, terms));
        }
        flags
    }

    #[must_use]
    pub const fn get(&self, class: DrugClass) -> bool {
        self.0[class.index()]
    }

    pub const fn set(&mut self, class: DrugClass, value: bool) {
        self.0[class.index()] = value;
    }

    /// Classes that are flagged, in taxonomy order.
    pub fn flagged(&self) -> impl Iterator<Item = DrugClass> + '_ {
        DrugClass::iter().filter(|class| self.get(*class))
    }
}

/// A reference to one computed flag, written `class:source` in
/// configuration (e.g. `fentanyl_analog:secondary`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlagRef {
    pub class: DrugClass,
    pub source: TextSource,
}

impl FromStr for FlagRef {
    type Err = ClassifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (class, source) = s
            .split_once(':')
            .ok_or_else(|| ClassifyError::MalformedFlag(s.to_string()))?;

        Ok(Self {
            class: class
                .trim()
                .parse()
                .map_err(|_| ClassifyError::UnknownClass(class.trim().to_string()))?,
            source: source
                .trim()
                .parse()
                .map_err(|_| ClassifyError::UnknownTextSource(source.trim().to_string()))?,
        })
    }
}

impl std::fmt::Display for FlagRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.class, self.source)
    }
}

/// A named classification that is set when any of its source flags is set.
///
/// Sources are kept in configured order; evaluation stops at the first
/// flag that is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "CompositeSpec")]
pub struct CompositeRule {
    name: String,
    sources: Vec<FlagRef>,
}

/// A `[[composites]]` entry exactly as written in configuration.
#[derive(Debug, Deserialize)]
struct CompositeSpec {
    name: String,
    sources: Vec<String>,
}

impl TryFrom<CompositeSpec> for CompositeRule {
    type Error = ClassifyError;

    fn try_from(spec: CompositeSpec) -> Result<Self, Self::Error> {
        let sources = spec
            .sources
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<FlagRef>, _>>()?;
        Self::new(spec.name, sources)
    }
}

impl CompositeRule {
    /// Creates a rule.
    ///
    /// # Errors
    ///
    /// * [`ClassifyError::InvalidComposite`] if the name is blank or there
    ///   are no sources
    pub fn new(name: impl Into<String>, sources: Vec<FlagRef>) -> Result<Self, ClassifyError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ClassifyError::InvalidComposite {
                name,
                reason: "name is blank".to_string(),
            });
        }
        if sources.is_empty() {
            return Err(ClassifyError::InvalidComposite {
                name,
                reason: "no sources".to_string(),
            });
        }
        Ok(Self { name, sources })
    }

    /// Output column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn sources(&self) -> &[FlagRef] {
        &self.sources
    }

    /// Logical OR of the referenced flags.
    #[must_use]
    pub fn evaluate(&self, primary: &ClassFlags, secondary: &ClassFlags) -> bool {
        any_set(self.sources.iter().map(|flag| {
            let flags = match flag.source {
                TextSource::Primary => primary,
                TextSource::Secondary => secondary,
            };
            flags.get(flag.class)
        }))
    }
}

/// Checks a rule set for duplicate names.
///
/// # Errors
///
/// * [`ClassifyError::InvalidComposite`] naming the first repeated rule
pub fn validate_composites(rules: &[CompositeRule]) -> Result<(), ClassifyError> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if !seen.insert(rule.name()) {
            return Err(ClassifyError::InvalidComposite {
                name: rule.name().to_string(),
                reason: "defined more than once".to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::test_taxonomy;

    fn fentanyl_rule() -> CompositeRule {
        serde_json::from_value(serde_json::json!({
            "name": "fentanyl",
            "sources": [
                "fentanyl:primary",
                "fentanyl:secondary",
                "fentanyl_analog:primary",
                "fentanyl_analog:secondary",
            ]
        }))
        .unwrap()
    }

    #[test]
    fn evaluate_agrees_with_classify_per_class() {
        let taxonomy = test_taxonomy();
        for text in [
            Some("Mixed drug toxicity: CARFENTANIL, cocaine, ethanol"),
            Some("Gunshot wound"),
            Some(""),
            None,
        ] {
            let flags = ClassFlags::evaluate(&taxonomy, text);
            for (class, terms) in taxonomy.iter() {
                assert_eq!(flags.get(class), classify(text, terms), "{class} in {text:?}");
            }
        }
    }

    #[test]
    fn evaluates_every_class_for_a_text() {
        let taxonomy = test_taxonomy();
        let flags = ClassFlags::evaluate(&taxonomy, Some("Acute FENTANYL and Heroin toxicity"));
        assert!(flags.get(DrugClass::Fentanyl));
        assert!(flags.get(DrugClass::Heroin));
        assert!(flags.get(DrugClass::Opioid));
        assert!(!flags.get(DrugClass::Cocaine));
        assert_eq!(
            flags.flagged().collect::<Vec<_>>(),
            [DrugClass::Opioid, DrugClass::Fentanyl, DrugClass::Heroin]
        );
    }

    #[test]
    fn absent_text_flags_nothing() {
        let flags = ClassFlags::evaluate(&test_taxonomy(), None);
        assert_eq!(flags, ClassFlags::default());
        assert_eq!(flags.flagged().count(), 0);
    }

    #[test]
    fn parses_flag_refs() {
        let flag: FlagRef = "fentanyl_analog:secondary".parse().unwrap();
        assert_eq!(flag.class, DrugClass::FentanylAnalog);
        assert_eq!(flag.source, TextSource::Secondary);
        assert_eq!(flag.to_string(), "fentanyl_analog:secondary");

        let spaced: FlagRef = " heroin : primary ".parse().unwrap();
        assert_eq!(spaced.class, DrugClass::Heroin);
    }

    #[test]
    fn rejects_bad_flag_refs() {
        assert!(matches!(
            "fentanyl".parse::<FlagRef>(),
            Err(ClassifyError::MalformedFlag(_))
        ));
        assert!(matches!(
            "kratom:primary".parse::<FlagRef>(),
            Err(ClassifyError::UnknownClass(name)) if name == "kratom"
        ));
        assert!(matches!(
            "fentanyl:tertiary".parse::<FlagRef>(),
            Err(ClassifyError::UnknownTextSource(name)) if name == "tertiary"
        ));
    }

    #[test]
    fn composite_is_or_of_sources() {
        let taxonomy = test_taxonomy();
        let rule = fentanyl_rule();

        let none = ClassFlags::evaluate(&taxonomy, Some("cocaine toxicity"));
        let fentanyl = ClassFlags::evaluate(&taxonomy, Some("fentanyl toxicity"));
        let analog = ClassFlags::evaluate(&taxonomy, Some("carfentanil"));

        assert!(!rule.evaluate(&none, &none));
        assert!(rule.evaluate(&fentanyl, &none));
        assert!(rule.evaluate(&none, &fentanyl));
        assert!(rule.evaluate(&none, &analog));
    }

    #[test]
    fn composite_only_reads_its_own_sources() {
        let taxonomy = test_taxonomy();
        let rule = CompositeRule::new(
            "fentanyl_primary_only",
            vec!["fentanyl:primary".parse().unwrap()],
        )
        .unwrap();
        let fentanyl = ClassFlags::evaluate(&taxonomy, Some("fentanyl"));
        let none = ClassFlags::default();

        assert!(rule.evaluate(&fentanyl, &none));
        assert!(!rule.evaluate(&none, &fentanyl));
    }

    #[test]
    fn rejects_invalid_rules() {
        let unknown = serde_json::from_value::<CompositeRule>(serde_json::json!({
            "name": "stimulant",
            "sources": ["cocaine:primary", "speed:primary"]
        }));
        assert!(unknown.is_err());

        assert!(matches!(
            CompositeRule::new("empty", Vec::new()),
            Err(ClassifyError::InvalidComposite { .. })
        ));
        assert!(matches!(
            CompositeRule::new(" ", vec!["heroin:primary".parse().unwrap()]),
            Err(ClassifyError::InvalidComposite { .. })
        ));
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        assert!(validate_composites(&[fentanyl_rule()]).is_ok());
        assert!(matches!(
            validate_composites(&[fentanyl_rule(), fentanyl_rule()]),
            Err(ClassifyError::InvalidComposite { name, .. }) if name == "fentanyl"
        ));
    }
}
