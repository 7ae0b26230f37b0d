//! Classification stage: flag every row against the drug-class taxonomy
//! and derive the composite columns.

use std::sync::Arc;

use case_enrich_classify::{
    CaseClassification, CompositeRule, DrugClass, Taxonomy, TextSource, classify_case,
};
use case_enrich_geocoder::progress::ProgressCallback;
use strum::IntoEnumIterator as _;

use crate::PipelineError;
use crate::columns::{self, flag_column, format_bool};
use crate::table::CaseTable;

/// Counts reported by [`classify_stage`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub rows: usize,
    /// Rows with at least one class flagged in either source.
    pub flagged_rows: usize,
    /// Rows set per composite rule, in rule order.
    pub composite_counts: Vec<(String, usize)>,
}

/// Runs the classification stage over `table`, appending
/// `secondary_combined`, one `<class>_<source>` column per class and
/// source, and one column per composite rule.
///
/// # Errors
///
/// Returns [`PipelineError`] if a column cannot be written.
pub fn classify_stage(
    table: &mut CaseTable,
    taxonomy: &Taxonomy,
    composites: &[CompositeRule],
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<ClassifySummary, PipelineError> {
    if let Some(p) = progress {
        p.set_total(table.len() as u64);
    }

    let results: Vec<CaseClassification> = table
        .records()
        .iter()
        .map(|record| {
            let result = classify_case(record, taxonomy, composites);
            if let Some(p) = progress {
                p.inc(1);
            }
            result
        })
        .collect();

    table.set_column(
        columns::SECONDARY_COMBINED,
        results.iter().map(|r| r.secondary_combined.clone()).collect(),
    )?;

    for class in DrugClass::iter() {
        for source in TextSource::iter() {
            table.set_column(
                &flag_column(class, source),
                results
                    .iter()
                    .map(|r| format_bool(r.flags(source).get(class)).to_string())
                    .collect(),
            )?;
        }
    }

    let mut composite_counts = Vec::with_capacity(composites.len());
    for (i, rule) in composites.iter().enumerate() {
        let values: Vec<bool> = results.iter().map(|r| r.composites[i]).collect();
        composite_counts.push((
            rule.name().to_string(),
            values.iter().filter(|v| **v).count(),
        ));
        table.set_column(
            rule.name(),
            values.into_iter().map(|v| format_bool(v).to_string()).collect(),
        )?;
    }

    let summary = ClassifySummary {
        rows: results.len(),
        flagged_rows: results
            .iter()
            .filter(|r| {
                r.primary.flagged().next().is_some() || r.secondary.flagged().next().is_some()
            })
            .count(),
        composite_counts,
    };

    log::info!(
        "Classified {} rows: {} with at least one drug class",
        summary.rows,
        summary.flagged_rows
    );
    for (name, count) in &summary.composite_counts {
        log::info!("  {name}: {count}");
    }
    if let Some(p) = progress {
        p.finish(format!("Classified {} rows", summary.rows));
    }

    Ok(summary)
}
