//! Geocoding stage: build addresses, geocode the rows that lack
//! coordinates, and reconcile the results back onto every row.

use std::sync::Arc;

use case_enrich_address::build_address;
use case_enrich_case_models::{AddressContext, LookupStatus};
use case_enrich_geocoder::GeocodeProvider;
use case_enrich_geocoder::progress::ProgressCallback;
use case_enrich_geocoder::runner::{AddressQuery, GeocodeOptions, geocode_addresses};
use case_enrich_reconcile::{ReconciledLocation, reconcile};

use crate::PipelineError;
use crate::columns::{self, format_bool, format_float, format_indicator, format_text};
use crate::table::CaseTable;

/// Options for [`geocode_stage`].
#[derive(Debug, Clone)]
pub struct GeocodeStageOptions {
    /// Which address is sent to the provider.
    pub context: AddressContext,
    /// Caps how many rows are looked up (trial runs). Rows past the cap
    /// keep their raw coordinates only.
    pub limit: Option<usize>,
    pub geocode: GeocodeOptions,
}

/// Counts reported by [`geocode_stage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeSummary {
    pub rows: usize,
    /// Rows missing latitude or longitude.
    pub eligible: usize,
    /// Rows actually sent to the runner (after `limit`).
    pub queried: usize,
    pub matched: usize,
    pub recovered: usize,
}

/// Runs the geocoding stage over `table`, appending the address and
/// location columns.
///
/// # Errors
///
/// Returns [`PipelineError`] only if a column cannot be written; provider
/// failures are recorded per row.
pub async fn geocode_stage(
    table: &mut CaseTable,
    provider: &dyn GeocodeProvider,
    options: &GeocodeStageOptions,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<GeocodeSummary, PipelineError> {
    let records = table.records().to_vec();

    let incident: Vec<_> = records
        .iter()
        .map(|r| build_address(r, AddressContext::Incident))
        .collect();
    let death: Vec<_> = records
        .iter()
        .map(|r| build_address(r, AddressContext::Death))
        .collect();

    let eligible: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.needs_geocoding())
        .map(|(i, _)| i)
        .collect();
    let queried = options.limit.map_or(eligible.len(), |n| n.min(eligible.len()));
    if queried < eligible.len() {
        log::info!(
            "Limiting geocoding to {queried} of {} eligible rows",
            eligible.len()
        );
    }

    let built = match options.context {
        AddressContext::Incident => &incident,
        AddressContext::Death => &death,
    };
    let queries: Vec<AddressQuery> = eligible[..queried]
        .iter()
        .map(|&i| AddressQuery {
            case_number: records[i].case_number.clone(),
            address: built[i].address.clone(),
        })
        .collect();

    if let Some(p) = progress {
        p.set_message(format!("Geocoding {} addresses", options.context));
    }
    let results = geocode_addresses(provider, &queries, &options.geocode, progress).await;
    let reconciled = reconcile(&results, &records);

    table.set_column(
        AddressContext::Incident.address_column(),
        incident.iter().map(|b| b.address.clone()).collect(),
    )?;
    table.set_column(
        columns::INCIDENT_ADDRESS_SUB,
        incident
            .iter()
            .map(|b| format_bool(b.city_was_substituted).to_string())
            .collect(),
    )?;
    table.set_column(
        AddressContext::Death.address_column(),
        death.into_iter().map(|b| b.address).collect(),
    )?;

    let column = |f: &dyn Fn(&ReconciledLocation) -> String| {
        reconciled.iter().map(f).collect::<Vec<_>>()
    };
    table.set_column(
        columns::GEOCODED_LATITUDE,
        column(&|r| format_float(r.geocoded.latitude)),
    )?;
    table.set_column(
        columns::GEOCODED_LONGITUDE,
        column(&|r| format_float(r.geocoded.longitude)),
    )?;
    table.set_column(
        columns::GEOCODED_SCORE,
        column(&|r| format_float(r.geocoded.score)),
    )?;
    table.set_column(
        columns::GEOCODED_ADDRESS,
        column(&|r| format_text(r.geocoded.matched_address.as_deref())),
    )?;
    table.set_column(
        columns::GEOCODE_STATUS,
        column(&|r| match r.geocoded.status {
            LookupStatus::NotRequested => String::new(),
            status => status.to_string(),
        }),
    )?;
    table.set_column(
        columns::RECOVERED,
        column(&|r| format_indicator(r.recovered).to_string()),
    )?;
    table.set_column(
        columns::FINAL_LATITUDE,
        column(&|r| format_float(r.final_latitude)),
    )?;
    table.set_column(
        columns::FINAL_LONGITUDE,
        column(&|r| format_float(r.final_longitude)),
    )?;

    let summary = GeocodeSummary {
        rows: records.len(),
        eligible: eligible.len(),
        queried,
        matched: reconciled
            .iter()
            .filter(|r| r.geocoded.status == LookupStatus::Matched)
            .count(),
        recovered: reconciled.iter().filter(|r| r.recovered).count(),
    };

    if let Some(p) = progress {
        p.finish(format!(
            "Geocoded {} rows ({} recovered)",
            summary.queried, summary.recovered
        ));
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use case_enrich_geocoder::{BoundingBox, Candidate, GeocodeError};

    use super::*;

    /// Provider that answers from a fixed table and records queries.
    struct TableProvider {
        answers: BTreeMap<&'static str, Candidate>,
        calls: Mutex<Vec<String>>,
    }

    impl TableProvider {
        fn new(answers: &[(&'static str, f64, f64, Option<f64>)]) -> Self {
            Self {
                answers: answers
                    .iter()
                    .map(|&(query, y, x, score)| {
                        (
                            query,
                            Candidate {
                                matched_address: format!("{query}, MO"),
                                y,
                                x,
                                score,
                            },
                        )
                    })
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GeocodeProvider for TableProvider {
        fn id(&self) -> &str {
            "table"
        }

        async fn lookup(
            &self,
            query: &str,
            _bounds: &BoundingBox,
        ) -> Result<Vec<Candidate>, GeocodeError> {
            self.calls.lock().unwrap().push(query.to_string());
            Ok(self.answers.get(query).cloned().into_iter().collect())
        }
    }

    const CASES: &str = "\
casenumber,latitude,longitude,incident_street,incident_city,incident_zip,residence_city,death_street,death_city,death_state,death_zip
A,38.95,,123 Main St Apt #4B,,65201,columbia,1 Hospital Dr,columbia,missouri,65212
B,41.88,-87.63,9 Elm St,Chicago,60601,,,,,
C,,,unknown,,,,,,,
D,,,77 Oak Ave,Fulton,65251,,,,,
";

    fn options(limit: Option<usize>) -> GeocodeStageOptions {
        GeocodeStageOptions {
            context: AddressContext::Incident,
            limit,
            geocode: GeocodeOptions {
                bounds: BoundingBox::new(-91.6, 36.96, -87.38, 42.57, 4326),
                timeout: Duration::from_secs(5),
                concurrency: 2,
            },
        }
    }

    #[tokio::test]
    async fn enriches_every_row() {
        let provider = TableProvider::new(&[
            ("123 MAIN ST COLUMBIA 65201", 38.90, -92.33, Some(91.0)),
            ("77 OAK AVE FULTON 65251", 38.85, -91.95, None),
        ]);
        let mut table = CaseTable::from_reader(CASES.as_bytes()).unwrap();

        let summary = geocode_stage(&mut table, &provider, &options(None), None)
            .await
            .unwrap();

        assert_eq!(
            summary,
            GeocodeSummary {
                rows: 4,
                eligible: 3,
                queried: 3,
                matched: 2,
                recovered: 1,
            }
        );
        // B already has coordinates; C is skipped before reaching the provider.
        let mut calls = provider.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(calls, ["123 MAIN ST COLUMBIA 65201", "77 OAK AVE FULTON 65251"]);

        assert_eq!(table.cell(0, "incident_address"), Some("123 MAIN ST COLUMBIA 65201"));
        assert_eq!(table.cell(0, "incident_address_sub"), Some("True"));
        assert_eq!(
            table.cell(0, "death_address"),
            Some("1 HOSPITAL DR COLUMBIA MISSOURI 65212")
        );
        assert_eq!(table.cell(0, "geocoded_score"), Some("91.0"));
        assert_eq!(table.cell(0, "geocode_status"), Some("matched"));
        assert_eq!(table.cell(0, "recovered"), Some("1"));
        assert_eq!(table.cell(0, "final_latitude"), Some("38.95"));
        assert_eq!(table.cell(0, "final_longitude"), Some("-92.33"));

        assert_eq!(table.cell(1, "incident_address_sub"), Some("False"));
        assert_eq!(table.cell(1, "geocode_status"), Some(""));
        assert_eq!(table.cell(1, "recovered"), Some("0"));
        assert_eq!(table.cell(1, "final_latitude"), Some("41.88"));

        assert_eq!(table.cell(2, "geocode_status"), Some("skipped"));
        assert_eq!(table.cell(2, "final_latitude"), Some(""));

        assert_eq!(table.cell(3, "geocoded_latitude"), Some("38.85"));
        assert_eq!(table.cell(3, "geocoded_score"), Some(""));
        assert_eq!(table.cell(3, "recovered"), Some("0"));
        assert_eq!(table.cell(3, "final_latitude"), Some("38.85"));
    }

    #[tokio::test]
    async fn limit_caps_lookups() {
        let provider = TableProvider::new(&[]);
        let mut table = CaseTable::from_reader(CASES.as_bytes()).unwrap();

        let summary = geocode_stage(&mut table, &provider, &options(Some(1)), None)
            .await
            .unwrap();

        assert_eq!(summary.eligible, 3);
        assert_eq!(summary.queried, 1);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
        assert_eq!(table.cell(0, "geocode_status"), Some("no_candidates"));
        assert_eq!(table.cell(3, "geocode_status"), Some(""));
    }

    #[tokio::test]
    async fn death_context_queries_death_address() {
        let provider = TableProvider::new(&[]);
        let mut table = CaseTable::from_reader(CASES.as_bytes()).unwrap();
        let mut opts = options(Some(1));
        opts.context = AddressContext::Death;

        geocode_stage(&mut table, &provider, &opts, None).await.unwrap();

        assert_eq!(
            *provider.calls.lock().unwrap(),
            ["1 HOSPITAL DR COLUMBIA MISSOURI 65212"]
        );
    }
}
