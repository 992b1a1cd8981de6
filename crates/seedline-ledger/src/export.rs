//! Registry and occurrence exports.
//!
//! The exports are the only persisted state; everything else is derived by
//! replay. Rows are written in a fixed order (units by introducing sentence
//! then id, occurrences by sentence) so the same merge always produces the
//! same bytes, and the digest over both files confirms it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use seedline_kernel::witness::content_digest;
use seedline_kernel::{Registry, RegistryConfig, SentenceId, UnitId, UnitRecord};

use crate::LedgerError;
use crate::jsonl::{
    JsonlError, read_jsonl_from_path, render_jsonl, write_bytes_atomic, write_json_to_path,
};
use crate::merge::{MergeOutcome, SentenceOccurrences, Snapshot};

pub const UNITS_FILE: &str = "units.jsonl";
pub const OCCURRENCES_FILE: &str = "occurrences.jsonl";
pub const MERGE_REPORT_FILE: &str = "merge-report.json";
pub const VIOLATIONS_FILE: &str = "violations.json";

/// One exported sentence: the canonical ids of its decomposition, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceRow {
    pub sentence_id: SentenceId,
    pub canonical_ids: Vec<UnitId>,
}

impl From<&SentenceOccurrences> for OccurrenceRow {
    fn from(sentence: &SentenceOccurrences) -> Self {
        Self {
            sentence_id: sentence.sentence_id,
            canonical_ids: sentence
                .occurrences
                .iter()
                .map(|o| o.canonical_id)
                .collect(),
        }
    }
}

pub fn occurrence_rows(timeline: &[SentenceOccurrences]) -> Vec<OccurrenceRow> {
    timeline.iter().map(OccurrenceRow::from).collect()
}

/// Both exports rendered to bytes, plus their digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedExport {
    pub units: Vec<u8>,
    pub occurrences: Vec<u8>,
    pub digest: String,
}

pub fn render_exports(
    registry: &Registry,
    timeline: &[SentenceOccurrences],
) -> Result<RenderedExport, JsonlError> {
    let units = render_jsonl(&registry.to_records())?;
    let occurrences = render_jsonl(&occurrence_rows(timeline))?;
    let digest = export_digest(&units, &occurrences);
    Ok(RenderedExport {
        units,
        occurrences,
        digest,
    })
}

/// `x1_` digest over the unit export, a NUL separator, and the occurrence
/// export. Neither file can contain NUL.
pub fn export_digest(units: &[u8], occurrences: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(units.len() + occurrences.len() + 1);
    bytes.extend_from_slice(units);
    bytes.push(0);
    bytes.extend_from_slice(occurrences);
    content_digest("x1", &bytes)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub units_path: PathBuf,
    pub occurrences_path: PathBuf,
    pub merge_report_path: PathBuf,
    pub violations_path: PathBuf,
    pub digest: String,
    pub units: usize,
    pub sentences: usize,
}

/// Write the four merge artifacts into `dir`, each atomically.
pub fn write_merge_outputs(
    dir: impl AsRef<Path>,
    outcome: &MergeOutcome,
) -> Result<ExportSummary, LedgerError> {
    let dir = dir.as_ref();
    let rendered = render_exports(&outcome.registry, &outcome.timeline)?;
    let summary = ExportSummary {
        units_path: dir.join(UNITS_FILE),
        occurrences_path: dir.join(OCCURRENCES_FILE),
        merge_report_path: dir.join(MERGE_REPORT_FILE),
        violations_path: dir.join(VIOLATIONS_FILE),
        digest: rendered.digest,
        units: outcome.registry.len(),
        sentences: outcome.timeline.len(),
    };
    write_bytes_atomic(&summary.units_path, &rendered.units)?;
    write_bytes_atomic(&summary.occurrences_path, &rendered.occurrences)?;
    write_json_to_path(&summary.merge_report_path, &outcome.report)?;
    write_json_to_path(&summary.violations_path, &outcome.violations)?;
    tracing::info!(dir = %dir.display(), digest = %summary.digest, "exports written");
    Ok(summary)
}

pub fn read_unit_records(path: impl AsRef<Path>) -> Result<Vec<UnitRecord>, JsonlError> {
    read_jsonl_from_path(path)
}

pub fn read_occurrence_rows(path: impl AsRef<Path>) -> Result<Vec<OccurrenceRow>, JsonlError> {
    read_jsonl_from_path(path)
}

/// Load a unit export back into a registry.
pub fn load_registry(
    path: impl AsRef<Path>,
    config: RegistryConfig,
) -> Result<Registry, LedgerError> {
    let records = read_unit_records(path)?;
    Ok(Registry::from_snapshot(records, config)?)
}

/// Load a previous merge's output directory as the base of the next merge.
///
/// Both exports are required: the unit export alone would drop every
/// sentence this run does not replay from the next occurrence export.
pub fn load_snapshot(
    dir: impl AsRef<Path>,
    config: RegistryConfig,
) -> Result<Snapshot, LedgerError> {
    let dir = dir.as_ref();
    let registry = load_registry(dir.join(UNITS_FILE), config)?;
    let rows = read_occurrence_rows(dir.join(OCCURRENCES_FILE))?;
    Ok(Snapshot::new(registry, &rows)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedline_kernel::config::TilingMode;
    use seedline_kernel::{Occurrence, OccurrenceStatus, UnitProposal};

    fn registry() -> Registry {
        let mut reg = Registry::new(RegistryConfig {
            case_sensitive_meanings: false,
            tiling: TilingMode::Spaced,
        });
        reg.register(SentenceId(1), UnitProposal::atomic("Quiero", "I want"))
            .unwrap();
        reg.register(SentenceId(1), UnitProposal::atomic("hablar", "to speak"))
            .unwrap();
        reg
    }

    fn timeline() -> Vec<SentenceOccurrences> {
        vec![SentenceOccurrences {
            sentence_id: SentenceId(1),
            occurrences: vec![
                Occurrence {
                    canonical_id: UnitId(1),
                    status: OccurrenceStatus::New,
                },
                Occurrence {
                    canonical_id: UnitId(2),
                    status: OccurrenceStatus::New,
                },
            ],
        }]
    }

    #[test]
    fn export_rows_are_flat_and_stable() {
        let rendered = render_exports(&registry(), &timeline()).unwrap();
        let units = String::from_utf8(rendered.units).unwrap();
        let first = units.lines().next().unwrap();
        assert_eq!(
            first,
            r#"{"canonical_id":1,"kind":"atomic","target_text":"Quiero","known_text":"I want","introducing_sentence_id":"S0001"}"#
        );
        assert_eq!(
            String::from_utf8(rendered.occurrences).unwrap(),
            "{\"sentence_id\":\"S0001\",\"canonical_ids\":[1,2]}\n"
        );
        assert!(rendered.digest.starts_with("x1_"));
    }

    #[test]
    fn digest_tracks_content() {
        let a = render_exports(&registry(), &timeline()).unwrap();
        let b = render_exports(&registry(), &timeline()).unwrap();
        assert_eq!(a.digest, b.digest);
        let c = render_exports(&registry(), &[]).unwrap();
        assert_ne!(a.digest, c.digest);
    }
}
