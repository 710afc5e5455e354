//! Heuristic field analysis of untyped byte ranges.
//!
//! A structure starts as one unclaimed gap. Each detector in [`PIPELINE`]
//! runs over every open gap; whenever a pass adds fields the gaps are
//! recomputed from the field list. Whatever no detector claims is reported
//! as `UNKNOWN`, so the result always tiles the structure exactly.

pub mod detectors;
pub mod error;
pub mod field;
pub mod gaps;
pub mod strings;
pub mod structure;

pub use detectors::{Detector, ScanContext, PIPELINE};
pub use error::{AnalysisError, Result};
pub use field::{Field, FieldKind, FieldValue};
pub use structure::{AnalyzedStructure, FunctionNames, Structure};

use rayon::prelude::*;
use tracing::debug;

use crate::config::AnalyzerConfig;
use crate::mappings::RegionSet;
use crate::target::TargetDescriptor;
use crate::{log_error, span_trace};

/// Infers field layouts; stateless apart from its configuration.
#[derive(Debug, Clone, Default)]
pub struct FieldAnalyzer {
    config: AnalyzerConfig,
}

impl FieldAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Partition `structure` into typed fields.
    ///
    /// Pointer candidates are validated against `regions`; words are decoded
    /// with `target`. The result is deterministic for identical inputs.
    ///
    /// # Errors
    /// Only on a detector defect (overlapping or misplaced fields); the
    /// failure is also logged.
    pub fn analyze(
        &self,
        structure: &Structure,
        regions: &RegionSet,
        target: &TargetDescriptor,
    ) -> Result<AnalyzedStructure> {
        let span = span_trace!(
            "analyze_structure",
            address = %format!("{:#x}", structure.address()),
            len = structure.len()
        );
        let _guard = span.enter();

        self.run(structure, regions, target)
            .map_err(|e| log_error!(e, "Field analysis failed"))
    }

    /// Analyze independent structures in parallel; results keep input order.
    pub fn analyze_many(
        &self,
        structures: &[Structure],
        regions: &RegionSet,
        target: &TargetDescriptor,
    ) -> Vec<Result<AnalyzedStructure>> {
        structures
            .par_iter()
            .map(|structure| self.analyze(structure, regions, target))
            .collect()
    }

    fn run(
        &self,
        structure: &Structure,
        regions: &RegionSet,
        target: &TargetDescriptor,
    ) -> Result<AnalyzedStructure> {
        let ctx = ScanContext {
            structure,
            regions,
            target,
            config: &self.config,
        };
        let len = structure.len();
        let word_size = target.word_size();

        let mut fields: Vec<Field> = Vec::new();
        let mut open_gaps = gaps::make_gaps(&mut fields, len, word_size)?;
        let mut last_count = None;

        for detector in PIPELINE {
            if open_gaps.is_empty() {
                break;
            }
            for gap in open_gaps.iter().filter(|g| !g.is_padding) {
                fields.extend(detector.make_fields(&ctx, gap.offset, gap.size)?);
            }
            if last_count != Some(fields.len()) {
                last_count = Some(fields.len());
                open_gaps = gaps::make_gaps(&mut fields, len, word_size)?;
            }
            debug!(
                detector = detector.name(),
                fields = fields.len(),
                gaps = open_gaps.len(),
                "Detector pass complete"
            );
        }

        fields.extend(open_gaps);
        fields.sort_by_key(|f| f.offset);
        let analyzed = AnalyzedStructure {
            address: structure.address(),
            size: len,
            fields,
        };
        analyzed.verify_tiling()?;
        Ok(analyzed)
    }
}
