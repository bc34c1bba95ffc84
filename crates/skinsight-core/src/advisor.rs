//! End-to-end recommendation: image → analysis → profile → record.

use crate::analyzer::{AnalyzerError, FaceAnalyzer, SharedAnalyzer};
use crate::normalizer::normalize;
use crate::resolver::{lookup, MatchStep};
use crate::table::RecommendationTable;
use crate::types::{LookupKey, NormalizedProfile, RawFaceAnalysis, RecommendationRecord};
use image::DynamicImage;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("cannot read image: {0}")]
    Image(#[from] image::ImageError),
    #[error("face analysis failed: {0}")]
    Analyzer(#[from] AnalyzerError),
}

/// A recommendation together with the evidence it was chosen from.
#[derive(Debug, Clone, Serialize)]
pub struct Advice {
    pub analysis: RawFaceAnalysis,
    pub profile: NormalizedProfile,
    pub step: MatchStep,
    pub key: LookupKey,
    pub recommendation: RecommendationRecord,
}

/// Resolve a recommendation for an already-computed analysis.
pub fn explain(table: &RecommendationTable, analysis: RawFaceAnalysis) -> Advice {
    let profile = normalize(&analysis);
    let resolution = lookup(table, &profile);
    Advice {
        step: resolution.step,
        key: resolution.key,
        recommendation: resolution.record.clone(),
        analysis,
        profile,
    }
}

/// Long-lived pairing of a validated table and a loaded analyzer, built once
/// at startup and shared by every request.
pub struct Advisor<A> {
    table: RecommendationTable,
    analyzer: SharedAnalyzer<A>,
}

impl<A: FaceAnalyzer> Advisor<A> {
    pub fn new(table: RecommendationTable, analyzer: A) -> Self {
        Self {
            table,
            analyzer: SharedAnalyzer::new(analyzer),
        }
    }

    pub fn table(&self) -> &RecommendationTable {
        &self.table
    }

    pub fn advise(&self, image: &DynamicImage) -> Result<Advice, AdvisorError> {
        let analysis = self.analyzer.analyze(image)?;
        let advice = explain(&self.table, analysis);
        tracing::info!(
            age_group = %advice.profile.age_group,
            mood = %advice.profile.mood,
            step = advice.step.number(),
            condition = %advice.recommendation.skin_condition,
            "recommendation ready"
        );
        Ok(advice)
    }

    /// Decode an image file (JPEG, PNG, ...) and advise on it.
    pub fn advise_file(&self, path: &Path) -> Result<Advice, AdvisorError> {
        let image = image::open(path)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width(),
            height = image.height(),
            "image decoded"
        );
        self.advise(&image)
    }
}
