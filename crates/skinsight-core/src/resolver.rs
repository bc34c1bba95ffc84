//! Prioritized wildcard lookup into the recommendation table.
//!
//! Candidate keys are generated from the profile in a fixed order, from most
//! to least specific, and the first key present in the table wins. The order
//! is part of the contract: a race-only entry is preferred over a mood-only
//! one.

use crate::normalizer::normalize;
use crate::table::RecommendationTable;
use crate::types::{LookupKey, Mood, NormalizedProfile, RawFaceAnalysis, RecommendationRecord, ANY};
use serde::Serialize;

/// One step of the lookup precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStep {
    /// `(age, gender, race, mood)`
    Exact,
    /// `(age, gender, Any, mood)`
    IgnoreRace,
    /// `(age, Any, race, mood)`
    IgnoreGender,
    /// `(age, Any, Any, mood)`
    AgeAndMood,
    /// `(Any, Any, race, Any)`
    RaceOnly,
    /// `(Any, Any, Any, mood)`
    MoodOnly,
    /// `(Any, Any, Any, Neutral)`
    Fallback,
}

impl MatchStep {
    /// Lookup order. Evaluation stops at the first key present in the table.
    pub const PRECEDENCE: [MatchStep; 7] = [
        MatchStep::Exact,
        MatchStep::IgnoreRace,
        MatchStep::IgnoreGender,
        MatchStep::AgeAndMood,
        MatchStep::RaceOnly,
        MatchStep::MoodOnly,
        MatchStep::Fallback,
    ];

    /// Project a profile onto this step's candidate key.
    pub fn project(self, profile: &NormalizedProfile) -> LookupKey {
        let age = profile.age_group.as_str();
        let gender = profile.gender.as_str();
        let race = profile.race.as_str();
        let mood = profile.mood.as_str();

        match self {
            MatchStep::Exact => LookupKey::new(age, gender, race, mood),
            MatchStep::IgnoreRace => LookupKey::new(age, gender, ANY, mood),
            MatchStep::IgnoreGender => LookupKey::new(age, ANY, race, mood),
            MatchStep::AgeAndMood => LookupKey::new(age, ANY, ANY, mood),
            MatchStep::RaceOnly => LookupKey::new(ANY, ANY, race, ANY),
            MatchStep::MoodOnly => LookupKey::new(ANY, ANY, ANY, mood),
            MatchStep::Fallback => LookupKey::new(ANY, ANY, ANY, Mood::Neutral.as_str()),
        }
    }

    /// 1-based position in [`MatchStep::PRECEDENCE`].
    pub fn number(self) -> usize {
        self as usize + 1
    }

    pub fn describe(self) -> &'static str {
        match self {
            MatchStep::Exact => "exact match",
            MatchStep::IgnoreRace => "age, gender and mood",
            MatchStep::IgnoreGender => "age, race and mood",
            MatchStep::AgeAndMood => "age and mood",
            MatchStep::RaceOnly => "race only",
            MatchStep::MoodOnly => "mood only",
            MatchStep::Fallback => "default",
        }
    }
}

/// The record chosen for a profile, and how it was found.
#[derive(Debug, Clone)]
pub struct Resolution<'t> {
    pub step: MatchStep,
    pub key: LookupKey,
    pub record: &'t RecommendationRecord,
}

/// Find the best-matching record for a profile. Never fails: a validated
/// table always holds the fallback entry.
pub fn lookup<'t>(table: &'t RecommendationTable, profile: &NormalizedProfile) -> Resolution<'t> {
    for step in MatchStep::PRECEDENCE {
        let key = step.project(profile);
        if let Some(record) = table.get(&key) {
            tracing::debug!(
                step = step.number(),
                key = %key,
                condition = %record.skin_condition,
                "recommendation matched"
            );
            return Resolution { step, key, record };
        }
    }

    Resolution {
        step: MatchStep::Fallback,
        key: LookupKey::fallback(),
        record: table.fallback(),
    }
}

/// Normalize a raw analysis and look up its recommendation.
pub fn resolve<'t>(table: &'t RecommendationTable, raw: &RawFaceAnalysis) -> &'t RecommendationRecord {
    lookup(table, &normalize(raw)).record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AgeGroup;

    fn record(condition: &str) -> RecommendationRecord {
        RecommendationRecord {
            skin_condition: condition.into(),
            products: vec![],
            lifestyle_changes: vec![],
            source: "test".into(),
        }
    }

    fn table(entries: &[((&str, &str, &str, &str), &str)]) -> RecommendationTable {
        RecommendationTable::from_entries(entries.iter().map(|&((a, g, r, m), condition)| {
            (LookupKey::new(a, g, r, m), record(condition))
        }))
        .unwrap()
    }

    fn profile(age_group: AgeGroup, gender: &str, race: &str, mood: Mood) -> NormalizedProfile {
        NormalizedProfile {
            age_group,
            gender: gender.into(),
            race: race.into(),
            mood,
        }
    }

    fn raw(age: f32, gender: &str, race: &str, emotion: &str) -> RawFaceAnalysis {
        RawFaceAnalysis {
            age,
            dominant_gender: gender.into(),
            dominant_race: race.into(),
            dominant_emotion: emotion.into(),
        }
    }

    #[test]
    fn test_step_numbers_follow_precedence() {
        for (i, step) in MatchStep::PRECEDENCE.iter().enumerate() {
            assert_eq!(step.number(), i + 1);
        }
    }

    #[test]
    fn test_projections() {
        let p = profile(AgeGroup::From25To40, "Male", "Black", Mood::Tired);
        let keys: Vec<String> = MatchStep::PRECEDENCE
            .iter()
            .map(|step| step.project(&p).to_string())
            .collect();
        assert_eq!(
            keys,
            vec![
                "(25-40, Male, Black, Tired)",
                "(25-40, Male, Any, Tired)",
                "(25-40, Any, Black, Tired)",
                "(25-40, Any, Any, Tired)",
                "(Any, Any, Black, Any)",
                "(Any, Any, Any, Tired)",
                "(Any, Any, Any, Neutral)",
            ]
        );
    }

    #[test]
    fn test_most_specific_wins() {
        let t = table(&[
            (("Any", "Any", "Any", "Neutral"), "fallback"),
            (("<25", "Any", "Any", "Sad"), "age and mood"),
            (("<25", "Female", "Asian", "Sad"), "exact"),
        ]);
        let r = lookup(&t, &profile(AgeGroup::Under25, "Female", "Asian", Mood::Sad));
        assert_eq!(r.step, MatchStep::Exact);
        assert_eq!(r.record.skin_condition, "exact");
    }

    #[test]
    fn test_each_step_reachable() {
        let t = table(&[
            (("Any", "Any", "Any", "Neutral"), "7"),
            (("Any", "Any", "Any", "Sad"), "6"),
            (("Any", "Any", "Indian", "Any"), "5"),
            (("40+", "Any", "Any", "Sad"), "4"),
            (("40+", "Any", "White", "Sad"), "3"),
            (("40+", "Male", "Any", "Sad"), "2"),
            (("40+", "Male", "Black", "Sad"), "1"),
        ]);
        let cases = [
            (profile(AgeGroup::Over40, "Male", "Black", Mood::Sad), MatchStep::Exact),
            (profile(AgeGroup::Over40, "Male", "Asian", Mood::Sad), MatchStep::IgnoreRace),
            (profile(AgeGroup::Over40, "Female", "White", Mood::Sad), MatchStep::IgnoreGender),
            (profile(AgeGroup::Over40, "Female", "Asian", Mood::Sad), MatchStep::AgeAndMood),
            (profile(AgeGroup::Under25, "Female", "Indian", Mood::Sad), MatchStep::RaceOnly),
            (profile(AgeGroup::Under25, "Female", "Asian", Mood::Sad), MatchStep::MoodOnly),
            (profile(AgeGroup::Under25, "Female", "Asian", Mood::Happy), MatchStep::Fallback),
        ];
        for (p, expected) in cases {
            let r = lookup(&t, &p);
            assert_eq!(r.step, expected, "{p:?}");
            assert_eq!(r.record.skin_condition, expected.number().to_string());
            assert_eq!(r.key, expected.project(&p));
        }
    }

    #[test]
    fn test_race_only_before_mood_only() {
        let t = table(&[
            (("Any", "Any", "Any", "Neutral"), "fallback"),
            (("Any", "Any", "Any", "Sad"), "mood only"),
            (("Any", "Any", "Black", "Any"), "race only"),
        ]);
        let r = lookup(&t, &profile(AgeGroup::From25To40, "Female", "Black", Mood::Sad));
        assert_eq!(r.step, MatchStep::RaceOnly);
        assert_eq!(r.record.skin_condition, "race only");
    }

    #[test]
    fn test_neutral_mood_only_hits_fallback_entry() {
        let t = table(&[(("Any", "Any", "Any", "Neutral"), "fallback")]);
        let r = lookup(&t, &profile(AgeGroup::Under25, "Male", "White", Mood::Neutral));
        // Step 6 projects to the fallback key itself.
        assert_eq!(r.step, MatchStep::MoodOnly);
        assert_eq!(r.record.skin_condition, "fallback");
    }

    #[test]
    fn test_resolver_is_total() {
        let t = table(&[(("Any", "Any", "Any", "Neutral"), "fallback")]);
        for age_group in AgeGroup::ALL {
            for mood in Mood::ALL {
                for (gender, race) in [("Male", "White"), ("", ""), ("Any", "Any"), ("x", "Black")] {
                    let r = lookup(&t, &profile(age_group, gender, race, mood));
                    assert_eq!(r.record.skin_condition, "fallback");
                }
            }
        }
    }

    #[test]
    fn test_wildcard_in_profile_is_literal() {
        // A detector label "any" capitalizes to the wildcard spelling and is
        // matched as a plain string.
        let t = table(&[
            (("Any", "Any", "Any", "Neutral"), "fallback"),
            (("25-40", "Any", "Any", "Happy"), "age and mood"),
        ]);
        let r = lookup(&t, &normalize(&raw(30.0, "any", "any", "happy")));
        assert_eq!(r.step, MatchStep::Exact);
        assert_eq!(r.record.skin_condition, "age and mood");
    }

    #[test]
    fn test_scenario_young_happy_white_female() {
        let t = RecommendationTable::builtin().unwrap();
        let raw = raw(22.0, "female", "white", "happy");
        let profile = normalize(&raw);
        assert_eq!(profile.age_group, AgeGroup::Under25);
        assert_eq!(profile.mood, Mood::Happy);

        let r = lookup(&t, &profile);
        assert_eq!(r.step, MatchStep::MoodOnly);
        assert_eq!(r.key, LookupKey::new("Any", "Any", "Any", "Happy"));
        assert_eq!(resolve(&t, &raw).skin_condition, "Healthy & Glowing Skin");
    }

    #[test]
    fn test_scenario_tired_black_male() {
        let t = RecommendationTable::builtin().unwrap();
        let raw = raw(30.0, "male", "black", "tired");
        let profile = normalize(&raw);
        assert_eq!(profile.age_group, AgeGroup::From25To40);
        assert_eq!(profile.mood, Mood::Tired);

        let r = lookup(&t, &profile);
        assert_eq!(r.step, MatchStep::RaceOnly);
        assert_eq!(r.key, LookupKey::new("Any", "Any", "Black", "Any"));
        assert_eq!(resolve(&t, &raw).skin_condition, "Hyperpigmentation & Dryness");
    }

    #[test]
    fn test_unknown_emotion_uses_default_record() {
        let t = RecommendationTable::builtin().unwrap();
        let record = resolve(&t, &raw(33.0, "male", "white", "contempt"));
        assert_eq!(record, t.fallback());
    }
}
