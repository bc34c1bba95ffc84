//! Raw face-analysis output → coarse lookup categories.
//!
//! Every function here is total: unknown labels fall back to a default
//! category instead of failing.

use crate::types::{AgeGroup, Mood, NormalizedProfile, RawFaceAnalysis};

/// Upper bound (exclusive) of the youngest bucket.
const YOUNG_AGE_LIMIT: f32 = 25.0;
/// Upper bound (inclusive) of the middle bucket.
const MIDDLE_AGE_LIMIT: f32 = 40.0;

/// Lower-cased emotion label → mood. Labels not listed map to `Neutral`.
const EMOTION_MOODS: [(&str, Mood); 9] = [
    ("sad", Mood::Sad),
    ("angry", Mood::Stressed),
    ("fear", Mood::Anxious),
    ("disgust", Mood::Anxious),
    ("happy", Mood::Happy),
    ("surprise", Mood::Happy),
    ("neutral", Mood::Neutral),
    ("tired", Mood::Tired),
    ("fatigue", Mood::Tired),
];

/// Bucket an age estimate: `[0, 25)`, `[25, 40]`, `(40, ∞)`.
///
/// NaN lands in the oldest bucket since it fails both comparisons.
pub fn age_group(age: f32) -> AgeGroup {
    if age < YOUNG_AGE_LIMIT {
        AgeGroup::Under25
    } else if age <= MIDDLE_AGE_LIMIT {
        AgeGroup::From25To40
    } else {
        AgeGroup::Over40
    }
}

/// Map an emotion label to a mood, case-insensitively.
pub fn mood(emotion: &str) -> Mood {
    let emotion = emotion.to_lowercase();
    EMOTION_MOODS
        .iter()
        .find(|(label, _)| *label == emotion)
        .map(|&(_, mood)| mood)
        .unwrap_or(Mood::Neutral)
}

/// Uppercase the first character; the rest of the label is left as-is.
pub fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn normalize(raw: &RawFaceAnalysis) -> NormalizedProfile {
    NormalizedProfile {
        age_group: age_group(raw.age),
        gender: capitalize(&raw.dominant_gender),
        race: capitalize(&raw.dominant_race),
        mood: mood(&raw.dominant_emotion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(age_group(0.0), AgeGroup::Under25);
        assert_eq!(age_group(24.999), AgeGroup::Under25);
        assert_eq!(age_group(25.0), AgeGroup::From25To40);
        assert_eq!(age_group(40.0), AgeGroup::From25To40);
        assert_eq!(age_group(40.001), AgeGroup::Over40);
        assert_eq!(age_group(41.0), AgeGroup::Over40);
        assert_eq!(age_group(97.0), AgeGroup::Over40);
    }

    #[test]
    fn test_age_group_partition_is_total() {
        // Sweep in tenths of a year; each age must land in exactly the bucket
        // its interval dictates.
        for tenths in 0..=1200 {
            let age = tenths as f32 / 10.0;
            let expected = if age < 25.0 {
                AgeGroup::Under25
            } else if age <= 40.0 {
                AgeGroup::From25To40
            } else {
                AgeGroup::Over40
            };
            assert_eq!(age_group(age), expected, "age {age}");
        }
    }

    #[test]
    fn test_mood_mapping() {
        assert_eq!(mood("sad"), Mood::Sad);
        assert_eq!(mood("angry"), Mood::Stressed);
        assert_eq!(mood("fear"), Mood::Anxious);
        assert_eq!(mood("disgust"), Mood::Anxious);
        assert_eq!(mood("happy"), Mood::Happy);
        assert_eq!(mood("surprise"), Mood::Happy);
        assert_eq!(mood("neutral"), Mood::Neutral);
        assert_eq!(mood("tired"), Mood::Tired);
        assert_eq!(mood("fatigue"), Mood::Tired);
    }

    #[test]
    fn test_mood_case_insensitive() {
        assert_eq!(mood("HAPPY"), Mood::Happy);
        assert_eq!(mood("Angry"), Mood::Stressed);
        assert_eq!(mood("SuRpRiSe"), Mood::Happy);
    }

    #[test]
    fn test_mood_unmapped_is_neutral() {
        assert_eq!(mood(""), Mood::Neutral);
        assert_eq!(mood("excited"), Mood::Neutral);
        assert_eq!(mood("contempt"), Mood::Neutral);
        assert_eq!(mood(" happy"), Mood::Neutral);
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("female"), "Female");
        assert_eq!(capitalize("latino hispanic"), "Latino hispanic");
        assert_eq!(capitalize("Man"), "Man");
        assert_eq!(capitalize("éclair"), "Éclair");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_normalize() {
        let raw = RawFaceAnalysis {
            age: 22.0,
            dominant_gender: "female".into(),
            dominant_race: "white".into(),
            dominant_emotion: "happy".into(),
        };
        let profile = normalize(&raw);
        assert_eq!(profile.age_group, AgeGroup::Under25);
        assert_eq!(profile.gender, "Female");
        assert_eq!(profile.race, "White");
        assert_eq!(profile.mood, Mood::Happy);
    }
}
