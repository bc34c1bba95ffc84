use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Wildcard key component: matches any value in its position.
pub const ANY: &str = "Any";

/// Output of the face-analysis model for the most confident face in an image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawFaceAnalysis {
    /// Estimated age in years.
    pub age: f32,
    pub dominant_gender: String,
    pub dominant_race: String,
    /// Lower-cased emotion label (e.g., "happy", "angry").
    pub dominant_emotion: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseCategoryError {
    kind: &'static str,
    value: String,
}

/// Coarse age bucket used as the first lookup key component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "<25")]
    Under25,
    #[serde(rename = "25-40")]
    From25To40,
    #[serde(rename = "40+")]
    Over40,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 3] = [AgeGroup::Under25, AgeGroup::From25To40, AgeGroup::Over40];

    pub fn as_str(self) -> &'static str {
        match self {
            AgeGroup::Under25 => "<25",
            AgeGroup::From25To40 => "25-40",
            AgeGroup::Over40 => "40+",
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeGroup {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgeGroup::ALL
            .into_iter()
            .find(|group| group.as_str() == s)
            .ok_or_else(|| ParseCategoryError {
                kind: "age group",
                value: s.to_string(),
            })
    }
}

/// Mood category derived from the dominant emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Sad,
    Stressed,
    Anxious,
    Happy,
    Neutral,
    Tired,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Sad,
        Mood::Stressed,
        Mood::Anxious,
        Mood::Happy,
        Mood::Neutral,
        Mood::Tired,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Sad => "Sad",
            Mood::Stressed => "Stressed",
            Mood::Anxious => "Anxious",
            Mood::Happy => "Happy",
            Mood::Neutral => "Neutral",
            Mood::Tired => "Tired",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mood::ALL
            .into_iter()
            .find(|mood| mood.as_str() == s)
            .ok_or_else(|| ParseCategoryError {
                kind: "mood",
                value: s.to_string(),
            })
    }
}

/// Bucketed attributes for one request. Gender and race are kept verbatim
/// (first letter capitalized) so they can be matched against table keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedProfile {
    pub age_group: AgeGroup,
    pub gender: String,
    pub race: String,
    pub mood: Mood,
}

/// A product suggestion with its referral link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub link: String,
}

/// A canned recommendation from the static table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub skin_condition: String,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub lifestyle_changes: Vec<String>,
    pub source: String,
}

/// Exact-match key into the recommendation table.
///
/// Any component may hold the wildcard [`ANY`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LookupKey {
    pub age_group: String,
    pub gender: String,
    pub race: String,
    pub mood: String,
}

impl LookupKey {
    pub fn new(
        age_group: impl Into<String>,
        gender: impl Into<String>,
        race: impl Into<String>,
        mood: impl Into<String>,
    ) -> Self {
        Self {
            age_group: age_group.into(),
            gender: gender.into(),
            race: race.into(),
            mood: mood.into(),
        }
    }

    /// The mandatory catch-all key `(Any, Any, Any, Neutral)`.
    pub fn fallback() -> Self {
        Self::new(ANY, ANY, ANY, Mood::Neutral.as_str())
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.age_group, self.gender, self.race, self.mood
        )
    }
}
