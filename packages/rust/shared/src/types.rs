//! Learner-facing domain types: grade levels, interests, preferences.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LearnkitError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one pipeline run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque session key used by the session store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generate a fresh session identifier.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Grade levels
// ---------------------------------------------------------------------------

/// Complexity bucket derived from a grade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityBucket {
    Elementary,
    Middle,
    High,
    College,
}

impl ComplexityBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Elementary => "elementary",
            Self::Middle => "middle",
            Self::High => "high",
            Self::College => "college",
        }
    }
}

impl fmt::Display for ComplexityBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The 13 ordered grade levels a learner can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "1")]
    Grade1,
    #[serde(rename = "2")]
    Grade2,
    #[serde(rename = "3")]
    Grade3,
    #[serde(rename = "4")]
    Grade4,
    #[serde(rename = "5")]
    Grade5,
    #[serde(rename = "6")]
    Grade6,
    #[serde(rename = "7")]
    Grade7,
    #[serde(rename = "8")]
    Grade8,
    #[serde(rename = "9")]
    Grade9,
    #[serde(rename = "10")]
    Grade10,
    #[serde(rename = "11")]
    Grade11,
    #[serde(rename = "12")]
    Grade12,
    #[serde(rename = "undergrad")]
    Undergrad,
}

impl GradeLevel {
    /// All grade levels in ascending order.
    pub const ALL: [GradeLevel; 13] = [
        Self::Grade1,
        Self::Grade2,
        Self::Grade3,
        Self::Grade4,
        Self::Grade5,
        Self::Grade6,
        Self::Grade7,
        Self::Grade8,
        Self::Grade9,
        Self::Grade10,
        Self::Grade11,
        Self::Grade12,
        Self::Undergrad,
    ];

    /// Wire/config value (`"1"`..`"12"`, `"undergrad"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grade1 => "1",
            Self::Grade2 => "2",
            Self::Grade3 => "3",
            Self::Grade4 => "4",
            Self::Grade5 => "5",
            Self::Grade6 => "6",
            Self::Grade7 => "7",
            Self::Grade8 => "8",
            Self::Grade9 => "9",
            Self::Grade10 => "10",
            Self::Grade11 => "11",
            Self::Grade12 => "12",
            Self::Undergrad => "undergrad",
        }
    }

    /// Human-readable label for prompts and CLI output.
    pub fn display_name(&self) -> String {
        match self {
            Self::Undergrad => "undergraduate".to_string(),
            other => format!("grade {}", other.as_str()),
        }
    }

    /// The complexity bucket that drives tone and quiz difficulty.
    pub fn bucket(&self) -> ComplexityBucket {
        match self {
            Self::Grade1 | Self::Grade2 | Self::Grade3 | Self::Grade4 | Self::Grade5 => {
                ComplexityBucket::Elementary
            }
            Self::Grade6 | Self::Grade7 | Self::Grade8 => ComplexityBucket::Middle,
            Self::Grade9 | Self::Grade10 | Self::Grade11 | Self::Grade12 => ComplexityBucket::High,
            Self::Undergrad => ComplexityBucket::College,
        }
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GradeLevel {
    type Err = LearnkitError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized
            .strip_prefix("grade")
            .map(str::trim)
            .unwrap_or(&normalized);

        match normalized {
            "undergrad" | "undergraduate" | "college" | "university" => Ok(Self::Undergrad),
            other => GradeLevel::ALL
                .iter()
                .find(|g| g.as_str() == other)
                .copied()
                .ok_or_else(|| {
                    LearnkitError::validation(format!(
                        "unknown grade level '{s}': expected 1-12 or 'undergrad'"
                    ))
                }),
        }
    }
}

// ---------------------------------------------------------------------------
// Interests
// ---------------------------------------------------------------------------

/// Topical interest used to personalize analogies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interest {
    Sports,
    Music,
    Art,
    Technology,
    Science,
    Nature,
    Animals,
    Gaming,
    Cooking,
    History,
    Space,
    Movies,
    Fashion,
    Travel,
    Business,
    Health,
}

impl Interest {
    pub const ALL: [Interest; 16] = [
        Self::Sports,
        Self::Music,
        Self::Art,
        Self::Technology,
        Self::Science,
        Self::Nature,
        Self::Animals,
        Self::Gaming,
        Self::Cooking,
        Self::History,
        Self::Space,
        Self::Movies,
        Self::Fashion,
        Self::Travel,
        Self::Business,
        Self::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sports => "sports",
            Self::Music => "music",
            Self::Art => "art",
            Self::Technology => "technology",
            Self::Science => "science",
            Self::Nature => "nature",
            Self::Animals => "animals",
            Self::Gaming => "gaming",
            Self::Cooking => "cooking",
            Self::History => "history",
            Self::Space => "space",
            Self::Movies => "movies",
            Self::Fashion => "fashion",
            Self::Travel => "travel",
            Self::Business => "business",
            Self::Health => "health",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sports => "Sports & Athletics",
            Self::Music => "Music",
            Self::Art => "Art & Design",
            Self::Technology => "Technology",
            Self::Science => "Science",
            Self::Nature => "Nature & Outdoors",
            Self::Animals => "Animals",
            Self::Gaming => "Video Games",
            Self::Cooking => "Cooking & Food",
            Self::History => "History",
            Self::Space => "Space & Astronomy",
            Self::Movies => "Movies & TV",
            Self::Fashion => "Fashion",
            Self::Travel => "Travel & Cultures",
            Self::Business => "Business & Money",
            Self::Health => "Health & Fitness",
        }
    }

    /// Fixed analogy phrases used when personalizing content.
    pub fn analogies(&self) -> &'static [&'static str] {
        match self {
            Self::Sports => &[
                "like a team running a practiced play",
                "like training for a big match",
                "like keeping score during a game",
            ],
            Self::Music => &[
                "like instruments playing together in a band",
                "like the rhythm that holds a song together",
                "like practicing scales before a concert",
            ],
            Self::Art => &[
                "like mixing colors on a palette",
                "like sketching an outline before painting",
                "like arranging shapes in a composition",
            ],
            Self::Technology => &[
                "like apps talking to each other on a phone",
                "like a computer following a program step by step",
                "like data traveling across the internet",
            ],
            Self::Science => &[
                "like running an experiment in a lab",
                "like testing a hypothesis with evidence",
                "like measuring results carefully",
            ],
            Self::Nature => &[
                "like a forest where every plant has a role",
                "like rivers shaping a valley over time",
                "like the changing of the seasons",
            ],
            Self::Animals => &[
                "like a pack of wolves working together",
                "like bees organizing their hive",
                "like birds migrating with the seasons",
            ],
            Self::Gaming => &[
                "like leveling up a character",
                "like unlocking a new area of the map",
                "like combining items to craft something new",
            ],
            Self::Cooking => &[
                "like following a recipe one step at a time",
                "like ingredients combining into a dish",
                "like adjusting heat while something simmers",
            ],
            Self::History => &[
                "like events on a timeline leading to a turning point",
                "like explorers mapping unknown lands",
                "like an empire building its roads",
            ],
            Self::Space => &[
                "like planets orbiting the sun",
                "like a rocket launching in stages",
                "like astronauts following a mission plan",
            ],
            Self::Movies => &[
                "like scenes building up to a plot twist",
                "like a director guiding the cast",
                "like a trailer previewing the whole film",
            ],
            Self::Fashion => &[
                "like pieces coming together in an outfit",
                "like a designer sketching a collection",
                "like trends that change with each season",
            ],
            Self::Travel => &[
                "like planning a route on a map",
                "like packing the essentials for a trip",
                "like discovering a new city's neighborhoods",
            ],
            Self::Business => &[
                "like a shop balancing what comes in and goes out",
                "like a team planning a product launch",
                "like investing a little to grow a lot",
            ],
            Self::Health => &[
                "like a workout routine that builds strength",
                "like a balanced meal fueling the body",
                "like the heart pumping blood to every organ",
            ],
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interest {
    type Err = LearnkitError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Interest::ALL
            .iter()
            .find(|i| i.as_str() == normalized)
            .copied()
            .ok_or_else(|| {
                LearnkitError::validation(format!(
                    "unknown interest '{s}': expected one of {}",
                    Interest::ALL
                        .iter()
                        .map(Interest::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Learning styles
// ---------------------------------------------------------------------------

/// Optional learning-style tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStyle {
    Visual,
    Auditory,
    ReadingWriting,
    Kinesthetic,
}

impl LearningStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visual => "visual",
            Self::Auditory => "auditory",
            Self::ReadingWriting => "reading_writing",
            Self::Kinesthetic => "kinesthetic",
        }
    }
}

impl FromStr for LearningStyle {
    type Err = LearnkitError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "visual" => Ok(Self::Visual),
            "auditory" => Ok(Self::Auditory),
            "reading_writing" | "reading" => Ok(Self::ReadingWriting),
            "kinesthetic" | "hands_on" => Ok(Self::Kinesthetic),
            _ => Err(LearnkitError::validation(format!(
                "unknown learning style '{s}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// UserPreferences
// ---------------------------------------------------------------------------

/// Learner preferences for one generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub grade_level: GradeLevel,
    pub interest: Interest,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learning_styles: Vec<LearningStyle>,
}

impl UserPreferences {
    pub fn new(grade_level: GradeLevel, interest: Interest) -> Self {
        Self {
            grade_level,
            interest,
            learning_styles: Vec::new(),
        }
    }

    pub fn with_styles(mut self, styles: impl IntoIterator<Item = LearningStyle>) -> Self {
        for style in styles {
            if !self.learning_styles.contains(&style) {
                self.learning_styles.push(style);
            }
        }
        self
    }

    pub fn bucket(&self) -> ComplexityBucket {
        self.grade_level.bucket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_buckets() {
        assert_eq!(GradeLevel::Grade2.bucket(), ComplexityBucket::Elementary);
        assert_eq!(GradeLevel::Grade5.bucket(), ComplexityBucket::Elementary);
        assert_eq!(GradeLevel::Grade7.bucket(), ComplexityBucket::Middle);
        assert_eq!(GradeLevel::Grade11.bucket(), ComplexityBucket::High);
        assert_eq!(GradeLevel::Undergrad.bucket(), ComplexityBucket::College);
    }

    #[test]
    fn grade_levels_are_ordered() {
        let mut sorted = GradeLevel::ALL;
        sorted.sort();
        assert_eq!(sorted, GradeLevel::ALL);
        assert!(GradeLevel::Grade12 < GradeLevel::Undergrad);
    }

    #[test]
    fn grade_parsing_accepts_aliases() {
        assert_eq!("8".parse::<GradeLevel>().unwrap(), GradeLevel::Grade8);
        assert_eq!("Grade 10".parse::<GradeLevel>().unwrap(), GradeLevel::Grade10);
        assert_eq!("college".parse::<GradeLevel>().unwrap(), GradeLevel::Undergrad);
        assert!("13".parse::<GradeLevel>().is_err());
        assert!("".parse::<GradeLevel>().is_err());
    }

    #[test]
    fn grade_serde_uses_wire_values() {
        let json = serde_json::to_string(&GradeLevel::Undergrad).unwrap();
        assert_eq!(json, r#""undergrad""#);
        let parsed: GradeLevel = serde_json::from_str(r#""7""#).unwrap();
        assert_eq!(parsed, GradeLevel::Grade7);
    }

    #[test]
    fn every_interest_has_analogies() {
        for interest in Interest::ALL {
            assert!(!interest.analogies().is_empty(), "{interest} has no analogies");
            assert!(!interest.display_name().is_empty());
            assert_eq!(interest.as_str().parse::<Interest>().unwrap(), interest);
        }
    }

    #[test]
    fn unknown_interest_lists_choices() {
        let err = "knitting".parse::<Interest>().unwrap_err();
        assert!(err.to_string().contains("technology"));
    }

    #[test]
    fn preferences_dedupe_styles() {
        let prefs = UserPreferences::new(GradeLevel::Grade8, Interest::Technology).with_styles([
            LearningStyle::Visual,
            LearningStyle::Visual,
            LearningStyle::Auditory,
        ]);
        assert_eq!(prefs.learning_styles.len(), 2);
        assert_eq!(prefs.bucket(), ComplexityBucket::Middle);
    }
}
