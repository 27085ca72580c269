//! Question model matching the frontend Question interface.

use serde::{Deserialize, Serialize};

/// Organizational unit a question belongs to.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UnitName {
    ADC,
    APP,
    ACC,
    AIS,
    CNS,
}

impl UnitName {
    pub const ALL: &'static [&'static str] = &["ADC", "APP", "ACC", "AIS", "CNS"];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitName::ADC => "ADC",
            UnitName::APP => "APP",
            UnitName::ACC => "ACC",
            UnitName::AIS => "AIS",
            UnitName::CNS => "CNS",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ADC" => Some(UnitName::ADC),
            "APP" => Some(UnitName::APP),
            "ACC" => Some(UnitName::ACC),
            "AIS" => Some(UnitName::AIS),
            "CNS" => Some(UnitName::CNS),
            _ => None,
        }
    }
}

/// Answer format of a question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    FillInTheBlank,
    MatchTheFollowing,
    ShortAnswer,
    LongAnswer,
}

impl QuestionType {
    pub const ALL: &'static [&'static str] = &[
        "mcq",
        "trueFalse",
        "fillInTheBlank",
        "matchTheFollowing",
        "shortAnswer",
        "longAnswer",
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "mcq",
            QuestionType::TrueFalse => "trueFalse",
            QuestionType::FillInTheBlank => "fillInTheBlank",
            QuestionType::MatchTheFollowing => "matchTheFollowing",
            QuestionType::ShortAnswer => "shortAnswer",
            QuestionType::LongAnswer => "longAnswer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "mcq" => Some(QuestionType::Mcq),
            "trueFalse" => Some(QuestionType::TrueFalse),
            "fillInTheBlank" => Some(QuestionType::FillInTheBlank),
            "matchTheFollowing" => Some(QuestionType::MatchTheFollowing),
            "shortAnswer" => Some(QuestionType::ShortAnswer),
            "longAnswer" => Some(QuestionType::LongAnswer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum DifficultyLevel {
    Easy,
    Medium,
    Hard,
}

impl DifficultyLevel {
    pub const ALL: &'static [&'static str] = &["easy", "medium", "hard"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyLevel::Easy => "easy",
            DifficultyLevel::Medium => "medium",
            DifficultyLevel::Hard => "hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "easy" => Some(DifficultyLevel::Easy),
            "medium" => Some(DifficultyLevel::Medium),
            "hard" => Some(DifficultyLevel::Hard),
            _ => None,
        }
    }
}

/// One row of a match-the-following question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

/// A canonical question row. Every version of a logical question is its own row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub unit_name: UnitName,
    pub year: i64,
    pub serial_number: i64,
    #[serde(default)]
    pub syllabus_section_id: Option<String>,
    pub question_type: QuestionType,
    pub question_text: String,
    #[serde(default)]
    pub answer_text: String,
    #[serde(default)]
    pub answer_list: Vec<String>,
    #[serde(default)]
    pub correct_option: Option<String>,
    #[serde(default)]
    pub match_pairs: Vec<MatchPair>,
    #[serde(default)]
    pub marks: i64,
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<u8>>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_latest_version: bool,
    #[serde(default)]
    pub previous_version_id: Option<String>,
    #[serde(default)]
    pub archived_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub linked_question: Vec<String>,
}

impl Question {
    /// Visible in normal listings: not deleted and not superseded.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.is_latest_version
    }
}

/// Query parameters for the standalone serial number lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSerialQuery {
    pub unit_name: UnitName,
    #[serde(default)]
    pub year: Option<i64>,
}

/// Next serial number for a unit/year pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextSerial {
    pub unit_name: UnitName,
    pub year: i64,
    pub serial_number: i64,
}
