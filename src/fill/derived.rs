//! Facts computed from the data itself rather than from an explicit mapping,
//! and the classification of fields that represent those facts.

use lazy_static::lazy_static;
use regex::Regex;

use super::models::Field;

pub const AGE_HEADER: &str = "AGE";
pub const GENDER_HEADER: &str = "GENDER";
pub const AGE_THRESHOLD: f64 = 35.0;

lazy_static! {
    static ref BELOW_35_YES: Regex = Regex::new(r"below\s*.*35.*yes").unwrap();
    static ref BELOW_35_NO: Regex = Regex::new(r"below\s*.*35.*no").unwrap();
    static ref MALE_WORD: Regex = Regex::new(r"\bmale\b").unwrap();
    static ref FEMALE_WORD: Regex = Regex::new(r"\bfemale\b").unwrap();
}

/// Whether `text` contains the standalone word "male". "female" does not count.
pub fn mentions_male(text: &str) -> bool {
    MALE_WORD.is_match(text)
}

pub fn mentions_female(text: &str) -> bool {
    FEMALE_WORD.is_match(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenderCategory {
    Male,
    Female,
    /// Any other non-empty value, upper-cased.
    Other(String),
    Unknown,
}

impl GenderCategory {
    pub fn from_raw(raw: &str) -> Self {
        let value = raw.trim().to_uppercase();
        match value.as_str() {
            "" => GenderCategory::Unknown,
            "M" | "MALE" | "MAN" | "BOY" => GenderCategory::Male,
            "F" | "FEMALE" | "WOMAN" | "GIRL" => GenderCategory::Female,
            _ => GenderCategory::Other(value),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GenderCategory::Male => "MALE",
            GenderCategory::Female => "FEMALE",
            GenderCategory::Other(value) => value,
            GenderCategory::Unknown => "",
        }
    }
}

/// Case-insensitive, trimmed header lookup.
fn find_header(headers: &[String], name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name))
}

/// `true` when the row's AGE cell parses as a number below 35.
/// A missing header, empty cell or non-numeric value counts as `false`.
pub fn age_below_threshold(row: &[String], headers: &[String]) -> bool {
    find_header(headers, AGE_HEADER)
        .and_then(|index| row.get(index))
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .and_then(|cell| cell.parse::<f64>().ok())
        .map(|age| age < AGE_THRESHOLD)
        .unwrap_or(false)
}

pub fn gender_category(row: &[String], headers: &[String]) -> GenderCategory {
    find_header(headers, GENDER_HEADER)
        .and_then(|index| row.get(index))
        .map(|cell| GenderCategory::from_raw(cell))
        .unwrap_or(GenderCategory::Unknown)
}

/// Derived facts for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedConditions {
    pub below_35: bool,
    pub gender: GenderCategory,
}

impl DerivedConditions {
    pub fn evaluate(row: &[String], headers: &[String]) -> Self {
        Self {
            below_35: age_below_threshold(row, headers),
            gender: gender_category(row, headers),
        }
    }

    /// Whether a simple derived-role field should receive its mark.
    /// `Mapped` and `GenderRegion` are decided elsewhere and always answer `false`.
    pub fn holds(&self, role: FieldRole) -> bool {
        match role {
            FieldRole::Below35Yes => self.below_35,
            FieldRole::Below35No => !self.below_35,
            FieldRole::GenderMale => self.gender == GenderCategory::Male,
            FieldRole::GenderFemale => self.gender == GenderCategory::Female,
            FieldRole::Mapped | FieldRole::GenderRegion => false,
        }
    }
}

/// What a field stands for, decided once per batch from its id and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    Mapped,
    Below35Yes,
    Below35No,
    GenderRegion,
    GenderMale,
    GenderFemale,
}

impl FieldRole {
    /// First match wins, in this order: below-35 yes, below-35 no, gender
    /// region, gender male, gender female, otherwise mapped.
    pub fn classify(field: &Field) -> Self {
        let id = field.id.to_lowercase();
        let label = field.label.to_lowercase();
        let named = |name: &str| id == name || label == name;

        if named("below35_yes") || BELOW_35_YES.is_match(&label) {
            FieldRole::Below35Yes
        } else if named("below35_no") || BELOW_35_NO.is_match(&label) {
            FieldRole::Below35No
        } else if named("gender") {
            FieldRole::GenderRegion
        } else if named("gender_male") || mentions_male(&label) {
            FieldRole::GenderMale
        } else if named("gender_female") || mentions_female(&label) {
            FieldRole::GenderFemale
        } else {
            FieldRole::Mapped
        }
    }

    pub fn is_derived(self) -> bool {
        self != FieldRole::Mapped
    }
}
