use serde::{Deserialize, Serialize};

/// The five education levels a subject can be offered at. Stored as
/// SCREAMING_SNAKE_CASE strings, which is also the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EducationLevel {
    Primary,
    JuniorSecondary,
    SeniorSecondary,
    AdvancedLevel,
    HigherEducation,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::Primary => "PRIMARY",
            EducationLevel::JuniorSecondary => "JUNIOR_SECONDARY",
            EducationLevel::SeniorSecondary => "SENIOR_SECONDARY",
            EducationLevel::AdvancedLevel => "ADVANCED_LEVEL",
            EducationLevel::HigherEducation => "HIGHER_EDUCATION",
        }
    }
}

pub const PRIMARY_CATEGORIES: &[&str] = &["Core Subjects", "Languages", "Religion"];

pub const JUNIOR_SECONDARY_CATEGORIES: &[&str] = &[
    "Core Subjects",
    "Languages",
    "Humanities",
    "Aesthetic Studies",
    "Health & Physical Education",
];

pub const SENIOR_SECONDARY_CATEGORIES: &[&str] = &[
    "Core Subjects",
    "Languages",
    "Humanities",
    "Commerce",
    "Technology",
    "Aesthetic Studies",
];

// Advanced Level is partitioned into the three national streams. A category
// is valid for ADVANCED_LEVEL when it appears in any stream.
pub const ADVANCED_LEVEL_ARTS: &[&str] = &[
    "Languages",
    "Social Sciences",
    "Religions & Civilizations",
    "Aesthetic Studies",
];

pub const ADVANCED_LEVEL_COMMERCE: &[&str] =
    &["Accounting", "Business Studies", "Economics"];

pub const ADVANCED_LEVEL_SCIENCE: &[&str] = &[
    "Physical Science",
    "Biological Science",
    "Combined Mathematics",
    "Information & Communication Technology",
];

pub const HIGHER_EDUCATION_CATEGORIES: &[&str] = &[
    "Information Technology",
    "Engineering",
    "Medicine & Health Sciences",
    "Law",
    "Management & Finance",
    "Humanities",
];

/// Category membership check for a given education level. Used identically by
/// subject create and update.
pub fn validate_category(level: EducationLevel, category: &str) -> bool {
    match level {
        EducationLevel::Primary => PRIMARY_CATEGORIES.contains(&category),
        EducationLevel::JuniorSecondary => JUNIOR_SECONDARY_CATEGORIES.contains(&category),
        EducationLevel::SeniorSecondary => SENIOR_SECONDARY_CATEGORIES.contains(&category),
        EducationLevel::AdvancedLevel => {
            ADVANCED_LEVEL_ARTS.contains(&category)
                || ADVANCED_LEVEL_COMMERCE.contains(&category)
                || ADVANCED_LEVEL_SCIENCE.contains(&category)
        }
        EducationLevel::HigherEducation => HIGHER_EDUCATION_CATEGORIES.contains(&category),
    }
}

/// The full valid category set for a level, for error messages and the
/// taxonomy endpoint.
pub fn categories_for(level: EducationLevel) -> Vec<&'static str> {
    match level {
        EducationLevel::Primary => PRIMARY_CATEGORIES.to_vec(),
        EducationLevel::JuniorSecondary => JUNIOR_SECONDARY_CATEGORIES.to_vec(),
        EducationLevel::SeniorSecondary => SENIOR_SECONDARY_CATEGORIES.to_vec(),
        EducationLevel::AdvancedLevel => {
            let mut all = ADVANCED_LEVEL_ARTS.to_vec();
            all.extend_from_slice(ADVANCED_LEVEL_COMMERCE);
            all.extend_from_slice(ADVANCED_LEVEL_SCIENCE);
            all
        }
        EducationLevel::HigherEducation => HIGHER_EDUCATION_CATEGORIES.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_accepts_its_own_categories() {
        assert!(validate_category(EducationLevel::Primary, "Languages"));
        assert!(!validate_category(EducationLevel::Primary, "Commerce"));
    }

    #[test]
    fn advanced_level_accepts_union_of_streams() {
        assert!(validate_category(EducationLevel::AdvancedLevel, "Economics"));
        assert!(validate_category(
            EducationLevel::AdvancedLevel,
            "Biological Science"
        ));
        assert!(validate_category(
            EducationLevel::AdvancedLevel,
            "Social Sciences"
        ));
    }

    #[test]
    fn advanced_level_rejects_subject_names_as_categories() {
        // "Biology" is a subject under the Biological Science category, not a
        // category itself.
        assert!(!validate_category(EducationLevel::AdvancedLevel, "Biology"));
        assert!(!validate_category(EducationLevel::AdvancedLevel, "Physics"));
    }

    #[test]
    fn higher_education_uses_its_own_list() {
        assert!(validate_category(
            EducationLevel::HigherEducation,
            "Engineering"
        ));
        assert!(!validate_category(
            EducationLevel::HigherEducation,
            "Biological Science"
        ));
    }

    #[test]
    fn categories_for_advanced_level_is_the_stream_union() {
        let all = categories_for(EducationLevel::AdvancedLevel);
        assert!(all.contains(&"Languages"));
        assert!(all.contains(&"Accounting"));
        assert!(all.contains(&"Combined Mathematics"));
        assert_eq!(
            all.len(),
            ADVANCED_LEVEL_ARTS.len()
                + ADVANCED_LEVEL_COMMERCE.len()
                + ADVANCED_LEVEL_SCIENCE.len()
        );
    }

    #[test]
    fn level_round_trips_through_serde() {
        let level: EducationLevel = serde_json::from_str("\"ADVANCED_LEVEL\"").unwrap();
        assert_eq!(level, EducationLevel::AdvancedLevel);
        assert_eq!(
            serde_json::to_string(&EducationLevel::JuniorSecondary).unwrap(),
            "\"JUNIOR_SECONDARY\""
        );
    }
}
