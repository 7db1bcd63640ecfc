use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::taxonomy::EducationLevel;

/// A subject offered on the platform, e.g. "Biology" under the Biological
/// Science category at ADVANCED_LEVEL. Names are globally unique.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Subject {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub education_level: EducationLevel,
    pub active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A subdivision of a subject a tutor can specialize in. Names are unique
/// within the parent subject.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Topic {
    #[serde(rename = "_id")]
    pub id: String,
    pub subject_id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Node of the city → town → hometown tree. Level 1 has no parent; level 2
/// parents are level 1; level 3 parents are level 2.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Location {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub level: i32,
    pub parent_id: Option<String>,
    pub active: bool,
    pub created_at: DateTime,
}
