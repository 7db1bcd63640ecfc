use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// One of the three ways a tutor can deliver a subject, each independently
/// priced per hour.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TeachingMode {
    pub enabled: bool,
    pub rate: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct TeachingModes {
    pub online: TeachingMode,
    pub home_visit: TeachingMode,
    pub group: TeachingMode,
}

/// A free-form HH:mm time window within one weekday.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AvailabilitySlot {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DayAvailability {
    pub day: String,
    pub slots: Vec<AvailabilitySlot>,
}

/// A subject a tutor teaches: which topics of it, in which modes at which
/// rates, and when.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TutorSubject {
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub modes: TeachingModes,
    #[serde(default)]
    pub availability: Vec<DayAvailability>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub year: i32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExperienceEntry {
    pub title: String,
    pub institution: String,
    pub start_year: i32,
    pub end_year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SocialLinks {
    pub website: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub youtube: Option<String>,
}

/// A file the tutor uploaded for the verification review. Only the hosted
/// URL and a label are kept here.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationDocument {
    pub document_id: String,
    pub url: String,
    pub label: Option<String>,
    pub uploaded_at: DateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default)]
pub struct VerificationChecks {
    pub identity: bool,
    pub qualifications: bool,
    pub background: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationRecord {
    pub status: VerificationStatus,
    pub checks: VerificationChecks,
    pub rejection_reason: Option<String>,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime>,
}

impl Default for VerificationRecord {
    fn default() -> Self {
        VerificationRecord {
            status: VerificationStatus::Pending,
            checks: VerificationChecks::default(),
            rejection_reason: None,
            verified_by: None,
            verified_at: None,
        }
    }
}

/// Tutor extension of a user account. Exactly one per user with the tutor
/// role, enforced by a unique index on user_id. `rating`, `total_reviews`
/// and `total_favorites` are derived from the ratings and favorites
/// collections and recomputed on every write there.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Tutor {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub bio: Option<String>,
    pub gender: Option<String>,
    #[serde(default)]
    pub social_links: SocialLinks,
    #[serde(default)]
    pub teaching_mediums: Vec<String>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub experience: Vec<ExperienceEntry>,
    #[serde(default)]
    pub subjects: Vec<TutorSubject>,
    pub available_locations: Option<String>,
    #[serde(default)]
    pub documents: Vec<VerificationDocument>,
    pub rating: f64,
    pub total_reviews: i64,
    pub total_favorites: i64,
    pub is_verified: bool,
    #[serde(default)]
    pub verification: VerificationRecord,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Tutor {
    /// A fresh, empty tutor profile for a newly registered tutor user.
    pub fn new(user_id: &str) -> Self {
        let now = DateTime::now();
        Tutor {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            bio: None,
            gender: None,
            social_links: SocialLinks::default(),
            teaching_mediums: Vec::new(),
            education: Vec::new(),
            experience: Vec::new(),
            subjects: Vec::new(),
            available_locations: None,
            documents: Vec::new(),
            rating: 0.0,
            total_reviews: 0,
            total_favorites: 0,
            is_verified: false,
            verification: VerificationRecord::default(),
            created_at: now,
            updated_at: now,
        }
    }
}
