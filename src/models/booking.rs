use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

/// Teaching mode selected for a booking. Mirrors the keys of
/// `TeachingModes` on the tutor profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeachingModeKind {
    Online,
    HomeVisit,
    Group,
}

impl TeachingModeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeachingModeKind::Online => "online",
            TeachingModeKind::HomeVisit => "home_visit",
            TeachingModeKind::Group => "group",
        }
    }
}

/// A student's booking of a tutor for a subject over a time window. The
/// amount is computed once at creation from the tutor's rate for the chosen
/// mode.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub mode: TeachingModeKind,
    pub start_time: DateTime,
    pub end_time: DateTime,
    pub amount: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// One rating per completed booking; topics are copied from the booking at
/// rating time.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Rating {
    #[serde(rename = "_id")]
    pub id: String,
    pub booking_id: String,
    pub tutor_id: String,
    pub student_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub score: f64,
    pub review: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Favorite {
    #[serde(rename = "_id")]
    pub id: String,
    pub student_id: String,
    pub tutor_id: String,
    pub created_at: DateTime,
}
