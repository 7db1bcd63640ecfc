use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Datelike;
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{bson, doc, DateTime as BsonDateTime};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_role;
use crate::models::booking::{Favorite, Rating};
use crate::models::catalog::{Subject, Topic};
use crate::models::tutor::{
    EducationEntry, ExperienceEntry, SocialLinks, Tutor, TutorSubject, VerificationDocument,
};
use crate::models::{page_limit, page_skip, Role, User};

pub const MAX_TOPICS_PER_SUBJECT: usize = 5;

const WEEKDAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

#[derive(Debug, Deserialize)]
pub struct TutorSearchQuery {
    pub subject_id: Option<String>,
    pub verified: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub social_links: Option<SocialLinks>,
    pub teaching_mediums: Option<Vec<String>>,
    pub education: Option<Vec<EducationEntry>>,
    pub experience: Option<Vec<ExperienceEntry>>,
    pub subjects: Option<Vec<TutorSubject>>,
    pub available_locations: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub url: String,
    pub label: Option<String>,
}

pub fn validate_education(entries: &[EducationEntry]) -> Result<(), String> {
    let current_year = chrono::Utc::now().year();
    for entry in entries {
        if entry.degree.trim().is_empty() || entry.institution.trim().is_empty() {
            return Err("Education entries need a degree and an institution".to_string());
        }
        if entry.year < 1950 || entry.year > current_year + 1 {
            return Err(format!("Education year {} is out of range", entry.year));
        }
    }
    Ok(())
}

pub fn validate_experience(entries: &[ExperienceEntry]) -> Result<(), String> {
    let current_year = chrono::Utc::now().year();
    for entry in entries {
        if entry.title.trim().is_empty() || entry.institution.trim().is_empty() {
            return Err("Experience entries need a title and an institution".to_string());
        }
        if entry.start_year < 1950 || entry.start_year > current_year + 1 {
            return Err(format!(
                "Experience start year {} is out of range",
                entry.start_year
            ));
        }
        if let Some(end_year) = entry.end_year {
            if end_year < entry.start_year {
                return Err("Experience cannot end before it starts".to_string());
            }
        }
    }
    Ok(())
}

/// Checks one subject entry's shape: topic cap, at least one priced mode,
/// well-formed availability windows.
pub fn validate_subject_entry(entry: &TutorSubject) -> Result<(), String> {
    if entry.topic_ids.len() > MAX_TOPICS_PER_SUBJECT {
        return Err(format!(
            "A subject can have at most {} topics",
            MAX_TOPICS_PER_SUBJECT
        ));
    }

    let modes = [
        &entry.modes.online,
        &entry.modes.home_visit,
        &entry.modes.group,
    ];
    if !modes.iter().any(|m| m.enabled && m.rate > 0.0) {
        return Err("Each subject needs at least one enabled mode with a positive rate".to_string());
    }
    if modes.iter().any(|m| m.rate < 0.0) {
        return Err("Rates cannot be negative".to_string());
    }

    let time_format = Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").unwrap();
    for day in &entry.availability {
        if !WEEKDAYS.contains(&day.day.as_str()) {
            return Err(format!("'{}' is not a weekday", day.day));
        }
        for slot in &day.slots {
            if !time_format.is_match(&slot.start) || !time_format.is_match(&slot.end) {
                return Err("Availability times must use the HH:mm format".to_string());
            }
            if slot.start >= slot.end {
                return Err("Availability slots must end after they start".to_string());
            }
        }
    }

    Ok(())
}

async fn load_own_tutor(
    data: &web::Data<AppState>,
    user: &User,
) -> Result<Tutor, HttpResponse> {
    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors.find_one(doc! { "user_id": &user.id }).await {
        Ok(Some(tutor)) => Ok(tutor),
        Ok(None) => Err(HttpResponse::NotFound().body("Tutor profile not found")),
        Err(e) => {
            error!("Error loading tutor profile for {}: {}", user.id, e);
            Err(HttpResponse::InternalServerError().body("Error loading tutor profile"))
        }
    }
}

/// SEARCH tutors, verified-first use case for the public listing page.
pub async fn search_tutors(
    data: web::Data<AppState>,
    query: web::Query<TutorSearchQuery>,
) -> impl Responder {
    let mut filter = doc! {};
    if let Some(subject_id) = &query.subject_id {
        filter.insert("subjects.subject_id", subject_id);
    }
    if let Some(verified) = query.verified {
        filter.insert("is_verified", verified);
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = regex::escape(search);
        // Names live on the user document, so matching users feed the
        // tutor filter by id.
        let users = data.mongodb.db.collection::<User>("users");
        let mut matched_ids: Vec<String> = Vec::new();
        match users
            .find(doc! { "name": { "$regex": &pattern, "$options": "i" }, "role": "tutor" })
            .await
        {
            Ok(mut cursor) => {
                while let Some(result) = cursor.next().await {
                    if let Ok(user) = result {
                        matched_ids.push(user.id);
                    }
                }
            }
            Err(e) => {
                error!("Error searching users: {}", e);
                return HttpResponse::InternalServerError().body("Error searching tutors");
            }
        }

        filter.insert(
            "$or",
            bson!([
                { "bio": { "$regex": &pattern, "$options": "i" } },
                { "available_locations": { "$regex": &pattern, "$options": "i" } },
                { "user_id": { "$in": matched_ids } },
            ]),
        );
    }

    let limit = page_limit(query.limit);
    let skip = page_skip(query.page, limit);

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let total = match tutors.count_documents(filter.clone()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Error counting tutors: {}", e);
            return HttpResponse::InternalServerError().body("Error searching tutors");
        }
    };

    let mut cursor = match tutors
        .find(filter)
        .sort(doc! { "rating": -1, "total_reviews": -1 })
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error searching tutors: {}", e);
            return HttpResponse::InternalServerError().body("Error searching tutors");
        }
    };

    let mut items: Vec<Tutor> = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(tutor) => items.push(tutor),
            Err(e) => {
                error!("Error reading tutor cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error searching tutors");
            }
        }
    }

    let user_ids: Vec<&str> = items.iter().map(|t| t.user_id.as_str()).collect();
    let users = data.mongodb.db.collection::<User>("users");
    let mut names = std::collections::HashMap::new();
    match users.find(doc! { "_id": { "$in": user_ids } }).await {
        Ok(mut cursor) => {
            while let Some(result) = cursor.next().await {
                if let Ok(user) = result {
                    names.insert(
                        user.id.clone(),
                        json!({ "name": user.name, "profile_image": user.profile_image }),
                    );
                }
            }
        }
        Err(e) => {
            error!("Error joining tutor users: {}", e);
            return HttpResponse::InternalServerError().body("Error searching tutors");
        }
    }

    let enriched: Vec<_> = items
        .into_iter()
        .map(|tutor| {
            let user = names.get(&tutor.user_id).cloned().unwrap_or(json!(null));
            json!({ "tutor": tutor, "user": user })
        })
        .collect();

    HttpResponse::Ok().json(json!({ "tutors": enriched, "total": total }))
}

/// GET a tutor's public profile by tutor id.
pub async fn get_tutor(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let tutor_id = path.into_inner();

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let tutor = match tutors.find_one(doc! { "_id": &tutor_id }).await {
        Ok(Some(tutor)) => tutor,
        Ok(None) => return HttpResponse::NotFound().body("Tutor not found"),
        Err(e) => {
            error!("Error fetching tutor {}: {}", tutor_id, e);
            return HttpResponse::InternalServerError().body("Error fetching tutor");
        }
    };

    let users = data.mongodb.db.collection::<User>("users");
    let user = match users.find_one(doc! { "_id": &tutor.user_id }).await {
        Ok(Some(user)) => json!({ "name": user.name, "profile_image": user.profile_image }),
        Ok(None) => json!(null),
        Err(e) => {
            error!("Error fetching user for tutor {}: {}", tutor_id, e);
            return HttpResponse::InternalServerError().body("Error fetching tutor");
        }
    };

    HttpResponse::Ok().json(json!({ "tutor": tutor, "user": user }))
}

/// GET the caller's own tutor profile.
pub async fn get_own_profile(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    match load_own_tutor(&data, &user).await {
        Ok(tutor) => HttpResponse::Ok().json(tutor),
        Err(resp) => resp,
    }
}

/// UPDATE the caller's tutor profile. Derived counters and the
/// verification record are never writable from here.
pub async fn update_own_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let tutor = match load_own_tutor(&data, &user).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };

    if let Some(education) = &payload.education {
        if let Err(message) = validate_education(education) {
            return HttpResponse::BadRequest().body(message);
        }
    }
    if let Some(experience) = &payload.experience {
        if let Err(message) = validate_experience(experience) {
            return HttpResponse::BadRequest().body(message);
        }
    }

    if let Some(subjects) = &payload.subjects {
        for entry in subjects {
            if let Err(message) = validate_subject_entry(entry) {
                return HttpResponse::BadRequest().body(message);
            }

            let subjects_coll = data.mongodb.db.collection::<Subject>("subjects");
            match subjects_coll
                .find_one(doc! { "_id": &entry.subject_id })
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return HttpResponse::BadRequest()
                        .body(format!("Subject {} does not exist", entry.subject_id))
                }
                Err(e) => {
                    error!("Error checking subject {}: {}", entry.subject_id, e);
                    return HttpResponse::InternalServerError().body("Error updating profile");
                }
            }

            if !entry.topic_ids.is_empty() {
                let topics_coll = data.mongodb.db.collection::<Topic>("topics");
                let owned = match topics_coll
                    .count_documents(doc! {
                        "_id": { "$in": &entry.topic_ids },
                        "subject_id": &entry.subject_id,
                    })
                    .await
                {
                    Ok(count) => count,
                    Err(e) => {
                        error!("Error checking topics for {}: {}", entry.subject_id, e);
                        return HttpResponse::InternalServerError().body("Error updating profile");
                    }
                };
                if owned as usize != entry.topic_ids.len() {
                    return HttpResponse::BadRequest().body(format!(
                        "Some topics do not belong to subject {}",
                        entry.subject_id
                    ));
                }
            }
        }
    }

    let mut set = doc! { "updated_at": BsonDateTime::now() };
    if let Some(bio) = &payload.bio {
        set.insert("bio", bio);
    }
    if let Some(gender) = &payload.gender {
        set.insert("gender", gender);
    }
    if let Some(social_links) = &payload.social_links {
        match mongodb::bson::to_bson(social_links) {
            Ok(value) => {
                set.insert("social_links", value);
            }
            Err(e) => {
                error!("Error serializing social links: {}", e);
                return HttpResponse::InternalServerError().body("Error updating profile");
            }
        }
    }
    if let Some(teaching_mediums) = &payload.teaching_mediums {
        set.insert("teaching_mediums", teaching_mediums);
    }
    if let Some(education) = &payload.education {
        match mongodb::bson::to_bson(education) {
            Ok(value) => {
                set.insert("education", value);
            }
            Err(e) => {
                error!("Error serializing education: {}", e);
                return HttpResponse::InternalServerError().body("Error updating profile");
            }
        }
    }
    if let Some(experience) = &payload.experience {
        match mongodb::bson::to_bson(experience) {
            Ok(value) => {
                set.insert("experience", value);
            }
            Err(e) => {
                error!("Error serializing experience: {}", e);
                return HttpResponse::InternalServerError().body("Error updating profile");
            }
        }
    }
    if let Some(subjects) = &payload.subjects {
        match mongodb::bson::to_bson(subjects) {
            Ok(value) => {
                set.insert("subjects", value);
            }
            Err(e) => {
                error!("Error serializing subjects: {}", e);
                return HttpResponse::InternalServerError().body("Error updating profile");
            }
        }
    }
    if let Some(available_locations) = &payload.available_locations {
        set.insert("available_locations", available_locations);
    }

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors
        .update_one(doc! { "_id": &tutor.id }, doc! { "$set": set })
        .await
    {
        Ok(_) => match tutors.find_one(doc! { "_id": &tutor.id }).await {
            Ok(Some(updated)) => HttpResponse::Ok().json(updated),
            _ => HttpResponse::InternalServerError().body("Error updating profile"),
        },
        Err(e) => {
            error!("Error updating tutor {}: {}", tutor.id, e);
            HttpResponse::InternalServerError().body("Error updating profile")
        }
    }
}

/// ADD a verification document to the caller's profile.
pub async fn add_document(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<AddDocumentRequest>,
) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let tutor = match load_own_tutor(&data, &user).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };

    if payload.url.trim().is_empty() {
        return HttpResponse::BadRequest().body("Document URL is required");
    }

    let document = VerificationDocument {
        document_id: uuid::Uuid::new_v4().to_string(),
        url: payload.url.trim().to_string(),
        label: payload.label.clone(),
        uploaded_at: BsonDateTime::now(),
    };
    let document_bson = match mongodb::bson::to_bson(&document) {
        Ok(value) => value,
        Err(e) => {
            error!("Error serializing document: {}", e);
            return HttpResponse::InternalServerError().body("Error adding document");
        }
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors
        .update_one(
            doc! { "_id": &tutor.id },
            doc! {
                "$push": { "documents": document_bson },
                "$set": { "updated_at": BsonDateTime::now() },
            },
        )
        .await
    {
        Ok(_) => HttpResponse::Ok().json(document),
        Err(e) => {
            error!("Error adding document to tutor {}: {}", tutor.id, e);
            HttpResponse::InternalServerError().body("Error adding document")
        }
    }
}

/// REMOVE a verification document from the caller's profile.
pub async fn remove_document(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let tutor = match load_own_tutor(&data, &user).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };
    let document_id = path.into_inner();

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors
        .update_one(
            doc! { "_id": &tutor.id },
            doc! {
                "$pull": { "documents": { "document_id": &document_id } },
                "$set": { "updated_at": BsonDateTime::now() },
            },
        )
        .await
    {
        Ok(result) if result.modified_count == 0 => {
            HttpResponse::NotFound().body("Document not found")
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Document removed" })),
        Err(e) => {
            error!("Error removing document from tutor {}: {}", tutor.id, e);
            HttpResponse::InternalServerError().body("Error removing document")
        }
    }
}

/// DELETE the caller's tutor profile along with its ratings and
/// favorites. Bookings are left in place and keep their tutor id.
pub async fn delete_own_profile(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let tutor = match load_own_tutor(&data, &user).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    if let Err(e) = tutors.delete_one(doc! { "_id": &tutor.id }).await {
        error!("Error deleting tutor {}: {}", tutor.id, e);
        return HttpResponse::InternalServerError().body("Error deleting profile");
    }

    let ratings = data.mongodb.db.collection::<Rating>("ratings");
    if let Err(e) = ratings.delete_many(doc! { "tutor_id": &tutor.id }).await {
        error!("Error deleting ratings of tutor {}: {}", tutor.id, e);
    }
    let favorites = data.mongodb.db.collection::<Favorite>("favorites");
    if let Err(e) = favorites.delete_many(doc! { "tutor_id": &tutor.id }).await {
        error!("Error deleting favorites of tutor {}: {}", tutor.id, e);
    }

    HttpResponse::Ok().json(json!({ "message": "Tutor profile deleted" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tutor::{AvailabilitySlot, DayAvailability, TeachingMode, TeachingModes};

    fn subject_entry() -> TutorSubject {
        TutorSubject {
            subject_id: "s1".to_string(),
            topic_ids: vec!["t1".to_string()],
            modes: TeachingModes {
                online: TeachingMode {
                    enabled: true,
                    rate: 2500.0,
                },
                home_visit: TeachingMode::default(),
                group: TeachingMode::default(),
            },
            availability: vec![DayAvailability {
                day: "Monday".to_string(),
                slots: vec![AvailabilitySlot {
                    start: "09:00".to_string(),
                    end: "11:30".to_string(),
                }],
            }],
        }
    }

    #[test]
    fn subject_entry_accepts_a_priced_mode() {
        assert!(validate_subject_entry(&subject_entry()).is_ok());
    }

    #[test]
    fn subject_entry_needs_an_enabled_priced_mode() {
        let mut entry = subject_entry();
        entry.modes.online.rate = 0.0;
        assert!(validate_subject_entry(&entry).is_err());

        let mut entry = subject_entry();
        entry.modes.online.enabled = false;
        assert!(validate_subject_entry(&entry).is_err());
    }

    #[test]
    fn subject_entry_caps_topics_at_five() {
        let mut entry = subject_entry();
        entry.topic_ids = (0..6).map(|i| format!("t{}", i)).collect();
        assert!(validate_subject_entry(&entry).is_err());
    }

    #[test]
    fn availability_times_must_be_hh_mm() {
        let mut entry = subject_entry();
        entry.availability[0].slots[0].start = "9:00".to_string();
        assert!(validate_subject_entry(&entry).is_err());

        let mut entry = subject_entry();
        entry.availability[0].slots[0].end = "24:00".to_string();
        assert!(validate_subject_entry(&entry).is_err());

        let mut entry = subject_entry();
        entry.availability[0].slots[0].end = "08:00".to_string();
        assert!(validate_subject_entry(&entry).is_err());

        let mut entry = subject_entry();
        entry.availability[0].day = "Funday".to_string();
        assert!(validate_subject_entry(&entry).is_err());
    }

    #[test]
    fn education_year_bounds() {
        let entry = EducationEntry {
            degree: "BSc".to_string(),
            institution: "University of Colombo".to_string(),
            year: 1900,
        };
        assert!(validate_education(&[entry]).is_err());

        let entry = EducationEntry {
            degree: "BSc".to_string(),
            institution: "University of Colombo".to_string(),
            year: 2015,
        };
        assert!(validate_education(&[entry]).is_ok());
    }

    #[test]
    fn experience_cannot_end_before_start() {
        let entry = ExperienceEntry {
            title: "Lecturer".to_string(),
            institution: "Royal College".to_string(),
            start_year: 2020,
            end_year: Some(2018),
            description: None,
        };
        assert!(validate_experience(&[entry]).is_err());
    }
}
