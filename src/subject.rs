use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_admin;
use crate::db::duplicate_key_message;
use crate::models::catalog::{Subject, Topic};
use crate::taxonomy::{self, EducationLevel};

#[derive(Debug, Deserialize)]
pub struct SubjectListQuery {
    pub education_level: Option<EducationLevel>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSubjectRequest {
    pub name: String,
    pub category: String,
    pub education_level: EducationLevel,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub education_level: Option<EducationLevel>,
    pub active: Option<bool>,
}

fn invalid_category_response(level: EducationLevel, category: &str) -> HttpResponse {
    HttpResponse::BadRequest().body(format!(
        "'{}' is not a category of {}. Valid categories: {}",
        category,
        level.as_str(),
        taxonomy::categories_for(level).join(", ")
    ))
}

/// LIST subjects, optionally narrowed to one education level.
pub async fn list_subjects(
    data: web::Data<AppState>,
    query: web::Query<SubjectListQuery>,
) -> impl Responder {
    let mut filter = doc! {};
    if let Some(level) = query.education_level {
        filter.insert("education_level", level.as_str());
    }
    if let Some(active) = query.active {
        filter.insert("active", active);
    }

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    let mut cursor = match subjects.find(filter).sort(doc! { "name": 1 }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching subjects: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching subjects");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(subject) => items.push(subject),
            Err(e) => {
                error!("Error reading subject cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching subjects");
            }
        }
    }

    HttpResponse::Ok().json(items)
}

/// GET one subject with its topics.
pub async fn get_subject(data: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let subject_id = path.into_inner();

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    let subject = match subjects.find_one(doc! { "_id": &subject_id }).await {
        Ok(Some(subject)) => subject,
        Ok(None) => return HttpResponse::NotFound().body("Subject not found"),
        Err(e) => {
            error!("Error fetching subject {}: {}", subject_id, e);
            return HttpResponse::InternalServerError().body("Error fetching subject");
        }
    };

    let topics_coll = data.mongodb.db.collection::<Topic>("topics");
    let mut cursor = match topics_coll
        .find(doc! { "subject_id": &subject_id })
        .sort(doc! { "name": 1 })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching topics for subject {}: {}", subject_id, e);
            return HttpResponse::InternalServerError().body("Error fetching subject");
        }
    };

    let mut topics = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(topic) => topics.push(topic),
            Err(e) => {
                error!("Error reading topic cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching subject");
            }
        }
    }

    HttpResponse::Ok().json(json!({ "subject": subject, "topics": topics }))
}

/// CREATE a subject. Admin only. The category must belong to the chosen
/// education level's taxonomy.
pub async fn create_subject(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateSubjectRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("Subject name is required");
    }
    let category = payload.category.trim();
    if !taxonomy::validate_category(payload.education_level, category) {
        return invalid_category_response(payload.education_level, category);
    }

    let now = BsonDateTime::now();
    let subject = Subject {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        category: category.to_string(),
        education_level: payload.education_level,
        active: true,
        created_at: now,
        updated_at: now,
    };

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    match subjects.insert_one(&subject).await {
        Ok(_) => HttpResponse::Ok().json(subject),
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A subject with this name already exists");
            }
            error!("Error creating subject: {}", e);
            HttpResponse::InternalServerError().body("Error creating subject")
        }
    }
}

/// UPDATE a subject. Admin only.
pub async fn update_subject(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateSubjectRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let subject_id = path.into_inner();

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    let existing = match subjects.find_one(doc! { "_id": &subject_id }).await {
        Ok(Some(subject)) => subject,
        Ok(None) => return HttpResponse::NotFound().body("Subject not found"),
        Err(e) => {
            error!("Error fetching subject {}: {}", subject_id, e);
            return HttpResponse::InternalServerError().body("Error updating subject");
        }
    };

    // The category check runs against the level the subject will end up
    // with, not the one it had.
    let level = payload.education_level.unwrap_or(existing.education_level);
    let category = payload
        .category
        .as_deref()
        .map(str::trim)
        .unwrap_or(&existing.category)
        .to_string();
    if !taxonomy::validate_category(level, &category) {
        return invalid_category_response(level, &category);
    }

    let mut set = doc! {
        "category": &category,
        "education_level": level.as_str(),
        "updated_at": BsonDateTime::now(),
    };
    if let Some(name) = &payload.name {
        let name = name.trim();
        if name.is_empty() {
            return HttpResponse::BadRequest().body("Subject name is required");
        }
        set.insert("name", name);
    }
    if let Some(active) = payload.active {
        set.insert("active", active);
    }

    match subjects
        .update_one(doc! { "_id": &subject_id }, doc! { "$set": set })
        .await
    {
        Ok(_) => match subjects.find_one(doc! { "_id": &subject_id }).await {
            Ok(Some(subject)) => HttpResponse::Ok().json(subject),
            _ => HttpResponse::InternalServerError().body("Error updating subject"),
        },
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A subject with this name already exists");
            }
            error!("Error updating subject {}: {}", subject_id, e);
            HttpResponse::InternalServerError().body("Error updating subject")
        }
    }
}

/// DELETE a subject and every topic under it. Admin only.
pub async fn delete_subject(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let subject_id = path.into_inner();

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    match subjects.delete_one(doc! { "_id": &subject_id }).await {
        Ok(result) if result.deleted_count == 0 => {
            return HttpResponse::NotFound().body("Subject not found")
        }
        Ok(_) => {}
        Err(e) => {
            error!("Error deleting subject {}: {}", subject_id, e);
            return HttpResponse::InternalServerError().body("Error deleting subject");
        }
    }

    let topics = data.mongodb.db.collection::<Topic>("topics");
    if let Err(e) = topics.delete_many(doc! { "subject_id": &subject_id }).await {
        error!("Error deleting topics of subject {}: {}", subject_id, e);
        return HttpResponse::InternalServerError().body("Error deleting subject topics");
    }

    HttpResponse::Ok().json(json!({ "message": "Subject deleted" }))
}
