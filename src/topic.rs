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

#[derive(Debug, Deserialize)]
pub struct TopicListQuery {
    pub subject_id: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTopicRequest {
    pub subject_id: String,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// LIST topics, usually for one subject.
pub async fn list_topics(
    data: web::Data<AppState>,
    query: web::Query<TopicListQuery>,
) -> impl Responder {
    let mut filter = doc! {};
    if let Some(subject_id) = &query.subject_id {
        filter.insert("subject_id", subject_id);
    }
    if let Some(active) = query.active {
        filter.insert("active", active);
    }

    let topics = data.mongodb.db.collection::<Topic>("topics");
    let mut cursor = match topics.find(filter).sort(doc! { "name": 1 }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching topics: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching topics");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(topic) => items.push(topic),
            Err(e) => {
                error!("Error reading topic cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching topics");
            }
        }
    }

    HttpResponse::Ok().json(items)
}

/// CREATE a topic under an existing subject. Admin only.
pub async fn create_topic(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTopicRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("Topic name is required");
    }

    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    match subjects.find_one(doc! { "_id": &payload.subject_id }).await {
        Ok(Some(_)) => {}
        Ok(None) => return HttpResponse::NotFound().body("Subject not found"),
        Err(e) => {
            error!("Error fetching subject {}: {}", payload.subject_id, e);
            return HttpResponse::InternalServerError().body("Error creating topic");
        }
    }

    let now = BsonDateTime::now();
    let topic = Topic {
        id: uuid::Uuid::new_v4().to_string(),
        subject_id: payload.subject_id.clone(),
        name: name.to_string(),
        description: payload.description.clone(),
        active: true,
        created_at: now,
        updated_at: now,
    };

    let topics = data.mongodb.db.collection::<Topic>("topics");
    match topics.insert_one(&topic).await {
        Ok(_) => HttpResponse::Ok().json(topic),
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A topic with this name already exists for this subject");
            }
            error!("Error creating topic: {}", e);
            HttpResponse::InternalServerError().body("Error creating topic")
        }
    }
}

/// UPDATE a topic. Admin only. The parent subject never changes.
pub async fn update_topic(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateTopicRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let topic_id = path.into_inner();

    let mut set = doc! { "updated_at": BsonDateTime::now() };
    if let Some(name) = &payload.name {
        let name = name.trim();
        if name.is_empty() {
            return HttpResponse::BadRequest().body("Topic name is required");
        }
        set.insert("name", name);
    }
    if let Some(description) = &payload.description {
        set.insert("description", description);
    }
    if let Some(active) = payload.active {
        set.insert("active", active);
    }

    let topics = data.mongodb.db.collection::<Topic>("topics");
    match topics
        .update_one(doc! { "_id": &topic_id }, doc! { "$set": set })
        .await
    {
        Ok(result) if result.matched_count == 0 => HttpResponse::NotFound().body("Topic not found"),
        Ok(_) => match topics.find_one(doc! { "_id": &topic_id }).await {
            Ok(Some(topic)) => HttpResponse::Ok().json(topic),
            _ => HttpResponse::InternalServerError().body("Error updating topic"),
        },
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A topic with this name already exists for this subject");
            }
            error!("Error updating topic {}: {}", topic_id, e);
            HttpResponse::InternalServerError().body("Error updating topic")
        }
    }
}

/// DELETE a topic. Admin only.
pub async fn delete_topic(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let topic_id = path.into_inner();

    let topics = data.mongodb.db.collection::<Topic>("topics");
    match topics.delete_one(doc! { "_id": &topic_id }).await {
        Ok(result) if result.deleted_count == 0 => HttpResponse::NotFound().body("Topic not found"),
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Topic deleted" })),
        Err(e) => {
            error!("Error deleting topic {}: {}", topic_id, e);
            HttpResponse::InternalServerError().body("Error deleting topic")
        }
    }
}
