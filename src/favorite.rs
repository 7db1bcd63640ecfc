use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_role;
use crate::db::{duplicate_key_message, MongoDB};
use crate::models::booking::Favorite;
use crate::models::tutor::Tutor;
use crate::models::Role;

#[derive(Debug, Deserialize)]
pub struct AddFavoriteRequest {
    pub tutor_id: String,
}

async fn recount_favorites(db: &MongoDB, tutor_id: &str) {
    let favorites = db.db.collection::<Favorite>("favorites");
    let count = match favorites.count_documents(doc! { "tutor_id": tutor_id }).await {
        Ok(count) => count as i64,
        Err(e) => {
            error!("Error counting favorites of {}: {}", tutor_id, e);
            return;
        }
    };
    let tutors = db.db.collection::<mongodb::bson::Document>("tutors");
    if let Err(e) = tutors
        .update_one(
            doc! { "_id": tutor_id },
            doc! { "$set": { "total_favorites": count } },
        )
        .await
    {
        error!("Error updating favorite count of {}: {}", tutor_id, e);
    }
}

/// ADD a tutor to the caller's favourites. Students only.
pub async fn add_favorite(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<AddFavoriteRequest>,
) -> impl Responder {
    let student = match require_role(&req, &data, Role::Student).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors.find_one(doc! { "_id": &payload.tutor_id }).await {
        Ok(Some(_)) => {}
        Ok(None) => return HttpResponse::NotFound().body("Tutor not found"),
        Err(e) => {
            error!("Error fetching tutor {}: {}", payload.tutor_id, e);
            return HttpResponse::InternalServerError().body("Error adding favourite");
        }
    }

    let favorite = Favorite {
        id: uuid::Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        tutor_id: payload.tutor_id.clone(),
        created_at: BsonDateTime::now(),
    };

    let favorites = data.mongodb.db.collection::<Favorite>("favorites");
    if let Err(e) = favorites.insert_one(&favorite).await {
        if duplicate_key_message(&e).is_some() {
            return HttpResponse::BadRequest().body("This tutor is already in your favourites");
        }
        error!("Error adding favourite: {}", e);
        return HttpResponse::InternalServerError().body("Error adding favourite");
    }

    recount_favorites(&data.mongodb, &payload.tutor_id).await;

    HttpResponse::Ok().json(favorite)
}

/// REMOVE a tutor from the caller's favourites.
pub async fn remove_favorite(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let student = match require_role(&req, &data, Role::Student).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let tutor_id = path.into_inner();

    let favorites = data.mongodb.db.collection::<Favorite>("favorites");
    match favorites
        .delete_one(doc! { "student_id": &student.id, "tutor_id": &tutor_id })
        .await
    {
        Ok(result) if result.deleted_count == 0 => {
            return HttpResponse::NotFound().body("Favourite not found")
        }
        Ok(_) => {}
        Err(e) => {
            error!("Error removing favourite: {}", e);
            return HttpResponse::InternalServerError().body("Error removing favourite");
        }
    }

    recount_favorites(&data.mongodb, &tutor_id).await;

    HttpResponse::Ok().json(json!({ "message": "Favourite removed" }))
}

/// LIST the caller's favourite tutors.
pub async fn list_favorites(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let student = match require_role(&req, &data, Role::Student).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let favorites = data.mongodb.db.collection::<Favorite>("favorites");
    let mut cursor = match favorites
        .find(doc! { "student_id": &student.id })
        .sort(doc! { "created_at": -1 })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching favourites for {}: {}", student.id, e);
            return HttpResponse::InternalServerError().body("Error fetching favourites");
        }
    };

    let mut items: Vec<Favorite> = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(favorite) => items.push(favorite),
            Err(e) => {
                error!("Error reading favourite cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching favourites");
            }
        }
    }

    let tutor_ids: Vec<&str> = items.iter().map(|f| f.tutor_id.as_str()).collect();
    let tutors_coll = data.mongodb.db.collection::<Tutor>("tutors");
    let mut tutors = std::collections::HashMap::new();
    match tutors_coll.find(doc! { "_id": { "$in": tutor_ids } }).await {
        Ok(mut cursor) => {
            while let Some(result) = cursor.next().await {
                if let Ok(tutor) = result {
                    tutors.insert(tutor.id.clone(), tutor);
                }
            }
        }
        Err(e) => {
            error!("Error joining favourite tutors: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching favourites");
        }
    }

    let enriched: Vec<_> = items
        .into_iter()
        .map(|favorite| {
            let tutor = tutors.get(&favorite.tutor_id);
            json!({ "favorite": favorite, "tutor": tutor })
        })
        .collect();

    HttpResponse::Ok().json(enriched)
}
