use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::app_state::AppState;
use crate::auth::{require_role, require_user};
use crate::db::{duplicate_key_message, MongoDB};
use crate::models::booking::{Booking, BookingStatus, Rating};
use crate::models::{page_limit, page_skip, Role};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRatingRequest {
    pub booking_id: String,
    #[validate(range(min = 1.0, max = 5.0))]
    pub score: f64,
    #[validate(length(min = 10))]
    pub review: String,
}

#[derive(Debug, Deserialize)]
pub struct RatingListQuery {
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

/// Mean score and count over a tutor's ratings. An unrated tutor reads as
/// 0.0 rather than NaN.
pub fn rating_summary(scores: &[f64]) -> (f64, i64) {
    if scores.is_empty() {
        return (0.0, 0);
    }
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    (mean, scores.len() as i64)
}

/// Maps a duplicate-key failure to the uniqueness rule that fired.
pub fn duplicate_rating_message(raw: &str) -> &'static str {
    if raw.contains("ratings_booking_unique") {
        "A rating for this booking already exists"
    } else if raw.contains("ratings_tutor_student_topics_unique") {
        "You have already rated this tutor for these topics"
    } else {
        "Duplicate rating"
    }
}

/// Re-derives the tutor's `rating` and `total_reviews` from the ratings
/// collection and persists them.
pub async fn recompute_tutor_rating(db: &MongoDB, tutor_id: &str) -> Result<(), String> {
    let ratings = db.db.collection::<Rating>("ratings");
    let mut cursor = ratings
        .find(doc! { "tutor_id": tutor_id })
        .await
        .map_err(|e| format!("Error fetching ratings: {}", e))?;

    let mut scores = Vec::new();
    while let Some(result) = cursor.next().await {
        let rating = result.map_err(|e| format!("Error reading rating cursor: {}", e))?;
        scores.push(rating.score);
    }

    let (mean, count) = rating_summary(&scores);
    let tutors = db.db.collection::<mongodb::bson::Document>("tutors");
    tutors
        .update_one(
            doc! { "_id": tutor_id },
            doc! { "$set": { "rating": mean, "total_reviews": count } },
        )
        .await
        .map_err(|e| format!("Error updating tutor aggregates: {}", e))?;
    Ok(())
}

/// RATE a completed booking. Students only. Rating the same booking again
/// replaces the previous score and review.
pub async fn create_rating(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateRatingRequest>,
) -> impl Responder {
    let student = match require_role(&req, &data, Role::Student).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    if let Err(errors) = payload.validate() {
        return HttpResponse::BadRequest().json(errors);
    }

    let bookings = data.mongodb.db.collection::<Booking>("bookings");
    let booking = match bookings.find_one(doc! { "_id": &payload.booking_id }).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return HttpResponse::NotFound().body("Booking not found"),
        Err(e) => {
            error!("Error fetching booking {}: {}", payload.booking_id, e);
            return HttpResponse::InternalServerError().body("Error creating rating");
        }
    };

    if booking.student_id != student.id {
        return HttpResponse::Forbidden().body("You can only rate your own bookings");
    }
    if booking.status != BookingStatus::Completed {
        return HttpResponse::BadRequest().body("Only completed bookings can be rated");
    }

    let ratings = data.mongodb.db.collection::<Rating>("ratings");
    let existing = match ratings
        .find_one(doc! { "booking_id": &booking.id })
        .await
    {
        Ok(existing) => existing,
        Err(e) => {
            error!("Error checking existing rating: {}", e);
            return HttpResponse::InternalServerError().body("Error creating rating");
        }
    };

    let rating = if let Some(existing) = existing {
        if let Err(e) = ratings
            .update_one(
                doc! { "_id": &existing.id },
                doc! { "$set": {
                    "score": payload.score,
                    "review": &payload.review,
                    "updated_at": BsonDateTime::now(),
                } },
            )
            .await
        {
            error!("Error updating rating {}: {}", existing.id, e);
            return HttpResponse::InternalServerError().body("Error updating rating");
        }
        Rating {
            score: payload.score,
            review: payload.review.clone(),
            updated_at: BsonDateTime::now(),
            ..existing
        }
    } else {
        let now = BsonDateTime::now();
        let rating = Rating {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: booking.id.clone(),
            tutor_id: booking.tutor_id.clone(),
            student_id: student.id.clone(),
            subject_id: booking.subject_id.clone(),
            topic_ids: booking.topic_ids.clone(),
            score: payload.score,
            review: payload.review.clone(),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = ratings.insert_one(&rating).await {
            if let Some(raw) = duplicate_key_message(&e) {
                return HttpResponse::BadRequest().body(duplicate_rating_message(raw));
            }
            error!("Error creating rating: {}", e);
            return HttpResponse::InternalServerError().body("Error creating rating");
        }
        rating
    };

    if let Err(e) = recompute_tutor_rating(&data.mongodb, &booking.tutor_id).await {
        error!("{}", e);
        return HttpResponse::InternalServerError().body("Error updating tutor rating");
    }

    HttpResponse::Ok().json(rating)
}

/// DELETE a rating. The author or an admin.
pub async fn delete_rating(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let rating_id = path.into_inner();

    let ratings = data.mongodb.db.collection::<Rating>("ratings");
    let rating = match ratings.find_one(doc! { "_id": &rating_id }).await {
        Ok(Some(rating)) => rating,
        Ok(None) => return HttpResponse::NotFound().body("Rating not found"),
        Err(e) => {
            error!("Error fetching rating {}: {}", rating_id, e);
            return HttpResponse::InternalServerError().body("Error deleting rating");
        }
    };

    if rating.student_id != user.id && user.role != Some(Role::Admin) {
        return HttpResponse::Forbidden().body("You can only delete your own ratings");
    }

    if let Err(e) = ratings.delete_one(doc! { "_id": &rating_id }).await {
        error!("Error deleting rating {}: {}", rating_id, e);
        return HttpResponse::InternalServerError().body("Error deleting rating");
    }

    if let Err(e) = recompute_tutor_rating(&data.mongodb, &rating.tutor_id).await {
        error!("{}", e);
        return HttpResponse::InternalServerError().body("Error updating tutor rating");
    }

    HttpResponse::Ok().json(json!({ "message": "Rating deleted" }))
}

/// LIST a tutor's ratings, newest first.
pub async fn list_tutor_ratings(
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<RatingListQuery>,
) -> impl Responder {
    let tutor_id = path.into_inner();
    let filter = doc! { "tutor_id": &tutor_id };

    let limit = page_limit(query.limit);
    let skip = page_skip(query.page, limit);

    let ratings = data.mongodb.db.collection::<Rating>("ratings");
    let total = match ratings.count_documents(filter.clone()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Error counting ratings for {}: {}", tutor_id, e);
            return HttpResponse::InternalServerError().body("Error fetching ratings");
        }
    };

    let mut cursor = match ratings
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching ratings for {}: {}", tutor_id, e);
            return HttpResponse::InternalServerError().body("Error fetching ratings");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(rating) => items.push(rating),
            Err(e) => {
                error!("Error reading rating cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching ratings");
            }
        }
    }

    HttpResponse::Ok().json(json!({ "ratings": items, "total": total }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_of_no_ratings_is_zero() {
        assert_eq!(rating_summary(&[]), (0.0, 0));
    }

    #[test]
    fn summary_averages_scores() {
        assert_eq!(rating_summary(&[4.0]), (4.0, 1));
        assert_eq!(rating_summary(&[4.0, 5.0]), (4.5, 2));
        assert_eq!(rating_summary(&[1.0, 2.0, 3.0]), (2.0, 3));
    }

    #[test]
    fn duplicate_messages_name_the_rule() {
        assert_eq!(
            duplicate_rating_message("E11000 duplicate key error ... index: ratings_booking_unique"),
            "A rating for this booking already exists"
        );
        assert_eq!(
            duplicate_rating_message(
                "E11000 duplicate key error ... index: ratings_tutor_student_topics_unique"
            ),
            "You have already rated this tutor for these topics"
        );
        assert_eq!(duplicate_rating_message("something else"), "Duplicate rating");
    }

    #[test]
    fn score_and_review_bounds() {
        let ok = CreateRatingRequest {
            booking_id: "b1".to_string(),
            score: 4.5,
            review: "Great teacher, very patient.".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad_score = CreateRatingRequest {
            booking_id: "b1".to_string(),
            score: 5.5,
            review: "Great teacher, very patient.".to_string(),
        };
        assert!(bad_score.validate().is_err());

        let short_review = CreateRatingRequest {
            booking_id: "b1".to_string(),
            score: 4.0,
            review: "Good".to_string(),
        };
        assert!(short_review.validate().is_err());
    }
}
