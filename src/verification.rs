use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_admin;
use crate::models::tutor::{Tutor, VerificationStatus};
use crate::models::{page_limit, page_skip, User};
use crate::notifier::{DomainEvent, Notify};

#[derive(Debug, Deserialize)]
pub struct VerificationListQuery {
    pub status: Option<VerificationStatus>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

/// LIST tutors by verification status for the admin dashboard.
pub async fn list_by_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<VerificationListQuery>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    let mut filter = doc! {};
    if let Some(status) = query.status {
        filter.insert("verification.status", status.as_str());
    }

    let limit = page_limit(query.limit);
    let skip = page_skip(query.page, limit);

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let total = match tutors.count_documents(filter.clone()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Error counting tutors for review: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tutors");
        }
    };

    let mut cursor = match tutors
        .find(filter)
        .sort(doc! { "created_at": 1 })
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tutors for review: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tutors");
        }
    };

    let mut items: Vec<Tutor> = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(tutor) => items.push(tutor),
            Err(e) => {
                error!("Error reading tutor cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching tutors");
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
                        json!({ "name": user.name, "email": user.email }),
                    );
                }
            }
        }
        Err(e) => {
            error!("Error joining tutor users: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tutors");
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

async fn load_tutor(
    data: &web::Data<AppState>,
    tutor_id: &str,
) -> Result<Tutor, HttpResponse> {
    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors.find_one(doc! { "_id": tutor_id }).await {
        Ok(Some(tutor)) => Ok(tutor),
        Ok(None) => Err(HttpResponse::NotFound().body("Tutor not found")),
        Err(e) => {
            error!("Error fetching tutor {}: {}", tutor_id, e);
            Err(HttpResponse::InternalServerError().body("Error fetching tutor"))
        }
    }
}

/// APPROVE a tutor. Admin only. All three checks pass together.
pub async fn approve_tutor(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let admin = match require_admin(&req, &data).await {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    let tutor_id = path.into_inner();

    let tutor = match load_tutor(&data, &tutor_id).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };
    if tutor.is_verified {
        return HttpResponse::BadRequest().body("Tutor is already verified");
    }

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let update = doc! {
        "$set": {
            "is_verified": true,
            "verification.status": "approved",
            "verification.checks.identity": true,
            "verification.checks.qualifications": true,
            "verification.checks.background": true,
            "verification.rejection_reason": null,
            "verification.verified_by": &admin.id,
            "verification.verified_at": BsonDateTime::now(),
            "updated_at": BsonDateTime::now(),
        }
    };
    if let Err(e) = tutors.update_one(doc! { "_id": &tutor_id }, update).await {
        error!("Error approving tutor {}: {}", tutor_id, e);
        return HttpResponse::InternalServerError().body("Error approving tutor");
    }

    data.notifier.do_send(Notify {
        user_id: tutor.user_id.clone(),
        event: DomainEvent::VerificationApproved,
    });

    HttpResponse::Ok().json(json!({ "message": "Tutor approved" }))
}

/// REJECT a tutor with a reason. Admin only.
pub async fn reject_tutor(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<RejectRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let tutor_id = path.into_inner();

    let reason = payload.reason.trim();
    if reason.is_empty() {
        return HttpResponse::BadRequest().body("Rejection reason is required");
    }

    let tutor = match load_tutor(&data, &tutor_id).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let update = doc! {
        "$set": {
            "is_verified": false,
            "verification.status": "rejected",
            "verification.checks.identity": false,
            "verification.checks.qualifications": false,
            "verification.checks.background": false,
            "verification.rejection_reason": reason,
            "updated_at": BsonDateTime::now(),
        }
    };
    if let Err(e) = tutors.update_one(doc! { "_id": &tutor_id }, update).await {
        error!("Error rejecting tutor {}: {}", tutor_id, e);
        return HttpResponse::InternalServerError().body("Error rejecting tutor");
    }

    data.notifier.do_send(Notify {
        user_id: tutor.user_id.clone(),
        event: DomainEvent::VerificationRejected {
            reason: reason.to_string(),
        },
    });

    HttpResponse::Ok().json(json!({ "message": "Tutor rejected" }))
}

/// TOGGLE a tutor's verified flag. Admin only. Turning it back on skips
/// the already-verified guard and sends a reinstatement notice instead of
/// the approval one.
pub async fn toggle_verification(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let admin = match require_admin(&req, &data).await {
        Ok(admin) => admin,
        Err(resp) => return resp,
    };
    let tutor_id = path.into_inner();

    let tutor = match load_tutor(&data, &tutor_id).await {
        Ok(tutor) => tutor,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let (update, event) = if tutor.is_verified {
        (
            doc! {
                "$set": {
                    "is_verified": false,
                    "verification.status": "pending",
                    "updated_at": BsonDateTime::now(),
                }
            },
            DomainEvent::VerificationRevoked,
        )
    } else {
        (
            doc! {
                "$set": {
                    "is_verified": true,
                    "verification.status": "approved",
                    "verification.checks.identity": true,
                    "verification.checks.qualifications": true,
                    "verification.checks.background": true,
                    "verification.rejection_reason": null,
                    "verification.verified_by": &admin.id,
                    "verification.verified_at": BsonDateTime::now(),
                    "updated_at": BsonDateTime::now(),
                }
            },
            DomainEvent::VerificationReinstated,
        )
    };

    if let Err(e) = tutors.update_one(doc! { "_id": &tutor_id }, update).await {
        error!("Error toggling verification for {}: {}", tutor_id, e);
        return HttpResponse::InternalServerError().body("Error updating tutor");
    }

    data.notifier.do_send(Notify {
        user_id: tutor.user_id.clone(),
        event,
    });

    HttpResponse::Ok().json(json!({ "is_verified": !tutor.is_verified }))
}
