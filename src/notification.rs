use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_user;
use crate::models::notification::Notification;
use crate::models::{page_limit, page_skip};

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub unread: Option<bool>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

/// LIST the caller's notifications, newest first.
pub async fn list_notifications(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<NotificationListQuery>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let mut filter = doc! { "user_id": &user.id };
    if query.unread == Some(true) {
        filter.insert("read", false);
    }

    let limit = page_limit(query.limit);
    let skip = page_skip(query.page, limit);

    let notifications = data.mongodb.db.collection::<Notification>("notifications");
    let total = match notifications.count_documents(filter.clone()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Error counting notifications for {}: {}", user.id, e);
            return HttpResponse::InternalServerError().body("Error fetching notifications");
        }
    };

    let mut cursor = match notifications
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching notifications for {}: {}", user.id, e);
            return HttpResponse::InternalServerError().body("Error fetching notifications");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(notification) => items.push(notification),
            Err(e) => {
                error!("Error reading notification cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching notifications");
            }
        }
    }

    HttpResponse::Ok().json(json!({ "notifications": items, "total": total }))
}

/// COUNT unread notifications, for the bell badge.
pub async fn unread_count(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let notifications = data.mongodb.db.collection::<Notification>("notifications");
    match notifications
        .count_documents(doc! { "user_id": &user.id, "read": false })
        .await
    {
        Ok(count) => HttpResponse::Ok().json(json!({ "count": count })),
        Err(e) => {
            error!("Error counting unread notifications for {}: {}", user.id, e);
            HttpResponse::InternalServerError().body("Error fetching notifications")
        }
    }
}

/// MARK one notification read. Scoped to the caller so one user cannot
/// touch another's feed.
pub async fn mark_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let notification_id = path.into_inner();

    let notifications = data.mongodb.db.collection::<Notification>("notifications");
    match notifications
        .update_one(
            doc! { "_id": &notification_id, "user_id": &user.id },
            doc! { "$set": { "read": true } },
        )
        .await
    {
        Ok(result) if result.matched_count == 0 => {
            HttpResponse::NotFound().body("Notification not found")
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Notification marked as read" })),
        Err(e) => {
            error!("Error marking notification {} read: {}", notification_id, e);
            HttpResponse::InternalServerError().body("Error updating notification")
        }
    }
}

/// MARK all of the caller's notifications read.
pub async fn mark_all_read(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let notifications = data.mongodb.db.collection::<Notification>("notifications");
    match notifications
        .update_many(
            doc! { "user_id": &user.id, "read": false },
            doc! { "$set": { "read": true } },
        )
        .await
    {
        Ok(result) => HttpResponse::Ok().json(json!({ "updated": result.modified_count })),
        Err(e) => {
            error!("Error marking notifications read for {}: {}", user.id, e);
            HttpResponse::InternalServerError().body("Error updating notifications")
        }
    }
}

/// DELETE one notification from the caller's feed.
pub async fn delete_notification(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let notification_id = path.into_inner();

    let notifications = data.mongodb.db.collection::<Notification>("notifications");
    match notifications
        .delete_one(doc! { "_id": &notification_id, "user_id": &user.id })
        .await
    {
        Ok(result) if result.deleted_count == 0 => {
            HttpResponse::NotFound().body("Notification not found")
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Notification deleted" })),
        Err(e) => {
            error!("Error deleting notification {}: {}", notification_id, e);
            HttpResponse::InternalServerError().body("Error deleting notification")
        }
    }
}
