use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::{require_role, require_user};
use crate::models::booking::{Booking, BookingStatus, PaymentStatus, TeachingModeKind};
use crate::models::catalog::Subject;
use crate::models::tutor::Tutor;
use crate::models::{page_limit, page_skip, Role, User};
use crate::notifier::{DomainEvent, Notify};

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub tutor_id: String,
    pub subject_id: String,
    #[serde(default)]
    pub topic_ids: Vec<String>,
    pub mode: TeachingModeKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct BookingListQuery {
    pub status: Option<BookingStatus>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

/// The only lifecycle moves a booking can make.
pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    matches!(
        (from, to),
        (BookingStatus::Pending, BookingStatus::Confirmed)
            | (BookingStatus::Pending, BookingStatus::Cancelled)
            | (BookingStatus::Confirmed, BookingStatus::Completed)
            | (BookingStatus::Confirmed, BookingStatus::Cancelled)
    )
}

/// Price of a session: hourly rate times the window length, rounded to
/// cents.
pub fn compute_amount(rate: f64, start_ms: i64, end_ms: i64) -> Result<f64, String> {
    if end_ms <= start_ms {
        return Err("Booking must end after it starts".to_string());
    }
    let hours = (end_ms - start_ms) as f64 / 3_600_000.0;
    Ok((rate * hours * 100.0).round() / 100.0)
}

async fn subject_name(data: &web::Data<AppState>, subject_id: &str) -> String {
    let subjects = data.mongodb.db.collection::<Subject>("subjects");
    match subjects.find_one(doc! { "_id": subject_id }).await {
        Ok(Some(subject)) => subject.name,
        _ => "your subject".to_string(),
    }
}

/// CREATE a booking. Students only. The amount is locked in from the
/// tutor's current rate for the chosen mode.
pub async fn create_booking(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateBookingRequest>,
) -> impl Responder {
    let student = match require_role(&req, &data, Role::Student).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let tutor = match tutors.find_one(doc! { "_id": &payload.tutor_id }).await {
        Ok(Some(tutor)) => tutor,
        Ok(None) => return HttpResponse::NotFound().body("Tutor not found"),
        Err(e) => {
            error!("Error fetching tutor {}: {}", payload.tutor_id, e);
            return HttpResponse::InternalServerError().body("Error creating booking");
        }
    };

    let entry = match tutor
        .subjects
        .iter()
        .find(|s| s.subject_id == payload.subject_id)
    {
        Some(entry) => entry,
        None => return HttpResponse::BadRequest().body("Tutor does not teach this subject"),
    };

    let mode = match payload.mode {
        TeachingModeKind::Online => &entry.modes.online,
        TeachingModeKind::HomeVisit => &entry.modes.home_visit,
        TeachingModeKind::Group => &entry.modes.group,
    };
    if !mode.enabled || mode.rate <= 0.0 {
        return HttpResponse::BadRequest()
            .body("Tutor does not offer this subject in the selected mode");
    }

    for topic_id in &payload.topic_ids {
        if !entry.topic_ids.contains(topic_id) {
            return HttpResponse::BadRequest()
                .body("Requested topics are not offered for this subject");
        }
    }

    let start_ms = payload.start_time.timestamp_millis();
    let end_ms = payload.end_time.timestamp_millis();
    let amount = match compute_amount(mode.rate, start_ms, end_ms) {
        Ok(amount) => amount,
        Err(message) => return HttpResponse::BadRequest().body(message),
    };

    let now = BsonDateTime::now();
    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        tutor_id: tutor.id.clone(),
        subject_id: payload.subject_id.clone(),
        topic_ids: payload.topic_ids.clone(),
        mode: payload.mode,
        start_time: BsonDateTime::from_millis(start_ms),
        end_time: BsonDateTime::from_millis(end_ms),
        amount,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    let bookings = data.mongodb.db.collection::<Booking>("bookings");
    if let Err(e) = bookings.insert_one(&booking).await {
        error!("Error creating booking: {}", e);
        return HttpResponse::InternalServerError().body("Error creating booking");
    }

    let subject = subject_name(&data, &payload.subject_id).await;
    data.notifier.do_send(Notify {
        user_id: tutor.user_id.clone(),
        event: DomainEvent::BookingRequested {
            booking_id: booking.id.clone(),
            subject_name: subject,
            student_name: student.name.clone(),
        },
    });

    HttpResponse::Ok().json(booking)
}

/// CHANGE a booking's status along the allowed transitions. Confirming and
/// completing are the tutor's moves; cancelling is open to both sides.
pub async fn update_status(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateStatusRequest>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let booking_id = path.into_inner();

    let bookings = data.mongodb.db.collection::<Booking>("bookings");
    let booking = match bookings.find_one(doc! { "_id": &booking_id }).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return HttpResponse::NotFound().body("Booking not found"),
        Err(e) => {
            error!("Error fetching booking {}: {}", booking_id, e);
            return HttpResponse::InternalServerError().body("Error updating booking");
        }
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let tutor = match tutors.find_one(doc! { "_id": &booking.tutor_id }).await {
        Ok(Some(tutor)) => tutor,
        Ok(None) => return HttpResponse::NotFound().body("Tutor not found"),
        Err(e) => {
            error!("Error fetching tutor {}: {}", booking.tutor_id, e);
            return HttpResponse::InternalServerError().body("Error updating booking");
        }
    };

    let is_student = user.id == booking.student_id;
    let is_tutor = user.id == tutor.user_id;
    if !is_student && !is_tutor {
        return HttpResponse::Forbidden().body("Not a participant of this booking");
    }

    let target = payload.status;
    if !can_transition(booking.status, target) {
        return HttpResponse::BadRequest().body(format!(
            "Cannot change a {} booking to {}",
            booking.status.as_str(),
            target.as_str()
        ));
    }
    match target {
        BookingStatus::Confirmed | BookingStatus::Completed => {
            if !is_tutor {
                return HttpResponse::Forbidden().body("Only the tutor can do that");
            }
        }
        BookingStatus::Cancelled => {}
        BookingStatus::Pending => unreachable!("no transition leads back to pending"),
    }

    if let Err(e) = bookings
        .update_one(
            doc! { "_id": &booking_id },
            doc! { "$set": {
                "status": target.as_str(),
                "updated_at": BsonDateTime::now(),
            } },
        )
        .await
    {
        error!("Error updating booking {}: {}", booking_id, e);
        return HttpResponse::InternalServerError().body("Error updating booking");
    }

    let subject = subject_name(&data, &booking.subject_id).await;
    let tutor_name = match data
        .mongodb
        .db
        .collection::<User>("users")
        .find_one(doc! { "_id": &tutor.user_id })
        .await
    {
        Ok(Some(tutor_user)) => tutor_user.name,
        _ => "Your tutor".to_string(),
    };

    let (recipient, event) = match target {
        BookingStatus::Confirmed => (
            booking.student_id.clone(),
            DomainEvent::BookingConfirmed {
                booking_id: booking.id.clone(),
                subject_name: subject,
                tutor_name,
            },
        ),
        BookingStatus::Completed => (
            booking.student_id.clone(),
            DomainEvent::BookingCompleted {
                booking_id: booking.id.clone(),
                subject_name: subject,
                tutor_name,
            },
        ),
        BookingStatus::Cancelled => {
            let counterparty = if is_student {
                tutor.user_id.clone()
            } else {
                booking.student_id.clone()
            };
            (
                counterparty,
                DomainEvent::BookingCancelled {
                    booking_id: booking.id.clone(),
                    subject_name: subject,
                    by_name: user.name.clone(),
                },
            )
        }
        BookingStatus::Pending => unreachable!(),
    };
    data.notifier.do_send(Notify {
        user_id: recipient,
        event,
    });

    HttpResponse::Ok().json(json!({ "status": target }))
}

async fn list_bookings_filtered(
    data: &web::Data<AppState>,
    mut filter: mongodb::bson::Document,
    query: &BookingListQuery,
) -> HttpResponse {
    if let Some(status) = query.status {
        filter.insert("status", status.as_str());
    }

    let limit = page_limit(query.limit);
    let skip = page_skip(query.page, limit);

    let bookings = data.mongodb.db.collection::<Booking>("bookings");
    let total = match bookings.count_documents(filter.clone()).await {
        Ok(total) => total,
        Err(e) => {
            error!("Error counting bookings: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching bookings");
        }
    };

    let mut cursor = match bookings
        .find(filter)
        .sort(doc! { "created_at": -1 })
        .skip(skip)
        .limit(limit)
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching bookings: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching bookings");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(booking) => items.push(booking),
            Err(e) => {
                error!("Error reading booking cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching bookings");
            }
        }
    }

    HttpResponse::Ok().json(json!({ "bookings": items, "total": total }))
}

/// LIST the caller's bookings as a student.
pub async fn list_student_bookings(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<BookingListQuery>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    list_bookings_filtered(&data, doc! { "student_id": &user.id }, &query).await
}

/// LIST the caller's bookings as a tutor.
pub async fn list_tutor_bookings(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<BookingListQuery>,
) -> impl Responder {
    let user = match require_role(&req, &data, Role::Tutor).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    let tutor = match tutors.find_one(doc! { "user_id": &user.id }).await {
        Ok(Some(tutor)) => tutor,
        Ok(None) => return HttpResponse::NotFound().body("Tutor profile not found"),
        Err(e) => {
            error!("Error loading tutor profile for {}: {}", user.id, e);
            return HttpResponse::InternalServerError().body("Error fetching bookings");
        }
    };

    list_bookings_filtered(&data, doc! { "tutor_id": &tutor.id }, &query).await
}

/// GET one booking. Participants and admins only.
pub async fn get_booking(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let booking_id = path.into_inner();

    let bookings = data.mongodb.db.collection::<Booking>("bookings");
    let booking = match bookings.find_one(doc! { "_id": &booking_id }).await {
        Ok(Some(booking)) => booking,
        Ok(None) => return HttpResponse::NotFound().body("Booking not found"),
        Err(e) => {
            error!("Error fetching booking {}: {}", booking_id, e);
            return HttpResponse::InternalServerError().body("Error fetching booking");
        }
    };

    if user.role == Some(Role::Admin) || user.id == booking.student_id {
        return HttpResponse::Ok().json(booking);
    }

    let tutors = data.mongodb.db.collection::<Tutor>("tutors");
    match tutors.find_one(doc! { "_id": &booking.tutor_id }).await {
        Ok(Some(tutor)) if tutor.user_id == user.id => HttpResponse::Ok().json(booking),
        Ok(_) => HttpResponse::Forbidden().body("Not a participant of this booking"),
        Err(e) => {
            error!("Error fetching tutor {}: {}", booking.tutor_id, e);
            HttpResponse::InternalServerError().body("Error fetching booking")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use BookingStatus::*;

        assert!(can_transition(Pending, Confirmed));
        assert!(can_transition(Pending, Cancelled));
        assert!(can_transition(Confirmed, Completed));
        assert!(can_transition(Confirmed, Cancelled));

        assert!(!can_transition(Pending, Completed));
        assert!(!can_transition(Pending, Pending));
        assert!(!can_transition(Confirmed, Pending));
        assert!(!can_transition(Confirmed, Confirmed));
        assert!(!can_transition(Completed, Cancelled));
        assert!(!can_transition(Completed, Confirmed));
        assert!(!can_transition(Cancelled, Confirmed));
        assert!(!can_transition(Cancelled, Completed));
    }

    #[test]
    fn amount_is_rate_times_hours() {
        let hour = 3_600_000;
        assert_eq!(compute_amount(2000.0, 0, hour).unwrap(), 2000.0);
        assert_eq!(compute_amount(2000.0, 0, hour / 2).unwrap(), 1000.0);
        assert_eq!(compute_amount(1500.0, 0, hour * 3).unwrap(), 4500.0);
        // 90 minutes at 999/h rounds to cents.
        assert_eq!(compute_amount(999.0, 0, hour + hour / 2).unwrap(), 1498.5);
    }

    #[test]
    fn amount_rejects_inverted_windows() {
        assert!(compute_amount(2000.0, 100, 100).is_err());
        assert!(compute_amount(2000.0, 200, 100).is_err());
    }
}
