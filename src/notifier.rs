use actix::prelude::*;
use log::{info, warn};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::MongoDB;
use crate::email::{EmailService, SendOutcome};
use crate::models::notification::{
    Notification, NotificationAction, NotificationCategory, NotificationEvent,
    NotificationPriority,
};
use crate::models::User;
use crate::sms::SmsService;

const BOOKING_NOTIFICATION_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

#[derive(Message)]
#[rtype(result = "()")]
pub struct PushMessage(pub String);

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    pub user_id: String,
    pub addr: Recipient<PushMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub user_id: String,
    pub addr: Recipient<PushMessage>,
}

/// Something that happened in the platform that the named user should hear
/// about on every channel they have.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Notify {
    pub user_id: String,
    pub event: DomainEvent,
}

#[derive(Debug, Clone)]
pub enum DomainEvent {
    Welcome {
        name: String,
    },
    BookingRequested {
        booking_id: String,
        subject_name: String,
        student_name: String,
    },
    BookingConfirmed {
        booking_id: String,
        subject_name: String,
        tutor_name: String,
    },
    BookingCancelled {
        booking_id: String,
        subject_name: String,
        by_name: String,
    },
    BookingCompleted {
        booking_id: String,
        subject_name: String,
        tutor_name: String,
    },
    VerificationApproved,
    VerificationRejected {
        reason: String,
    },
    VerificationReinstated,
    VerificationRevoked,
}

impl DomainEvent {
    pub fn kind(&self) -> NotificationEvent {
        match self {
            DomainEvent::Welcome { .. } => NotificationEvent::Welcome,
            DomainEvent::BookingRequested { .. } => NotificationEvent::BookingRequested,
            DomainEvent::BookingConfirmed { .. } => NotificationEvent::BookingConfirmed,
            DomainEvent::BookingCancelled { .. } => NotificationEvent::BookingCancelled,
            DomainEvent::BookingCompleted { .. } => NotificationEvent::BookingCompleted,
            DomainEvent::VerificationApproved => NotificationEvent::VerificationApproved,
            DomainEvent::VerificationRejected { .. } => NotificationEvent::VerificationRejected,
            DomainEvent::VerificationReinstated => NotificationEvent::VerificationReinstated,
            DomainEvent::VerificationRevoked => NotificationEvent::VerificationRevoked,
        }
    }

    pub fn category(&self) -> NotificationCategory {
        match self {
            DomainEvent::Welcome { .. } => NotificationCategory::Account,
            DomainEvent::BookingRequested { .. }
            | DomainEvent::BookingConfirmed { .. }
            | DomainEvent::BookingCancelled { .. }
            | DomainEvent::BookingCompleted { .. } => NotificationCategory::Booking,
            DomainEvent::VerificationApproved
            | DomainEvent::VerificationRejected { .. }
            | DomainEvent::VerificationReinstated
            | DomainEvent::VerificationRevoked => NotificationCategory::Verification,
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            DomainEvent::Welcome { .. } => NotificationPriority::Low,
            DomainEvent::BookingRequested { .. }
            | DomainEvent::BookingConfirmed { .. }
            | DomainEvent::BookingCancelled { .. } => NotificationPriority::High,
            DomainEvent::BookingCompleted { .. } => NotificationPriority::Normal,
            DomainEvent::VerificationApproved
            | DomainEvent::VerificationRejected { .. }
            | DomainEvent::VerificationReinstated
            | DomainEvent::VerificationRevoked => NotificationPriority::High,
        }
    }

    pub fn title(&self) -> String {
        match self {
            DomainEvent::Welcome { .. } => "Welcome to VerifiedTutors".to_string(),
            DomainEvent::BookingRequested { .. } => "New booking request".to_string(),
            DomainEvent::BookingConfirmed { .. } => "Booking confirmed".to_string(),
            DomainEvent::BookingCancelled { .. } => "Booking cancelled".to_string(),
            DomainEvent::BookingCompleted { .. } => "Booking completed".to_string(),
            DomainEvent::VerificationApproved => "Profile verified".to_string(),
            DomainEvent::VerificationRejected { .. } => "Verification rejected".to_string(),
            DomainEvent::VerificationReinstated => "Verification reinstated".to_string(),
            DomainEvent::VerificationRevoked => "Verification revoked".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            DomainEvent::Welcome { name } => format!(
                "Hi {}, your VerifiedTutors account is ready. Complete your profile to get started.",
                name
            ),
            DomainEvent::BookingRequested {
                subject_name,
                student_name,
                ..
            } => format!(
                "{} has requested a {} session with you.",
                student_name, subject_name
            ),
            DomainEvent::BookingConfirmed {
                subject_name,
                tutor_name,
                ..
            } => format!(
                "{} has confirmed your {} session.",
                tutor_name, subject_name
            ),
            DomainEvent::BookingCancelled {
                subject_name,
                by_name,
                ..
            } => format!("{} has cancelled the {} session.", by_name, subject_name),
            DomainEvent::BookingCompleted {
                subject_name,
                tutor_name,
                ..
            } => format!(
                "Your {} session with {} is complete. You can now leave a rating.",
                subject_name, tutor_name
            ),
            DomainEvent::VerificationApproved => {
                "Your tutor profile has been verified. Students can now find you in search."
                    .to_string()
            }
            DomainEvent::VerificationRejected { reason } => {
                format!("Your verification was rejected: {}", reason)
            }
            DomainEvent::VerificationReinstated => {
                "Your tutor verification has been reinstated.".to_string()
            }
            DomainEvent::VerificationRevoked => {
                "Your tutor verification has been revoked. Contact support for details."
                    .to_string()
            }
        }
    }

    pub fn action(&self, frontend_origin: &str) -> Option<NotificationAction> {
        match self {
            DomainEvent::Welcome { .. } => Some(NotificationAction {
                label: "Complete your profile".to_string(),
                url: format!("{}/profile", frontend_origin),
            }),
            DomainEvent::BookingRequested { booking_id, .. }
            | DomainEvent::BookingConfirmed { booking_id, .. }
            | DomainEvent::BookingCancelled { booking_id, .. }
            | DomainEvent::BookingCompleted { booking_id, .. } => Some(NotificationAction {
                label: "View booking".to_string(),
                url: format!("{}/bookings/{}", frontend_origin, booking_id),
            }),
            DomainEvent::VerificationRejected { .. } => Some(NotificationAction {
                label: "Review your documents".to_string(),
                url: format!("{}/profile/verification", frontend_origin),
            }),
            DomainEvent::VerificationApproved
            | DomainEvent::VerificationReinstated
            | DomainEvent::VerificationRevoked => None,
        }
    }

    /// Booking notifications stop mattering once the session window is long
    /// past, so they age out of the collection.
    pub fn expires_at(&self) -> Option<BsonDateTime> {
        match self.category() {
            NotificationCategory::Booking => Some(BsonDateTime::from_millis(
                BsonDateTime::now().timestamp_millis() + BOOKING_NOTIFICATION_TTL_MS,
            )),
            _ => None,
        }
    }
}

/// Central fan-out point. Holds the live socket sessions and pushes every
/// event to the persisted feed, email, SMS and any open sockets. Sessions
/// are process local, so socket delivery only reaches connections on this
/// instance.
pub struct NotificationServer {
    sessions: HashMap<String, Vec<Recipient<PushMessage>>>,
    db: Arc<MongoDB>,
    mailer: EmailService,
    sms: SmsService,
    frontend_origin: String,
}

impl NotificationServer {
    pub fn new(
        db: Arc<MongoDB>,
        mailer: EmailService,
        sms: SmsService,
        frontend_origin: String,
    ) -> Self {
        NotificationServer {
            sessions: HashMap::new(),
            db,
            mailer,
            sms,
            frontend_origin,
        }
    }
}

impl Actor for NotificationServer {
    type Context = Context<Self>;
}

impl Handler<Connect> for NotificationServer {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("User {} connected (WS)", msg.user_id);
        self.sessions
            .entry(msg.user_id.clone())
            .or_default()
            .push(msg.addr);
    }
}

impl Handler<Disconnect> for NotificationServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("User {} disconnected (WS)", msg.user_id);
        if let Some(addrs) = self.sessions.get_mut(&msg.user_id) {
            // Remove only the connection that matches the provided address.
            addrs.retain(|a| a != &msg.addr);
            if addrs.is_empty() {
                self.sessions.remove(&msg.user_id);
            }
        }
    }
}

impl Handler<Notify> for NotificationServer {
    type Result = ResponseFuture<()>;

    fn handle(&mut self, msg: Notify, _: &mut Context<Self>) -> Self::Result {
        let db = self.db.clone();
        let mailer = self.mailer.clone();
        let sms = self.sms.clone();
        let recipients = self
            .sessions
            .get(&msg.user_id)
            .cloned()
            .unwrap_or_default();

        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: msg.user_id.clone(),
            event: msg.event.kind(),
            category: msg.event.category(),
            title: msg.event.title(),
            message: msg.event.message(),
            read: false,
            action: msg.event.action(&self.frontend_origin),
            metadata: None,
            expires_at: msg.event.expires_at(),
            priority: msg.event.priority(),
            created_at: BsonDateTime::now(),
        };

        Box::pin(async move {
            let notifications = db.db.collection::<Notification>("notifications");
            if let Err(e) = notifications.insert_one(&notification).await {
                warn!(
                    "Failed to persist notification for user {}: {}",
                    msg.user_id, e
                );
            }

            let users = db.db.collection::<User>("users");
            let user = match users.find_one(doc! { "_id": &msg.user_id }).await {
                Ok(Some(user)) => Some(user),
                Ok(None) => {
                    warn!("Notification target user {} not found", msg.user_id);
                    None
                }
                Err(e) => {
                    warn!("Failed to load user {} for notification: {}", msg.user_id, e);
                    None
                }
            };

            if let Some(user) = &user {
                match mailer
                    .send(&user.email, &notification.title, &notification.message)
                    .await
                {
                    Ok(SendOutcome::Sent) => {}
                    Ok(SendOutcome::Skipped) => {}
                    Err(e) => warn!("Failed to email user {}: {}", msg.user_id, e),
                }

                if let Some(phone) = &user.phone {
                    match sms.send(phone, &notification.message).await {
                        Ok(_) => {}
                        Err(e) => warn!("Failed to SMS user {}: {}", msg.user_id, e),
                    }
                }
            }

            let payload = json!({
                "type": "notification",
                "notification": &notification,
            })
            .to_string();
            for addr in recipients {
                addr.do_send(PushMessage(payload.clone()));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_events_carry_an_action_link() {
        let event = DomainEvent::BookingRequested {
            booking_id: "b1".to_string(),
            subject_name: "Physics".to_string(),
            student_name: "Amara".to_string(),
        };
        let action = event.action("https://app.example").unwrap();
        assert_eq!(action.url, "https://app.example/bookings/b1");
        assert_eq!(event.category(), NotificationCategory::Booking);
        assert!(event.expires_at().is_some());
    }

    #[test]
    fn verification_events_are_high_priority_and_permanent() {
        let event = DomainEvent::VerificationRejected {
            reason: "Documents unreadable".to_string(),
        };
        assert_eq!(event.priority(), NotificationPriority::High);
        assert_eq!(event.category(), NotificationCategory::Verification);
        assert!(event.expires_at().is_none());
        assert!(event.message().contains("Documents unreadable"));
    }

    #[test]
    fn templates_are_never_empty() {
        let events = vec![
            DomainEvent::Welcome {
                name: "Nimal".to_string(),
            },
            DomainEvent::BookingConfirmed {
                booking_id: "b2".to_string(),
                subject_name: "Chemistry".to_string(),
                tutor_name: "Ms. Silva".to_string(),
            },
            DomainEvent::VerificationApproved,
            DomainEvent::VerificationRevoked,
        ];
        for event in events {
            assert!(!event.title().is_empty());
            assert!(!event.message().is_empty());
        }
    }
}
