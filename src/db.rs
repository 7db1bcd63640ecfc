use std::time::Duration;

use mongodb::bson::doc;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

pub struct MongoDB {
    pub client: Client,
    pub db: Database,
}

impl MongoDB {
    pub async fn init(uri: &str, db_name: &str) -> Self {
        let client_options = ClientOptions::parse(uri)
            .await
            .expect("Failed to parse MongoDB connection string");
        let client = Client::with_options(client_options).expect("Failed to initialize client");
        let db = client.database(db_name);
        MongoDB { client, db }
    }

    /// Creates the unique and TTL indexes the domain invariants rely on.
    /// Safe to run on every startup; Mongo treats existing indexes as a no-op.
    pub async fn ensure_indexes(&self) -> mongodb::error::Result<()> {
        let unique = |keys, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .name(name.to_string())
                        .build(),
                )
                .build()
        };
        let plain = |keys, name: &str| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(name.to_string()).build())
                .build()
        };

        self.db
            .collection::<mongodb::bson::Document>("users")
            .create_index(unique(doc! { "email": 1 }, "users_email_unique"))
            .await?;
        self.db
            .collection::<mongodb::bson::Document>("tutors")
            .create_index(unique(doc! { "user_id": 1 }, "tutors_user_unique"))
            .await?;
        self.db
            .collection::<mongodb::bson::Document>("subjects")
            .create_index(unique(doc! { "name": 1 }, "subjects_name_unique"))
            .await?;
        self.db
            .collection::<mongodb::bson::Document>("topics")
            .create_index(unique(
                doc! { "subject_id": 1, "name": 1 },
                "topics_subject_name_unique",
            ))
            .await?;
        self.db
            .collection::<mongodb::bson::Document>("locations")
            .create_index(unique(
                doc! { "name": 1, "parent_id": 1 },
                "locations_name_parent_unique",
            ))
            .await?;
        self.db
            .collection::<mongodb::bson::Document>("favorites")
            .create_index(unique(
                doc! { "student_id": 1, "tutor_id": 1 },
                "favorites_pair_unique",
            ))
            .await?;

        // Two deliberate uniqueness rules on ratings: one rating per booking,
        // and one rating per (tutor, student, topic set).
        let ratings = self.db.collection::<mongodb::bson::Document>("ratings");
        ratings
            .create_index(unique(doc! { "booking_id": 1 }, "ratings_booking_unique"))
            .await?;
        ratings
            .create_index(unique(
                doc! { "tutor_id": 1, "student_id": 1, "topic_ids": 1 },
                "ratings_tutor_student_topics_unique",
            ))
            .await?;

        let bookings = self.db.collection::<mongodb::bson::Document>("bookings");
        bookings
            .create_index(plain(doc! { "student_id": 1 }, "bookings_student"))
            .await?;
        bookings
            .create_index(plain(doc! { "tutor_id": 1 }, "bookings_tutor"))
            .await?;

        let notifications = self.db.collection::<mongodb::bson::Document>("notifications");
        notifications
            .create_index(plain(
                doc! { "user_id": 1, "created_at": -1 },
                "notifications_user_created",
            ))
            .await?;
        // Documents without expires_at are never expired by this index.
        notifications
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "expires_at": 1 })
                    .options(
                        IndexOptions::builder()
                            .expire_after(Duration::from_secs(0))
                            .name("notifications_expiry_ttl".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        Ok(())
    }
}

/// Returns the server message of a duplicate-key write error, if that is what
/// the error is. The message contains the index name, which callers match on
/// to produce a user-facing message.
pub fn duplicate_key_message(err: &mongodb::error::Error) -> Option<&str> {
    if let ErrorKind::Write(WriteFailure::WriteError(write_err)) = err.kind.as_ref() {
        if write_err.code == 11000 {
            return Some(write_err.message.as_str());
        }
    }
    None
}
