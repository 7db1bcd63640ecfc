// src/main.rs

mod app_state;
mod auth;
mod booking;
mod config;
mod db;
mod email;
mod favorite;
mod location;
mod models;
mod notification;
mod notifier;
mod rating;
mod sms;
mod subject;
mod taxonomy;
mod topic;
mod tutor;
mod verification;
mod web_socket_server;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::info;

use crate::app_state::AppState;
use crate::auth::{
    forgot_password, get_me, login, oauth_login, register, reset_password, select_role,
    validate_jwt,
};
use crate::booking::{
    create_booking, get_booking, list_student_bookings, list_tutor_bookings, update_status,
};
use crate::favorite::{add_favorite, list_favorites, remove_favorite};
use crate::location::{create_location, delete_location, get_location_tree, update_location};
use crate::notification::{
    delete_notification, list_notifications, mark_all_read, mark_read, unread_count,
};
use crate::rating::{create_rating, delete_rating, list_tutor_ratings};
use crate::subject::{
    create_subject, delete_subject, get_subject, list_subjects, update_subject,
};
use crate::topic::{create_topic, delete_topic, list_topics, update_topic};
use crate::tutor::{
    add_document, delete_own_profile, get_own_profile, get_tutor, remove_document,
    search_tutors, update_own_profile,
};
use crate::verification::{approve_tutor, list_by_status, reject_tutor, toggle_verification};
use crate::web_socket_server::ws_index;

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim();
                    let secret = req
                        .app_data::<web::Data<AppState>>()
                        .map(|data| data.config.jwt_secret.clone())
                        .unwrap_or_default();
                    match validate_jwt(token, &secret) {
                        Ok(claims) => {
                            req.extensions_mut().insert(claims.sub);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .body(format!("Invalid token: {}", e))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    mongodb
        .ensure_indexes()
        .await
        .expect("Failed to create database indexes");

    let http_client = reqwest::Client::new();
    let mailer = email::EmailService::from_config(&config);
    let sms = sms::SmsService::from_config(&config, http_client.clone());
    let notifier = notifier::NotificationServer::new(
        mongodb.clone(),
        mailer.clone(),
        sms.clone(),
        config.frontend_origin.clone(),
    )
    .start();

    let frontend_origin = config.frontend_origin.clone();
    info!("Server running at http://0.0.0.0:8080");
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                notifier: notifier.clone(),
                mongodb: mongodb.clone(),
                config: config.clone(),
                mailer: mailer.clone(),
                sms: sms.clone(),
                http_client: http_client.clone(),
            }))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .route("/register", web::post().to(register))
                            .route("/login", web::post().to(login))
                            .route("/oauth", web::post().to(oauth_login))
                            .route("/select-role", web::post().to(select_role))
                            .route("/me", web::get().to(get_me))
                            .route("/forgot-password", web::post().to(forgot_password))
                            .route("/reset-password", web::post().to(reset_password)),
                    )
                    // CATALOG
                    .service(
                        web::scope("/subjects")
                            .route("", web::get().to(list_subjects))
                            .route("", web::post().to(create_subject))
                            .route("/{subject_id}", web::get().to(get_subject))
                            .route("/{subject_id}", web::put().to(update_subject))
                            .route("/{subject_id}", web::delete().to(delete_subject)),
                    )
                    .service(
                        web::scope("/topics")
                            .route("", web::get().to(list_topics))
                            .route("", web::post().to(create_topic))
                            .route("/{topic_id}", web::put().to(update_topic))
                            .route("/{topic_id}", web::delete().to(delete_topic)),
                    )
                    .service(
                        web::scope("/locations")
                            .route("", web::get().to(get_location_tree))
                            .route("", web::post().to(create_location))
                            .route("/{location_id}", web::put().to(update_location))
                            .route("/{location_id}", web::delete().to(delete_location)),
                    )
                    // TUTORS
                    .service(
                        web::scope("/tutors")
                            .route("", web::get().to(search_tutors))
                            .route("/me", web::get().to(get_own_profile))
                            .route("/me", web::put().to(update_own_profile))
                            .route("/me", web::delete().to(delete_own_profile))
                            .route("/me/documents", web::post().to(add_document))
                            .route(
                                "/me/documents/{document_id}",
                                web::delete().to(remove_document),
                            )
                            .route("/{tutor_id}", web::get().to(get_tutor))
                            .route("/{tutor_id}/ratings", web::get().to(list_tutor_ratings)),
                    )
                    // ADMIN verification workflow
                    .service(
                        web::scope("/admin/tutors")
                            .route("", web::get().to(list_by_status))
                            .route("/{tutor_id}/approve", web::put().to(approve_tutor))
                            .route("/{tutor_id}/reject", web::put().to(reject_tutor))
                            .route("/{tutor_id}/toggle", web::put().to(toggle_verification)),
                    )
                    // BOOKINGS
                    .service(
                        web::scope("/bookings")
                            .route("", web::post().to(create_booking))
                            .route("/student", web::get().to(list_student_bookings))
                            .route("/tutor", web::get().to(list_tutor_bookings))
                            .route("/{booking_id}", web::get().to(get_booking))
                            .route("/{booking_id}/status", web::put().to(update_status)),
                    )
                    // RATINGS
                    .service(
                        web::scope("/ratings")
                            .route("", web::post().to(create_rating))
                            .route("/{rating_id}", web::delete().to(delete_rating)),
                    )
                    // FAVOURITES
                    .service(
                        web::scope("/favorites")
                            .route("", web::get().to(list_favorites))
                            .route("", web::post().to(add_favorite))
                            .route("/{tutor_id}", web::delete().to(remove_favorite)),
                    )
                    // NOTIFICATIONS
                    .service(
                        web::scope("/notifications")
                            .route("", web::get().to(list_notifications))
                            .route("/unread-count", web::get().to(unread_count))
                            .route("/read-all", web::put().to(mark_all_read))
                            .route("/{notification_id}/read", web::put().to(mark_read))
                            .route("/{notification_id}", web::delete().to(delete_notification)),
                    ),
            )
            // WEBSOCKET route for real-time notifications
            .service(web::resource("/ws").route(web::get().to(ws_index)))
    })
    .bind("0.0.0.0:8080")?
    .run()
    .await
}
