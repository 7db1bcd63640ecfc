use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, warn};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::app_state::AppState;
use crate::db;
use crate::email::SendOutcome;
use crate::models::tutor::Tutor;
use crate::models::{AuthProvider, Role, User};
use crate::notifier::{DomainEvent, Notify};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// JWT Creation
pub fn create_jwt(user_id: &str, secret: &str) -> String {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .unwrap()
}

// JWT Validation
pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Loads the authenticated user, or the response to return instead.
pub async fn require_user(
    req: &HttpRequest,
    data: &web::Data<AppState>,
) -> Result<User, HttpResponse> {
    let user_id = match req.extensions().get::<String>() {
        Some(id) => id.clone(),
        None => return Err(HttpResponse::Unauthorized().body("Unauthorized")),
    };
    let users = data.mongodb.db.collection::<User>("users");
    match users.find_one(doc! { "_id": &user_id }).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(HttpResponse::Unauthorized().body("Unauthorized")),
        Err(e) => {
            error!("Error loading user {}: {}", user_id, e);
            Err(HttpResponse::InternalServerError().body("Error loading user"))
        }
    }
}

pub async fn require_role(
    req: &HttpRequest,
    data: &web::Data<AppState>,
    role: Role,
) -> Result<User, HttpResponse> {
    let user = require_user(req, data).await?;
    if user.role != Some(role) {
        return Err(
            HttpResponse::Forbidden().body(format!("{} access required", role.as_str()))
        );
    }
    Ok(user)
}

pub async fn require_admin(
    req: &HttpRequest,
    data: &web::Data<AppState>,
) -> Result<User, HttpResponse> {
    require_role(req, data, Role::Admin).await
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// Signup Endpoint
pub async fn register(
    data: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> impl Responder {
    if let Err(e) = payload.validate() {
        return HttpResponse::BadRequest().body(e.to_string());
    }
    if payload.role == Role::Admin {
        return HttpResponse::BadRequest().body("Cannot register as admin");
    }

    let hashed_password = match hash(&payload.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let now = BsonDateTime::now();
    let new_user = User {
        id: Uuid::new_v4().to_string(),
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        password_hash: Some(hashed_password),
        role: Some(payload.role),
        auth_provider: AuthProvider::Local,
        phone: payload.phone.clone(),
        profile_image: None,
        reset_token: None,
        reset_token_expires_at: None,
        created_at: now,
        updated_at: now,
    };

    let users = data.mongodb.db.collection::<User>("users");
    if let Err(e) = users.insert_one(&new_user).await {
        if db::duplicate_key_message(&e).is_some() {
            return HttpResponse::BadRequest().body("Email already registered");
        }
        error!("Error creating user: {}", e);
        return HttpResponse::InternalServerError().body("Error creating user");
    }

    if payload.role == Role::Tutor {
        let tutors = data.mongodb.db.collection::<Tutor>("tutors");
        if let Err(e) = tutors.insert_one(&Tutor::new(&new_user.id)).await {
            error!("Error creating tutor profile for {}: {}", new_user.id, e);
            return HttpResponse::InternalServerError().body("Error creating tutor profile");
        }
    }

    data.notifier.do_send(Notify {
        user_id: new_user.id.clone(),
        event: DomainEvent::Welcome {
            name: new_user.name.clone(),
        },
    });

    let token = create_jwt(&new_user.id, &data.config.jwt_secret);
    HttpResponse::Ok().json(json!({ "token": token, "user": new_user.public() }))
}

// Login Endpoint
pub async fn login(data: web::Data<AppState>, payload: web::Json<LoginRequest>) -> impl Responder {
    let users = data.mongodb.db.collection::<User>("users");
    let user = match users
        .find_one(doc! { "email": payload.email.trim().to_lowercase() })
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::Unauthorized().body("Invalid credentials"),
        Err(e) => {
            error!("Error logging in: {}", e);
            return HttpResponse::InternalServerError().body("Error logging in");
        }
    };

    let hashed = match &user.password_hash {
        Some(h) => h.clone(),
        None => return HttpResponse::Unauthorized().body("This account signs in with Google"),
    };
    if !verify(&payload.password, &hashed).unwrap_or(false) {
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    let token = create_jwt(&user.id, &data.config.jwt_secret);
    HttpResponse::Ok().json(json!({ "token": token, "user": user.public() }))
}

#[derive(Debug, Deserialize)]
pub struct OAuthLoginRequest {
    pub provider: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    email: String,
    name: Option<String>,
    picture: Option<String>,
}

/// First OAuth login creates the account with no role; the client is told to
/// send the user through role selection.
pub async fn oauth_login(
    data: web::Data<AppState>,
    payload: web::Json<OAuthLoginRequest>,
) -> impl Responder {
    if payload.provider != "google" {
        return HttpResponse::BadRequest().body("Unsupported OAuth provider");
    }

    let info = match data
        .http_client
        .get(&data.config.google_userinfo_url)
        .bearer_auth(&payload.access_token)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => match resp.json::<GoogleUserInfo>().await {
            Ok(info) => info,
            Err(e) => {
                error!("OAuth userinfo parse error: {}", e);
                return HttpResponse::BadGateway().body("OAuth provider returned an invalid response");
            }
        },
        Ok(_) => return HttpResponse::Unauthorized().body("Invalid OAuth token"),
        Err(e) => {
            error!("OAuth provider unreachable: {}", e);
            return HttpResponse::BadGateway().body("OAuth provider unreachable");
        }
    };

    let email = info.email.trim().to_lowercase();
    let users = data.mongodb.db.collection::<User>("users");
    let user = match users.find_one(doc! { "email": &email }).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            let now = BsonDateTime::now();
            let new_user = User {
                id: Uuid::new_v4().to_string(),
                name: info.name.unwrap_or_else(|| email.clone()),
                email,
                password_hash: None,
                role: None,
                auth_provider: AuthProvider::Google,
                phone: None,
                profile_image: info.picture,
                reset_token: None,
                reset_token_expires_at: None,
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = users.insert_one(&new_user).await {
                error!("Error creating OAuth user: {}", e);
                return HttpResponse::InternalServerError().body("Error creating user");
            }
            data.notifier.do_send(Notify {
                user_id: new_user.id.clone(),
                event: DomainEvent::Welcome {
                    name: new_user.name.clone(),
                },
            });
            new_user
        }
        Err(e) => {
            error!("Error looking up OAuth user: {}", e);
            return HttpResponse::InternalServerError().body("Error logging in");
        }
    };

    let token = create_jwt(&user.id, &data.config.jwt_secret);
    HttpResponse::Ok().json(json!({
        "token": token,
        "user": user.public(),
        "role_selection_required": user.role.is_none(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct SelectRoleRequest {
    pub role: Role,
}

/// One-shot role selection for OAuth accounts. The role is immutable once
/// set.
pub async fn select_role(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<SelectRoleRequest>,
) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    if payload.role == Role::Admin {
        return HttpResponse::BadRequest().body("Cannot select the admin role");
    }
    if user.role.is_some() {
        return HttpResponse::BadRequest().body("Role has already been selected");
    }

    let users = data.mongodb.db.collection::<User>("users");
    let update = doc! { "$set": {
        "role": payload.role.as_str(),
        "updated_at": BsonDateTime::now(),
    }};
    if let Err(e) = users.update_one(doc! { "_id": &user.id }, update).await {
        error!("Error updating role for {}: {}", user.id, e);
        return HttpResponse::InternalServerError().body("Error updating role");
    }

    if payload.role == Role::Tutor {
        let tutors = data.mongodb.db.collection::<Tutor>("tutors");
        let exists = tutors
            .find_one(doc! { "user_id": &user.id })
            .await
            .ok()
            .flatten();
        if exists.is_none() {
            if let Err(e) = tutors.insert_one(&Tutor::new(&user.id)).await {
                error!("Error creating tutor profile for {}: {}", user.id, e);
                return HttpResponse::InternalServerError().body("Error creating tutor profile");
            }
        }
    }

    HttpResponse::Ok().json(json!({ "status": "Role selected", "role": payload.role }))
}

pub async fn get_me(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let user = match require_user(&req, &data).await {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let tutor = if user.role == Some(Role::Tutor) {
        let tutors = data.mongodb.db.collection::<Tutor>("tutors");
        tutors
            .find_one(doc! { "user_id": &user.id })
            .await
            .ok()
            .flatten()
    } else {
        None
    };

    HttpResponse::Ok().json(json!({ "user": user.public(), "tutor": tutor }))
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Stores a one-hour reset token and emails the reset link. The email is the
/// point of this operation, so unlike notifications an SMTP failure fails
/// the request.
pub async fn forgot_password(
    data: web::Data<AppState>,
    payload: web::Json<ForgotPasswordRequest>,
) -> impl Responder {
    let users = data.mongodb.db.collection::<User>("users");
    let email = payload.email.trim().to_lowercase();
    let user = match users.find_one(doc! { "email": &email }).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Same response as the success path; the address is not probed.
            return HttpResponse::Ok()
                .json(json!({ "status": "If the email exists, a reset link has been sent" }));
        }
        Err(e) => {
            error!("Error looking up user for password reset: {}", e);
            return HttpResponse::InternalServerError().body("Error requesting password reset");
        }
    };

    let reset_token = Uuid::new_v4().to_string();
    let expires_at = BsonDateTime::from_millis(Utc::now().timestamp_millis() + 60 * 60 * 1000);
    let update = doc! { "$set": {
        "reset_token": &reset_token,
        "reset_token_expires_at": expires_at,
        "updated_at": BsonDateTime::now(),
    }};
    if let Err(e) = users.update_one(doc! { "_id": &user.id }, update).await {
        error!("Error storing reset token: {}", e);
        return HttpResponse::InternalServerError().body("Error requesting password reset");
    }

    let link = format!(
        "{}/reset-password?token={}",
        data.config.frontend_origin, reset_token
    );
    let body = format!(
        "Hello {},\n\nA password reset was requested for your VerifiedTutors \
         account. Use the link below within one hour:\n\n{}\n\nIf you did not \
         request this, you can ignore this email.",
        user.name, link
    );
    match data
        .mailer
        .send(&user.email, "Reset your VerifiedTutors password", &body)
        .await
    {
        Ok(SendOutcome::Sent) => {}
        Ok(SendOutcome::Skipped) => {
            warn!("SMTP not configured; password reset email for {} skipped", user.email)
        }
        Err(e) => {
            error!("Failed to send password reset email: {}", e);
            return HttpResponse::BadGateway().body("Failed to send password reset email");
        }
    }

    HttpResponse::Ok().json(json!({ "status": "If the email exists, a reset link has been sent" }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[validate(length(min = 8))]
    pub password: String,
}

pub async fn reset_password(
    data: web::Data<AppState>,
    payload: web::Json<ResetPasswordRequest>,
) -> impl Responder {
    if let Err(e) = payload.validate() {
        return HttpResponse::BadRequest().body(e.to_string());
    }

    let users = data.mongodb.db.collection::<User>("users");
    let user = match users
        .find_one(doc! { "reset_token": &payload.token })
        .await
    {
        Ok(Some(user)) => user,
        Ok(None) => return HttpResponse::BadRequest().body("Invalid or expired reset token"),
        Err(e) => {
            error!("Error looking up reset token: {}", e);
            return HttpResponse::InternalServerError().body("Error resetting password");
        }
    };

    let expired = user
        .reset_token_expires_at
        .map(|t| t.timestamp_millis() < Utc::now().timestamp_millis())
        .unwrap_or(true);
    if expired {
        return HttpResponse::BadRequest().body("Invalid or expired reset token");
    }

    let hashed = match hash(&payload.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };
    let update = doc! {
        "$set": { "password_hash": hashed, "updated_at": BsonDateTime::now() },
        "$unset": { "reset_token": "", "reset_token_expires_at": "" },
    };
    if let Err(e) = users.update_one(doc! { "_id": &user.id }, update).await {
        error!("Error resetting password for {}: {}", user.id, e);
        return HttpResponse::InternalServerError().body("Error resetting password");
    }

    HttpResponse::Ok().json(json!({ "status": "Password has been reset" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jwt_round_trips() {
        let token = create_jwt("user-123", "test-secret");
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-123");
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt("user-123", "test-secret");
        assert!(validate_jwt(&token, "other-secret").is_err());
    }

    #[test]
    fn register_payload_validation() {
        let ok = RegisterRequest {
            name: "Kasun Perera".into(),
            email: "kasun@example.com".into(),
            password: "longenough".into(),
            role: Role::Student,
            phone: None,
        };
        assert!(ok.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".into(),
            ..ok
        };
        assert!(bad_email.validate().is_err());

        let short_password = RegisterRequest {
            name: "Kasun Perera".into(),
            email: "kasun@example.com".into(),
            password: "short".into(),
            role: Role::Student,
            phone: None,
        };
        assert!(short_password.validate().is_err());
    }
}
