use actix_web::{web, HttpRequest, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::{doc, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::app_state::AppState;
use crate::auth::require_admin;
use crate::db::duplicate_key_message;
use crate::models::catalog::Location;

#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    pub name: String,
    pub level: i32,
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLocationRequest {
    pub name: Option<String>,
    pub parent_id: Option<String>,
    pub active: Option<bool>,
}

/// A location with its children folded in, for the tree response.
#[derive(Debug, Serialize)]
pub struct LocationNode {
    pub id: String,
    pub name: String,
    pub level: i32,
    pub children: Vec<LocationNode>,
}

/// Level 1 roots the tree, level 2 hangs off level 1, level 3 off level 2.
pub fn validate_level_parent(level: i32, parent: Option<&Location>) -> Result<(), String> {
    match (level, parent) {
        (1, None) => Ok(()),
        (1, Some(_)) => Err("A level 1 location cannot have a parent".to_string()),
        (2, Some(parent)) if parent.level == 1 => Ok(()),
        (3, Some(parent)) if parent.level == 2 => Ok(()),
        (2, _) => Err("A level 2 location requires a level 1 parent".to_string()),
        (3, _) => Err("A level 3 location requires a level 2 parent".to_string()),
        _ => Err("Location level must be 1, 2 or 3".to_string()),
    }
}

/// Folds a flat list into the three level tree. Orphans whose parent is
/// missing or inactive are dropped.
pub fn build_tree(locations: Vec<Location>) -> Vec<LocationNode> {
    let mut roots = Vec::new();
    let mut towns: Vec<Location> = Vec::new();
    let mut hometowns: Vec<Location> = Vec::new();

    for location in locations {
        match location.level {
            1 => roots.push(LocationNode {
                id: location.id,
                name: location.name,
                level: 1,
                children: Vec::new(),
            }),
            2 => towns.push(location),
            3 => hometowns.push(location),
            _ => {}
        }
    }

    for town in towns {
        if let Some(root) = roots
            .iter_mut()
            .find(|r| Some(&r.id) == town.parent_id.as_ref())
        {
            root.children.push(LocationNode {
                id: town.id,
                name: town.name,
                level: 2,
                children: Vec::new(),
            });
        }
    }

    for hometown in hometowns {
        for root in roots.iter_mut() {
            if let Some(town) = root
                .children
                .iter_mut()
                .find(|t| Some(&t.id) == hometown.parent_id.as_ref())
            {
                town.children.push(LocationNode {
                    id: hometown.id,
                    name: hometown.name,
                    level: 3,
                    children: Vec::new(),
                });
                break;
            }
        }
    }

    roots
}

async fn load_parent(
    data: &web::Data<AppState>,
    parent_id: Option<&String>,
) -> Result<Option<Location>, HttpResponse> {
    let parent_id = match parent_id {
        Some(id) => id,
        None => return Ok(None),
    };
    let locations = data.mongodb.db.collection::<Location>("locations");
    match locations.find_one(doc! { "_id": parent_id }).await {
        Ok(Some(parent)) => Ok(Some(parent)),
        Ok(None) => Err(HttpResponse::NotFound().body("Parent location not found")),
        Err(e) => {
            error!("Error fetching parent location {}: {}", parent_id, e);
            Err(HttpResponse::InternalServerError().body("Error fetching parent location"))
        }
    }
}

/// GET the full active location tree.
pub async fn get_location_tree(data: web::Data<AppState>) -> impl Responder {
    let locations = data.mongodb.db.collection::<Location>("locations");
    let mut cursor = match locations
        .find(doc! { "active": true })
        .sort(doc! { "level": 1, "name": 1 })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching locations: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching locations");
        }
    };

    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(location) => items.push(location),
            Err(e) => {
                error!("Error reading location cursor: {}", e);
                return HttpResponse::InternalServerError().body("Error fetching locations");
            }
        }
    }

    HttpResponse::Ok().json(build_tree(items))
}

/// CREATE a location. Admin only.
pub async fn create_location(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateLocationRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("Location name is required");
    }

    let parent = match load_parent(&data, payload.parent_id.as_ref()).await {
        Ok(parent) => parent,
        Err(resp) => return resp,
    };
    if let Err(message) = validate_level_parent(payload.level, parent.as_ref()) {
        return HttpResponse::BadRequest().body(message);
    }

    let location = Location {
        id: uuid::Uuid::new_v4().to_string(),
        name: name.to_string(),
        level: payload.level,
        parent_id: payload.parent_id.clone(),
        active: true,
        created_at: BsonDateTime::now(),
    };

    let locations = data.mongodb.db.collection::<Location>("locations");
    match locations.insert_one(&location).await {
        Ok(_) => HttpResponse::Ok().json(location),
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A location with this name already exists under this parent");
            }
            error!("Error creating location: {}", e);
            HttpResponse::InternalServerError().body("Error creating location")
        }
    }
}

/// UPDATE a location. Admin only. Level is fixed at creation; reparenting
/// stays within the same level's rules.
pub async fn update_location(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateLocationRequest>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let location_id = path.into_inner();

    let locations = data.mongodb.db.collection::<Location>("locations");
    let existing = match locations.find_one(doc! { "_id": &location_id }).await {
        Ok(Some(location)) => location,
        Ok(None) => return HttpResponse::NotFound().body("Location not found"),
        Err(e) => {
            error!("Error fetching location {}: {}", location_id, e);
            return HttpResponse::InternalServerError().body("Error updating location");
        }
    };

    let mut set = doc! {};
    if let Some(name) = &payload.name {
        let name = name.trim();
        if name.is_empty() {
            return HttpResponse::BadRequest().body("Location name is required");
        }
        set.insert("name", name);
    }
    if let Some(active) = payload.active {
        set.insert("active", active);
    }
    if let Some(parent_id) = &payload.parent_id {
        if parent_id == &location_id {
            return HttpResponse::BadRequest().body("A location cannot be its own parent");
        }
        let parent = match load_parent(&data, Some(parent_id)).await {
            Ok(parent) => parent,
            Err(resp) => return resp,
        };
        if let Err(message) = validate_level_parent(existing.level, parent.as_ref()) {
            return HttpResponse::BadRequest().body(message);
        }
        set.insert("parent_id", parent_id);
    }

    if set.is_empty() {
        return HttpResponse::Ok().json(existing);
    }

    match locations
        .update_one(doc! { "_id": &location_id }, doc! { "$set": set })
        .await
    {
        Ok(_) => match locations.find_one(doc! { "_id": &location_id }).await {
            Ok(Some(location)) => HttpResponse::Ok().json(location),
            _ => HttpResponse::InternalServerError().body("Error updating location"),
        },
        Err(e) => {
            if duplicate_key_message(&e).is_some() {
                return HttpResponse::BadRequest()
                    .body("A location with this name already exists under this parent");
            }
            error!("Error updating location {}: {}", location_id, e);
            HttpResponse::InternalServerError().body("Error updating location")
        }
    }
}

/// DELETE a leaf location. Admin only. Parents with children are refused
/// so the tree never dangles.
pub async fn delete_location(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_admin(&req, &data).await {
        return resp;
    }
    let location_id = path.into_inner();

    let locations = data.mongodb.db.collection::<Location>("locations");
    match locations
        .count_documents(doc! { "parent_id": &location_id })
        .await
    {
        Ok(0) => {}
        Ok(_) => {
            return HttpResponse::BadRequest().body("Cannot delete a location with child locations")
        }
        Err(e) => {
            error!("Error counting children of location {}: {}", location_id, e);
            return HttpResponse::InternalServerError().body("Error deleting location");
        }
    }

    match locations.delete_one(doc! { "_id": &location_id }).await {
        Ok(result) if result.deleted_count == 0 => {
            HttpResponse::NotFound().body("Location not found")
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "message": "Location deleted" })),
        Err(e) => {
            error!("Error deleting location {}: {}", location_id, e);
            HttpResponse::InternalServerError().body("Error deleting location")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(id: &str, level: i32, parent_id: Option<&str>) -> Location {
        Location {
            id: id.to_string(),
            name: id.to_string(),
            level,
            parent_id: parent_id.map(|s| s.to_string()),
            active: true,
            created_at: BsonDateTime::now(),
        }
    }

    #[test]
    fn level_parent_rules() {
        let city = location("colombo", 1, None);
        let town = location("dehiwala", 2, Some("colombo"));

        assert!(validate_level_parent(1, None).is_ok());
        assert!(validate_level_parent(1, Some(&city)).is_err());
        assert!(validate_level_parent(2, Some(&city)).is_ok());
        assert!(validate_level_parent(2, None).is_err());
        assert!(validate_level_parent(2, Some(&town)).is_err());
        assert!(validate_level_parent(3, Some(&town)).is_ok());
        assert!(validate_level_parent(3, Some(&city)).is_err());
        assert!(validate_level_parent(4, None).is_err());
    }

    #[test]
    fn tree_nests_three_levels() {
        let tree = build_tree(vec![
            location("colombo", 1, None),
            location("kandy", 1, None),
            location("dehiwala", 2, Some("colombo")),
            location("attidiya", 3, Some("dehiwala")),
            location("peradeniya", 2, Some("kandy")),
        ]);

        assert_eq!(tree.len(), 2);
        let colombo = tree.iter().find(|n| n.id == "colombo").unwrap();
        assert_eq!(colombo.children.len(), 1);
        assert_eq!(colombo.children[0].id, "dehiwala");
        assert_eq!(colombo.children[0].children[0].id, "attidiya");
        let kandy = tree.iter().find(|n| n.id == "kandy").unwrap();
        assert_eq!(kandy.children.len(), 1);
        assert!(kandy.children[0].children.is_empty());
    }

    #[test]
    fn tree_drops_orphans() {
        let tree = build_tree(vec![
            location("colombo", 1, None),
            location("nowhere-town", 2, Some("missing")),
            location("nowhere-home", 3, Some("nowhere-town")),
        ]);

        assert_eq!(tree.len(), 1);
        assert!(tree[0].children.is_empty());
    }
}
