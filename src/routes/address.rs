use log::info;
use mongodb::bson::{doc, oid::ObjectId, DateTime};
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use validator::Validate;

use super::{mongo_error, parse_id};
use crate::db::{DbConn, ADDRESSES};
use crate::guards::AuthGuard;
use crate::models::{Address, AddressDto, AddressResponse};
use crate::utils::{ApiError, ApiResponse};

fn addresses(db: &DbConn) -> mongodb::Collection<Address> {
    db.collection::<Address>(ADDRESSES)
}

fn validated(dto: Json<AddressDto>) -> Result<AddressDto, ApiError> {
    let dto = dto.into_inner();
    dto.validate()
        .map_err(|e| ApiError::bad_request(format!("Invalid address: {}", e)))?;
    Ok(dto)
}

async fn find_owned(db: &DbConn, owner_id: ObjectId, id: ObjectId) -> Result<Address, ApiError> {
    addresses(db)
        .find_one(doc! { "_id": id, "owner_id": owner_id }, None)
        .await
        .map_err(mongo_error)?
        .ok_or_else(|| ApiError::not_found("Address not found"))
}

/// Leaves `keep` as the owner's only default address.
async fn make_default(db: &DbConn, owner_id: ObjectId, keep: ObjectId) -> Result<(), ApiError> {
    addresses(db)
        .update_many(
            doc! { "owner_id": owner_id, "_id": { "$ne": keep } },
            doc! { "$set": { "is_default": false, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(mongo_error)?;
    addresses(db)
        .update_one(
            doc! { "_id": keep, "owner_id": owner_id },
            doc! { "$set": { "is_default": true, "updated_at": DateTime::now() } },
            None,
        )
        .await
        .map_err(mongo_error)?;
    Ok(())
}

#[openapi(tag = "Addresses")]
#[get("/addresses")]
pub async fn list_addresses(
    db: &State<DbConn>,
    auth: AuthGuard,
) -> Result<Json<ApiResponse<Vec<AddressResponse>>>, ApiError> {
    let find_options = FindOptions::builder()
        .sort(doc! { "is_default": -1, "created_at": 1 })
        .build();

    let mut cursor = addresses(db)
        .find(doc! { "owner_id": auth.owner_id }, find_options)
        .await
        .map_err(mongo_error)?;

    let mut list = Vec::new();
    while cursor.advance().await.map_err(mongo_error)? {
        let address = cursor.deserialize_current().map_err(mongo_error)?;
        list.push(AddressResponse::from(address));
    }
    Ok(Json(ApiResponse::success(list)))
}

/// The first address an owner adds becomes the default.
#[openapi(tag = "Addresses")]
#[post("/addresses", data = "<dto>")]
pub async fn create_address(
    db: &State<DbConn>,
    auth: AuthGuard,
    dto: Json<AddressDto>,
) -> Result<Json<ApiResponse<AddressResponse>>, ApiError> {
    let dto = validated(dto)?;

    let existing = addresses(db)
        .count_documents(doc! { "owner_id": auth.owner_id }, None)
        .await
        .map_err(mongo_error)?;
    let is_default = existing == 0 || dto.is_default;

    let mut address = Address::from_dto(auth.owner_id, dto, is_default);
    let result = addresses(db).insert_one(&address, None).await.map_err(mongo_error)?;
    let id = result
        .inserted_id
        .as_object_id()
        .ok_or_else(|| ApiError::internal_error("Address was stored without an id"))?;
    address.id = Some(id);

    if is_default && existing > 0 {
        make_default(db, auth.owner_id, id).await?;
    }
    info!("address {} added for {}", id, auth.owner_id);

    Ok(Json(ApiResponse::success_with_message(
        "Address added".to_string(),
        AddressResponse::from(address),
    )))
}

#[openapi(tag = "Addresses")]
#[put("/addresses/<id>", data = "<dto>")]
pub async fn update_address(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
    dto: Json<AddressDto>,
) -> Result<Json<ApiResponse<AddressResponse>>, ApiError> {
    let id = parse_id(&id, "address")?;
    let dto = validated(dto)?;
    let current = find_owned(db, auth.owner_id, id).await?;

    // Unticking "default" does not demote; another address must be promoted.
    let is_default = current.is_default || dto.is_default;
    let mut address = Address::from_dto(auth.owner_id, dto, is_default);
    address.id = Some(id);
    address.created_at = current.created_at;

    addresses(db)
        .replace_one(doc! { "_id": id, "owner_id": auth.owner_id }, &address, None)
        .await
        .map_err(mongo_error)?;
    if is_default && !current.is_default {
        make_default(db, auth.owner_id, id).await?;
    }

    Ok(Json(ApiResponse::success_with_message(
        "Address updated".to_string(),
        AddressResponse::from(address),
    )))
}

/// Deleting the default leaves the owner without one until they pick another.
#[openapi(tag = "Addresses")]
#[delete("/addresses/<id>")]
pub async fn delete_address(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let id = parse_id(&id, "address")?;
    let result = addresses(db)
        .delete_one(doc! { "_id": id, "owner_id": auth.owner_id }, None)
        .await
        .map_err(mongo_error)?;
    if result.deleted_count == 0 {
        return Err(ApiError::not_found("Address not found"));
    }

    Ok(Json(ApiResponse::success_with_message(
        "Address deleted".to_string(),
        serde_json::json!({ "id": id.to_hex() }),
    )))
}

#[openapi(tag = "Addresses")]
#[put("/addresses/<id>/default")]
pub async fn set_default_address(
    db: &State<DbConn>,
    auth: AuthGuard,
    id: String,
) -> Result<Json<ApiResponse<AddressResponse>>, ApiError> {
    let id = parse_id(&id, "address")?;
    let mut address = find_owned(db, auth.owner_id, id).await?;
    make_default(db, auth.owner_id, id).await?;
    address.is_default = true;

    Ok(Json(ApiResponse::success(AddressResponse::from(address))))
}
