use log::info;
use mongodb::bson::{self, doc, DateTime};
use mongodb::options::UpdateOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use serde_json::{json, Value};

use super::{db_error, mongo_error};
use crate::config::Config;
use crate::db::{DbConn, PersistError, DRAFTS};
use crate::guards::AuthGuard;
use crate::models::{FormDraft, SaveDraftDto};
use crate::utils::validation::validate_flow_name;
use crate::utils::{ApiError, ApiResponse};

type ApiResult = Result<Json<ApiResponse<Value>>, ApiError>;

fn checked_name(flow_name: &str) -> Result<(), ApiError> {
    if validate_flow_name(flow_name) {
        Ok(())
    } else {
        Err(ApiError::bad_request("Flow names are lowercase letters, digits and dashes"))
    }
}

fn drafts(db: &DbConn) -> mongodb::Collection<FormDraft> {
    db.collection::<FormDraft>(DRAFTS)
}

/// Returns the saved draft; one past its TTL is removed and reported missing.
#[openapi(tag = "Drafts")]
#[get("/drafts/<flow_name>")]
pub async fn get_draft(db: &State<DbConn>, auth: AuthGuard, flow_name: String) -> ApiResult {
    checked_name(&flow_name)?;
    let key = doc! { "owner_id": auth.owner_id, "flow_name": flow_name.as_str() };

    let draft = drafts(db)
        .find_one(key.clone(), None)
        .await
        .map_err(mongo_error)?
        .ok_or_else(|| ApiError::not_found("No draft saved"))?;

    if draft.is_expired(DateTime::now(), Config::draft_ttl_hours()) {
        drafts(db).delete_one(key, None).await.map_err(mongo_error)?;
        info!("expired {} draft of {} dropped", flow_name, auth.owner_id);
        return Err(ApiError::not_found("No draft saved"));
    }

    Ok(Json(ApiResponse::success(json!({
        "flowName": draft.flow_name,
        "data": draft.data,
        "savedAt": draft.saved_at.try_to_rfc3339_string().ok(),
    }))))
}

#[openapi(tag = "Drafts")]
#[put("/drafts/<flow_name>", data = "<dto>")]
pub async fn save_draft(
    db: &State<DbConn>,
    auth: AuthGuard,
    flow_name: String,
    dto: Json<SaveDraftDto>,
) -> ApiResult {
    checked_name(&flow_name)?;
    let data = dto.into_inner().data;
    if !data.is_object() {
        return Err(ApiError::bad_request("Draft data must be a JSON object"));
    }

    let saved_at = DateTime::now();
    let encoded = bson::to_bson(&data).map_err(|e| db_error(PersistError::Encode(e)))?;
    drafts(db)
        .update_one(
            doc! { "owner_id": auth.owner_id, "flow_name": flow_name.as_str() },
            doc! { "$set": { "data": encoded, "saved_at": saved_at } },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await
        .map_err(mongo_error)?;

    Ok(Json(ApiResponse::success(json!({
        "flowName": flow_name,
        "savedAt": saved_at.try_to_rfc3339_string().ok(),
    }))))
}

/// Idempotent: clearing a missing draft succeeds.
#[openapi(tag = "Drafts")]
#[delete("/drafts/<flow_name>")]
pub async fn delete_draft(db: &State<DbConn>, auth: AuthGuard, flow_name: String) -> ApiResult {
    checked_name(&flow_name)?;
    let result = drafts(db)
        .delete_one(doc! { "owner_id": auth.owner_id, "flow_name": flow_name.as_str() }, None)
        .await
        .map_err(mongo_error)?;

    Ok(Json(ApiResponse::success(json!({ "deleted": result.deleted_count > 0 }))))
}
