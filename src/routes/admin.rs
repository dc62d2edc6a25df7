use std::collections::{BTreeSet, HashSet};

use log::{error, info};
use mongodb::bson::doc;
use mongodb::options::FindOptions;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use serde_json::{json, Value};

use super::{db_error, mongo_error, parse_flow, parse_id};
use crate::db::{records, DbConn, RECORDS};
use crate::guards::AdminGuard;
use crate::models::{MarkReviewedDto, VerificationRecord};
use crate::utils::{ApiError, ApiResponse};
use crate::verification::session::summarize;
use crate::verification::{ChangeFlags, Flow, Section, Wizard, WizardSession};

type ApiResult = Result<Json<ApiResponse<Value>>, ApiError>;

async fn find_record(db: &DbConn, owner: &str, flow: &str) -> Result<(VerificationRecord, Flow), ApiError> {
    let owner_id = parse_id(owner, "owner")?;
    let flow = parse_flow(flow)?;
    let record = records::find(db, owner_id, flow)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Verification record not found"))?;
    Ok((record, flow))
}

fn badges(flow: Flow, record: &VerificationRecord, flags: &ChangeFlags) -> Value {
    let verified: BTreeSet<String> = record.verified_documents.iter().cloned().collect();
    json!(summarize(flow, &record.data, &verified, flags))
}

#[derive(FromForm, serde::Deserialize, rocket_okapi::okapi::schemars::JsonSchema)]
pub struct RecordListQuery {
    pub flow: Option<String>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[openapi(tag = "Admin")]
#[get("/admin/verification?<query..>")]
pub async fn list_verifications(db: &State<DbConn>, _admin: AdminGuard, query: RecordListQuery) -> ApiResult {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);
    let skip = (page - 1) * limit;

    let mut filter = doc! {};
    if let Some(flow) = query.flow {
        filter.insert("flow", parse_flow(&flow)?.as_str());
    }
    if let Some(status) = query.status {
        match status.as_str() {
            "draft" | "submitted" => filter.insert("status", status),
            _ => return Err(ApiError::bad_request("Invalid status")),
        };
    }

    let find_options = FindOptions::builder()
        .skip(skip as u64)
        .limit(limit)
        .sort(doc! { "updated_at": -1 })
        .build();

    let mut cursor = db
        .collection::<VerificationRecord>(RECORDS)
        .find(filter.clone(), find_options)
        .await
        .map_err(mongo_error)?;

    let mut items = Vec::new();
    while cursor.advance().await.map_err(mongo_error)? {
        let record = cursor.deserialize_current().map_err(mongo_error)?;
        items.push(json!({
            "ownerId": record.owner_id.to_hex(),
            "flow": record.flow,
            "status": record.status,
            "pendingReview": !record.changed_fields.is_empty(),
            "changedFields": record.changed_fields.len(),
            "updatedAt": record.updated_at.try_to_rfc3339_string().ok(),
        }));
    }

    let total = db
        .collection::<VerificationRecord>(RECORDS)
        .count_documents(filter, None)
        .await
        .map_err(mongo_error)?;

    Ok(Json(ApiResponse::success(json!({
        "records": items,
        "pagination": {
            "page": page,
            "limit": limit,
            "total": total,
            "pages": (total as f64 / limit as f64).ceil() as i64,
        }
    }))))
}

/// The record as a reviewer sees it: data, completion and change badges.
#[openapi(tag = "Admin")]
#[get("/admin/verification/<owner>/<flow>")]
pub async fn get_for_review(db: &State<DbConn>, _admin: AdminGuard, owner: String, flow: String) -> ApiResult {
    let (record, flow) = find_record(db, &owner, &flow).await?;
    let wizard = Wizard::restore(flow, None, record.current_step, record.is_submitted());
    let session = WizardSession::resume(
        flow,
        record.data.clone(),
        record.field_statuses.clone(),
        record.changed_fields.clone(),
        record.verified_documents.clone(),
        wizard,
    );

    Ok(Json(ApiResponse::success(json!({
        "ownerId": record.owner_id.to_hex(),
        "status": record.status,
        "submittedAt": record.submitted_at.and_then(|at| at.try_to_rfc3339_string().ok()),
        "data": record.data,
        "changedFields": record.changed_fields,
        "verifiedDocuments": record.verified_documents,
        "summary": session.summary(),
    }))))
}

/// Clears change badges for a section and/or individual fields. Flags are
/// cleared in memory first and put back if storage refuses.
#[openapi(tag = "Admin")]
#[post("/admin/verification/<owner>/<flow>/review", data = "<dto>")]
pub async fn mark_reviewed(
    db: &State<DbConn>,
    admin: AdminGuard,
    owner: String,
    flow: String,
    dto: Json<MarkReviewedDto>,
) -> ApiResult {
    let (record, flow) = find_record(db, &owner, &flow).await?;
    let dto = dto.into_inner();

    let mut fields: Vec<String> = dto.fields.unwrap_or_default();
    if let Some(section) = dto.section {
        let section = section.parse::<Section>().map_err(ApiError::bad_request)?;
        let schema = flow
            .section(section)
            .ok_or_else(|| ApiError::bad_request(format!("{} is not part of the {} flow", section.as_str(), flow)))?;
        // Whole-object edits such as `warehouseAddress` sit above the
        // section's enumerated leaves.
        let roots: HashSet<&str> = schema.paths().filter_map(|path| path.split('.').next()).collect();
        fields.extend(roots.into_iter().map(str::to_string));
    }
    if fields.is_empty() {
        return Err(ApiError::bad_request("Name a section or at least one field"));
    }

    let mut flags = ChangeFlags::new(record.changed_fields.iter().cloned());
    let review = flags.begin_review(fields.as_slice());

    match records::pull_changed(db, record.owner_id, flow, &review.cleared).await {
        Ok(()) => {
            flags
                .commit(review.id)
                .map_err(|e| ApiError::internal_error(e.to_string()))?;
            info!(
                "admin {} reviewed {} path(s) on {} record of {}",
                admin.auth.owner_id,
                review.cleared.len(),
                flow,
                record.owner_id
            );
        }
        Err(e) => {
            let restored = flags
                .rollback(review.id)
                .map_err(|e| ApiError::internal_error(e.to_string()))?;
            error!("mark reviewed failed, restored {} flag(s): {}", restored.len(), e);
            return Err(db_error(e));
        }
    }

    Ok(Json(ApiResponse::success(json!({
        "cleared": review.cleared,
        "changedFields": flags.changed(),
        "sections": badges(flow, &record, &flags),
    }))))
}

async fn set_verified(db: &DbConn, owner: &str, flow: &str, name: &str, verified: bool) -> ApiResult {
    let (mut record, flow) = find_record(db, owner, flow).await?;
    let document = flow
        .document(name)
        .ok_or_else(|| ApiError::not_found(format!("Unknown {} document '{}'", flow, name)))?;

    if verified {
        let uploaded = crate::verification::path::get(&record.data, document.url_path)
            .and_then(Value::as_str)
            .is_some_and(|url| !url.trim().is_empty());
        if !uploaded {
            return Err(ApiError::conflict(format!("{} has not been uploaded", name)));
        }
    }

    records::set_document_verified(db, record.owner_id, flow, document.name, verified)
        .await
        .map_err(db_error)?;
    info!("{} document {} of {} set verified={}", flow, document.name, record.owner_id, verified);

    record.verified_documents.retain(|d| d != document.name);
    if verified {
        record.verified_documents.push(document.name.to_string());
    }
    let flags = ChangeFlags::new(record.changed_fields.iter().cloned());
    Ok(Json(ApiResponse::success(json!({
        "document": document.name,
        "verified": verified,
        "verifiedDocuments": record.verified_documents,
        "sections": badges(flow, &record, &flags),
    }))))
}

#[openapi(tag = "Admin")]
#[put("/admin/verification/<owner>/<flow>/documents/<name>/verify")]
pub async fn verify_document(
    db: &State<DbConn>,
    _admin: AdminGuard,
    owner: String,
    flow: String,
    name: String,
) -> ApiResult {
    set_verified(db, &owner, &flow, &name, true).await
}

#[openapi(tag = "Admin")]
#[put("/admin/verification/<owner>/<flow>/documents/<name>/unverify")]
pub async fn unverify_document(
    db: &State<DbConn>,
    _admin: AdminGuard,
    owner: String,
    flow: String,
    name: String,
) -> ApiResult {
    set_verified(db, &owner, &flow, &name, false).await
}
