use chrono::Utc;
use log::{info, warn};
use mongodb::bson::oid::ObjectId;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use serde_json::{json, Value};

use super::{authorize, db_error, parse_flow, session_error, wizard_error};
use crate::db::{records, DbConn};
use crate::guards::AuthGuard;
use crate::models::{normalize_payload, CheckFieldDto, NextStepDto, VerificationRecord};
use crate::services::{RegistryError, RegistryService};
use crate::utils::{ApiError, ApiResponse};
use crate::verification::path;
use crate::verification::rules;
use crate::verification::wizard::parse_step_segment;
use crate::verification::{
    FieldTracker, FieldVerificationStatus, Flow, RegistryConfirmation, RegistryOutcome, Wizard, WizardSession,
};

type ApiResult = Result<Json<ApiResponse<Value>>, ApiError>;

/// Loads (or creates) the caller's record and resumes a session on it.
/// `url_step` wins over the stored step when it is in range.
async fn open_session(
    db: &DbConn,
    owner_id: ObjectId,
    flow: Flow,
    url_step: Option<u8>,
) -> Result<(VerificationRecord, WizardSession), ApiError> {
    let record = records::load_or_create(db, owner_id, flow).await.map_err(db_error)?;
    let wizard = Wizard::restore(flow, url_step, record.current_step, record.is_submitted());
    let session = WizardSession::resume(
        flow,
        record.data.clone(),
        record.field_statuses.clone(),
        record.changed_fields.clone(),
        record.verified_documents.clone(),
        wizard,
    );
    Ok((record, session))
}

/// Like `open_session`, but the step from the URL must be valid.
async fn open_at_step(
    db: &DbConn,
    owner_id: ObjectId,
    flow: Flow,
    step: &str,
) -> Result<(VerificationRecord, WizardSession), ApiError> {
    let wizard = Wizard::from_segment(flow, step, false).map_err(wizard_error)?;
    open_session(db, owner_id, flow, Some(wizard.step())).await
}

fn view(record: &VerificationRecord, session: &WizardSession) -> Value {
    json!({
        "flow": session.flow(),
        "status": record.status,
        "submittedAt": record.submitted_at.and_then(|at| at.try_to_rfc3339_string().ok()),
        "data": session.current(),
        "summary": session.summary(),
    })
}

fn normalized(flow: Flow, patch: Value) -> Result<Value, ApiError> {
    normalize_payload(flow, patch).map_err(|e| ApiError::bad_request(format!("Invalid section data: {}", e)))
}

#[openapi(tag = "Verification")]
#[get("/verification/<flow>")]
pub async fn get_verification(db: &State<DbConn>, auth: AuthGuard, flow: String) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let (record, session) = open_session(db, auth.owner_id, flow, None).await?;
    Ok(Json(ApiResponse::success(view(&record, &session))))
}

/// The step in the URL becomes the stored step.
#[openapi(tag = "Verification")]
#[get("/verification/<flow>/steps/<step>")]
pub async fn get_step(db: &State<DbConn>, auth: AuthGuard, flow: String, step: String) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let (record, session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    if session.wizard().step() != record.current_step {
        records::set_step(db, auth.owner_id, flow, session.wizard().step())
            .await
            .map_err(db_error)?;
    }
    Ok(Json(ApiResponse::success(view(&record, &session))))
}

/// Saves one section. Only fields that differ from storage are written;
/// `advance=true` moves to the next step in the same write.
#[openapi(tag = "Verification")]
#[put("/verification/<flow>/steps/<step>?<advance>", data = "<patch>")]
pub async fn save_step(
    db: &State<DbConn>,
    auth: AuthGuard,
    flow: String,
    step: String,
    advance: Option<bool>,
    patch: Json<Value>,
) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let patch = normalized(flow, patch.into_inner())?;
    let (record, mut session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    let step = session.wizard().step();
    session.apply_section(step, &patch, Utc::now()).map_err(session_error)?;

    let owner_id = auth.owner_id;
    let db: &DbConn = db;
    let persist = move |request| records::persist_save(db, owner_id, flow, request);
    let report = if advance.unwrap_or(false) {
        session.save_and_next(persist).await
    } else {
        session.save(persist).await
    }
    .map_err(session_error)?;

    let message = if report.written { "Section saved" } else { "No changes to save" };
    Ok(Json(ApiResponse::success_with_message(
        message.to_string(),
        json!({ "changedPaths": report.changed_paths, "verification": view(&record, &session) }),
    )))
}

/// Moves on when the form shows nothing that differs from storage and no
/// field on the step failed its format check.
#[openapi(tag = "Verification")]
#[post("/verification/<flow>/steps/<step>/next", data = "<dto>")]
pub async fn next_step(
    db: &State<DbConn>,
    auth: AuthGuard,
    flow: String,
    step: String,
    dto: Json<NextStepDto>,
) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let (record, mut session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    let current = session.wizard().step();
    if let Some(pending) = dto.into_inner().pending {
        let pending = normalized(flow, pending)?;
        session.apply_section(current, &pending, Utc::now()).map_err(session_error)?;
    }

    let step = session.next().map_err(wizard_error)?;
    records::set_step(db, auth.owner_id, flow, step).await.map_err(db_error)?;
    Ok(Json(ApiResponse::success(view(&record, &session))))
}

#[openapi(tag = "Verification")]
#[post("/verification/<flow>/steps/<step>/previous")]
pub async fn previous_step(db: &State<DbConn>, auth: AuthGuard, flow: String, step: String) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let (record, mut session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    let step = session.wizard_mut().previous();
    records::set_step(db, auth.owner_id, flow, step).await.map_err(db_error)?;
    Ok(Json(ApiResponse::success(view(&record, &session))))
}

#[openapi(tag = "Verification")]
#[post("/verification/<flow>/steps/<step>/jump/<target>")]
pub async fn jump_to_step(
    db: &State<DbConn>,
    auth: AuthGuard,
    flow: String,
    step: String,
    target: String,
) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let target = parse_step_segment(&target).map_err(wizard_error)?;
    let (record, mut session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    let step = session.wizard_mut().jump_to(target).map_err(wizard_error)?;
    records::set_step(db, auth.owner_id, flow, step).await.map_err(db_error)?;
    Ok(Json(ApiResponse::success(view(&record, &session))))
}

/// Final submission. Resubmitting a submitted record is allowed.
#[openapi(tag = "Verification")]
#[post("/verification/<flow>/steps/<step>/submit")]
pub async fn submit_verification(db: &State<DbConn>, auth: AuthGuard, flow: String, step: String) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let (mut record, mut session) = open_at_step(db, auth.owner_id, flow, &step).await?;
    let owner_id = auth.owner_id;
    let db: &DbConn = db;
    session
        .submit(move |request| records::persist_save(db, owner_id, flow, request))
        .await
        .map_err(session_error)?;

    if let Some(updated) = records::find(db, owner_id, flow).await.map_err(db_error)? {
        record = updated;
    }
    info!("{} verification of {} submitted", flow, owner_id);
    Ok(Json(ApiResponse::success_with_message(
        "Verification submitted for review".to_string(),
        view(&record, &session),
    )))
}

/// Format check for a single identifier. Nothing is stored; `related`
/// supplies the fields a cross-field check reads.
#[openapi(tag = "Verification")]
#[post("/verification/checks/<field>", data = "<dto>")]
pub async fn check_field(_auth: AuthGuard, field: String, dto: Json<CheckFieldDto>) -> ApiResult {
    let rule = rules::rule_for(&field)
        .ok_or_else(|| ApiError::not_found(format!("No format rule for '{}'", field)))?;

    let dto = dto.into_inner();
    let mut record = json!({});
    for (other, value) in dto.related {
        path::set(&mut record, &other, Value::String(value)).map_err(|e| ApiError::bad_request(e.to_string()))?;
    }
    path::set(&mut record, rule.field, Value::String(dto.value))
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut tracker = FieldTracker::default();
    tracker.on_edit(rule.field, &record, Utc::now());
    let verification = tracker.get(rule.field).cloned().unwrap_or_default();

    Ok(Json(ApiResponse::success(json!({
        "field": rule.field,
        "kind": rule.kind,
        "verification": verification,
    }))))
}

/// Asks the registry about a field that already passed its format check.
#[openapi(tag = "Verification")]
#[post("/verification/<flow>/fields/<field>/confirm")]
pub async fn confirm_field(db: &State<DbConn>, auth: AuthGuard, flow: String, field: String) -> ApiResult {
    let flow = parse_flow(&flow)?;
    authorize(&auth, flow)?;

    let rule = rules::rule_for(&field)
        .ok_or_else(|| ApiError::not_found(format!("No format rule for '{}'", field)))?;
    let (_, mut session) = open_session(db, auth.owner_id, flow, None).await?;

    if session.tracker().status(rule.field) != FieldVerificationStatus::Verified {
        return Err(ApiError::conflict(format!("{} must pass its format check first", rule.field)));
    }
    let value = path::get(session.current(), rule.field)
        .and_then(Value::as_str)
        .map(|raw| rule.kind.normalize(raw))
        .ok_or_else(|| ApiError::conflict(format!("{} has no value", rule.field)))?;

    let (confirmation, failure) = match RegistryService::confirm(rule.kind, &value).await {
        Ok(confirmation) => (confirmation, None),
        Err(RegistryError::NotConfigured) => {
            return Err(ApiError::service_unavailable("Registry lookups are not configured"));
        }
        Err(e) => {
            warn!("registry confirmation of {} for {} failed: {}", rule.field, auth.owner_id, e);
            let confirmation = RegistryConfirmation {
                outcome: RegistryOutcome::Unreachable,
                message: Some(e.to_string()),
                checked_at: Utc::now(),
            };
            (confirmation, Some(e))
        }
    };

    session.tracker_mut().record_registry(rule.field, confirmation);
    let status = session.tracker().get(rule.field).cloned().unwrap_or_default();
    records::set_field_status(db, auth.owner_id, flow, rule.field, &status)
        .await
        .map_err(db_error)?;

    if let Some(e) = failure {
        return Err(ApiError::bad_gateway(e.to_string()));
    }
    Ok(Json(ApiResponse::success(json!({ "field": rule.field, "verification": status }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::JwtService;
    use rocket::http::{ContentType, Header, Status};
    use rocket::local::asynchronous::Client;

    async fn client() -> Client {
        let rocket = rocket::build().mount("/api/v1", routes![check_field]);
        Client::tracked(rocket).await.unwrap()
    }

    fn bearer(role: Role) -> Header<'static> {
        let token = JwtService::generate_access_token(&ObjectId::new(), role).unwrap();
        Header::new("Authorization", format!("Bearer {}", token))
    }

    #[rocket::async_test]
    async fn check_requires_a_token() {
        let client = client().await;
        let res = client
            .post("/api/v1/verification/checks/panNumber")
            .header(ContentType::JSON)
            .body(r#"{"value":"AAGCB7383J"}"#)
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn check_reports_status_and_metadata() {
        let client = client().await;
        let res = client
            .post("/api/v1/verification/checks/ifscCode")
            .header(ContentType::JSON)
            .header(bearer(Role::Buyer))
            .body(r#"{"value":"hdfc0001234"}"#)
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::Ok);

        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["verification"]["status"], "verified");
        assert_eq!(body["data"]["verification"]["metadata"]["bank_name"], "HDFC Bank");
    }

    #[rocket::async_test]
    async fn cross_field_check_uses_related_values() {
        let client = client().await;
        let res = client
            .post("/api/v1/verification/checks/gstin")
            .header(ContentType::JSON)
            .header(bearer(Role::Seller))
            .body(r#"{"value":"29AAGCB7383J1Z4","related":{"panNumber":"AAPFU0939F"}}"#)
            .dispatch()
            .await;
        let body: Value = res.into_json().await.unwrap();
        assert_eq!(body["data"]["verification"]["status"], "invalid");
        assert!(body["data"]["verification"]["hint"].is_string());
    }

    #[rocket::async_test]
    async fn unknown_fields_have_no_rule() {
        let client = client().await;
        let res = client
            .post("/api/v1/verification/checks/businessName")
            .header(ContentType::JSON)
            .header(bearer(Role::Seller))
            .body(r#"{"value":"Sahyadri"}"#)
            .dispatch()
            .await;
        assert_eq!(res.status(), Status::NotFound);
    }
}
