pub mod address;
pub mod admin;
pub mod draft;
pub mod verification;

use log::{error, warn};
use mongodb::bson::oid::ObjectId;

use crate::db::PersistError;
use crate::guards::AuthGuard;
use crate::utils::ApiError;
use crate::verification::{Flow, SessionError, WizardError};

pub(crate) fn parse_flow(flow: &str) -> Result<Flow, ApiError> {
    flow.parse::<Flow>().map_err(ApiError::bad_request)
}

pub(crate) fn parse_id(id: &str, what: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::bad_request(format!("Invalid {} ID", what)))
}

/// Sellers see the seller flow, buyers the buyer flow.
pub(crate) fn authorize(auth: &AuthGuard, flow: Flow) -> Result<(), ApiError> {
    if auth.role.can_open(flow) {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!("The {} flow is not available for this account", flow)))
    }
}

pub(crate) fn db_error(e: PersistError) -> ApiError {
    error!("{}", e);
    ApiError::internal_error(format!("Database error: {}", e))
}

pub(crate) fn mongo_error(e: mongodb::error::Error) -> ApiError {
    db_error(PersistError::Mongo(e))
}

pub(crate) fn wizard_error(e: WizardError) -> ApiError {
    let err = match &e {
        WizardError::OutOfRange { .. } | WizardError::BadSegment(_) | WizardError::InvalidFields(_) => {
            ApiError::bad_request(e.to_string())
        }
        WizardError::UnsavedChanges | WizardError::NotTerminal(_) => ApiError::conflict(e.to_string()),
        WizardError::JumpNotAllowed(_) => ApiError::forbidden(e.to_string()),
        WizardError::SaveFailed(_) => ApiError::internal_error(e.to_string()),
    };
    warn!("{}", err);
    err
}

pub(crate) fn session_error(e: SessionError) -> ApiError {
    match e {
        SessionError::Wizard(e) => wizard_error(e),
        other => ApiError::bad_request(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::http::Status;

    #[test]
    fn wizard_errors_map_to_statuses() {
        assert_eq!(wizard_error(WizardError::UnsavedChanges).status, Status::Conflict);
        assert_eq!(wizard_error(WizardError::JumpNotAllowed(Flow::Buyer)).status, Status::Forbidden);
        assert_eq!(wizard_error(WizardError::OutOfRange { step: 9, total: 5 }).status, Status::BadRequest);
        assert_eq!(
            wizard_error(WizardError::InvalidFields(vec!["gstin".to_string()])).status,
            Status::BadRequest
        );
        assert_eq!(
            session_error(SessionError::ForeignField { field: "gstin".to_string(), step: 3 }).status,
            Status::BadRequest
        );
    }

    #[test]
    fn flows_parse_or_reject() {
        assert_eq!(parse_flow("Seller").ok().map(|f| f.as_str()), Some("seller"));
        assert_eq!(parse_flow("vendor").err().map(|e| e.status), Some(Status::BadRequest));
    }
}
