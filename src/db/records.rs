//! Reads and writes of `verification_records`.
//!
//! Every write goes through a targeted update (`$set` on dotted paths,
//! `$addToSet`/`$pull` on the sets) so independent requests for different
//! sections or documents do not overwrite each other.

use log::info;
use mongodb::bson::{self, doc, oid::ObjectId, DateTime, Document};
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

use super::{DbConn, PersistError, RECORDS};
use crate::models::VerificationRecord;
use crate::verification::diff;
use crate::verification::{FieldVerification, Flow, SaveRequest};

fn key(owner_id: ObjectId, flow: Flow) -> Document {
    doc! { "owner_id": owner_id, "flow": flow.as_str() }
}

fn records(db: &DbConn) -> mongodb::Collection<VerificationRecord> {
    db.collection::<VerificationRecord>(RECORDS)
}

/// Returns the owner's record for `flow`, creating an empty one first.
pub async fn load_or_create(db: &DbConn, owner_id: ObjectId, flow: Flow) -> Result<VerificationRecord, PersistError> {
    let mut fresh = bson::to_document(&VerificationRecord::new(owner_id, flow))?;
    fresh.remove("owner_id");
    fresh.remove("flow");

    let options = FindOneAndUpdateOptions::builder()
        .upsert(true)
        .return_document(ReturnDocument::After)
        .build();

    let record = records(db)
        .find_one_and_update(key(owner_id, flow), doc! { "$setOnInsert": fresh }, options)
        .await?;

    match record {
        Some(record) => Ok(record),
        // Upsert with ReturnDocument::After always yields a document.
        None => Ok(VerificationRecord::new(owner_id, flow)),
    }
}

pub async fn find(db: &DbConn, owner_id: ObjectId, flow: Flow) -> Result<Option<VerificationRecord>, PersistError> {
    Ok(records(db).find_one(key(owner_id, flow), None).await?)
}

/// Builds the update for a wizard save: only the diff is `$set` under
/// `data.*`, each re-checked status under `field_statuses.<field>`, and the
/// changed leaf paths join `changed_fields`.
pub fn save_update(request: &SaveRequest) -> Result<Document, PersistError> {
    let mut set = diff::to_set_document("data", &request.changes)?;
    for (field, status) in &request.field_statuses {
        set.insert(format!("field_statuses.{}", field), bson::to_bson(status)?);
    }
    set.insert("current_step", i32::from(request.step));
    set.insert("updated_at", DateTime::now());
    if request.submit {
        set.insert("status", "submitted");
        set.insert("submitted_at", DateTime::now());
    }

    let mut update = doc! { "$set": set };
    if !request.changed_paths.is_empty() {
        update.insert(
            "$addToSet",
            doc! { "changed_fields": { "$each": request.changed_paths.clone() } },
        );
    }
    Ok(update)
}

pub async fn persist_save(
    db: &DbConn,
    owner_id: ObjectId,
    flow: Flow,
    request: SaveRequest,
) -> Result<(), PersistError> {
    let update = save_update(&request)?;
    records(db).update_one(key(owner_id, flow), update, None).await?;
    info!(
        "{} record of {} saved: {} path(s), step {}",
        flow,
        owner_id,
        request.changed_paths.len(),
        request.step
    );
    Ok(())
}

pub async fn set_step(db: &DbConn, owner_id: ObjectId, flow: Flow, step: u8) -> Result<(), PersistError> {
    records(db)
        .update_one(
            key(owner_id, flow),
            doc! { "$set": { "current_step": i32::from(step), "updated_at": DateTime::now() } },
            None,
        )
        .await?;
    Ok(())
}

/// `None` when there is nothing to pull.
pub fn pull_update(paths: &[String]) -> Option<Document> {
    if paths.is_empty() {
        return None;
    }
    Some(doc! {
        "$pull": { "changed_fields": { "$in": paths.to_vec() } },
        "$set": { "updated_at": DateTime::now() },
    })
}

/// Removes reviewed paths from `changed_fields`.
pub async fn pull_changed(db: &DbConn, owner_id: ObjectId, flow: Flow, paths: &[String]) -> Result<(), PersistError> {
    let Some(update) = pull_update(paths) else {
        return Ok(());
    };
    records(db).update_one(key(owner_id, flow), update, None).await?;
    Ok(())
}

pub async fn set_document_verified(
    db: &DbConn,
    owner_id: ObjectId,
    flow: Flow,
    name: &str,
    verified: bool,
) -> Result<(), PersistError> {
    let op = if verified { "$addToSet" } else { "$pull" };
    let mut update = Document::new();
    update.insert(op, doc! { "verified_documents": name });
    update.insert("$set", doc! { "updated_at": DateTime::now() });
    records(db).update_one(key(owner_id, flow), update, None).await?;
    Ok(())
}

pub async fn set_field_status(
    db: &DbConn,
    owner_id: ObjectId,
    flow: Flow,
    field: &str,
    status: &FieldVerification,
) -> Result<(), PersistError> {
    let mut set = Document::new();
    set.insert(format!("field_statuses.{}", field), bson::to_bson(status)?);
    set.insert("updated_at", DateTime::now());
    records(db).update_one(key(owner_id, flow), doc! { "$set": set }, None).await?;
    Ok(())
}
