//! One owner for everything a wizard instance knows.
//!
//! Routes resume a session from storage, feed it intents (edit a field,
//! apply a section, save, advance, submit) and read back views. The
//! session decides what needs persisting; the caller decides how.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{info, warn};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::future::Future;
use thiserror::Error;

use super::completion;
use super::diff;
use super::path::{self, PathError};
use super::review::ChangeFlags;
use super::schema::{Flow, Section, SectionSchema};
use super::tracker::{FieldTracker, FieldVerification, FieldVerificationStatus};
use super::wizard::{Wizard, WizardError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Wizard(#[from] WizardError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("section data must be a JSON object")]
    NotAnObject,
    #[error("field '{field}' is not part of step {step}")]
    ForeignField { field: String, step: u8 },
}

/// Everything a save needs to write.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub changes: Map<String, Value>,
    pub changed_paths: Vec<String>,
    /// Statuses re-checked by this session, not the whole stored map.
    pub field_statuses: BTreeMap<String, FieldVerification>,
    /// Step the wizard will be on once the save lands.
    pub step: u8,
    pub submit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    pub written: bool,
    pub changed_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionSummary {
    pub title: &'static str,
    pub step: u8,
    pub completion: u8,
    pub all_documents_verified: bool,
    pub has_changes: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub changed_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub flow: Flow,
    pub overall_completion: u8,
    pub document_completion: u8,
    pub sections: IndexMap<Section, SectionSummary>,
    pub field_statuses: BTreeMap<String, FieldVerification>,
    pub wizard: Wizard,
    pub path_segment: String,
}

pub fn summarize(
    flow: Flow,
    record: &Value,
    verified_documents: &BTreeSet<String>,
    flags: &ChangeFlags,
) -> IndexMap<Section, SectionSummary> {
    flow.sections()
        .iter()
        .zip(1u8..)
        .map(|(schema, step)| {
            let changed_fields = flags.changed_in(schema);
            let summary = SectionSummary {
                title: schema.title,
                step,
                completion: completion::section_completion(schema, record),
                all_documents_verified: completion::all_documents_verified(
                    schema,
                    record,
                    verified_documents,
                ),
                has_changes: !changed_fields.is_empty(),
                changed_fields,
            };
            (schema.section, summary)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct WizardSession {
    flow: Flow,
    original: Value,
    current: Value,
    tracker: FieldTracker,
    flags: ChangeFlags,
    verified_documents: BTreeSet<String>,
    wizard: Wizard,
}

impl WizardSession {
    pub fn resume(
        flow: Flow,
        data: Value,
        field_statuses: BTreeMap<String, FieldVerification>,
        changed_fields: Vec<String>,
        verified_documents: Vec<String>,
        wizard: Wizard,
    ) -> Self {
        let data = if data.is_object() { data } else { Value::Object(Map::new()) };
        WizardSession {
            flow,
            original: data.clone(),
            current: data,
            tracker: FieldTracker::from_statuses(field_statuses),
            flags: ChangeFlags::new(changed_fields),
            verified_documents: verified_documents.into_iter().collect(),
            wizard,
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn wizard(&self) -> &Wizard {
        &self.wizard
    }

    pub fn wizard_mut(&mut self) -> &mut Wizard {
        &mut self.wizard
    }

    pub fn tracker(&self) -> &FieldTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut FieldTracker {
        &mut self.tracker
    }

    pub fn flags(&self) -> &ChangeFlags {
        &self.flags
    }

    pub fn pending_changes(&self) -> Map<String, Value> {
        diff::diff(&self.current, &self.original)
    }

    pub fn has_unsaved(&self) -> bool {
        diff::has_changes(&self.current, &self.original)
    }

    /// Fields on `step` whose format check failed or could not run.
    pub fn blocking_fields(&self, step: u8) -> Vec<String> {
        let Some(schema) = self.flow.section_for_step(step) else {
            return Vec::new();
        };
        self.tracker
            .statuses()
            .iter()
            .filter(|(field, verification)| {
                matches!(
                    verification.status,
                    FieldVerificationStatus::Invalid | FieldVerificationStatus::Error
                ) && owns_root(schema, field)
            })
            .map(|(field, _)| field.clone())
            .collect()
    }

    fn ensure_valid<I: IntoIterator<Item = u8>>(&self, steps: I) -> Result<(), WizardError> {
        let blocking: Vec<String> = steps.into_iter().flat_map(|step| self.blocking_fields(step)).collect();
        if blocking.is_empty() {
            Ok(())
        } else {
            warn!("{} wizard: step {} blocked by {}", self.flow, self.wizard.step(), blocking.join(", "));
            Err(WizardError::InvalidFields(blocking))
        }
    }

    /// Advances without saving. Invalid fields on the current step and
    /// unsaved edits both hold the wizard where it is.
    pub fn next(&mut self) -> Result<u8, WizardError> {
        self.ensure_valid([self.wizard.step()])?;
        let unsaved = self.has_unsaved();
        self.wizard.next(unsaved)
    }

    pub fn edit_field(&mut self, field: &str, value: Value, now: DateTime<Utc>) -> Result<(), SessionError> {
        path::set(&mut self.current, field, value)?;
        self.tracker.on_edit(field, &self.current, now);
        Ok(())
    }

    /// Merges a section's worth of edits into the current record. Every
    /// top-level key must belong to the section shown on `step`.
    pub fn apply_section(&mut self, step: u8, patch: &Value, now: DateTime<Utc>) -> Result<Vec<String>, SessionError> {
        let schema = self
            .flow
            .section_for_step(step)
            .ok_or(WizardError::OutOfRange { step, total: self.flow.total_steps() })?;
        let patch_map = patch.as_object().ok_or(SessionError::NotAnObject)?;

        if let Some(field) = patch_map.keys().find(|key| !owns_root(schema, key)) {
            return Err(SessionError::ForeignField { field: field.clone(), step });
        }

        let edited = diff::changed_paths(&diff::diff(patch, &self.current));
        path::merge(&mut self.current, patch);
        for field in &edited {
            self.tracker.on_edit(field, &self.current, now);
        }
        Ok(edited)
    }

    fn save_request(&self, step: u8, submit: bool) -> SaveRequest {
        let changes = self.pending_changes();
        SaveRequest {
            changed_paths: diff::changed_paths(&changes),
            changes,
            field_statuses: self.tracker.touched_statuses(),
            step,
            submit,
        }
    }

    fn mark_saved(&mut self, request: &SaveRequest) -> SaveReport {
        self.original = self.current.clone();
        self.tracker.clear_touched();
        self.flags.record_edits(request.changed_paths.iter().cloned());
        SaveReport { written: true, changed_paths: request.changed_paths.clone() }
    }

    /// Writes pending changes through `persist`. Nothing to write means no
    /// call at all.
    pub async fn save<F, Fut, E>(&mut self, persist: F) -> Result<SaveReport, SessionError>
    where
        F: FnOnce(SaveRequest) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        if !self.has_unsaved() {
            return Ok(SaveReport { written: false, changed_paths: Vec::new() });
        }
        let request = self.save_request(self.wizard.step(), false);
        let forwarded = request.clone();
        self.wizard.save(|| persist(forwarded)).await?;
        Ok(self.mark_saved(&request))
    }

    /// Saves (when needed) and moves to the next step. The write carries the
    /// new step so a reload lands where the user is headed.
    pub async fn save_and_next<F, Fut, E>(&mut self, persist: F) -> Result<SaveReport, SessionError>
    where
        F: FnOnce(SaveRequest) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.ensure_valid([self.wizard.step()])?;
        let request = self.save_request(self.wizard.step().saturating_add(1), false);
        let forwarded = request.clone();
        self.wizard.save_and_next(|| persist(forwarded)).await?;
        if request.changes.is_empty() {
            // Only the step moved.
            return Ok(SaveReport { written: false, changed_paths: Vec::new() });
        }
        Ok(self.mark_saved(&request))
    }

    pub async fn submit<F, Fut, E>(&mut self, persist: F) -> Result<SaveReport, SessionError>
    where
        F: FnOnce(SaveRequest) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Display,
    {
        self.ensure_valid(1..=self.flow.total_steps())?;
        let request = self.save_request(self.wizard.step(), true);
        let forwarded = request.clone();
        self.wizard.submit_final(|| persist(forwarded)).await?;
        info!("{} verification submitted with {} pending field(s)", self.flow, request.changed_paths.len());
        Ok(self.mark_saved(&request))
    }

    pub fn summary(&self) -> FlowSummary {
        FlowSummary {
            flow: self.flow,
            overall_completion: completion::overall_completion(self.flow, &self.current),
            document_completion: completion::document_completion(self.flow, &self.current),
            sections: summarize(self.flow, &self.current, &self.verified_documents, &self.flags),
            field_statuses: self.tracker.statuses().clone(),
            path_segment: self.wizard.path_segment(),
            wizard: self.wizard.clone(),
        }
    }
}

fn owns_root(schema: &SectionSchema, key: &str) -> bool {
    schema
        .paths()
        .any(|path| path.split('.').next() == Some(key))
}
