//! Change badges for admin review.
//!
//! The server keeps the set of paths a user edited since the last admin
//! acknowledgement. Marking fields reviewed is two-phase: flags are cleared
//! locally first and either committed once storage agrees or put back.

use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use uuid::Uuid;

use super::path::is_ancestor_or_self;
use super::schema::SectionSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReviewError {
    #[error("no pending review with id {0}")]
    UnknownReview(Uuid),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReview {
    pub id: Uuid,
    pub cleared: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ChangeFlags {
    changed: BTreeSet<String>,
    pending: HashMap<Uuid, Vec<String>>,
}

impl ChangeFlags {
    pub fn new<I, S>(changed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ChangeFlags {
            changed: changed.into_iter().map(Into::into).collect(),
            pending: HashMap::new(),
        }
    }

    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    /// True if `field` or anything nested under it changed.
    pub fn is_changed(&self, field: &str) -> bool {
        self.changed.iter().any(|path| is_ancestor_or_self(field, path))
    }

    /// Changed paths that belong to the section. A whole-object change such
    /// as `warehouseAddress` also flags the section's `warehouseAddress.*`.
    pub fn changed_in(&self, schema: &SectionSchema) -> Vec<String> {
        self.changed
            .iter()
            .filter(|changed| {
                schema.paths().any(|field| {
                    is_ancestor_or_self(field, changed) || is_ancestor_or_self(changed, field)
                })
            })
            .cloned()
            .collect()
    }

    pub fn has_changes(&self, schema: &SectionSchema) -> bool {
        !self.changed_in(schema).is_empty()
    }

    pub fn record_edits<I, S>(&mut self, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed.extend(paths.into_iter().map(Into::into));
    }

    /// Clears each field and its nested paths, remembering what was removed.
    pub fn begin_review<S: AsRef<str>>(&mut self, fields: &[S]) -> PendingReview {
        let cleared: Vec<String> = self
            .changed
            .iter()
            .filter(|path| fields.iter().any(|field| is_ancestor_or_self(field.as_ref(), path)))
            .cloned()
            .collect();
        for path in &cleared {
            self.changed.remove(path);
        }

        let id = Uuid::new_v4();
        self.pending.insert(id, cleared.clone());
        PendingReview { id, cleared }
    }

    pub fn commit(&mut self, id: Uuid) -> Result<(), ReviewError> {
        self.pending
            .remove(&id)
            .map(|_| ())
            .ok_or(ReviewError::UnknownReview(id))
    }

    /// Puts back exactly the paths the review cleared.
    pub fn rollback(&mut self, id: Uuid) -> Result<Vec<String>, ReviewError> {
        let cleared = self.pending.remove(&id).ok_or(ReviewError::UnknownReview(id))?;
        self.changed.extend(cleared.iter().cloned());
        Ok(cleared)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::schema::{Flow, Section};

    fn flags() -> ChangeFlags {
        ChangeFlags::new([
            "fullName",
            "fullName.first",
            "fullNameAlias",
            "gstin",
            "warehouseAddress.city",
            "exportMarkets",
        ])
    }

    #[test]
    fn reviewing_full_name_clears_only_its_paths() {
        let mut flags = flags();
        let review = flags.begin_review(&["fullName"]);

        assert_eq!(review.cleared, vec!["fullName".to_string(), "fullName.first".to_string()]);
        assert!(!flags.is_changed("fullName"));
        assert!(flags.is_changed("fullNameAlias"));
        assert!(flags.is_changed("gstin"));
        assert!(flags.is_changed("warehouseAddress"));

        let logistics = Flow::Seller.section(Section::Logistics).unwrap();
        assert!(flags.has_changes(logistics));
    }

    #[test]
    fn section_flags_follow_enumerated_paths() {
        let flags = flags();
        let identity = Flow::Seller.section(Section::BusinessIdentity).unwrap();
        let food = Flow::Seller.section(Section::FoodSafety).unwrap();

        assert_eq!(
            flags.changed_in(identity),
            vec!["fullName".to_string(), "fullName.first".to_string(), "gstin".to_string()]
        );
        assert!(!flags.has_changes(food));
    }

    #[test]
    fn whole_object_change_flags_nested_requirements() {
        let flags = ChangeFlags::new(["warehouseAddress"]);
        let logistics = Flow::Seller.section(Section::Logistics).unwrap();
        assert!(flags.has_changes(logistics));
    }

    #[test]
    fn rollback_restores_cleared_flags() {
        let mut flags = flags();
        let before = flags.changed().clone();
        let review = flags.begin_review(&["gstin", "exportMarkets"]);
        assert!(!flags.is_changed("gstin"));
        assert!(flags.has_pending());

        let restored = flags.rollback(review.id).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(flags.changed(), &before);
        assert!(!flags.has_pending());
    }

    #[test]
    fn commit_keeps_flags_cleared() {
        let mut flags = flags();
        let review = flags.begin_review(&["gstin"]);
        flags.commit(review.id).unwrap();
        assert!(!flags.is_changed("gstin"));
        assert_eq!(flags.commit(review.id), Err(ReviewError::UnknownReview(review.id)));
    }

    #[test]
    fn user_edits_raise_flags() {
        let mut flags = ChangeFlags::default();
        flags.record_edits(vec!["panNumber".to_string()]);
        assert!(flags.is_changed("panNumber"));
    }
}
