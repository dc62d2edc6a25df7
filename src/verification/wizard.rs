//! Linear step navigation for the onboarding wizard.
//!
//! The step lives in the URL as `step-<n>`; when a valid step arrives in the
//! path it wins over whatever was stored last time.

use log::{info, warn};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use thiserror::Error;

use super::schema::Flow;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("step {step} is outside 1..={total}")]
    OutOfRange { step: u8, total: u8 },
    #[error("'{0}' is not a wizard step")]
    BadSegment(String),
    #[error("save your changes before moving on")]
    UnsavedChanges,
    #[error("fix these fields before moving on: {}", .0.join(", "))]
    InvalidFields(Vec<String>),
    #[error("the {0} flow does not allow jumping between steps")]
    JumpNotAllowed(Flow),
    #[error("final submission is only possible from step {0}")]
    NotTerminal(u8),
    #[error("save failed: {0}")]
    SaveFailed(String),
}

/// Accepts `step-3` or plain `3`.
pub fn parse_step_segment(segment: &str) -> Result<u8, WizardError> {
    let digits = segment.strip_prefix("step-").unwrap_or(segment);
    digits
        .parse::<u8>()
        .map_err(|_| WizardError::BadSegment(segment.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Wizard {
    flow: Flow,
    step: u8,
    total_steps: u8,
    submitted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

impl Wizard {
    pub fn new(flow: Flow) -> Self {
        Wizard {
            flow,
            step: 1,
            total_steps: flow.total_steps(),
            submitted: false,
            last_error: None,
        }
    }

    pub fn at(flow: Flow, step: u8) -> Result<Self, WizardError> {
        let mut wizard = Wizard::new(flow);
        wizard.step = wizard.checked(step)?;
        Ok(wizard)
    }

    /// A valid URL step overrides the stored one; an invalid stored step
    /// falls back to the first.
    pub fn restore(flow: Flow, url_step: Option<u8>, stored_step: u8, submitted: bool) -> Self {
        let mut wizard = Wizard::new(flow);
        wizard.submitted = submitted;
        wizard.step = url_step
            .and_then(|step| wizard.checked(step).ok())
            .or_else(|| wizard.checked(stored_step).ok())
            .unwrap_or(1);
        wizard
    }

    pub fn from_segment(flow: Flow, segment: &str, submitted: bool) -> Result<Self, WizardError> {
        let step = parse_step_segment(segment)?;
        let mut wizard = Wizard::at(flow, step)?;
        wizard.submitted = submitted;
        Ok(wizard)
    }

    fn checked(&self, step: u8) -> Result<u8, WizardError> {
        if (1..=self.total_steps).contains(&step) {
            Ok(step)
        } else {
            Err(WizardError::OutOfRange { step, total: self.total_steps })
        }
    }

    pub fn flow(&self) -> Flow {
        self.flow
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    pub fn total_steps(&self) -> u8 {
        self.total_steps
    }

    pub fn is_terminal(&self) -> bool {
        self.step == self.total_steps
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn path_segment(&self) -> String {
        format!("step-{}", self.step)
    }

    pub fn next(&mut self, has_unsaved: bool) -> Result<u8, WizardError> {
        if has_unsaved {
            warn!("{} wizard: next blocked on step {} by unsaved changes", self.flow, self.step);
            return Err(WizardError::UnsavedChanges);
        }
        self.step = self.checked(self.step + 1)?;
        Ok(self.step)
    }

    pub fn previous(&mut self) -> u8 {
        self.step = self.step.saturating_sub(1).max(1);
        self.step
    }

    pub fn jump_to(&mut self, step: u8) -> Result<u8, WizardError> {
        if !self.flow.allows_jump() {
            return Err(WizardError::JumpNotAllowed(self.flow));
        }
        self.step = self.checked(step)?;
        Ok(self.step)
    }

    /// Runs `save`. A failure is recorded and the step does not move.
    pub async fn save<F, Fut, T, E>(&mut self, save: F) -> Result<T, WizardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match save().await {
            Ok(saved) => {
                self.last_error = None;
                Ok(saved)
            }
            Err(e) => {
                let message = e.to_string();
                warn!("{} wizard: save on step {} failed: {}", self.flow, self.step, message);
                self.last_error = Some(message.clone());
                Err(WizardError::SaveFailed(message))
            }
        }
    }

    /// Saves, then advances. Refused up front on the terminal step so a
    /// save never lands without its navigation.
    pub async fn save_and_next<F, Fut, T, E>(&mut self, save: F) -> Result<T, WizardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let target = self.checked(self.step + 1)?;
        let saved = self.save(save).await?;
        self.step = target;
        Ok(saved)
    }

    pub async fn submit_final<F, Fut, T, E>(&mut self, save: F) -> Result<T, WizardError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if !self.is_terminal() {
            return Err(WizardError::NotTerminal(self.total_steps));
        }
        let saved = self.save(save).await?;
        self.submitted = true;
        info!("{} wizard submitted", self.flow);
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<(), String> {
        Ok(())
    }

    async fn fail() -> Result<(), String> {
        Err("network down".to_string())
    }

    #[test]
    fn url_step_wins_over_stored_step() {
        for step in 1..=5 {
            let wizard = Wizard::restore(Flow::Seller, Some(step), 2, false);
            assert_eq!(wizard.step(), step);
        }
        assert_eq!(Wizard::restore(Flow::Buyer, Some(9), 3, false).step(), 3);
        assert_eq!(Wizard::restore(Flow::Buyer, None, 0, false).step(), 1);
    }

    #[test]
    fn segments_round_trip_through_the_path() {
        let wizard = Wizard::from_segment(Flow::Seller, "step-4", false).unwrap();
        assert_eq!(wizard.path_segment(), "step-4");
        assert_eq!(parse_step_segment("3"), Ok(3));
        assert_eq!(
            parse_step_segment("step-x"),
            Err(WizardError::BadSegment("step-x".to_string()))
        );
        assert_eq!(
            Wizard::from_segment(Flow::Buyer, "step-5", false),
            Err(WizardError::OutOfRange { step: 5, total: 4 })
        );
    }

    #[test]
    fn next_is_blocked_by_unsaved_changes() {
        let mut wizard = Wizard::new(Flow::Buyer);
        assert_eq!(wizard.next(true), Err(WizardError::UnsavedChanges));
        assert_eq!(wizard.step(), 1);
        assert_eq!(wizard.next(false), Ok(2));
    }

    #[test]
    fn previous_is_unconditional_and_floors_at_one() {
        let mut wizard = Wizard::at(Flow::Buyer, 2).unwrap();
        assert_eq!(wizard.previous(), 1);
        assert_eq!(wizard.previous(), 1);
    }

    #[test]
    fn only_sellers_can_jump() {
        let mut seller = Wizard::new(Flow::Seller);
        assert_eq!(seller.jump_to(4), Ok(4));
        assert!(seller.jump_to(6).is_err());

        let mut buyer = Wizard::new(Flow::Buyer);
        assert_eq!(buyer.jump_to(3), Err(WizardError::JumpNotAllowed(Flow::Buyer)));
    }

    #[tokio::test]
    async fn failed_save_stays_on_step_and_records_error() {
        let mut wizard = Wizard::at(Flow::Seller, 2).unwrap();
        let result = wizard.save_and_next(fail).await;
        assert_eq!(result, Err(WizardError::SaveFailed("network down".to_string())));
        assert_eq!(wizard.step(), 2);
        assert_eq!(wizard.last_error(), Some("network down"));

        wizard.save_and_next(ok).await.unwrap();
        assert_eq!(wizard.step(), 3);
        assert_eq!(wizard.last_error(), None);
    }

    #[tokio::test]
    async fn submit_only_from_terminal_step() {
        let mut wizard = Wizard::at(Flow::Buyer, 3).unwrap();
        assert_eq!(wizard.submit_final(ok).await, Err(WizardError::NotTerminal(4)));
        assert!(!wizard.is_submitted());

        wizard.next(false).unwrap();
        wizard.submit_final(ok).await.unwrap();
        assert!(wizard.is_submitted());
    }

    #[tokio::test]
    async fn save_and_next_refuses_on_terminal_step_without_saving() {
        let mut wizard = Wizard::at(Flow::Buyer, 4).unwrap();
        let mut called = false;
        let result = wizard
            .save_and_next(|| {
                called = true;
                ok()
            })
            .await;
        assert_eq!(result, Err(WizardError::OutOfRange { step: 5, total: 4 }));
        assert!(!called);
    }
}
