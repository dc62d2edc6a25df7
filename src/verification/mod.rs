//! Verification completion tracker shared by the seller, buyer and admin
//! review flows. Nothing in here performs I/O.

pub mod completion;
pub mod diff;
pub mod path;
pub mod review;
pub mod rules;
pub mod schema;
pub mod session;
pub mod tracker;
pub mod wizard;

pub use review::ChangeFlags;
pub use schema::{Flow, Section};
pub use session::{SaveRequest, SessionError, WizardSession};
pub use tracker::{FieldTracker, FieldVerification, FieldVerificationStatus, RegistryConfirmation, RegistryOutcome};
pub use wizard::{Wizard, WizardError};
