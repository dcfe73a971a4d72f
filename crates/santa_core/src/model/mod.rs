//! Draw domain model.
//!
//! # Responsibility
//! - Define groups, participants and assignment pairs used by the draw core.
//! - Validate onboarding input before it reaches storage.
//!
//! # Invariants
//! - Every group and participant is identified by a stable UUID.
//! - Optional joined data (contacts, receivers) is `Option`, never sniffed.

pub mod access_code;
pub mod group;
pub mod participant;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Validation failures for onboarding input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    EmptyGroupName,
    EmptyParticipantName,
    /// A contact was provided but contains only whitespace.
    BlankContact,
    InvalidSuggestedValue(String),
    InvalidEventDate(String),
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyGroupName => write!(f, "group name cannot be empty"),
            Self::EmptyParticipantName => write!(f, "participant name cannot be empty"),
            Self::BlankContact => write!(f, "contact address cannot be blank"),
            Self::InvalidSuggestedValue(value) => {
                write!(f, "suggested value must be a plain amount like `50.00`, got `{value}`")
            }
            Self::InvalidEventDate(value) => {
                write!(f, "event date must be `YYYY-MM-DD`, got `{value}`")
            }
        }
    }
}

impl Error for ModelValidationError {}

/// Trims an optional contact and maps empty values to `None`.
pub(crate) fn normalize_contact(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
