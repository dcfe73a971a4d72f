//! Participant model and assignment pairs.

use super::group::GroupId;
use super::{normalize_contact, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable participant identifier.
pub type ParticipantId = Uuid;

/// Group member as seen by the draw core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub group_id: GroupId,
    pub name: String,
    /// Messaging address. Participants without one are never notified.
    pub contact: Option<String>,
    /// Personal code used in the participant's access link.
    pub access_code: String,
    /// Set exactly once by the draw.
    pub assigned_receiver_id: Option<ParticipantId>,
    pub has_viewed_result: bool,
}

/// Giver/receiver link. `giver != receiver` for every pair produced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentPair<T = ParticipantId> {
    pub giver: T,
    pub receiver: T,
}

/// Onboarding input for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewParticipant {
    pub name: String,
    pub contact: Option<String>,
}

impl NewParticipant {
    pub fn new(name: impl Into<String>, contact: Option<&str>) -> Self {
        Self {
            name: name.into(),
            contact: contact.map(str::to_string),
        }
    }

    /// Checks required fields and returns a trimmed copy.
    ///
    /// An empty-string contact is treated as "no contact", matching how
    /// optional form fields arrive.
    pub fn validate(&self) -> Result<Self, ModelValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModelValidationError::EmptyParticipantName);
        }
        if matches!(&self.contact, Some(value) if !value.is_empty() && value.trim().is_empty()) {
            return Err(ModelValidationError::BlankContact);
        }
        Ok(Self {
            name: name.to_string(),
            contact: normalize_contact(self.contact.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::NewParticipant;
    use crate::model::ModelValidationError;

    #[test]
    fn empty_contact_means_no_contact() {
        let validated = NewParticipant::new(" Bea ", Some("")).validate().unwrap();
        assert_eq!(validated.name, "Bea");
        assert_eq!(validated.contact, None);
    }

    #[test]
    fn whitespace_contact_is_rejected() {
        let err = NewParticipant::new("Bea", Some("   "))
            .validate()
            .unwrap_err();
        assert_eq!(err, ModelValidationError::BlankContact);
    }
}
