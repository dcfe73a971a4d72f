//! Group model and draw lifecycle state.

use super::{normalize_contact, ModelValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable group identifier.
pub type GroupId = Uuid;

/// Draw lifecycle of one group.
///
/// `Pending -> Drawing -> Drawn`. `Drawing` is a short-lived claim held while
/// one caller computes and commits the assignment. `Drawn` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawState {
    Pending,
    Drawing,
    Drawn,
}

impl DrawState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Drawing => "drawing",
            Self::Drawn => "drawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "drawing" => Some(Self::Drawing),
            "drawn" => Some(Self::Drawn),
            _ => None,
        }
    }
}

/// Secret Santa group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Short upper-case code shared with participants and the organizer.
    pub code: String,
    pub name: String,
    pub organizer_name: Option<String>,
    /// Organizer contact; the summary message is skipped when absent.
    pub organizer_contact: Option<String>,
    /// Suggested gift value as entered, e.g. `50` or `49.90`.
    pub suggested_value: Option<String>,
    /// Exchange date, `YYYY-MM-DD`.
    pub event_date: Option<String>,
    pub draw_state: DrawState,
}

impl Group {
    pub fn is_drawn(&self) -> bool {
        self.draw_state == DrawState::Drawn
    }
}

/// Onboarding input for a new group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub organizer_name: Option<String>,
    pub organizer_contact: Option<String>,
    pub suggested_value: Option<String>,
    pub event_date: Option<String>,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_organizer(mut self, name: impl Into<String>, contact: Option<&str>) -> Self {
        self.organizer_name = Some(name.into());
        self.organizer_contact = contact.map(str::to_string);
        self
    }

    pub fn with_event_details(
        mut self,
        suggested_value: Option<&str>,
        event_date: Option<&str>,
    ) -> Self {
        self.suggested_value = suggested_value.map(str::to_string);
        self.event_date = event_date.map(str::to_string);
        self
    }

    /// Checks required fields and returns a trimmed copy.
    pub fn validate(&self) -> Result<Self, ModelValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ModelValidationError::EmptyGroupName);
        }
        if matches!(&self.organizer_contact, Some(value) if value.trim().is_empty()) {
            return Err(ModelValidationError::BlankContact);
        }
        let suggested_value = normalize_contact(self.suggested_value.as_deref());
        if let Some(value) = &suggested_value {
            if !is_valid_amount(value) {
                return Err(ModelValidationError::InvalidSuggestedValue(value.clone()));
            }
        }
        let event_date = normalize_contact(self.event_date.as_deref());
        if let Some(value) = &event_date {
            if !is_iso_date(value) {
                return Err(ModelValidationError::InvalidEventDate(value.clone()));
            }
        }
        Ok(Self {
            name: name.to_string(),
            organizer_name: normalize_contact(self.organizer_name.as_deref()),
            organizer_contact: normalize_contact(self.organizer_contact.as_deref()),
            suggested_value,
            event_date,
        })
    }
}

/// Non-negative decimal with at most two fraction digits.
fn is_valid_amount(value: &str) -> bool {
    let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
    !whole.is_empty()
        && whole.bytes().all(|byte| byte.is_ascii_digit())
        && fraction.len() <= 2
        && fraction.bytes().all(|byte| byte.is_ascii_digit())
        && !value.ends_with('.')
}

/// `YYYY-MM-DD` with a plausible month and day.
fn is_iso_date(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    let [year, month, day] = parts.as_slice() else {
        return false;
    };
    let numeric = |text: &str, len: usize| {
        text.len() == len && text.bytes().all(|byte| byte.is_ascii_digit())
    };
    if !(numeric(*year, 4) && numeric(*month, 2) && numeric(*day, 2)) {
        return false;
    }
    matches!(month.parse::<u8>(), Ok(1..=12)) && matches!(day.parse::<u8>(), Ok(1..=31))
}
