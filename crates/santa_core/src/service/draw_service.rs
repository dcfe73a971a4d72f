//! Draw orchestration use cases.
//!
//! # Responsibility
//! - Run a group's draw: claim, assign, commit, notify.
//! - Resend personal links after the draw.
//! - Tell a giver when their receiver updated a wishlist.
//! - Report which participants have opened their result.
//!
//! # Invariants
//! - A group moves `Pending -> Drawing -> Drawn` at most once.
//! - Nothing is written when the group has fewer than two participants.
//! - The assignment covers the participant list read while the claim is held.
//! - A failed commit releases the claim and surfaces `PersistenceFailure`.
//! - Notification failures never fail a committed draw.

use crate::config::SantaConfig;
use crate::draw::assignment::{
    generate_assignment, verify_single_cycle, AssignmentError, MIN_PARTICIPANTS,
};
use crate::model::group::{DrawState, Group, GroupId};
use crate::model::participant::{AssignmentPair, Participant, ParticipantId};
use crate::notify::dispatcher::{DispatchSummary, NotificationDispatcher};
use crate::notify::gateway::{GatewayError, MessageGateway};
use crate::notify::messages::{
    organizer_message, participant_invite_text, participant_messages, wishlist_update_text,
    LinkBuilder,
};
use crate::repo::draw_repo::{DrawRepository, RepoError};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors surfaced by draw use cases.
#[derive(Debug)]
pub enum DrawServiceError {
    GroupNotFound(GroupId),
    GroupCodeNotFound(String),
    ParticipantNotFound(ParticipantId),
    InsufficientParticipants { found: usize },
    AlreadyDrawn(GroupId),
    /// Another caller holds the draw claim for this group.
    DrawInProgress(GroupId),
    NotDrawn(GroupId),
    MissingContact(ParticipantId),
    Assignment(AssignmentError),
    PersistenceFailure(RepoError),
    /// Read-back after a write disagrees with what was written.
    InconsistentState(&'static str),
    /// Single-recipient resend failed.
    Delivery(GatewayError),
}

impl Display for DrawServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::GroupCodeNotFound(code) => write!(f, "group not found for code `{code}`"),
            Self::ParticipantNotFound(id) => write!(f, "participant not found: {id}"),
            Self::InsufficientParticipants { found } => write!(
                f,
                "at least {MIN_PARTICIPANTS} participants are required, found {found}"
            ),
            Self::AlreadyDrawn(id) => write!(f, "group {id} has already been drawn"),
            Self::DrawInProgress(id) => write!(f, "a draw is already in progress for group {id}"),
            Self::NotDrawn(id) => write!(f, "group {id} has not been drawn yet"),
            Self::MissingContact(id) => write!(f, "participant {id} has no contact address"),
            Self::Assignment(err) => write!(f, "{err}"),
            Self::PersistenceFailure(err) => write!(f, "persistence failure: {err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent draw state: {details}"),
            Self::Delivery(err) => write!(f, "delivery failed: {err}"),
        }
    }
}

impl Error for DrawServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Assignment(err) => Some(err),
            Self::PersistenceFailure(err) => Some(err),
            Self::Delivery(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DrawServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::GroupNotFound(id) => Self::GroupNotFound(id),
            RepoError::ParticipantNotFound(id) => Self::ParticipantNotFound(id),
            RepoError::DrawConflict {
                group_id,
                state: DrawState::Drawn,
            } => Self::AlreadyDrawn(group_id),
            RepoError::DrawConflict {
                group_id,
                state: DrawState::Drawing,
            } => Self::DrawInProgress(group_id),
            other => Self::PersistenceFailure(other),
        }
    }
}

impl From<AssignmentError> for DrawServiceError {
    fn from(value: AssignmentError) -> Self {
        match value {
            AssignmentError::InsufficientParticipants { found } => {
                Self::InsufficientParticipants { found }
            }
            other => Self::Assignment(other),
        }
    }
}

/// Result of a committed draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawOutcome {
    /// Group as persisted after the draw (`Drawn`).
    pub group: Group,
    /// Participants read back with their assigned receivers.
    pub participants: Vec<Participant>,
    pub pairs: Vec<AssignmentPair>,
    /// Delivery summary for participant and organizer messages.
    pub notifications: DispatchSummary,
}

/// Organizer view of one participant. Never carries codes or receivers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantStatus {
    pub id: ParticipantId,
    pub name: String,
    pub has_contact: bool,
    pub has_viewed_result: bool,
}

/// Organizer view of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStatus {
    pub group: Group,
    pub participants: Vec<ParticipantStatus>,
    /// Participants that opened their result page.
    pub viewed: usize,
}

/// Draw orchestrator over a repository and a messaging gateway.
pub struct DrawService<R: DrawRepository, G: MessageGateway> {
    repo: R,
    dispatcher: NotificationDispatcher<G>,
    links: LinkBuilder,
    rng: StdRng,
}

impl<R: DrawRepository, G: MessageGateway> DrawService<R, G> {
    /// Creates a service with an entropy-seeded RNG.
    pub fn new(repo: R, dispatcher: NotificationDispatcher<G>, links: LinkBuilder) -> Self {
        Self {
            repo,
            dispatcher,
            links,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a service from injected configuration.
    pub fn from_config(repo: R, gateway: G, config: &SantaConfig) -> Self {
        Self::new(
            repo,
            NotificationDispatcher::from_config(gateway, &config.dispatch),
            LinkBuilder::new(config.app_base_url.as_str()),
        )
    }

    /// Replaces the RNG with a seeded one, making draws reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher<G> {
        &self.dispatcher
    }

    /// Runs the draw for one group and notifies participants and organizer.
    ///
    /// # Errors
    /// - `GroupNotFound`, `AlreadyDrawn`, `DrawInProgress` before any write.
    /// - `InsufficientParticipants` before any write, or after the claim
    ///   (which is then released) if participants vanished in between.
    /// - `PersistenceFailure` when the commit fails; the claim is released.
    /// - `InconsistentState` when read-back misses an assignment.
    pub fn execute_draw(&mut self, group_id: GroupId) -> Result<DrawOutcome, DrawServiceError> {
        let started_at = Instant::now();
        info!("event=draw_execute module=service status=start group_id={group_id}");

        let result = self.execute_draw_inner(group_id);
        match &result {
            Ok(outcome) => info!(
                "event=draw_execute module=service status=ok group_id={} participants={} sent={} failed={} gateway_unavailable={} duration_ms={}",
                group_id,
                outcome.participants.len(),
                outcome.notifications.sent,
                outcome.notifications.failed,
                outcome.notifications.gateway_unavailable,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=draw_execute module=service status=error group_id={} duration_ms={} error={}",
                group_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn execute_draw_inner(&mut self, group_id: GroupId) -> Result<DrawOutcome, DrawServiceError> {
        let group = self
            .repo
            .get_group(group_id)?
            .ok_or(DrawServiceError::GroupNotFound(group_id))?;
        match group.draw_state {
            DrawState::Pending => {}
            DrawState::Drawing => return Err(DrawServiceError::DrawInProgress(group_id)),
            DrawState::Drawn => return Err(DrawServiceError::AlreadyDrawn(group_id)),
        }

        let found = self.repo.load_participants(group_id)?.len();
        if found < MIN_PARTICIPANTS {
            return Err(DrawServiceError::InsufficientParticipants { found });
        }

        self.repo.claim_draw(group_id)?;

        // Membership is frozen only once the claim is held.
        let participants = match self.repo.load_participants(group_id) {
            Ok(participants) => participants,
            Err(err) => {
                self.release_claim(group_id);
                return Err(err.into());
            }
        };
        if participants.len() < MIN_PARTICIPANTS {
            self.release_claim(group_id);
            return Err(DrawServiceError::InsufficientParticipants {
                found: participants.len(),
            });
        }

        let ids: Vec<ParticipantId> = participants
            .iter()
            .map(|participant| participant.id)
            .collect();
        let pairs = match generate_assignment(&ids, &mut self.rng) {
            Ok(pairs) => pairs,
            Err(err) => {
                self.release_claim(group_id);
                return Err(err.into());
            }
        };
        if !verify_single_cycle(&ids, &pairs) {
            self.release_claim(group_id);
            return Err(DrawServiceError::InconsistentState(
                "generated assignment is not a single cycle",
            ));
        }

        if let Err(err) = self.repo.commit_draw(group_id, &pairs) {
            self.release_claim(group_id);
            return Err(DrawServiceError::PersistenceFailure(err));
        }

        let group = self
            .repo
            .get_group(group_id)?
            .ok_or(DrawServiceError::InconsistentState(
                "drawn group missing in read-back",
            ))?;
        let participants = self.repo.load_participants(group_id)?;
        if participants.len() != pairs.len()
            || participants
                .iter()
                .any(|participant| participant.assigned_receiver_id.is_none())
        {
            return Err(DrawServiceError::InconsistentState(
                "participant without receiver after commit",
            ));
        }

        let mut messages = participant_messages(&group, &participants, &self.links);
        messages.extend(organizer_message(&group, participants.len(), &self.links));
        let notifications = self.dispatcher.dispatch(&messages);

        Ok(DrawOutcome {
            group,
            participants,
            pairs,
            notifications,
        })
    }

    /// Resends the personal link to every participant with a contact.
    pub fn resend_group_notifications(
        &self,
        group_code: &str,
    ) -> Result<DispatchSummary, DrawServiceError> {
        let group = self
            .repo
            .find_group_by_code(group_code)?
            .ok_or_else(|| DrawServiceError::GroupCodeNotFound(group_code.to_string()))?;
        if !group.is_drawn() {
            return Err(DrawServiceError::NotDrawn(group.id));
        }

        let participants = self.repo.load_participants(group.id)?;
        let messages = participant_messages(&group, &participants, &self.links);
        let summary = self.dispatcher.dispatch(&messages);
        info!(
            "event=notify_resend module=service status=ok scope=group group_id={} sent={} failed={}",
            group.id, summary.sent, summary.failed
        );
        Ok(summary)
    }

    /// Resends the personal link to one participant.
    ///
    /// No availability probe is made; the send either succeeds or reports
    /// the gateway's reason.
    pub fn resend_participant_notification(
        &self,
        participant_id: ParticipantId,
    ) -> Result<(), DrawServiceError> {
        let participant = self
            .repo
            .get_participant(participant_id)?
            .ok_or(DrawServiceError::ParticipantNotFound(participant_id))?;
        let group = self
            .repo
            .get_group(participant.group_id)?
            .ok_or(DrawServiceError::GroupNotFound(participant.group_id))?;
        if !group.is_drawn() {
            return Err(DrawServiceError::NotDrawn(group.id));
        }
        let address = participant
            .contact
            .as_deref()
            .ok_or(DrawServiceError::MissingContact(participant_id))?;

        let text = participant_invite_text(&group, &participant, &self.links);
        self.dispatcher
            .send_one(address, &text)
            .map_err(DrawServiceError::Delivery)?;
        info!(
            "event=notify_resend module=service status=ok scope=participant participant_id={participant_id}"
        );
        Ok(())
    }

    /// Tells the giver of `receiver_id` that their receiver updated a wishlist.
    ///
    /// # Errors
    /// - `ParticipantNotFound` for an unknown receiver.
    /// - `NotDrawn` before the draw.
    /// - `MissingContact` when the giver has no contact.
    /// - `Delivery` when the gateway rejects the send.
    pub fn notify_giver(&self, receiver_id: ParticipantId) -> Result<(), DrawServiceError> {
        let receiver = self
            .repo
            .get_participant(receiver_id)?
            .ok_or(DrawServiceError::ParticipantNotFound(receiver_id))?;
        let group = self
            .repo
            .get_group(receiver.group_id)?
            .ok_or(DrawServiceError::GroupNotFound(receiver.group_id))?;
        if !group.is_drawn() {
            return Err(DrawServiceError::NotDrawn(group.id));
        }

        let giver = self
            .repo
            .load_participants(group.id)?
            .into_iter()
            .find(|participant| participant.assigned_receiver_id == Some(receiver_id))
            .ok_or(DrawServiceError::InconsistentState(
                "drawn participant has no giver",
            ))?;
        let address = giver
            .contact
            .as_deref()
            .ok_or(DrawServiceError::MissingContact(giver.id))?;

        let text = wishlist_update_text(&group, &giver, &receiver, &self.links);
        self.dispatcher
            .send_one(address, &text)
            .map_err(DrawServiceError::Delivery)?;
        info!(
            "event=notify_giver module=service status=ok group_id={} receiver_id={}",
            group.id, receiver_id
        );
        Ok(())
    }

    /// Lists participants with their contact and result-viewed flags.
    pub fn group_status(&self, group_code: &str) -> Result<GroupStatus, DrawServiceError> {
        let group = self
            .repo
            .find_group_by_code(group_code)?
            .ok_or_else(|| DrawServiceError::GroupCodeNotFound(group_code.to_string()))?;
        let participants: Vec<ParticipantStatus> = self
            .repo
            .load_participants(group.id)?
            .into_iter()
            .map(|participant| ParticipantStatus {
                id: participant.id,
                has_contact: participant.contact.is_some(),
                has_viewed_result: participant.has_viewed_result,
                name: participant.name,
            })
            .collect();
        let viewed = participants
            .iter()
            .filter(|participant| participant.has_viewed_result)
            .count();

        Ok(GroupStatus {
            group,
            participants,
            viewed,
        })
    }

    fn release_claim(&self, group_id: GroupId) {
        if let Err(err) = self.repo.release_draw(group_id) {
            warn!(
                "event=draw_release module=service status=error group_id={group_id} error={err}"
            );
        }
    }
}
