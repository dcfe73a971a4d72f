//! Draw repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load groups and participants for the draw.
//! - Persist assignments and group draw state.
//! - Provide onboarding helpers for the SQLite store.
//!
//! # Invariants
//! - `claim_draw` is a compare-and-set `Pending -> Drawing`.
//! - `SqliteDrawRepository::commit_draw` writes every assignment and the
//!   `Drawn` state in one transaction, or nothing.
//! - A commit is refused unless every participant of the group is a giver.

use crate::db::migrations::{latest_version, schema_version};
use crate::db::DbError;
use crate::model::access_code::{
    generate_code, normalize_code, GROUP_CODE_LEN, PARTICIPANT_CODE_LEN,
};
use crate::model::group::{DrawState, Group, GroupId, NewGroup};
use crate::model::participant::{AssignmentPair, NewParticipant, Participant, ParticipantId};
use crate::model::ModelValidationError;
use log::{info, warn};
use rusqlite::{
    params, Connection, ErrorCode, OptionalExtension, Row, Transaction, TransactionBehavior,
};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const GROUP_SELECT_SQL: &str = "SELECT
    id,
    code,
    name,
    organizer_name,
    organizer_contact,
    suggested_value,
    event_date,
    draw_state
FROM groups";

const PARTICIPANT_SELECT_SQL: &str = "SELECT
    id,
    group_id,
    name,
    contact,
    access_code,
    assigned_receiver_id,
    has_viewed_result
FROM participants";

const MAX_CODE_ATTEMPTS: usize = 8;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for draw persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ModelValidationError),
    GroupNotFound(GroupId),
    ParticipantNotFound(ParticipantId),
    /// Group is not in the state the operation requires.
    DrawConflict {
        group_id: GroupId,
        state: DrawState,
    },
    /// Participant already has a receiver; assignments are immutable.
    AssignmentAlreadySet(ParticipantId),
    /// Pairs leave some participants of the group without a receiver.
    IncompleteAssignment {
        group_id: GroupId,
        unassigned: usize,
    },
    /// Could not find a free access code after several attempts.
    CodeSpaceExhausted,
    InvalidData(String),
    MissingRequiredTable(&'static str),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::ParticipantNotFound(id) => write!(f, "participant not found: {id}"),
            Self::DrawConflict { group_id, state } => write!(
                f,
                "group {group_id} is in draw state `{}`",
                state.as_str()
            ),
            Self::AssignmentAlreadySet(id) => {
                write!(f, "participant {id} already has an assigned receiver")
            }
            Self::IncompleteAssignment {
                group_id,
                unassigned,
            } => write!(
                f,
                "assignment for group {group_id} leaves {unassigned} participant(s) without a receiver"
            ),
            Self::CodeSpaceExhausted => write!(f, "could not allocate a unique access code"),
            Self::InvalidData(message) => write!(f, "invalid persisted draw data: {message}"),
            Self::MissingRequiredTable(table) => {
                write!(f, "draw repository requires table `{table}`")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "draw repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ModelValidationError> for RepoError {
    fn from(value: ModelValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Store contract consumed by the draw orchestrator.
pub trait DrawRepository {
    /// Loads one group by id.
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<Group>>;
    /// Loads one group by its human code (case-insensitive).
    fn find_group_by_code(&self, code: &str) -> RepoResult<Option<Group>>;
    /// Lists participants of a group in insertion order.
    ///
    /// Fails with `GroupNotFound` when the group does not exist.
    fn load_participants(&self, group_id: GroupId) -> RepoResult<Vec<Participant>>;
    /// Loads one participant by id.
    fn get_participant(&self, participant_id: ParticipantId) -> RepoResult<Option<Participant>>;
    /// Sets `assigned_receiver_id` on the giver. Fails if already set.
    fn write_assignment(
        &self,
        participant_id: ParticipantId,
        receiver_id: ParticipantId,
    ) -> RepoResult<()>;
    /// Moves the group to `state`. Never leaves `Drawn`.
    fn set_group_state(&self, group_id: GroupId, state: DrawState) -> RepoResult<()>;
    /// Compare-and-set `Pending -> Drawing`.
    fn claim_draw(&self, group_id: GroupId) -> RepoResult<()>;
    /// Reverts a claim `Drawing -> Pending` after a failed commit.
    fn release_draw(&self, group_id: GroupId) -> RepoResult<()>;

    /// Persists all pairs and marks the group `Drawn`.
    ///
    /// Fails with `IncompleteAssignment` before any write when a participant
    /// of the group is not a giver in `pairs`.
    ///
    /// The default issues independent writes and stops at the first failure,
    /// which can leave earlier writes in place. Stores that support
    /// transactions should override it.
    fn commit_draw(&self, group_id: GroupId, pairs: &[AssignmentPair]) -> RepoResult<()> {
        let participants = self.load_participants(group_id)?;
        let unassigned = count_missing_givers(
            participants.iter().map(|participant| participant.id),
            pairs,
        );
        if unassigned > 0 {
            return Err(RepoError::IncompleteAssignment {
                group_id,
                unassigned,
            });
        }
        for pair in pairs {
            self.write_assignment(pair.giver, pair.receiver)?;
        }
        self.set_group_state(group_id, DrawState::Drawn)
    }
}

/// SQLite-backed draw repository.
pub struct SqliteDrawRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDrawRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_draw_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Creates a group in `Pending` state with a fresh group code.
    pub fn create_group(&self, input: &NewGroup) -> RepoResult<Group> {
        let input = input.validate()?;
        let id = Uuid::new_v4();
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_code(&mut rng, GROUP_CODE_LEN);
            let inserted = self.conn.execute(
                "INSERT INTO groups (
                    id, code, name, organizer_name, organizer_contact,
                    suggested_value, event_date, draw_state
                 )
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending');",
                params![
                    id.to_string(),
                    code.as_str(),
                    input.name.as_str(),
                    input.organizer_name.as_deref(),
                    input.organizer_contact.as_deref(),
                    input.suggested_value.as_deref(),
                    input.event_date.as_deref(),
                ],
            );
            match inserted {
                Ok(_) => {
                    info!("event=group_create module=repo status=ok group_id={id}");
                    return Ok(Group {
                        id,
                        code,
                        name: input.name,
                        organizer_name: input.organizer_name,
                        organizer_contact: input.organizer_contact,
                        suggested_value: input.suggested_value,
                        event_date: input.event_date,
                        draw_state: DrawState::Pending,
                    });
                }
                Err(err) if is_constraint_violation(&err) => {
                    warn!("event=group_create module=repo status=retry reason=code_collision");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(RepoError::CodeSpaceExhausted)
    }

    /// Adds participants to a `Pending` group in one transaction.
    pub fn add_participants(
        &self,
        group_id: GroupId,
        inputs: &[NewParticipant],
    ) -> RepoResult<Vec<Participant>> {
        let validated = inputs
            .iter()
            .map(NewParticipant::validate)
            .collect::<Result<Vec<_>, _>>()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        match load_draw_state(&tx, group_id)? {
            None => return Err(RepoError::GroupNotFound(group_id)),
            Some(DrawState::Pending) => {}
            Some(state) => return Err(RepoError::DrawConflict { group_id, state }),
        }

        let mut rng = rand::thread_rng();
        let mut created = Vec::with_capacity(validated.len());
        for input in validated {
            let id = Uuid::new_v4();
            let mut access_code = None;
            for _ in 0..MAX_CODE_ATTEMPTS {
                let candidate = generate_code(&mut rng, PARTICIPANT_CODE_LEN);
                let inserted = tx.execute(
                    "INSERT INTO participants (id, group_id, name, contact, access_code)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        id.to_string(),
                        group_id.to_string(),
                        input.name.as_str(),
                        input.contact.as_deref(),
                        candidate.as_str(),
                    ],
                );
                match inserted {
                    Ok(_) => {
                        access_code = Some(candidate);
                        break;
                    }
                    Err(err) if is_constraint_violation(&err) => continue,
                    Err(err) => return Err(err.into()),
                }
            }
            let access_code = access_code.ok_or(RepoError::CodeSpaceExhausted)?;
            created.push(Participant {
                id,
                group_id,
                name: input.name,
                contact: input.contact,
                access_code,
                assigned_receiver_id: None,
                has_viewed_result: false,
            });
        }

        tx.commit()?;
        info!(
            "event=participants_add module=repo status=ok group_id={} count={}",
            group_id,
            created.len()
        );
        Ok(created)
    }

    /// Records that a participant opened their result.
    pub fn mark_viewed(&self, participant_id: ParticipantId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE participants SET has_viewed_result = 1 WHERE id = ?1;",
            [participant_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::ParticipantNotFound(participant_id));
        }
        Ok(())
    }
}

impl DrawRepository for SqliteDrawRepository<'_> {
    fn get_group(&self, group_id: GroupId) -> RepoResult<Option<Group>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_group_row(row)?));
        }
        Ok(None)
    }

    fn find_group_by_code(&self, code: &str) -> RepoResult<Option<Group>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{GROUP_SELECT_SQL} WHERE code = ?1;"))?;
        let mut rows = stmt.query([normalize_code(code)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_group_row(row)?));
        }
        Ok(None)
    }

    fn load_participants(&self, group_id: GroupId) -> RepoResult<Vec<Participant>> {
        if load_draw_state(self.conn, group_id)?.is_none() {
            return Err(RepoError::GroupNotFound(group_id));
        }

        let mut stmt = self.conn.prepare(&format!(
            "{PARTICIPANT_SELECT_SQL}
             WHERE group_id = ?1
             ORDER BY rowid ASC;"
        ))?;
        let mut rows = stmt.query([group_id.to_string()])?;
        let mut participants = Vec::new();
        while let Some(row) = rows.next()? {
            participants.push(parse_participant_row(row)?);
        }
        Ok(participants)
    }

    fn get_participant(&self, participant_id: ParticipantId) -> RepoResult<Option<Participant>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PARTICIPANT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([participant_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_participant_row(row)?));
        }
        Ok(None)
    }

    fn write_assignment(
        &self,
        participant_id: ParticipantId,
        receiver_id: ParticipantId,
    ) -> RepoResult<()> {
        assign_receiver(self.conn, participant_id, receiver_id)
    }

    fn set_group_state(&self, group_id: GroupId, state: DrawState) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE groups
             SET
                draw_state = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?2
               AND draw_state != 'drawn';",
            params![state.as_str(), group_id.to_string()],
        )?;
        if changed == 0 {
            return Err(state_conflict(self.conn, group_id)?);
        }
        Ok(())
    }

    fn claim_draw(&self, group_id: GroupId) -> RepoResult<()> {
        transition_state(self.conn, group_id, DrawState::Pending, DrawState::Drawing)
    }

    fn release_draw(&self, group_id: GroupId) -> RepoResult<()> {
        transition_state(self.conn, group_id, DrawState::Drawing, DrawState::Pending)
    }

    fn commit_draw(&self, group_id: GroupId, pairs: &[AssignmentPair]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for pair in pairs {
            let giver_group = participant_group(&tx, pair.giver)?;
            if giver_group != Some(group_id) {
                return Err(RepoError::ParticipantNotFound(pair.giver));
            }
            assign_receiver(&tx, pair.giver, pair.receiver)?;
        }
        let unassigned: i64 = tx.query_row(
            "SELECT COUNT(*)
             FROM participants
             WHERE group_id = ?1
               AND assigned_receiver_id IS NULL;",
            [group_id.to_string()],
            |row| row.get(0),
        )?;
        if unassigned > 0 {
            warn!(
                "event=draw_commit module=repo status=rejected group_id={group_id} unassigned={unassigned}"
            );
            return Err(RepoError::IncompleteAssignment {
                group_id,
                unassigned: usize::try_from(unassigned).unwrap_or(usize::MAX),
            });
        }
        transition_state(&tx, group_id, DrawState::Drawing, DrawState::Drawn)?;
        tx.commit()?;
        Ok(())
    }
}

/// Counts group members that are not a giver in `pairs`.
fn count_missing_givers(
    participant_ids: impl Iterator<Item = ParticipantId>,
    pairs: &[AssignmentPair],
) -> usize {
    let givers: HashSet<ParticipantId> = pairs.iter().map(|pair| pair.giver).collect();
    participant_ids.filter(|id| !givers.contains(id)).count()
}

fn assign_receiver(
    conn: &Connection,
    participant_id: ParticipantId,
    receiver_id: ParticipantId,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE participants
         SET assigned_receiver_id = ?2
         WHERE id = ?1
           AND assigned_receiver_id IS NULL;",
        params![participant_id.to_string(), receiver_id.to_string()],
    )?;
    if changed == 0 {
        return match participant_group(conn, participant_id)? {
            Some(_) => Err(RepoError::AssignmentAlreadySet(participant_id)),
            None => Err(RepoError::ParticipantNotFound(participant_id)),
        };
    }
    Ok(())
}

fn transition_state(
    conn: &Connection,
    group_id: GroupId,
    from: DrawState,
    to: DrawState,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE groups
         SET
            draw_state = ?1,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE id = ?2
           AND draw_state = ?3;",
        params![to.as_str(), group_id.to_string(), from.as_str()],
    )?;
    if changed == 0 {
        return Err(state_conflict(conn, group_id)?);
    }
    Ok(())
}

/// Builds the error for a state update that matched no row.
fn state_conflict(conn: &Connection, group_id: GroupId) -> RepoResult<RepoError> {
    Ok(match load_draw_state(conn, group_id)? {
        Some(state) => RepoError::DrawConflict { group_id, state },
        None => RepoError::GroupNotFound(group_id),
    })
}

fn load_draw_state(conn: &Connection, group_id: GroupId) -> RepoResult<Option<DrawState>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT draw_state FROM groups WHERE id = ?1;",
            [group_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value.map(|text| parse_draw_state(&text)).transpose()
}

fn participant_group(
    conn: &Connection,
    participant_id: ParticipantId,
) -> RepoResult<Option<GroupId>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT group_id FROM participants WHERE id = ?1;",
            [participant_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|text| parse_uuid(&text, "participants.group_id"))
        .transpose()
}

fn parse_group_row(row: &Row<'_>) -> RepoResult<Group> {
    let id_text: String = row.get("id")?;
    let state_text: String = row.get("draw_state")?;
    Ok(Group {
        id: parse_uuid(&id_text, "groups.id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        organizer_name: row.get("organizer_name")?,
        organizer_contact: row.get("organizer_contact")?,
        suggested_value: row.get("suggested_value")?,
        event_date: row.get("event_date")?,
        draw_state: parse_draw_state(&state_text)?,
    })
}

fn parse_participant_row(row: &Row<'_>) -> RepoResult<Participant> {
    let id_text: String = row.get("id")?;
    let group_text: String = row.get("group_id")?;
    let receiver_id = match row.get::<_, Option<String>>("assigned_receiver_id")? {
        Some(value) => Some(parse_uuid(&value, "participants.assigned_receiver_id")?),
        None => None,
    };
    let has_viewed_result = match row.get::<_, i64>("has_viewed_result")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid has_viewed_result value `{other}` in participants.has_viewed_result"
            )));
        }
    };

    Ok(Participant {
        id: parse_uuid(&id_text, "participants.id")?,
        group_id: parse_uuid(&group_text, "participants.group_id")?,
        name: row.get("name")?,
        contact: row.get("contact")?,
        access_code: row.get("access_code")?,
        assigned_receiver_id: receiver_id,
        has_viewed_result,
    })
}

fn parse_draw_state(value: &str) -> RepoResult<DrawState> {
    DrawState::parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid draw state `{value}` in groups.draw_state"))
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn ensure_draw_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in ["groups", "participants"] {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
