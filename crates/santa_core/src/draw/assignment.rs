//! Single-cycle assignment generator.
//!
//! # Responsibility
//! - Turn an ordered list of participant IDs into giver/receiver pairs.
//!
//! # Invariants
//! - Output has exactly one pair per input ID.
//! - Every ID appears once as giver and once as receiver.
//! - No pair has `giver == receiver`.
//!
//! The shuffled order is closed into one cycle, so only single-cycle
//! derangements are produced. With two participants each one can infer the
//! other's target.

use crate::model::participant::AssignmentPair;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::hash::Hash;

/// Smallest group that can be drawn.
pub const MIN_PARTICIPANTS: usize = 2;

/// Assignment generation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentError {
    InsufficientParticipants { found: usize },
    /// The same ID appears more than once in the input.
    DuplicateParticipant,
}

impl Display for AssignmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientParticipants { found } => write!(
                f,
                "at least {MIN_PARTICIPANTS} participants are required, found {found}"
            ),
            Self::DuplicateParticipant => write!(f, "participant ids must be unique"),
        }
    }
}

impl Error for AssignmentError {}

/// Generates a fixed-point-free assignment over `ids`.
///
/// Shuffles a copy of `ids` (Fisher-Yates) and pairs index `i` with index
/// `(i + 1) mod N`. Deterministic for a seeded `rng`.
///
/// # Errors
/// - `InsufficientParticipants` when fewer than two IDs are given.
/// - `DuplicateParticipant` when `ids` contains repeats.
pub fn generate_assignment<T, R>(
    ids: &[T],
    rng: &mut R,
) -> Result<Vec<AssignmentPair<T>>, AssignmentError>
where
    T: Clone + Eq + Hash,
    R: Rng + ?Sized,
{
    if ids.len() < MIN_PARTICIPANTS {
        return Err(AssignmentError::InsufficientParticipants { found: ids.len() });
    }
    let unique: HashSet<&T> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(AssignmentError::DuplicateParticipant);
    }

    let mut shuffled = ids.to_vec();
    shuffled.shuffle(rng);

    let pairs = shuffled
        .iter()
        .enumerate()
        .map(|(index, giver)| AssignmentPair {
            giver: giver.clone(),
            receiver: shuffled[(index + 1) % shuffled.len()].clone(),
        })
        .collect();
    Ok(pairs)
}

/// [`generate_assignment`] using the thread-local RNG.
pub fn generate_assignment_with_thread_rng<T>(
    ids: &[T],
) -> Result<Vec<AssignmentPair<T>>, AssignmentError>
where
    T: Clone + Eq + Hash,
{
    generate_assignment(ids, &mut rand::thread_rng())
}

/// Returns whether `pairs` is a fixed-point-free single cycle over `ids`.
pub fn verify_single_cycle<T>(ids: &[T], pairs: &[AssignmentPair<T>]) -> bool
where
    T: Eq + Hash,
{
    if ids.len() < MIN_PARTICIPANTS || pairs.len() != ids.len() {
        return false;
    }
    let expected: HashSet<&T> = ids.iter().collect();
    if expected.len() != ids.len() {
        return false;
    }

    let mut next: HashMap<&T, &T> = HashMap::with_capacity(pairs.len());
    let mut receivers: HashSet<&T> = HashSet::with_capacity(pairs.len());
    for pair in pairs {
        if pair.giver == pair.receiver
            || !expected.contains(&pair.giver)
            || !expected.contains(&pair.receiver)
            || !receivers.insert(&pair.receiver)
            || next.insert(&pair.giver, &pair.receiver).is_some()
        {
            return false;
        }
    }

    // Walk from the first ID; a single cycle visits everyone before returning.
    let start = &ids[0];
    let mut current = start;
    for step in 1..=ids.len() {
        current = match next.get(current) {
            Some(receiver) => *receiver,
            None => return false,
        };
        if current == start {
            return step == ids.len();
        }
    }
    false
}
