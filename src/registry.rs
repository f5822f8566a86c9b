//! Append-only, round-partitioned key/value storage.
//!
//! Iteration order is round-major and insertion-order-minor. This is the
//! order in which both parties feed items into the Fiat-Shamir transcript, so
//! nothing in here may reorder keys once inserted.

use crate::{IopError, Round};
use ark_std::{
    collections::HashMap,
    fmt::{Debug, Display},
    hash::Hash,
};

/// Identifier of a protocol item (column, coin or query)
pub trait Identifier: Clone + Eq + Hash + Ord + Debug + Display + Send + Sync {
    /// Underlying string
    fn as_str(&self) -> &str;

    /// Whether the identifier is the empty string
    fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

#[derive(Debug, Clone)]
struct Entry<D> {
    round: Round,
    data: D,
    ignored: bool,
    skipped_from_verifier_transcript: bool,
    skipped_from_prover_transcript: bool,
}

/// Registry of items declared at a given round
#[derive(Debug, Clone)]
pub struct RoundRegistry<Id, D> {
    by_round: Vec<Vec<Id>>,
    entries: HashMap<Id, Entry<D>>,
}

impl<Id, D> Default for RoundRegistry<Id, D> {
    fn default() -> Self {
        Self {
            by_round: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<Id: Identifier, D> RoundRegistry<Id, D> {
    /// An empty registry with no round
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` at `round`, growing the round count if needed
    pub fn add_to_round(&mut self, round: Round, id: Id, data: D) -> Result<(), IopError> {
        if self.entries.contains_key(&id) {
            return Err(IopError::DuplicateId(id.to_string()));
        }
        self.reserve_for(round + 1);
        self.by_round[round].push(id.clone());
        self.entries.insert(
            id,
            Entry {
                round,
                data,
                ignored: false,
                skipped_from_verifier_transcript: false,
                skipped_from_prover_transcript: false,
            },
        );
        Ok(())
    }

    fn entry(&self, id: &Id) -> Result<&Entry<D>, IopError> {
        self.entries
            .get(id)
            .ok_or_else(|| IopError::UnknownId(id.to_string()))
    }

    fn entry_mut(&mut self, id: &Id) -> Result<&mut Entry<D>, IopError> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| IopError::UnknownId(id.to_string()))
    }

    /// Returns the data attached to `id`
    pub fn data(&self, id: &Id) -> Result<&D, IopError> {
        self.entry(id).map(|e| &e.data)
    }

    /// Returns the data attached to `id`, mutably. The declared round stays fixed.
    pub fn data_mut(&mut self, id: &Id) -> Result<&mut D, IopError> {
        self.entry_mut(id).map(|e| &mut e.data)
    }

    /// Whether `id` was ever registered (ignored ids included)
    pub fn exists(&self, id: &Id) -> bool {
        self.entries.contains_key(id)
    }

    /// Round at which `id` was declared
    pub fn round(&self, id: &Id) -> Result<Round, IopError> {
        self.entry(id).map(|e| e.round)
    }

    /// Fails unless `id` was declared at `round`
    pub fn must_be_in_round(&self, round: Round, id: &Id) -> Result<(), IopError> {
        let declared = self.round(id)?;
        if declared != round {
            return Err(IopError::WrongRound {
                id: id.to_string(),
                declared,
                current: round,
            });
        }
        Ok(())
    }

    /// Ids declared at `round`, in insertion order.
    ///
    /// Rounds past [`Self::num_rounds`] are empty.
    pub fn all_keys_at(&self, round: Round) -> &[Id] {
        self.by_round.get(round).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Unignored ids declared at `round`, in insertion order
    pub fn all_unignored_keys_at(&self, round: Round) -> Vec<Id> {
        self.all_keys_at(round)
            .iter()
            .filter(|id| !self.is_ignored(id))
            .cloned()
            .collect()
    }

    /// All ids, round-major then insertion order
    pub fn all_keys(&self) -> Vec<Id> {
        self.by_round.iter().flatten().cloned().collect()
    }

    /// All unignored ids, round-major then insertion order
    pub fn all_unignored_keys(&self) -> Vec<Id> {
        self.by_round
            .iter()
            .flatten()
            .filter(|id| !self.is_ignored(id))
            .cloned()
            .collect()
    }

    /// Number of rounds tracked by the registry
    pub fn num_rounds(&self) -> usize {
        self.by_round.len()
    }

    /// Extends the registry to at least `num_rounds` rounds; never truncates
    pub fn reserve_for(&mut self, num_rounds: usize) {
        if self.by_round.len() < num_rounds {
            self.by_round.resize_with(num_rounds, Vec::new);
        }
    }

    /// Number of registered ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Soft-retires `id`: it is skipped by the "unignored" iterators but its
    /// metadata stays resolvable
    pub fn mark_as_ignored(&mut self, id: &Id) -> Result<(), IopError> {
        self.entry_mut(id)?.ignored = true;
        Ok(())
    }

    /// Whether `id` is ignored. Unknown ids are not.
    pub fn is_ignored(&self, id: &Id) -> bool {
        self.entries.get(id).is_some_and(|e| e.ignored)
    }

    /// Keeps `id` out of the verifier's transcript
    pub fn mark_as_skipped_from_verifier_transcript(&mut self, id: &Id) -> Result<(), IopError> {
        self.entry_mut(id)?.skipped_from_verifier_transcript = true;
        Ok(())
    }

    /// Keeps `id` out of the prover's transcript, and hence out of the verifier's
    pub fn mark_as_skipped_from_prover_transcript(&mut self, id: &Id) -> Result<(), IopError> {
        let entry = self.entry_mut(id)?;
        entry.skipped_from_prover_transcript = true;
        entry.skipped_from_verifier_transcript = true;
        Ok(())
    }

    /// Whether the verifier must not absorb `id`
    pub fn is_skipped_from_verifier_transcript(&self, id: &Id) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.skipped_from_verifier_transcript)
    }

    /// Whether the prover must not absorb `id`
    pub fn is_skipped_from_prover_transcript(&self, id: &Id) -> bool {
        self.entries
            .get(id)
            .is_some_and(|e| e.skipped_from_prover_transcript)
    }
}

/// Per-round lists of values (e.g. prover or verifier actions)
pub struct RoundVec<T> {
    inner: Vec<Vec<T>>,
}

impl<T> Default for RoundVec<T> {
    fn default() -> Self {
        Self { inner: Vec::new() }
    }
}

impl<T> RoundVec<T> {
    /// Appends `item` to `round`, growing the round count if needed
    pub fn push(&mut self, round: Round, item: T) {
        self.reserve_for(round + 1);
        self.inner[round].push(item);
    }

    /// Items of `round` in insertion order, empty past the last round
    pub fn at(&self, round: Round) -> &[T] {
        self.inner.get(round).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of rounds tracked
    pub fn num_rounds(&self) -> usize {
        self.inner.len()
    }

    /// Extends to at least `num_rounds` rounds; never truncates
    pub fn reserve_for(&mut self, num_rounds: usize) {
        if self.inner.len() < num_rounds {
            self.inner.resize_with(num_rounds, Vec::new);
        }
    }

    /// Iterates over `(round, item)` pairs, round-major
    pub fn iter(&self) -> impl Iterator<Item = (Round, &T)> + '_ {
        self.inner
            .iter()
            .enumerate()
            .flat_map(|(round, items)| items.iter().map(move |item| (round, item)))
    }

    /// Total number of items
    pub fn len(&self) -> usize {
        self.inner.iter().map(Vec::len).sum()
    }

    /// Whether no item was pushed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
