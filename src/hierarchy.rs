//! Manager hierarchy resolution
//!
//! Walks `manager_id` edges upward from a person to answer "is X one of Y's
//! managers?". The walk goes through a [`ManagerLookup`] so the same code
//! runs against the database ([`crate::directory::PersonDirectory`]) and
//! against in-memory fixtures ([`MemoryDirectory`]).
//!
//! The manager graph is not guaranteed to be acyclic. Every walk keeps a
//! visited set and fails with [`HierarchyError::Cycle`] instead of looping,
//! and gives up with [`HierarchyError::TooDeep`] past `max_depth` levels.

use async_trait::async_trait;
use sea_orm::DbErr;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Person primary key
pub type PersonId = i64;

/// Default limit on the number of managers walked
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Minimal view of a person needed for traversal
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersonLink {
    pub id: PersonId,
    pub manager_id: Option<PersonId>,
}

/// Hierarchy resolution errors
#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("person {0} not found")]
    NotFound(PersonId),

    #[error("corrupted hierarchy: manager cycle through person {person_id}")]
    Cycle { person_id: PersonId },

    #[error("manager chain of person {person_id} exceeds {max_depth} levels")]
    TooDeep { person_id: PersonId, max_depth: usize },

    #[error("person {person_id} cannot report to {manager_id}: would create a manager cycle")]
    WouldCycle {
        person_id: PersonId,
        manager_id: PersonId,
    },

    #[error("lookup failed: {0}")]
    Lookup(#[from] DbErr),
}

pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Data access used by the upward walk
#[async_trait]
pub trait ManagerLookup: Send + Sync {
    /// Fetch a person's manager edge. `Ok(None)` means no such row in scope.
    async fn find_link(&self, person_id: PersonId) -> Result<Option<PersonLink>, DbErr>;
}

#[async_trait]
impl<T: ManagerLookup + ?Sized> ManagerLookup for &T {
    async fn find_link(&self, person_id: PersonId) -> Result<Option<PersonLink>, DbErr> {
        (**self).find_link(person_id).await
    }
}

/// Result of one upward walk
struct Walk {
    chain: Vec<PersonId>,
    found: bool,
}

/// Upward manager-chain traversal
#[derive(Clone, Debug)]
pub struct HierarchyResolver<L> {
    lookup: L,
    max_depth: usize,
}

impl<L: ManagerLookup> HierarchyResolver<L> {
    pub fn new(lookup: L) -> Self {
        Self::with_max_depth(lookup, DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(lookup: L, max_depth: usize) -> Self {
        Self { lookup, max_depth }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Fetch a person or fail with `NotFound`
    pub async fn require(&self, person_id: PersonId) -> HierarchyResult<PersonLink> {
        self.lookup
            .find_link(person_id)
            .await?
            .ok_or(HierarchyError::NotFound(person_id))
    }

    /// Whether `candidate` is `target`'s direct or transitive manager.
    ///
    /// A person is never their own manager here; see [`Self::is_manager_or_self`].
    pub async fn is_manager(&self, candidate: PersonId, target: PersonId) -> HierarchyResult<bool> {
        Ok(self.walk_up(target, Some(candidate)).await?.found)
    }

    /// Access gate: `candidate` is `target`, or one of `target`'s managers.
    ///
    /// The target must exist even when both ids are equal.
    pub async fn is_manager_or_self(
        &self,
        candidate: PersonId,
        target: PersonId,
    ) -> HierarchyResult<bool> {
        if candidate == target {
            self.require(target).await?;
            return Ok(true);
        }
        self.is_manager(candidate, target).await
    }

    /// Managers of `target`, nearest first, ending at a root.
    pub async fn manager_chain(&self, target: PersonId) -> HierarchyResult<Vec<PersonId>> {
        Ok(self.walk_up(target, None).await?.chain)
    }

    async fn walk_up(&self, target: PersonId, stop_at: Option<PersonId>) -> HierarchyResult<Walk> {
        let mut current = self.require(target).await?;
        let mut visited = HashSet::from([target]);
        let mut chain = Vec::new();

        while let Some(manager_id) = current.manager_id {
            if !visited.insert(manager_id) {
                tracing::error!(target_id = target, person_id = manager_id, "Manager cycle detected");
                return Err(HierarchyError::Cycle {
                    person_id: manager_id,
                });
            }
            if chain.len() >= self.max_depth {
                return Err(HierarchyError::TooDeep {
                    person_id: target,
                    max_depth: self.max_depth,
                });
            }

            let Some(manager) = self.lookup.find_link(manager_id).await? else {
                tracing::warn!(
                    person_id = current.id,
                    manager_id,
                    "Manager outside of organization scope, stopping walk"
                );
                break;
            };
            chain.push(manager_id);
            // Only a manager with a row in scope can match
            if stop_at == Some(manager_id) {
                return Ok(Walk { chain, found: true });
            }
            current = manager;
        }

        Ok(Walk { chain, found: false })
    }
}

/// In-memory directory for fixtures and tests
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    people: HashMap<PersonId, Option<PersonId>>,
    lookups: AtomicUsize,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a person with an optional manager
    pub fn with_person(mut self, id: PersonId, manager_id: Option<PersonId>) -> Self {
        self.insert(id, manager_id);
        self
    }

    pub fn insert(&mut self, id: PersonId, manager_id: Option<PersonId>) {
        self.people.insert(id, manager_id);
    }

    /// Number of `find_link` calls served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Ids of people whose manager is `manager_id`, ascending
    pub fn reports_of(&self, manager_id: PersonId) -> Vec<PersonId> {
        let mut ids: Vec<PersonId> = self
            .people
            .iter()
            .filter(|(_, m)| **m == Some(manager_id))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl ManagerLookup for MemoryDirectory {
    async fn find_link(&self, person_id: PersonId) -> Result<Option<PersonLink>, DbErr> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.people.get(&person_id).map(|manager_id| PersonLink {
            id: person_id,
            manager_id: *manager_id,
        }))
    }
}
