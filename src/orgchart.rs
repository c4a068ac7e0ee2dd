//! Org chart service
//!
//! Downward traversal (reports), tree assembly for the org chart view, and
//! the write-time check that keeps manager reassignments acyclic.

use async_trait::async_trait;
use sea_orm::DbErr;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::entity::person;
use crate::entity::person::PersonResponse;
use crate::hierarchy::{
    HierarchyError, HierarchyResolver, HierarchyResult, ManagerLookup, MemoryDirectory, PersonId,
};

/// Data access used by downward walks
#[async_trait]
pub trait ReportLookup: Send + Sync {
    /// Ids of people whose `manager_id` is `manager_id`
    async fn direct_reports(&self, manager_id: PersonId) -> Result<Vec<PersonId>, DbErr>;
}

#[async_trait]
impl ReportLookup for MemoryDirectory {
    async fn direct_reports(&self, manager_id: PersonId) -> Result<Vec<PersonId>, DbErr> {
        Ok(self.reports_of(manager_id))
    }
}

/// Everyone below `manager_id`, breadth first.
///
/// Stops expanding at `max_depth` levels. A person reached twice (corrupt
/// cyclic data) is only listed once, and `manager_id` itself is never listed.
pub async fn all_reports<L: ReportLookup>(
    lookup: &L,
    manager_id: PersonId,
    max_depth: usize,
) -> Result<Vec<PersonId>, DbErr> {
    let mut seen = HashSet::from([manager_id]);
    let mut result = Vec::new();
    let mut queue = VecDeque::from([(manager_id, 0usize)]);

    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            tracing::warn!(manager_id, max_depth, "Report walk truncated at depth limit");
            continue;
        }
        for report in lookup.direct_reports(id).await? {
            if seen.insert(report) {
                result.push(report);
                queue.push_back((report, depth + 1));
            }
        }
    }

    Ok(result)
}

/// Reject reassignments that would make the manager graph cyclic.
///
/// `person_id` may not manage itself, and may not be placed under anyone it
/// already manages. Clearing the manager is always allowed.
pub async fn validate_reassignment<L: ManagerLookup>(
    resolver: &HierarchyResolver<L>,
    person_id: PersonId,
    new_manager: Option<PersonId>,
) -> HierarchyResult<()> {
    let Some(manager_id) = new_manager else {
        return Ok(());
    };
    if manager_id == person_id {
        return Err(HierarchyError::WouldCycle {
            person_id,
            manager_id,
        });
    }
    if resolver.is_manager(person_id, manager_id).await? {
        return Err(HierarchyError::WouldCycle {
            person_id,
            manager_id,
        });
    }
    Ok(())
}

/// Org chart node
#[derive(Clone, Debug, Serialize)]
pub struct OrgNode {
    #[serde(flatten)]
    pub person: PersonResponse,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OrgNode>,
}

/// Assemble the org chart of one organization.
///
/// Roots are people without a manager or whose manager is not in `people`.
/// People only reachable through a cycle are appended as extra roots so
/// every input row appears exactly once. Siblings are ordered by name.
pub fn build_org_tree(people: Vec<person::Model>) -> Vec<OrgNode> {
    let ids: HashSet<PersonId> = people.iter().map(|p| p.id).collect();
    let mut children: HashMap<PersonId, Vec<PersonId>> = HashMap::new();
    let mut roots = Vec::new();

    let mut sorted = people;
    sorted.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

    for p in &sorted {
        match p.manager_id {
            Some(m) if m != p.id && ids.contains(&m) => {
                children.entry(m).or_default().push(p.id);
            }
            _ => roots.push(p.id),
        }
    }

    let by_id: HashMap<PersonId, person::Model> = sorted.into_iter().map(|p| (p.id, p)).collect();
    let mut placed = HashSet::new();
    let mut tree = Vec::new();

    for root in roots {
        if let Some(node) = build_node(root, &by_id, &children, &mut placed) {
            tree.push(node);
        }
    }

    // Whatever is left sits on a cycle
    let mut orphans: Vec<&person::Model> = by_id
        .values()
        .filter(|p| !placed.contains(&p.id))
        .collect();
    orphans.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    let orphan_ids: Vec<PersonId> = orphans.into_iter().map(|p| p.id).collect();

    for id in orphan_ids {
        if placed.contains(&id) {
            continue;
        }
        tracing::warn!(person_id = id, "Person on a manager cycle, listed as root");
        if let Some(node) = build_node(id, &by_id, &children, &mut placed) {
            tree.push(node);
        }
    }

    tree
}

fn build_node(
    id: PersonId,
    by_id: &HashMap<PersonId, person::Model>,
    children: &HashMap<PersonId, Vec<PersonId>>,
    placed: &mut HashSet<PersonId>,
) -> Option<OrgNode> {
    if !placed.insert(id) {
        return None;
    }
    let person = by_id.get(&id)?.clone();
    let kids = children
        .get(&id)
        .map(|ids| {
            ids.iter()
                .filter_map(|child| build_node(*child, by_id, children, placed))
                .collect()
        })
        .unwrap_or_default();

    Some(OrgNode {
        person: person.into(),
        children: kids,
    })
}
