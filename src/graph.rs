// ─────────────────────────────────────────────────────────────────────────────
// wsus-metadata-store
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
// ─────────────────────────────────────────────────────────────────────────────
//! In-memory prerequisite graph (§4.7): built lazily from every record
//! with prerequisites across the whole delta chain.

use std::collections::{HashMap, HashSet};

use once_cell::sync::OnceCell;
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct Node {
    prerequisites: HashSet<Uuid>,
    dependents: HashSet<Uuid>,
}

/// Built once, guarded by a one-shot initializer (§5).
#[derive(Default)]
pub struct PrerequisiteGraph {
    nodes: OnceCell<HashMap<Uuid, Node>>,
}

impl PrerequisiteGraph {
    pub fn new() -> Self {
        Self { nodes: OnceCell::new() }
    }

    /// `edges` is every (update guid, flattened prerequisite guid) pair
    /// across the whole chain. Node creation is idempotent; building twice
    /// is a no-op.
    fn ensure_built(&self, edges: impl FnOnce() -> Vec<(Uuid, Uuid)>) -> &HashMap<Uuid, Node> {
        self.nodes.get_or_init(|| {
            let mut nodes: HashMap<Uuid, Node> = HashMap::new();
            for (update, prereq) in edges() {
                nodes.entry(update).or_default();
                nodes.entry(prereq).or_default();
                nodes.get_mut(&update).unwrap().prerequisites.insert(prereq);
                nodes.get_mut(&prereq).unwrap().dependents.insert(update);
            }
            nodes
        })
    }

    pub fn roots(&self, edges: impl FnOnce() -> Vec<(Uuid, Uuid)>) -> Vec<Uuid> {
        self.ensure_built(edges)
            .iter()
            .filter(|(_, n)| n.prerequisites.is_empty())
            .map(|(g, _)| *g)
            .collect()
    }

    pub fn leaves(&self, edges: impl FnOnce() -> Vec<(Uuid, Uuid)>) -> Vec<Uuid> {
        self.ensure_built(edges)
            .iter()
            .filter(|(_, n)| n.dependents.is_empty())
            .map(|(g, _)| *g)
            .collect()
    }

    pub fn interior(&self, edges: impl FnOnce() -> Vec<(Uuid, Uuid)>) -> Vec<Uuid> {
        self.ensure_built(edges)
            .iter()
            .filter(|(_, n)| !n.prerequisites.is_empty() && !n.dependents.is_empty())
            .map(|(g, _)| *g)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_roots_leaves_interior() {
        let graph = PrerequisiteGraph::new();
        let (g1, g2, g3, g4) = (
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            Uuid::from_u128(3),
            Uuid::from_u128(4),
        );
        let edges = || vec![(g3, g1), (g3, g2), (g4, g3)];

        let roots: HashSet<_> = graph.roots(edges).into_iter().collect();
        assert!(roots.is_superset(&HashSet::from([g1, g2])));

        let leaves: HashSet<_> = graph.leaves(edges).into_iter().collect();
        assert!(leaves.is_superset(&HashSet::from([g4])));

        let interior: HashSet<_> = graph.interior(edges).into_iter().collect();
        assert!(interior.is_superset(&HashSet::from([g3])));
    }

    #[test]
    fn build_is_idempotent() {
        let graph = PrerequisiteGraph::new();
        let edges = || vec![(Uuid::from_u128(1), Uuid::from_u128(2))];
        let first = graph.roots(edges);
        let second = graph.roots(|| panic!("edges() must not be called again"));
        assert_eq!(first, second);
    }
}
