// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A small directed graph over package names, used to order an install
//! transaction's dependency closure and to compute reverse-dependency
//! ("what needs this?") queries for reclamation.

use petgraph::prelude::DiGraph;
use thiserror::Error;

use self::subgraph::subgraph;

mod subgraph;

/// NodeIndex as employed throughout the crate.
pub type NodeIndex = petgraph::prelude::NodeIndex<u32>;

#[derive(Debug, Error)]
pub enum Error<N: std::fmt::Debug> {
    /// `order()` found a cycle; `from -> to` is one edge on the cycle,
    /// naming at least one of its participants.
    #[error("dependency cycle: {from:?} -> {to:?}")]
    Cycle { from: N, to: N },
}

/// Simplistic encapsulation of petgraph APIs, generalized to empower
/// transaction/catalog code with an explicit, diagnosable cycle check
/// instead of `petgraph`'s own `Topo`/`Dfs`, which silently drop or skip
/// nodes that sit on a cycle rather than reporting one.
#[derive(Debug, Clone)]
pub struct Dag<N>(DiGraph<N, (), u32>);

impl<N> Default for Dag<N> {
    fn default() -> Self {
        Self(DiGraph::default())
    }
}

impl<N> Dag<N>
where
    N: Clone + PartialEq + std::fmt::Debug,
{
    /// Construct a new Dag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds node N to the graph and returns the index.
    /// If N already exists, it'll return the index of that node.
    pub fn add_node_or_get_index(&mut self, node: N) -> NodeIndex {
        if let Some(index) = self.get_index(&node) {
            index
        } else {
            self.0.add_node(node)
        }
    }

    /// Returns true if the node exists.
    pub fn node_exists(&self, node: &N) -> bool {
        self.get_index(node).is_some()
    }

    /// Remove a node.
    pub fn remove_node(&mut self, node: &N) -> Option<N> {
        let index = self.get_index(node)?;
        self.0.remove_node(index)
    }

    /// Add an edge from `a` to `b` (`a` depends on `b`). Unlike a strict DAG
    /// structure, this does not refuse to create a cycle — a dependency may
    /// name a package not yet known to be acyclic (or not loaded at all);
    /// cycle detection happens explicitly in [`Dag::order`] and at catalog
    /// commit time. Returns `false` only if the edge already exists.
    pub fn add_edge(&mut self, a: NodeIndex, b: NodeIndex) -> bool {
        if self.0.find_edge(a, b).is_some() {
            return false;
        }

        self.0.add_edge(a, b, ());

        true
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = &'_ N> {
        self.0.node_indices().map(|i| &self.0[i])
    }

    pub fn is_empty(&self) -> bool {
        self.0.node_count() == 0
    }

    /// Direct successors (dependencies) of `node`, in insertion order.
    pub fn dependencies_of(&self, node: &N) -> Vec<&'_ N> {
        let Some(index) = self.get_index(node) else {
            return vec![];
        };
        self.0
            .neighbors_directed(index, petgraph::Direction::Outgoing)
            .map(|i| &self.0[i])
            .collect()
    }

    /// Transpose the graph, returning the clone.
    pub fn transpose(&self) -> Self {
        let mut transposed = self.0.clone();
        transposed.reverse();
        Self(transposed)
    }

    /// Split the graph at the given start node(s), returning a new graph.
    pub fn subgraph(&self, starting_nodes: &[N]) -> Self {
        Self(subgraph(&self.0, starting_nodes))
    }

    /// Return the index for node of type N.
    pub fn get_index(&self, node: &N) -> Option<NodeIndex> {
        self.0.node_indices().find(|i| self.0[*i] == *node)
    }

    /// Produce a post-order DFS traversal — the reverse of "dependencies
    /// first"; callers wanting dependencies-first order should reverse the
    /// result. Siblings are visited in insertion order, so repeated calls on
    /// an unchanged graph produce the same order (deterministic).
    ///
    /// Implements the three-state DFS (unvisited / on-stack / done)
    /// explicitly, rather than `petgraph::visit::{Dfs, Topo}`, because those
    /// silently skip nodes already on the walk stack instead of reporting a
    /// cycle: this is a deliberate divergence from the upstream `dag` crate
    /// this is adapted from, matching the explicit `rec_stack` check the
    /// original C dependency-graph walk performed.
    pub fn order(&self) -> Result<Vec<N>, Error<N>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum State {
            Unvisited,
            OnStack,
            Done,
        }

        let mut state = vec![State::Unvisited; self.0.node_count()];
        let mut out = Vec::with_capacity(self.0.node_count());

        for start in self.0.node_indices() {
            if state[start.index()] == State::Unvisited {
                self.visit(start, &mut state, &mut out)?;
            }
        }

        Ok(out)
    }

    fn visit(&self, node: NodeIndex, state: &mut [State], out: &mut Vec<N>) -> Result<(), Error<N>>
    where
        N: Clone,
    {
        use State::*;

        state[node.index()] = OnStack;

        for neighbor in self.0.neighbors_directed(node, petgraph::Direction::Outgoing) {
            match state[neighbor.index()] {
                OnStack => {
                    return Err(Error::Cycle {
                        from: self.0[node].clone(),
                        to: self.0[neighbor].clone(),
                    });
                }
                Done => continue,
                Unvisited => self.visit(neighbor, state, out)?,
            }
        }

        state[node.index()] = Done;
        out.push(self.0[node].clone());

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn build(edges: &[(&str, &str)]) -> Dag<String> {
        let mut dag = Dag::new();
        for (from, to) in edges {
            let a = dag.add_node_or_get_index(from.to_string());
            let b = dag.add_node_or_get_index(to.to_string());
            dag.add_edge(a, b);
        }
        dag
    }

    #[test]
    fn linear_chain_order() {
        // C depends on B depends on A
        let dag = build(&[("C", "B"), ("B", "A")]);
        let order = dag.order().unwrap();
        assert_eq!(order, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }

    #[test]
    fn cycle_is_reported() {
        let dag = build(&[("X", "Y"), ("Y", "X")]);
        let err = dag.order().unwrap_err();
        match err {
            Error::Cycle { from, to } => {
                let participants = [from, to];
                assert!(participants.contains(&"X".to_string()));
                assert!(participants.contains(&"Y".to_string()));
            }
        }
    }

    #[test]
    fn order_is_stable_across_runs() {
        let dag = build(&[("C", "A"), ("C", "B"), ("B", "A")]);
        let first = dag.order().unwrap();
        let second = dag.order().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_dependency_is_permitted_in_graph() {
        let mut dag = Dag::new();
        let p = dag.add_node_or_get_index("P".to_string());
        // "Q" is referenced but never independently loaded/inserted beyond this edge target.
        let q = dag.add_node_or_get_index("Q".to_string());
        dag.add_edge(p, q);

        let order = dag.order().unwrap();
        assert_eq!(order, vec!["Q".to_string(), "P".to_string()]);
    }

    #[test]
    fn dependents_via_transpose() {
        let dag = build(&[("C", "B"), ("B", "A")]);
        let reversed = dag.transpose();
        let dependents_of_a = reversed.dependencies_of(&"A".to_string());
        assert_eq!(dependents_of_a, vec![&"B".to_string()]);
    }
}
