//! Package dependency management
//!
//! This module builds the in-workspace dependency graph and splits a package set
//! into topological tiers for batched execution.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::kosaraju_scc;
use petgraph::prelude::*;

use crate::package::{package_names, Package};
use crate::types::{MonoError, MonoResult};

/// Dependency graph over a package set
///
/// Node `i` is the package at index `i` of the input slice. Edges point from a
/// package to each in-workspace package it depends on.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    pub graph: DiGraph<String, ()>,
    /// One dependency path per strongly connected component (plus self-dependencies),
    /// each starting from its alphabetically first package
    pub cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn build(packages: &[Package]) -> MonoResult<Self> {
        let mut graph = DiGraph::<String, ()>::new();
        let mut node_indices = HashMap::new();

        for package in packages {
            let node_index = graph.add_node(package.name().to_string());
            if node_indices.insert(package.name(), node_index).is_some() {
                return Err(MonoError::Package(format!(
                    "Duplicate package name '{}'",
                    package.name()
                )));
            }
        }

        let names = package_names(packages);
        for package in packages {
            let from_node = node_indices[package.name()];
            for dep in package.workspace_dependencies(&names) {
                graph.update_edge(from_node, node_indices[dep], ());
            }
        }

        let cycles = find_cycles(&graph);
        Ok(Self { graph, cycles })
    }

    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// In-workspace dependencies of `name`, in declaration order
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        let Some(node) = self.graph.node_indices().find(|n| self.graph[*n] == name) else {
            return Vec::new();
        };
        // petgraph walks outgoing edges newest first
        let mut deps: Vec<String> = self
            .graph
            .neighbors(node)
            .map(|n| self.graph[n].clone())
            .collect();
        deps.reverse();
        deps
    }
}

fn find_cycles(graph: &DiGraph<String, ()>) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = kosaraju_scc(graph)
        .into_iter()
        .filter_map(|component| {
            if component.len() > 1 {
                Some(cycle_through_component(graph, &component))
            } else {
                let node = component[0];
                if graph.contains_edge(node, node) {
                    Some(vec![graph[node].clone()])
                } else {
                    None
                }
            }
        })
        .collect();

    cycles.sort();
    cycles
}

/// Shortest cycle inside a strongly connected component, starting from the
/// alphabetically first package and following real dependency edges
fn cycle_through_component(graph: &DiGraph<String, ()>, component: &[NodeIndex]) -> Vec<String> {
    let members: HashSet<NodeIndex> = component.iter().copied().collect();
    let Some(start) = component
        .iter()
        .copied()
        .min_by(|a, b| graph[*a].cmp(&graph[*b]))
    else {
        return Vec::new();
    };

    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if !members.contains(&next) {
                continue;
            }
            if next == start {
                let mut path = vec![node];
                let mut current = node;
                while let Some(&prev) = parent.get(&current) {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return path.into_iter().map(|n| graph[n].clone()).collect();
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    Vec::new()
}

/// Split `packages` into tiers where every package's in-workspace dependencies
/// live in strictly earlier tiers
///
/// Tier 0 holds packages with no in-workspace dependencies. Packages keep their
/// input order inside a tier. Fails with [`MonoError::DependencyCycle`] before
/// producing anything if the graph is not acyclic.
pub fn topologically_batch_packages(packages: &[Package]) -> MonoResult<Vec<Vec<Package>>> {
    let dependency_graph = DependencyGraph::build(packages)?;
    if dependency_graph.has_cycles() {
        return Err(MonoError::DependencyCycle(dependency_graph.cycles));
    }

    let graph = &dependency_graph.graph;
    let mut placed = vec![false; packages.len()];
    let mut remaining = packages.len();
    let mut batches = Vec::new();

    while remaining > 0 {
        let tier: Vec<usize> = (0..packages.len())
            .filter(|&i| {
                !placed[i]
                    && graph
                        .neighbors(NodeIndex::new(i))
                        .all(|dep| placed[dep.index()])
            })
            .collect();

        // Only reachable with a cycle, which was ruled out above
        if tier.is_empty() {
            return Err(MonoError::DependencyCycle(Vec::new()));
        }

        for &i in &tier {
            placed[i] = true;
        }
        remaining -= tier.len();
        batches.push(tier.into_iter().map(|i| packages[i].clone()).collect());
    }

    Ok(batches)
}
