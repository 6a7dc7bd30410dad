use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::warn;
use thiserror::Error;

/// Dependency map fed to the resolver: node name -> names it depends on.
pub type DependencyMap = BTreeMap<String, BTreeSet<String>>;

/// Error that can occur when resolving dependencies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DependencyError {
    /// Dependency cycle detected. The path starts and ends with the same node.
    #[error("Circular dependency detected: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),
}

/// Represents a node in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
    /// Node name
    pub name: String,
    /// Names of the nodes this node depends on, in declaration order
    pub edges: Vec<String>,
}

/// A dependency edge whose target is not a node of the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedEdge {
    pub dependent: String,
    pub dependency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Visited,
}

/// Dependency graph over named nodes.
///
/// Nodes keep their insertion order, which is also the order in which
/// independent nodes come out of [`DependencyGraph::resolve`].
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
    /// Edge targets as node indices, parallel to `nodes`
    adjacency: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
    unresolved: Vec<UnresolvedEdge>,
}

impl DependencyGraph {
    /// Create a new, empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a dependency map.
    ///
    /// Every key becomes a node. Dependencies that are not keys of the map are
    /// logged and dropped; they remain visible through [`unresolved`](Self::unresolved).
    pub fn from_map(map: &DependencyMap) -> Self {
        let mut graph = Self::new();
        for name in map.keys() {
            graph.add_node(name);
        }
        for (name, dependencies) in map {
            for dependency in dependencies {
                graph.add_edge(name, dependency);
            }
        }
        graph
    }

    /// Add a node, returning its index. Adding an existing node is a no-op.
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(DependencyNode { name: name.to_string(), edges: Vec::new() });
        self.adjacency.push(Vec::new());
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Add an edge (`dependent` depends on `dependency`).
    ///
    /// Returns `false` and records an unresolved edge when `dependency` is not a
    /// node of the graph. Duplicate edges are ignored.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str) -> bool {
        let from = self.add_node(dependent);
        let Some(&to) = self.index.get(dependency) else {
            warn!("Failed to solve dependency '{}' of '{}'", dependency, dependent);
            self.unresolved.push(UnresolvedEdge {
                dependent: dependent.to_string(),
                dependency: dependency.to_string(),
            });
            return false;
        };
        if !self.adjacency[from].contains(&to) {
            self.adjacency[from].push(to);
            self.nodes[from].edges.push(dependency.to_string());
        }
        true
    }

    /// Check if the graph contains a node
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up a node by name
    pub fn node(&self, name: &str) -> Option<&DependencyNode> {
        self.index.get(name).map(|&idx| &self.nodes[idx])
    }

    /// Get the dependencies of a node
    pub fn dependencies_of(&self, name: &str) -> Vec<String> {
        self.node(name).map(|n| n.edges.clone()).unwrap_or_default()
    }

    /// Edges dropped because their target is unknown
    pub fn unresolved(&self) -> &[UnresolvedEdge] {
        &self.unresolved
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Produce an order in which every node appears after all of its dependencies.
    ///
    /// Iterative post-order depth-first traversal. A node found while it is
    /// still on the visit stack closes a cycle; the error carries that cycle.
    pub fn resolve(&self) -> Result<Vec<String>, DependencyError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for root in 0..self.nodes.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::Visiting;
            // (node, index of the next edge to follow)
            let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                match self.adjacency[node].get(frame.1).copied() {
                    Some(dep) => {
                        frame.1 += 1;
                        match marks[dep] {
                            Mark::Visited => {}
                            Mark::Unvisited => {
                                marks[dep] = Mark::Visiting;
                                stack.push((dep, 0));
                            }
                            Mark::Visiting => {
                                let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                                let mut cycle: Vec<String> = stack[start..]
                                    .iter()
                                    .map(|&(n, _)| self.nodes[n].name.clone())
                                    .collect();
                                cycle.push(self.nodes[dep].name.clone());
                                return Err(DependencyError::CyclicDependency(cycle));
                            }
                        }
                    }
                    None => {
                        marks[node] = Mark::Visited;
                        order.push(self.nodes[node].name.clone());
                        stack.pop();
                    }
                }
            }
        }

        Ok(order)
    }
}

/// Resolve a dependency map into a load order.
pub fn resolve_order(map: &DependencyMap) -> Result<Vec<String>, DependencyError> {
    DependencyGraph::from_map(map).resolve()
}
