//! The include/extends graph rooted at one document.
//!
//! The graph is computed on demand and never cached: every build reads the
//! documents and resolves their directives again. Nodes are absolute paths,
//! edges point from the referencing document to the resolved target.
//!
//! Traversal keeps a visited set seeded with the root, and a path is marked
//! visited before it is queued, so cycles (`a -> b -> a`, or a file including
//! itself) terminate. Edges into already visited nodes are still recorded,
//! which is what [`ReferenceGraph::cycle_through`] relies on.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::tarjan_scc;
use petgraph::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::path::normalize;
use super::types::DirectiveKind;
use super::{Cancelled, Workspace};

/// Dependency graph type alias: paths as nodes, the directive kind on edges.
pub type DependencyGraph = DiGraph<PathBuf, DirectiveKind>;

#[derive(Debug, Clone)]
pub struct ReferenceGraph {
    graph: DependencyGraph,
    nodes: HashMap<PathBuf, NodeIndex>,
    root: NodeIndex,
    /// Reachable documents in discovery order, root excluded.
    referenced: Vec<PathBuf>,
}

impl ReferenceGraph {
    /// Walks every document reachable from `root`.
    ///
    /// Documents that cannot be read or scanned are kept as nodes but
    /// contribute no edges. Only cancellation stops the walk early.
    pub async fn build(
        workspace: &Workspace,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReferenceGraph, Cancelled> {
        let root = normalize(root);
        let root = root.as_path();
        let mut graph = DependencyGraph::new();
        let root_index = graph.add_node(root.to_path_buf());
        let mut nodes = HashMap::from([(root.to_path_buf(), root_index)]);
        let mut visited = HashSet::from([root.to_path_buf()]);
        let mut referenced = Vec::new();
        let mut stack = vec![root.to_path_buf()];

        while let Some(document) = stack.pop() {
            if cancel.is_cancelled() {
                debug!(root = %root.display(), "reference graph walk cancelled");
                return Err(Cancelled);
            }

            let targets = direct_references(workspace, &document).await;
            if cancel.is_cancelled() {
                return Err(Cancelled);
            }

            let from = nodes[&document];
            let mut next = Vec::new();
            for (target, kind) in targets {
                let to = *nodes
                    .entry(target.clone())
                    .or_insert_with(|| graph.add_node(target.clone()));
                graph.update_edge(from, to, kind);

                if visited.insert(target.clone()) {
                    referenced.push(target.clone());
                    next.push(target);
                }
            }
            // reversed so the first directive is walked first
            stack.extend(next.into_iter().rev());
        }

        Ok(ReferenceGraph {
            graph,
            nodes,
            root: root_index,
            referenced,
        })
    }

    pub fn root(&self) -> &Path {
        &self.graph[self.root]
    }

    /// Every document reachable from the root, without duplicates and
    /// without the root itself.
    pub fn referenced_files(&self) -> &[PathBuf] {
        &self.referenced
    }

    pub fn into_referenced_files(self) -> Vec<PathBuf> {
        self.referenced
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Direct targets of `document` that were resolved during the walk.
    pub fn targets_of(&self, document: &Path) -> Vec<&Path> {
        self.nodes
            .get(document)
            .map(|index| {
                self.graph
                    .neighbors_directed(*index, Direction::Outgoing)
                    .map(|target| self.graph[target].as_path())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All cycles in the graph, each as the set of documents taking part.
    pub fn cycles(&self) -> Vec<Vec<PathBuf>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| self.graph.contains_edge(*node, *node))
            })
            .map(|component| {
                component
                    .into_iter()
                    .map(|node| self.graph[node].clone())
                    .collect()
            })
            .collect()
    }

    /// The cycle that the edge `from -> to` closes, if any.
    pub fn cycle_through(&self, from: &Path, to: &Path) -> Option<Vec<PathBuf>> {
        let (from_index, to_index) = (*self.nodes.get(from)?, *self.nodes.get(to)?);
        if !self.graph.contains_edge(from_index, to_index) {
            return None;
        }

        self.cycles().into_iter().find(|cycle| {
            cycle.iter().any(|p| p == from) && cycle.iter().any(|p| p == to)
        })
    }
}

/// Resolved direct targets of one document: include targets in line order,
/// then extends targets, each path at most once.
pub async fn direct_references(
    workspace: &Workspace,
    document: &Path,
) -> Vec<(PathBuf, DirectiveKind)> {
    let Some(file) = workspace.scan(document).await else {
        return vec![];
    };

    let mut targets: Vec<(PathBuf, DirectiveKind)> = Vec::new();
    for kind in [DirectiveKind::Include, DirectiveKind::Extends] {
        for directive in file.directives.iter().filter(|d| d.kind == kind) {
            match workspace
                .resolver()
                .resolve(directive.target(), document)
                .await
            {
                Some(target) if !targets.iter().any(|(seen, _)| *seen == target) => {
                    targets.push((target, kind));
                }
                Some(_) => {}
                None => debug!(
                    document = %document.display(),
                    target = directive.target(),
                    "unresolved {} target",
                    kind.keyword()
                ),
            }
        }
    }
    targets
}

/// Every document transitively referenced by `document` through
/// include/extends. Unresolved and unreadable references are skipped.
pub async fn all_referenced_files(
    workspace: &Workspace,
    document: &Path,
    cancel: &CancellationToken,
) -> Result<Vec<PathBuf>, Cancelled> {
    ReferenceGraph::build(workspace, document, cancel)
        .await
        .map(ReferenceGraph::into_referenced_files)
}
