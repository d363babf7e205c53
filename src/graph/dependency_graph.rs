//! The internal graph structure of the frame graph.
//!
//! This is a plain dependency graph: nodes hold a payload implementing [`GraphNode`], edges only record what kind
//! of dependency they express. Its main job is [`DependencyGraph::cull`], which removes every node that does not
//! (transitively) contribute to a target node.

use std::fmt::Debug;

use petgraph::{Direction, Graph};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;

/// Interface shared by every node kind stored in a [`DependencyGraph`].
pub trait GraphNode {
    /// Name of the node, used in diagnostics.
    fn name(&self) -> &str;

    /// Called once for every node that was removed by [`DependencyGraph::cull`].
    fn on_culled(&mut self) {}

    /// Additional graphviz attributes for this node.
    fn graphviz_attributes(&self) -> String {
        String::new()
    }
}

/// The kind of dependency an edge expresses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Resource to pass, the pass reads this version of the resource.
    Read,
    /// Pass to resource, the pass produces this version of the resource.
    Write,
    /// Resource to resource, used to make aliasing between sub-resources and their parent visible.
    Dependency,
}

#[derive(Debug)]
pub struct NodeEntry<N> {
    pub(crate) node: N,
    refcount: u32,
    target: bool,
}

/// Dependency graph with reference counting based culling.
#[derive(Debug)]
pub struct DependencyGraph<N: GraphNode> {
    graph: Graph<NodeEntry<N>, EdgeKind>,
}

impl<N: GraphNode> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            graph: Default::default(),
        }
    }
}

impl<N: GraphNode> DependencyGraph<N> {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty dependency graph with room for the given amount of nodes and edges.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: Graph::with_capacity(nodes, edges),
        }
    }

    /// Add a node. Nodes start out with a reference count of zero.
    pub fn add_node(&mut self, node: N) -> NodeIndex {
        self.graph.add_node(NodeEntry {
            node,
            refcount: 0,
            target: false,
        })
    }

    /// Add an edge `from -> to`. The edge holds a reference on `from` during culling.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> EdgeIndex {
        self.graph.add_edge(from, to, kind)
    }

    /// Add a [`EdgeKind::Dependency`] edge `from -> to`, unless these nodes are already linked.
    pub fn link(&mut self, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        match self.graph.find_edge(from, to) {
            Some(edge) => edge,
            None => self.add_edge(from, to, EdgeKind::Dependency),
        }
    }

    /// Get the payload of a node.
    pub fn node(&self, node: NodeIndex) -> &N {
        &self.graph[node].node
    }

    /// Get the payload of a node.
    pub fn node_mut(&mut self, node: NodeIndex) -> &mut N {
        &mut self.graph[node].node
    }

    /// Mark a node as a target. Targets and everything they depend on survive culling.
    pub fn make_target(&mut self, node: NodeIndex) {
        self.graph[node].target = true;
    }

    /// Returns true if this node is a target.
    pub fn is_target(&self, node: NodeIndex) -> bool {
        self.graph[node].target
    }

    /// Number of live nodes depending on this node. Only meaningful after [`DependencyGraph::cull`].
    pub fn refcount(&self, node: NodeIndex) -> u32 {
        self.graph[node].refcount
    }

    /// Returns true if this node was removed by the last [`DependencyGraph::cull`].
    pub fn is_culled(&self, node: NodeIndex) -> bool {
        let entry = &self.graph[node];
        !entry.target && entry.refcount == 0
    }

    /// An edge is valid if neither of its endpoints was culled.
    pub fn is_edge_valid(&self, edge: EdgeIndex) -> bool {
        let (from, to) = self.edge_endpoints(edge);
        !self.is_culled(from) && !self.is_culled(to)
    }

    /// Get the `(from, to)` nodes of an edge.
    pub fn edge_endpoints(&self, edge: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(edge)
            .expect("Edges are never removed, an edge index handed out by this graph always resolves")
    }

    /// Get the kind of an edge.
    pub fn edge_kind(&self, edge: EdgeIndex) -> EdgeKind {
        self.graph[edge]
    }

    /// All edges pointing to `node`.
    pub fn incoming_edges(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges_directed(node, Direction::Incoming).map(|edge| edge.id())
    }

    /// All edges starting at `node`.
    pub fn outgoing_edges(&self, node: NodeIndex) -> impl Iterator<Item = EdgeIndex> + '_ {
        self.graph.edges_directed(node, Direction::Outgoing).map(|edge| edge.id())
    }

    /// Remove every node that no target depends on, directly or indirectly.
    pub fn cull(&mut self) {
        // Algorithm as follows:
        // - Every edge holds a reference on its source node.
        // - Every node with zero references that is not a target is culled. Culling a node releases
        //   the references it held on the nodes it depends on, which may cull those in turn.
        for entry in self.graph.node_weights_mut() {
            entry.refcount = 0;
        }
        let sources = self.graph.edge_references().map(|edge| edge.source()).collect::<Vec<_>>();
        for source in sources {
            self.graph[source].refcount += 1;
        }

        let mut stack = self
            .graph
            .node_indices()
            .filter(|&node| self.is_culled(node))
            .collect::<Vec<_>>();
        while let Some(node) = stack.pop() {
            let dependencies = self
                .graph
                .edges_directed(node, Direction::Incoming)
                .map(|edge| edge.source())
                .collect::<Vec<_>>();
            for dependency in dependencies {
                let entry = &mut self.graph[dependency];
                entry.refcount -= 1;
                if entry.refcount == 0 && !entry.target {
                    stack.push(dependency);
                }
            }
        }

        let culled = self
            .graph
            .node_indices()
            .filter(|&node| self.is_culled(node))
            .collect::<Vec<_>>();
        for node in culled {
            self.graph[node].node.on_culled();
        }
    }

    /// Returns true if `to` can be reached from `from` by following edges.
    pub fn has_path(&self, from: NodeIndex, to: NodeIndex) -> bool {
        petgraph::algo::has_path_connecting(&self.graph, from, to, None)
    }

    /// Returns true if the graph contains no cycle.
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Total amount of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Total amount of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Remove all nodes and edges.
    pub fn clear(&mut self) {
        self.graph.clear();
    }
}

impl<N: GraphNode + Debug> DependencyGraph<N> {
    /// Get the string representation of this graph in `dot` format. Culled nodes are grayed out, edges
    /// touching them are dashed.
    pub fn dot(&self) -> String {
        format!(
            "{:?}",
            Dot::with_attr_getters(
                &self.graph,
                &[Config::NodeNoLabel, Config::EdgeNoLabel],
                &|_, edge| {
                    let color = match edge.weight() {
                        EdgeKind::Read => "darkolivegreen",
                        EdgeKind::Write => "red2",
                        EdgeKind::Dependency => "gray40",
                    };
                    let style = if self.is_edge_valid(edge.id()) { "solid" } else { "dashed" };
                    format!("color = \"{color}\" style = {style}")
                },
                &|_, (index, entry)| {
                    let fill = if self.is_culled(index) { "lightgray" } else { "white" };
                    format!(
                        "label = \"{}\\nrefs: {}\" style = filled fillcolor = \"{fill}\" {}",
                        entry.node.name(),
                        entry.refcount,
                        entry.node.graphviz_attributes()
                    )
                },
            )
        )
    }
}
