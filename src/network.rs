//! # Interaction Network
//!
//! An undirected, weighted `petgraph` graph of Reddit users built from posts
//! and their comments.
//!
//! ## Construction
//!
//! - One node per distinct username (post author or commenter). Deleted or
//!   removed accounts are not users and get no node.
//! - `author ↔ commenter`: weight +1 for every comment on the author's post.
//! - `commenter ↔ commenter`: weight +1 for every post both commented on.
//!
//! Nodes are inserted in username order, so the same set of (post, comment)
//! rows always yields the same graph and the same floating-point results,
//! whatever the input order.
//!
//! ## Centrality
//!
//! - Degree: neighbour count divided by `n - 1`.
//! - Betweenness: `rustworkx_core::centrality::betweenness_centrality` over
//!   unweighted shortest paths, normalized by `(n - 1)(n - 2)`.
//! - PageRank: `petgraph::algo::page_rank` with damping `d` for a fixed
//!   number of iterations. Scores sum to 1.
//!
//! ## Examples
//!
//! ```
//! use music_trends::network::InteractionNetwork;
//!
//! let mut network = InteractionNetwork::new();
//! let a = network.add_node("alice");
//! let b = network.add_node("bob");
//! network.add_edge(a, b, 1.0);
//! assert_eq!(network.degree(a), 1);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::error::Error;
use std::f64::consts::PI;

use log::info;
use petgraph::algo::page_rank;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use plotters::prelude::*;
use rustworkx_core::centrality::betweenness_centrality;
use serde::{Deserialize, Serialize};

use crate::config::GraphConfig;
use crate::types::{Comment, Post};

/// Node count from which betweenness would run in parallel.
const BETWEENNESS_PARALLEL_THRESHOLD: usize = usize::MAX;

/// Whether a username refers to an actual account.
pub fn is_real_user(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != "[deleted]" && name != "[removed]"
}

#[derive(Debug, Clone, PartialEq)]
/// An edge in the network
///
/// # Attributes
///
/// * from: String
/// The endpoint whose username sorts first
///
/// * to: String
/// The other endpoint
///
/// * weight: f64
/// Number of interactions between the two users
pub struct Edge {
    pub from: String,
    pub to: String,
    pub weight: f64,
}

/// Centrality metrics of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityResult {
    pub user: String,
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
}

/// One row of the superspreader ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Superspreader {
    pub rank: usize,
    pub user: String,
    pub connections: usize,
    pub degree: f64,
    pub betweenness: f64,
    pub pagerank: f64,
    pub combined_score: f64,
}

#[derive(Debug, Clone, Default)]
/// Undirected weighted user graph.
///
/// # Attributes
///
/// * graph: UnGraph<String, f64>
/// Usernames as node weights, interaction counts as edge weights
///
/// * index: HashMap<String, NodeIndex>
/// Node of each username
pub struct InteractionNetwork {
    graph: UnGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

impl InteractionNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the network from posts and the comments fetched for them.
    ///
    /// # Parameters
    ///
    /// * posts: &[Post]
    /// Posts whose authors become nodes
    ///
    /// * comments: &[Comment]
    /// Comments linking commenters to post authors and to each other
    ///
    /// # Returns
    ///
    /// * Self
    /// The network, with node indices in username order.
    pub fn build(posts: &[Post], comments: &[Comment]) -> Self {
        let mut users: BTreeSet<&str> = BTreeSet::new();
        for post in posts {
            if is_real_user(&post.author) {
                users.insert(post.author.trim());
            }
        }
        for comment in comments {
            if is_real_user(&comment.author) {
                users.insert(comment.author.trim());
            }
        }

        let mut network = Self::new();
        for user in &users {
            network.add_node(user);
        }

        let author_of: HashMap<&str, &str> = posts
            .iter()
            .map(|p| (p.id.as_str(), p.author.trim()))
            .collect();

        // author <-> commenter, one unit per comment
        let mut commenters_by_post: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for comment in comments {
            let commenter = comment.author.trim();
            if !is_real_user(commenter) {
                continue;
            }
            commenters_by_post
                .entry(comment.post_id.as_str())
                .or_default()
                .insert(commenter);

            if let Some(author) = author_of.get(comment.post_id.as_str()) {
                if is_real_user(author) && *author != commenter {
                    network.add_interaction(author, commenter, 1.0);
                }
            }
        }

        // commenter <-> commenter, one unit per shared post
        for commenters in commenters_by_post.values() {
            let list: Vec<&str> = commenters.iter().copied().collect();
            for i in 0..list.len() {
                for j in (i + 1)..list.len() {
                    network.add_interaction(list[i], list[j], 1.0);
                }
            }
        }

        network
    }

    /// Adds a node for `name` unless it exists, returning its index.
    pub fn add_node(&mut self, name: &str) -> usize {
        if let Some(&ix) = self.index.get(name) {
            return ix.index();
        }
        let ix = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), ix);
        ix.index()
    }

    /// Adds `weight` to the undirected edge between two node indices.
    /// Self-loops and unknown indices are ignored.
    pub fn add_edge(&mut self, from: usize, to: usize, weight: f64) {
        let n = self.graph.node_count();
        if from == to || from >= n || to >= n {
            return;
        }
        let (a, b) = (NodeIndex::new(from), NodeIndex::new(to));
        match self.graph.find_edge(a, b) {
            Some(edge) => self.graph[edge] += weight,
            None => {
                self.graph.add_edge(a, b, weight);
            }
        }
    }

    fn add_interaction(&mut self, a: &str, b: &str, weight: f64) {
        if let (Some(&x), Some(&y)) = (self.index.get(a), self.index.get(b)) {
            self.add_edge(x.index(), y.index(), weight);
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Usernames in node order.
    pub fn names(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    pub fn node_id(&self, name: &str) -> Option<usize> {
        self.index.get(name).map(|ix| ix.index())
    }

    /// Weight of the edge between two users, if any.
    pub fn weight(&self, a: &str, b: &str) -> Option<f64> {
        let (x, y) = (self.index.get(a)?, self.index.get(b)?);
        self.graph.find_edge(*x, *y).map(|e| self.graph[e])
    }

    /// Number of distinct neighbours of a node.
    pub fn degree(&self, id: usize) -> usize {
        if id >= self.graph.node_count() {
            return 0;
        }
        self.graph.neighbors(NodeIndex::new(id)).count()
    }

    /// All edges, each once, ordered by endpoint names.
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_references()
            .map(|e| {
                let (a, b) = (&self.graph[e.source()], &self.graph[e.target()]);
                let (from, to) = if a <= b { (a, b) } else { (b, a) };
                Edge {
                    from: from.clone(),
                    to: to.clone(),
                    weight: *e.weight(),
                }
            })
            .collect();
        edges.sort_by(|x, y| x.from.cmp(&y.from).then_with(|| x.to.cmp(&y.to)));
        edges
    }

    /// The subgraph induced by `users`; unknown names are ignored.
    pub fn subgraph(&self, users: &[String]) -> InteractionNetwork {
        let keep: BTreeSet<&str> = users
            .iter()
            .map(String::as_str)
            .filter(|u| self.index.contains_key(*u))
            .collect();
        let mut sub = InteractionNetwork::new();
        for user in &keep {
            sub.add_node(user);
        }
        for edge in self.edges() {
            if keep.contains(edge.from.as_str()) && keep.contains(edge.to.as_str()) {
                sub.add_interaction(&edge.from, &edge.to, edge.weight);
            }
        }
        sub
    }

    /// Normalized degree centrality of every node.
    pub fn degree_centrality(&self) -> Vec<f64> {
        let n = self.graph.node_count();
        if n <= 1 {
            return vec![1.0; n];
        }
        let scale = 1.0 / (n - 1) as f64;
        (0..n).map(|v| self.degree(v) as f64 * scale).collect()
    }

    /// Normalized betweenness centrality of every node.
    pub fn betweenness_centrality(&self) -> Vec<f64> {
        betweenness_centrality(&self.graph, false, true, BETWEENNESS_PARALLEL_THRESHOLD)
            .into_iter()
            .map(|b| b.unwrap_or(0.0))
            .collect()
    }

    /// PageRank of every node after `iterations` rounds.
    pub fn pagerank(&self, damping: f64, iterations: usize) -> Vec<f64> {
        if self.graph.node_count() == 0 {
            return Vec::new();
        }
        page_rank(&self.graph, damping.clamp(0.0, 1.0), iterations)
    }

    /// Degree, betweenness and PageRank for every user, in node order.
    pub fn centralities(&self, config: &GraphConfig) -> Vec<CentralityResult> {
        let degree = self.degree_centrality();
        let betweenness = self.betweenness_centrality();
        let pagerank = self.pagerank(config.damping, config.max_iterations);
        self.graph
            .node_indices()
            .map(|ix| {
                let i = ix.index();
                CentralityResult {
                    user: self.graph[ix].clone(),
                    degree: degree[i],
                    betweenness: betweenness.get(i).copied().unwrap_or(0.0),
                    pagerank: pagerank[i],
                }
            })
            .collect()
    }

    /// Rank users by combined centrality and keep the top `config.top_k`.
    ///
    /// The combined score is the mean of the three metrics, each divided by
    /// its maximum over the graph. Equal scores are ordered by username.
    pub fn superspreaders(&self, config: &GraphConfig) -> Vec<Superspreader> {
        let results = self.centralities(config);
        let max_of = |f: fn(&CentralityResult) -> f64| results.iter().map(f).fold(0.0f64, f64::max);
        let max_degree = max_of(|r| r.degree);
        let max_betweenness = max_of(|r| r.betweenness);
        let max_pagerank = max_of(|r| r.pagerank);
        let ratio = |v: f64, max: f64| if max > 0.0 { v / max } else { 0.0 };

        let mut ranked: Vec<Superspreader> = results
            .into_iter()
            .map(|r| {
                let combined = (ratio(r.degree, max_degree)
                    + ratio(r.betweenness, max_betweenness)
                    + ratio(r.pagerank, max_pagerank))
                    / 3.0;
                let connections = self.node_id(&r.user).map(|id| self.degree(id)).unwrap_or(0);
                Superspreader {
                    rank: 0,
                    user: r.user,
                    connections,
                    degree: r.degree,
                    betweenness: r.betweenness,
                    pagerank: r.pagerank,
                    combined_score: combined,
                }
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.combined_score
                .total_cmp(&a.combined_score)
                .then_with(|| a.user.cmp(&b.user))
        });
        ranked.truncate(config.top_k);
        for (i, row) in ranked.iter_mut().enumerate() {
            row.rank = i + 1;
        }
        info!(
            "Ranked {} superspreaders out of {} users ({} edges)",
            ranked.len(),
            self.node_count(),
            self.edge_count()
        );
        ranked
    }

    /// Draw the network with nodes on a circle, sized by PageRank.
    ///
    /// # Parameters
    ///
    /// * output_file: &str
    /// Path of the PNG to write
    ///
    /// * pagerank: &HashMap<String, f64>
    /// Score per user, used for node radius and labelling
    pub fn static_plot(&self, output_file: &str, title: &str, pagerank: &HashMap<String, f64>) -> Result<(), Box<dyn Error>> {
        let root = BitMapBackend::new(output_file, (1200, 1000)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(title, ("sans-serif", 28))?;

        let chart = ChartBuilder::on(&root)
            .margin(30)
            .build_cartesian_2d(-1.25f64..1.25f64, -1.25f64..1.25f64)?;

        let names = self.names();
        let n = names.len().max(1) as f64;
        let positions: Vec<(f64, f64)> = (0..names.len())
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / n;
                (angle.cos(), angle.sin())
            })
            .collect();
        let max_rank = pagerank.values().copied().fold(0.0f64, f64::max);

        // Draw edges with chart context
        for edge in self.edges() {
            let (Some(a), Some(b)) = (self.node_id(&edge.from), self.node_id(&edge.to)) else { continue };
            let width = (edge.weight.ln_1p().ceil() as u32).clamp(1, 6);
            chart.plotting_area().draw(&PathElement::new(
                vec![positions[a], positions[b]],
                BLUE.mix(0.35).stroke_width(width),
            ))?;
        }

        // Draw nodes with chart context
        for (i, (x, y)) in positions.iter().enumerate() {
            let score = pagerank.get(names[i]).copied().unwrap_or(0.0);
            let relative = if max_rank > 0.0 { score / max_rank } else { 0.0 };
            let radius = 4 + (relative * 20.0).round() as i32;
            chart.plotting_area().draw(&Circle::new(
                (*x, *y),
                radius,
                RED.mix(0.8).filled(),
            ))?;
            if relative > 0.05 {
                chart.plotting_area().draw(&Text::new(
                    names[i].to_string(),
                    (*x * 1.08, *y * 1.08),
                    ("sans-serif", 14).into_font(),
                ))?;
            }
        }

        root.present()?;
        Ok(())
    }
}
