//! Graphviz export of the stored sheep graph

use crate::models::{FlockId, Sheep};
use std::fmt::Write;

/// Renders the sheep of `flock` (or of every flock) as a DOT digraph
///
/// One `first -> last` edge per sheep, in sheep id order.
pub fn render_dot(sheep: &[Sheep], flock: Option<FlockId>) -> String {
    let mut edges: Vec<&Sheep> = sheep
        .iter()
        .filter(|s| flock.is_none_or(|f| s.flock == f))
        .collect();
    edges.sort_by_key(|s| s.key());

    let mut out = String::from("digraph {\nrepulsiveforce=50\nK=1\n");
    for s in edges {
        let _ = writeln!(out, "{} -> {}", s.first, s.last);
    }
    out.push_str("}\n");
    out
}

/// The newest flock present, if any
pub fn latest_flock(sheep: &[Sheep]) -> Option<FlockId> {
    sheep.iter().map(|s| s.flock).max()
}
