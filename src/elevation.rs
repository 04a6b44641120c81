//! C5: elevation annotator (spec.md §4.5).
//!
//! Expands a compact hike (start lot, peak sequence, end lot) into its
//! full node chain by re-walking each leg's shortest path, then sums the
//! forward elevation gain edge by edge, swapping an edge's stored
//! gain/loss whenever it's traversed against its stored polyline
//! direction. A leg-level cache (keyed by the leg's two endpoint ids, not
//! by individual graph edges — glossary: "Node chain") means computing
//! `A -> B` also gives `B -> A` for free: its loss is `A -> B`'s gain and
//! vice versa, satisfying the elevation-symmetry invariant by
//! construction rather than by re-deriving it per call.

use rustc_hash::FxHashMap;

use crate::cluster::Cluster;
use crate::graph::{EdgeIndex, Graph, VertexId};
use crate::hike::Hike;

#[derive(Clone, Debug)]
struct Leg {
	gain_m: f64,
	loss_m: f64,
	nodes: Vec<VertexId>,
	edges: Vec<EdgeIndex>,
}

/// Per-cluster-run memo of resolved leg geometry/elevation, cleared along
/// with the rest of the cluster's working state at cluster exit.
#[derive(Default)]
pub struct ElevationCache {
	legs: FxHashMap<(VertexId, VertexId), Leg>,
}

impl ElevationCache {
	pub fn new() -> Self {
		Self::default()
	}

	fn resolve(
		&mut self,
		graph: &Graph,
		allow_vertex: impl Fn(VertexId) -> bool,
		from: VertexId,
		to: VertexId,
	) -> Option<Leg> {
		if let Some(leg) = self.legs.get(&(from, to)) {
			return Some(leg.clone());
		}
		if let Some(leg) = self.legs.get(&(to, from)) {
			let reversed = Leg {
				gain_m: leg.loss_m,
				loss_m: leg.gain_m,
				nodes: leg.nodes.iter().rev().copied().collect(),
				edges: leg.edges.iter().rev().copied().collect(),
			};
			self.legs.insert((from, to), reversed.clone());
			return Some(reversed);
		}

		let (_, nodes, edges) = graph.shortest_path(from, to, allow_vertex, |e| e.is_usable())?;
		let mut gain_m = 0.0;
		let mut loss_m = 0.0;
		let mut cur = from;
		for &eidx in &edges {
			let e = graph.edge(eidx);
			let (g, l) = e.gain_loss_from(cur);
			gain_m += g;
			loss_m += l;
			cur = e.other(cur);
		}
		let leg = Leg { gain_m, loss_m, nodes, edges };
		self.legs.insert((from, to), leg.clone());
		Some(leg)
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedHike {
	pub d_km: f64,
	pub ele_gain_m: i64,
	pub peaks: Vec<VertexId>,
	pub start_lot: VertexId,
	pub end_lot: VertexId,
	/// Fully expanded vertex sequence (glossary: "Node chain").
	pub node_chain: Vec<VertexId>,
	pub edge_chain: Vec<EdgeIndex>,
}

/// Expands `hike` into its node chain and total elevation gain. Returns
/// `None` only if a leg that `hike.rs` already proved reachable somehow
/// isn't (defensive; should not occur for a `Hike` built by `build_hikes`
/// against the same graph and cluster).
pub fn annotate_hike(
	graph: &Graph,
	cluster: &Cluster,
	cache: &mut ElevationCache,
	hike: &Hike,
) -> Option<AnnotatedHike> {
	let mut stops = vec![hike.start_lot];
	stops.extend(hike.peaks.iter().copied());
	stops.push(hike.end_lot);

	let mut node_chain = vec![stops[0]];
	let mut edge_chain = Vec::new();
	let mut ele_gain_m = 0.0;

	for w in stops.windows(2) {
		let (from, to) = (w[0], w[1]);
		let is_lot_leg = from == hike.start_lot || to == hike.end_lot;
		let leg = if is_lot_leg {
			cache.resolve(graph, |v| cluster.with_lots_barrier(graph, v), from, to)
		} else {
			cache.resolve(graph, |v| cluster.no_lots_barrier(graph, v), from, to)
		}?;
		ele_gain_m += leg.gain_m;
		edge_chain.extend(leg.edges.iter().copied());
		node_chain.extend(leg.nodes.iter().skip(1).copied());
	}

	Some(AnnotatedHike {
		d_km: hike.d_km,
		ele_gain_m: ele_gain_m.trunc() as i64,
		peaks: hike.peaks.clone(),
		start_lot: hike.start_lot,
		end_lot: hike.end_lot,
		node_chain,
		edge_chain,
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::test_support::GraphBuilder;

	#[test]
	fn elevation_is_summed_forward_and_cached_reverse_is_symmetric() {
		let mut b = GraphBuilder::new();
		let lot = b.lot(0.0, 0.0);
		let th = b.trailhead(0.01, 0.0);
		let peak = b.peak("A", 0.02, 0.0);
		b.lot_walk(lot, th, 0.1, true);
		b.trail(th, peak, 1.0, 300.0, 50.0);
		let g = b.build();
		let cluster = Cluster { peaks: vec![peak], trailhead_lots: vec![lot] };

		let hike = Hike { d_km: 2.2, peaks: vec![peak], start_lot: lot, end_lot: lot };
		let mut cache = ElevationCache::new();
		let annotated = annotate_hike(&g, &cluster, &mut cache, &hike).unwrap();

		// lot->th->peak gains 300 (th->peak) then peak->th->lot gains 50
		// (the reverse of th->peak's loss).
		assert_eq!(annotated.ele_gain_m, 350);
		assert_eq!(annotated.node_chain, vec![lot, th, peak, th, lot]);
	}

	#[test]
	fn reverse_leg_reuses_forward_cache_with_gain_loss_swapped() {
		let mut b = GraphBuilder::new();
		let a = b.peak("A", 0.0, 0.0);
		let c = b.peak("C", 0.01, 0.0);
		b.trail(a, c, 1.0, 200.0, 20.0);
		let g = b.build();
		let cluster = Cluster { peaks: vec![a, c], trailhead_lots: vec![] };
		let mut cache = ElevationCache::new();

		let forward = cache.resolve(&g, |v| cluster.no_lots_barrier(&g, v), a, c).unwrap();
		let backward = cache.resolve(&g, |v| cluster.no_lots_barrier(&g, v), c, a).unwrap();
		assert_eq!(forward.gain_m, backward.loss_m);
		assert_eq!(forward.loss_m, backward.gain_m);
	}
}
