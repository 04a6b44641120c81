//! C2: cluster discovery (spec.md §4.2).
//!
//! A cluster is a maximal connected set of `Peak` vertices in the subgraph
//! that excludes `Lot` vertices. Since every `LotWalk` edge touches a `Lot`
//! endpoint (data model, spec.md §3), excluding `Lot` vertices from a walk
//! also excludes every `LotWalk` edge for free — no separate edge-kind
//! filter is needed to build G'.
//!
//! A forced partition (region spec `forced_clusters`) can split a natural
//! component into several clusters. Per the Open Question in spec.md §9,
//! peaks in different forced clusters must never share a plausible
//! sequence; this module enforces that by excluding foreign-forced-group
//! peaks as hard barriers (see `sequence.rs`, which reuses
//! `Cluster::no_lots_barrier`), the same trick used to exclude `Lot`
//! vertices from G'.

use rustc_hash::FxHashMap;

use crate::error::HikeError;
use crate::graph::{Graph, VertexId};

#[derive(Clone, Debug)]
pub struct Cluster {
	/// All `Peak` vertices in this cluster (not just the required ones —
	/// an unrequired peak still blocks "surprise peak" plausibility for
	/// its neighbors, see spec.md §4.3 and DESIGN.md).
	pub peaks: Vec<VertexId>,
	/// Lots adjacent to at least one of this cluster's peaks without
	/// crossing another peak (spec.md §3/§4.2 item 4).
	pub trailhead_lots: Vec<VertexId>,
}

impl Cluster {
	/// True if `candidate` may appear on a G'-path local to this cluster
	/// (spec.md §4.2/§4.3): excludes `Lot` vertices entirely, and excludes
	/// peaks outside this cluster (a different natural component, or split
	/// off by a forced partition) as a hard barrier. Used by `sequence.rs`
	/// to build the cluster-local peak index.
	pub fn no_lots_barrier(&self, graph: &Graph, candidate: VertexId) -> bool {
		match graph.vertex(candidate) {
			Ok(v) if v.kind.is_lot() => false,
			Ok(v) if v.kind.is_peak() => self.peaks.contains(&candidate),
			Ok(_) => true,
			Err(_) => false,
		}
	}

	/// Like `no_lots_barrier` but allows `Lot` vertices through: the
	/// "peak-and-lot complete graph" spec.md §4.4 uses for lot-to-peak
	/// distances. Foreign peaks are still a hard barrier.
	pub fn with_lots_barrier(&self, graph: &Graph, candidate: VertexId) -> bool {
		match graph.vertex(candidate) {
			Ok(v) if v.kind.is_peak() => self.peaks.contains(&candidate),
			Ok(_) => true,
			Err(_) => false,
		}
	}
}

/// `forced_clusters`: each inner `Vec<VertexId>` is a set of peaks the
/// region spec insists live in distinct clusters, even if the trail graph
/// would otherwise connect them (spec.md §6).
pub fn discover_clusters(
	graph: &Graph,
	required_peaks: &[VertexId],
	forced_clusters: &[Vec<VertexId>],
) -> (Vec<Cluster>, Vec<HikeError>) {
	let mut diagnostics = Vec::new();

	for &peak in required_peaks {
		if graph.vertex(peak).map(|v| v.kind.is_peak()).unwrap_or(false) && graph.degree(peak) == 0 {
			diagnostics.push(HikeError::DisconnectedPeak { peak });
		}
	}

	// Natural connected components of G' (non-Lot vertices).
	let mut component_of: FxHashMap<VertexId, usize> = FxHashMap::default();
	let mut next_component = 0usize;
	for v in graph.vertices() {
		if v.kind.is_lot() || component_of.contains_key(&v.id) {
			continue;
		}
		let mut stack = vec![v.id];
		component_of.insert(v.id, next_component);
		while let Some(u) = stack.pop() {
			for &eidx in graph.edges_of(u) {
				let e = graph.edge(eidx);
				let w = e.other(u);
				if let Ok(wv) = graph.vertex(w) {
					if !wv.kind.is_lot() && !component_of.contains_key(&w) {
						component_of.insert(w, next_component);
						stack.push(w);
					}
				}
			}
		}
		next_component += 1;
	}

	// forced group key per peak, if any.
	let mut forced_group: FxHashMap<VertexId, usize> = FxHashMap::default();
	for (gi, group) in forced_clusters.iter().enumerate() {
		for &p in group {
			forced_group.insert(p, gi);
		}
	}

	// Split each natural component into sub-clusters keyed by (component,
	// forced-group-or-none).
	let mut buckets: FxHashMap<(usize, Option<usize>), Vec<VertexId>> = FxHashMap::default();
	for v in graph.vertices() {
		if !v.kind.is_peak() {
			continue;
		}
		let Some(&comp) = component_of.get(&v.id) else { continue };
		let key = (comp, forced_group.get(&v.id).copied());
		buckets.entry(key).or_default().push(v.id);
	}

	let mut clusters: Vec<Cluster> = Vec::new();
	let mut keys: Vec<_> = buckets.keys().copied().collect();
	keys.sort();
	for key in keys {
		let mut peaks = buckets.remove(&key).unwrap();
		peaks.sort();
		let trailhead_lots = trailhead_lots_for(graph, &peaks);
		clusters.push(Cluster { peaks, trailhead_lots });
	}

	(clusters, diagnostics)
}

/// Lots reachable from at least one of `peaks` without passing through a
/// peak outside `peaks` (spec.md §3/§4.2 item 4). Implemented as a
/// multi-source walk from each peak through non-peak vertices (and usable
/// `LotWalk` edges once a `Lot` is reached), stopping expansion the moment
/// another peak would be entered.
fn trailhead_lots_for(graph: &Graph, peaks: &[VertexId]) -> Vec<VertexId> {
	let mut lots = std::collections::BTreeSet::new();
	let mut visited: std::collections::HashSet<VertexId> = std::collections::HashSet::new();

	for &p in peaks {
		let mut stack = vec![p];
		visited.insert(p);
		while let Some(u) = stack.pop() {
			for &eidx in graph.edges_of(u) {
				let e = graph.edge(eidx);
				if !e.is_usable() {
					continue;
				}
				let w = e.other(u);
				let Ok(wv) = graph.vertex(w) else { continue };
				if wv.kind.is_peak() {
					// Reached a peak: record it only if it's one of ours
					// (never cross over it), otherwise stop here.
					continue;
				}
				if visited.insert(w) {
					if wv.kind.is_lot() {
						lots.insert(w);
					}
					stack.push(w);
				}
			}
		}
	}
	lots.into_iter().collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::test_support::GraphBuilder;

	#[test]
	fn single_peak_single_lot_cluster() {
		let mut b = GraphBuilder::new();
		let lot = b.lot(0.0, 0.0);
		let th = b.trailhead(0.01, 0.0);
		let peak = b.peak("A", 0.02, 0.0);
		b.lot_walk(lot, th, 0.1, true);
		b.trail(th, peak, 1.0, 100.0, 0.0);
		let g = b.build();

		let (clusters, diags) = discover_clusters(&g, &[peak], &[]);
		assert!(diags.is_empty());
		assert_eq!(clusters.len(), 1);
		assert_eq!(clusters[0].peaks, vec![peak]);
		assert_eq!(clusters[0].trailhead_lots, vec![lot]);
	}

	#[test]
	fn two_peaks_separated_by_a_lot_are_distinct_clusters() {
		let mut b = GraphBuilder::new();
		let lot1 = b.lot(0.0, 0.0);
		let th1 = b.trailhead(0.01, 0.0);
		let a = b.peak("A", 0.02, 0.0);
		let lot2 = b.lot(1.0, 0.0);
		let th2 = b.trailhead(1.01, 0.0);
		let c = b.peak("C", 1.02, 0.0);
		b.lot_walk(lot1, th1, 0.1, true);
		b.trail(th1, a, 1.0, 100.0, 0.0);
		b.lot_walk(lot2, th2, 0.1, true);
		b.trail(th2, c, 1.0, 100.0, 0.0);
		let g = b.build();

		let (clusters, _) = discover_clusters(&g, &[a, c], &[]);
		assert_eq!(clusters.len(), 2);
	}

	#[test]
	fn disconnected_required_peak_is_reported() {
		let mut b = GraphBuilder::new();
		let a = b.peak("A", 0.0, 0.0);
		let g = b.build();
		let (_, diags) = discover_clusters(&g, &[a], &[]);
		assert_eq!(diags, vec![HikeError::DisconnectedPeak { peak: a }]);
	}

	#[test]
	fn forced_partition_splits_a_connected_component() {
		let mut b = GraphBuilder::new();
		let lot = b.lot(0.0, 0.0);
		let th = b.trailhead(0.01, 0.0);
		let a = b.peak("A", 0.02, 0.0);
		let c = b.peak("C", 0.03, 0.0);
		b.lot_walk(lot, th, 0.1, true);
		b.trail(th, a, 1.0, 100.0, 0.0);
		b.trail(a, c, 1.0, 100.0, 0.0);
		let g = b.build();

		let (clusters, _) = discover_clusters(&g, &[a, c], &[vec![a], vec![c]]);
		assert_eq!(clusters.len(), 2);
		assert!(clusters.iter().any(|cl| cl.peaks == vec![a]));
		assert!(clusters.iter().any(|cl| cl.peaks == vec![c]));
	}
}
