//! C3: plausible peak sequences within a cluster (spec.md §4.3).
//!
//! This is the combinatorial core. For a cluster of `k` peaks we first
//! build a complete peak-to-peak distance index over G' (the trail-only
//! subgraph, barriers per `Cluster::no_lots_barrier`), then run a bottom-up
//! dynamic program over subsets of peaks (`u64` bitmasks — clusters are
//! capped at 64 peaks, design note §9). For every `(mask, start, end)`
//! triple the DP keeps the single cheapest ordering of `mask`'s peaks that
//! begins at `start` and ends at `end`, which is both the natural
//! bottom-up reading of the original recursive formulation and the thing
//! spec.md §4.3 calls "sequence minimality".
//!
//! A sequence is *plausible* only if no peak not in its mask lies on the
//! cheapest G'-path between two consecutive stops (the "no surprise peak"
//! rule) — if one does, the hiker would summit it "for free" and the
//! implied sequence is redundant with a longer one that lists it
//! explicitly. `max_length` (spec.md §4.3) is a separate, non-fatal
//! truncation: masks wider than it are simply never built, rather than
//! treated as an error.
//!
//! The DP only ever extends a prefix at its tail, so a leg gets checked
//! against the mask as it stood when that leg was first inserted — which
//! for a leg that ends up in the *middle* of a longer sequence is smaller
//! than the sequence's final mask. A reverse of a valid sequence can need
//! that leg checked against the full mask instead (its "middle" peak is
//! now its last), so `plan_sequences` runs an explicit reverse-augmentation
//! pass afterward (spec.md §4.3, Reversibility in §8) rather than relying
//! on the forward DP to produce every reverse on its own.

use rustc_hash::FxHashMap;

use crate::cluster::Cluster;
use crate::error::{HikeError, Result};
use crate::graph::{Graph, VertexId};

/// A cluster wider than this cannot be enumerated at all (design note §9);
/// reported as `HikeError::ClusterTooLarge`.
pub const MAX_CLUSTER_PEAKS: usize = 64;

/// Default safety-valve cap on sequence length (spec.md §4.3): truncation,
/// not an error.
pub const DEFAULT_MAX_LENGTH: usize = 8;

/// Distances and "any peak in between" masks between every pair of a
/// cluster's peaks over G', restricted to `cluster`.
pub struct PeakIndex {
	pub peaks: Vec<VertexId>,
	index_of: FxHashMap<VertexId, usize>,
	/// `dist[i * n + j]`: G' distance from peak `i` to peak `j`, or `None`
	/// if unreachable without leaving the cluster.
	dist: Vec<Option<f64>>,
	/// `between[i * n + j]`: bitmask of cluster peaks (other than `i`/`j`)
	/// that lie on the cheapest G'-path from `i` to `j`.
	between: Vec<u64>,
}

impl PeakIndex {
	pub fn build(graph: &Graph, cluster: &Cluster) -> Self {
		let peaks = cluster.peaks.clone();
		let n = peaks.len();
		let index_of: FxHashMap<VertexId, usize> =
			peaks.iter().enumerate().map(|(i, &p)| (p, i)).collect();
		let mut dist = vec![None; n * n];
		let mut between = vec![0u64; n * n];

		for (i, &src) in peaks.iter().enumerate() {
			let table = graph.dijkstra_filtered(src, |v| cluster.no_lots_barrier(graph, v), |_| true);
			for (j, &dst) in peaks.iter().enumerate() {
				if i == j {
					dist[i * n + j] = Some(0.0);
					continue;
				}
				if let Some(&(d, _)) = table.get(&dst) {
					dist[i * n + j] = Some(d);
					between[i * n + j] = path_peak_mask(&table, src, dst, &index_of, i, j);
				}
			}
		}

		Self { peaks, index_of, dist, between }
	}

	pub fn n(&self) -> usize {
		self.peaks.len()
	}

	pub fn dist(&self, i: usize, j: usize) -> Option<f64> {
		self.dist[i * self.n() + j]
	}

	pub fn between_mask(&self, i: usize, j: usize) -> u64 {
		self.between[i * self.n() + j]
	}

	pub fn index_of(&self, peak: VertexId) -> Option<usize> {
		self.index_of.get(&peak).copied()
	}
}

fn path_peak_mask(
	table: &FxHashMap<VertexId, (f64, Option<(VertexId, crate::graph::EdgeIndex)>)>,
	src: VertexId,
	dst: VertexId,
	index_of: &FxHashMap<VertexId, usize>,
	i: usize,
	j: usize,
) -> u64 {
	let mut mask = 0u64;
	let mut cur = dst;
	while cur != src {
		if let Some(&k) = index_of.get(&cur) {
			if k != i && k != j {
				mask |= 1 << k;
			}
		}
		match table.get(&cur).and_then(|(_, prev)| *prev) {
			Some((p, _)) => cur = p,
			None => break,
		}
	}
	mask
}

#[derive(Clone, Debug)]
pub struct SequenceEntry {
	pub cost_km: f64,
	/// Peak indices (into `PeakIndex::peaks`) in visiting order.
	pub order: Vec<usize>,
}

/// The per-cluster-run memo table for the peak-sequence DP (glossary:
/// "Cluster cache"), keyed by `(peak bitset, start, end)` and dropped at
/// cluster exit — never shared across clusters or reused across calls.
pub struct SequenceTable {
	pub entries: FxHashMap<(u64, usize, usize), SequenceEntry>,
}

/// Runs the bottom-up DP described in spec.md §4.3, keeping only sequences
/// of at most `max_length` peaks. Returns `ClusterTooLarge` without
/// computing anything if the cluster itself exceeds `MAX_CLUSTER_PEAKS`
/// (a hard precondition, independent of `max_length`'s soft truncation).
pub fn plan_sequences(index: &PeakIndex, max_length: usize) -> Result<SequenceTable> {
	let n = index.n();
	if n > MAX_CLUSTER_PEAKS {
		return Err(HikeError::ClusterTooLarge { peak_count: n });
	}
	let mut entries: FxHashMap<(u64, usize, usize), SequenceEntry> = FxHashMap::default();

	for i in 0..n {
		let mask = 1u64 << i;
		entries.insert((mask, i, i), SequenceEntry { cost_km: 0.0, order: vec![i] });
	}

	if max_length < 2 {
		return Ok(SequenceTable { entries });
	}

	// Process masks in increasing popcount order, capped at `max_length`
	// bits set, so every subset of `mask` has already been resolved.
	let mut masks: Vec<u64> = (1u64..(1u64 << n))
		.filter(|m| (m.count_ones() as usize) <= max_length)
		.collect();
	masks.sort_by_key(|m| m.count_ones());

	for mask in masks {
		if mask.count_ones() < 2 {
			continue;
		}
		for end in 0..n {
			if mask & (1 << end) == 0 {
				continue;
			}
			let prev_mask = mask & !(1 << end);
			if prev_mask == 0 {
				continue;
			}
			for mid in 0..n {
				if prev_mask & (1 << mid) == 0 {
					continue;
				}
				let Some(step) = index.dist(mid, end) else { continue };
				// No-surprise-peak rule: nothing outside `mask` may lie on
				// the mid->end leg.
				if index.between_mask(mid, end) & !mask != 0 {
					continue;
				}
				for start in 0..n {
					if prev_mask & (1 << start) == 0 {
						continue;
					}
					let Some(prefix) = entries.get(&(prev_mask, start, mid)) else { continue };
					let cost = prefix.cost_km + step;
					let key = (mask, start, end);
					let better = entries.get(&key).map_or(true, |e| cost < e.cost_km - 1e-12);
					if better {
						let mut order = prefix.order.clone();
						order.push(end);
						entries.insert(key, SequenceEntry { cost_km: cost, order });
					}
				}
			}
		}
	}

	// Reverse augmentation (spec.md §4.3): if a sequence is plausible, so is
	// its reverse, at identical cost (every underlying leg is the same
	// undirected path walked the other way). The DP above only ever
	// extends a prefix by appending to its tail, so a reverse whose own
	// prefix would have been rejected at a smaller mask — e.g. the two-peak
	// leg of a three-peak sequence whose middle peak is only added last —
	// never gets built directly. Copy every entry's reverse in rather than
	// re-deriving it from scratch.
	let forward: Vec<((u64, usize, usize), SequenceEntry)> =
		entries.iter().map(|(&k, v)| (k, v.clone())).collect();
	for ((mask, start, end), entry) in forward {
		if start == end {
			continue;
		}
		let rev_key = (mask, end, start);
		if !entries.contains_key(&rev_key) {
			let order: Vec<usize> = entry.order.iter().rev().copied().collect();
			entries.insert(rev_key, SequenceEntry { cost_km: entry.cost_km, order });
		}
	}

	Ok(SequenceTable { entries })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cluster::Cluster;
	use crate::graph::test_support::GraphBuilder;

	fn line_cluster() -> (Graph, Cluster) {
		let mut b = GraphBuilder::new();
		let a = b.peak("A", 0.0, 0.0);
		let c = b.peak("B", 0.01, 0.0);
		let d = b.peak("C", 0.02, 0.0);
		b.trail(a, c, 1.0, 0.0, 0.0);
		b.trail(c, d, 1.0, 0.0, 0.0);
		let g = b.build();
		let cluster = Cluster { peaks: vec![a, c, d], trailhead_lots: vec![] };
		(g, cluster)
	}

	#[test]
	fn three_peak_line_has_one_plausible_full_sequence_per_direction() {
		let (g, cluster) = line_cluster();
		let index = PeakIndex::build(&g, &cluster);
		let table = plan_sequences(&index, DEFAULT_MAX_LENGTH).unwrap();

		let full_mask = (1u64 << index.n()) - 1;
		let a_i = index.index_of(cluster.peaks[0]).unwrap();
		let d_i = index.index_of(cluster.peaks[2]).unwrap();

		// A->B->C direct is plausible and costs 2.0.
		let entry = table.entries.get(&(full_mask, a_i, d_i)).unwrap();
		assert!((entry.cost_km - 2.0).abs() < 1e-9);
		assert_eq!(entry.order.len(), 3);
	}

	#[test]
	fn endpoint_pair_skipping_the_middle_peak_is_implausible() {
		let (g, cluster) = line_cluster();
		let index = PeakIndex::build(&g, &cluster);
		let a_i = index.index_of(cluster.peaks[0]).unwrap();
		let d_i = index.index_of(cluster.peaks[2]).unwrap();
		let mask_ad = (1 << a_i) | (1 << d_i);
		// A direct A-C sequence (skipping B) would have B on its cheapest
		// path, so it must never appear as a 2-peak mask entry.
		let table = plan_sequences(&index, DEFAULT_MAX_LENGTH).unwrap();
		assert!(table.entries.get(&(mask_ad, a_i, d_i)).is_none());
	}

	#[test]
	fn max_length_truncates_without_erroring() {
		let (g, cluster) = line_cluster();
		let index = PeakIndex::build(&g, &cluster);
		let table = plan_sequences(&index, 2).unwrap();
		let full_mask = (1u64 << index.n()) - 1;
		assert!(table.entries.keys().all(|&(m, _, _)| m != full_mask));
	}

	#[test]
	fn every_sequence_has_a_reverse_of_identical_cost() {
		let (g, cluster) = line_cluster();
		let index = PeakIndex::build(&g, &cluster);
		let table = plan_sequences(&index, DEFAULT_MAX_LENGTH).unwrap();

		for (&(mask, start, end), entry) in &table.entries {
			if start == end {
				continue;
			}
			let rev = table.entries.get(&(mask, end, start)).unwrap_or_else(|| {
				panic!("missing reverse of ({mask:#b}, {start}, {end})")
			});
			assert!((rev.cost_km - entry.cost_km).abs() < 1e-9);
			let expected: Vec<usize> = entry.order.iter().rev().copied().collect();
			assert_eq!(rev.order, expected);
		}
	}

	#[test]
	fn a_three_peak_detour_augments_with_its_reverse() {
		// Three collinear peaks S-ND-W with ND on the shortest S<->W path:
		// the DP builds (ND,W,S) directly (ND visited first, so the hard
		// S<->W leg is checked against a mask that already contains ND),
		// but its reverse (S,W,ND) needs the W->S leg checked against the
		// 2-peak mask {S,W} where ND is absent, so it can only appear via
		// reverse augmentation.
		let mut b = GraphBuilder::new();
		let s = b.peak("S", -74.42, 42.00);
		let nd = b.peak("ND", -74.36, 42.03);
		let w = b.peak("W", -74.33, 42.05);
		b.trail(s, nd, 2.18, 0.0, 0.0);
		b.trail(nd, w, 6.67, 0.0, 0.0);
		let g = b.build();
		let cluster = Cluster { peaks: vec![s, nd, w], trailhead_lots: vec![] };
		let index = PeakIndex::build(&g, &cluster);
		let table = plan_sequences(&index, DEFAULT_MAX_LENGTH).unwrap();

		let (s_i, nd_i, w_i) = (
			index.index_of(s).unwrap(),
			index.index_of(nd).unwrap(),
			index.index_of(w).unwrap(),
		);
		let full_mask = (1u64 << index.n()) - 1;

		let direct = table.entries.get(&(full_mask, nd_i, s_i)).unwrap();
		assert_eq!(direct.order, vec![nd_i, w_i, s_i]);

		let reversed = table.entries.get(&(full_mask, s_i, nd_i)).unwrap();
		assert_eq!(reversed.order, vec![s_i, w_i, nd_i]);
		assert!((reversed.cost_km - direct.cost_km).abs() < 1e-9);
	}

	#[test]
	fn oversized_cluster_is_rejected() {
		let mut b = GraphBuilder::new();
		let mut peaks = vec![];
		for i in 0..(MAX_CLUSTER_PEAKS + 1) {
			peaks.push(b.peak(&format!("P{i}"), i as f64 * 0.01, 0.0));
		}
		for w in peaks.windows(2) {
			b.trail(w[0], w[1], 1.0, 0.0, 0.0);
		}
		let g = b.build();
		let cluster = Cluster { peaks, trailhead_lots: vec![] };
		let index = PeakIndex::build(&g, &cluster);
		assert!(matches!(
			plan_sequences(&index, DEFAULT_MAX_LENGTH),
			Err(HikeError::ClusterTooLarge { .. })
		));
	}
}
