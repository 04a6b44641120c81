//! C4: hike builder (spec.md §4.4).
//!
//! Turns each plausible peak sequence from `sequence::SequenceTable` into
//! zero or more concrete hikes by attaching lots to its two open ends. A
//! loop hike picks the single best lot for both ends; a through-hike picks
//! the best *pair* of distinct lots. "Best" is found by distance alone,
//! ignoring surprise peaks; only the chosen best lot (or pair) is then
//! checked against the "no surprise peak" rule, extended here to the
//! lot-to-peak legs — if the best candidate fails that check the sequence
//! yields no hike of that shape at all, rather than falling back to a
//! worse candidate that happens to be clear.

use rustc_hash::FxHashMap;

use crate::cluster::Cluster;
use crate::graph::{EdgeIndex, Graph, VertexId};
use crate::sequence::{PeakIndex, SequenceTable};

#[derive(Clone, Debug, PartialEq)]
pub struct Hike {
	/// True distance in km — never includes the non-loop penalty (§9 open
	/// question; that's applied only inside `cover.rs`).
	pub d_km: f64,
	/// Peaks in visiting order.
	pub peaks: Vec<VertexId>,
	pub start_lot: VertexId,
	pub end_lot: VertexId,
}

impl Hike {
	pub fn is_loop(&self) -> bool {
		self.start_lot == self.end_lot
	}
}

type LotTable = FxHashMap<VertexId, (f64, Option<(VertexId, EdgeIndex)>)>;

/// Builds every accepted loop and through hike for `cluster`'s plausible
/// sequences. `index` and `sequences` must come from the same cluster run.
pub fn build_hikes(graph: &Graph, cluster: &Cluster, index: &PeakIndex, sequences: &SequenceTable) -> Vec<Hike> {
	if cluster.trailhead_lots.is_empty() {
		return Vec::new();
	}

	let lot_tables: FxHashMap<VertexId, LotTable> = cluster
		.trailhead_lots
		.iter()
		.map(|&lot| {
			let table = graph.dijkstra_filtered(
				lot,
				|v| cluster.with_lots_barrier(graph, v),
				|e| e.is_usable(),
			);
			(lot, table)
		})
		.collect();

	let mut hikes = Vec::new();

	for entry in sequences.entries.values() {
		let peaks: Vec<VertexId> = entry.order.iter().map(|&i| index.peaks[i]).collect();
		let start_peak = peaks[0];
		let end_peak = *peaks.last().unwrap();
		let mask = entry.order.iter().fold(0u64, |m, &i| m | (1 << i));

		// Loop hikes: record the single best lot minimizing total distance,
		// regardless of whether its legs are surprise-free, then accept
		// only if that best lot turns out to be clear — never fall back to
		// a worse lot that happens to be clear.
		let mut best_loop: Option<(f64, VertexId)> = None;
		for &lot in &cluster.trailhead_lots {
			let table = &lot_tables[&lot];
			let Some(&(d1, _)) = table.get(&start_peak) else { continue };
			let Some(&(d2, _)) = table.get(&end_peak) else { continue };
			let total = d1 + entry.cost_km + d2;
			if best_loop.map_or(true, |(bd, bl)| total < bd - 1e-12 || ((total - bd).abs() <= 1e-12 && lot < bl)) {
				best_loop = Some((total, lot));
			}
		}
		if let Some((d_km, lot)) = best_loop {
			let table = &lot_tables[&lot];
			if leg_clear(table, index, start_peak, mask) && leg_clear(table, index, end_peak, mask) {
				hikes.push(Hike { d_km, peaks: peaks.clone(), start_lot: lot, end_lot: lot });
			}
		}

		// Through hikes: distinct lot pair. Needs ≥2 trailhead lots. Same
		// minimize-then-gate rule as the loop case above.
		if cluster.trailhead_lots.len() >= 2 {
			let mut best_through: Option<(f64, VertexId, VertexId)> = None;
			for &lot1 in &cluster.trailhead_lots {
				let table1 = &lot_tables[&lot1];
				let Some(&(d1, _)) = table1.get(&start_peak) else { continue };
				for &lot2 in &cluster.trailhead_lots {
					if lot2 == lot1 {
						continue;
					}
					let table2 = &lot_tables[&lot2];
					let Some(&(d2, _)) = table2.get(&end_peak) else { continue };
					let total = d1 + entry.cost_km + d2;
					let better = best_through.map_or(true, |(bd, bl1, bl2)| {
						total < bd - 1e-12
							|| ((total - bd).abs() <= 1e-12 && (lot1, lot2) < (bl1, bl2))
					});
					if better {
						best_through = Some((total, lot1, lot2));
					}
				}
			}
			if let Some((d_km, lot1, lot2)) = best_through {
				let table1 = &lot_tables[&lot1];
				let table2 = &lot_tables[&lot2];
				if leg_clear(table1, index, start_peak, mask) && leg_clear(table2, index, end_peak, mask) {
					hikes.push(Hike { d_km, peaks: peaks.clone(), start_lot: lot1, end_lot: lot2 });
				}
			}
		}
	}

	hikes
}

/// True if the lot-to-`to` path recorded in `table` never crosses a peak
/// outside `mask` (the "no surprise peak" rule extended to lot legs).
fn leg_clear(table: &LotTable, index: &PeakIndex, to: VertexId, mask: u64) -> bool {
	let mut cur = to;
	loop {
		if let Some(k) = index.index_of(cur) {
			if mask & (1 << k) == 0 {
				return false;
			}
		}
		match table.get(&cur).and_then(|(_, prev)| *prev) {
			Some((p, _)) => cur = p,
			None => break,
		}
	}
	true
}
