//! Region specification (spec.md §6): declarative, data-only configuration
//! that shapes the graph before C1-C7 ever run. Kept as a side input to
//! `geojson::build_graph` rather than mutated in place on a `Graph`
//! (design note §9: "keep it as a side input to C2 rather than mutating
//! the graph inside C1").

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
	pub north: f64,
	pub south: f64,
	pub east: f64,
	pub west: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct RegionSpec {
	pub bbox: BoundingBox,
	pub required_peak_count: usize,
	/// Each inner list is a set of peak codes the region insists live in
	/// distinct clusters (spec.md §4.2, §9 open question).
	#[serde(default)]
	pub forced_clusters: Vec<Vec<String>>,
	/// Vertex-id pairs naming an edge to delete from the graph entirely.
	#[serde(default)]
	pub edges_to_toss: Vec<(u64, u64)>,
	/// Unordered lot-id pairs to mark as disallowed `LotWalk` edges.
	#[serde(default)]
	pub bad_lot_walks: Vec<(u64, u64)>,
	/// Road way names to treat as `Trail` edges rather than excluding them.
	#[serde(default)]
	pub roads_that_are_trails: Vec<String>,
	/// Lot ids to exclude from the graph (e.g. permanently closed lots).
	#[serde(default)]
	pub invalid_parking_ids: Vec<u64>,
}

impl RegionSpec {
	pub fn tossed_edges(&self) -> HashSet<(u64, u64)> {
		self.edges_to_toss
			.iter()
			.flat_map(|&(a, b)| [(a, b), (b, a)])
			.collect()
	}

	pub fn disallowed_lot_walks(&self) -> HashSet<(u64, u64)> {
		self.bad_lot_walks
			.iter()
			.flat_map(|&(a, b)| [(a, b), (b, a)])
			.collect()
	}

	pub fn invalid_parking_id_set(&self) -> HashSet<u64> {
		self.invalid_parking_ids.iter().copied().collect()
	}

	pub fn is_trail_road(&self, name: &str) -> bool {
		self.roads_that_are_trails.iter().any(|n| n == name)
	}
}
