//! C1: typed vertices and weighted edges, with deterministic shortest-path
//! queries and complete-graph projection (spec.md §4.1).
//!
//! Vertex ids are dense `u32`s assigned at construction time, rather than
//! passing external ids straight through as borrowed strings; edges live
//! in a flat `Vec` and vertices hold indices into it, matching the CSR
//! layout design note in spec.md §9.

use std::collections::BinaryHeap;
use std::fmt;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{HikeError, Result};
use crate::f64nn::f64s;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VertexId(pub u32);

impl fmt::Display for VertexId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

pub type EdgeIndex = usize;

#[derive(Clone, PartialEq, Debug)]
pub enum VertexKind {
	Peak { code: String },
	Trailhead,
	Junction,
	Lot,
}

impl VertexKind {
	pub fn is_peak(&self) -> bool {
		matches!(self, VertexKind::Peak { .. })
	}

	pub fn is_lot(&self) -> bool {
		matches!(self, VertexKind::Lot)
	}
}

#[derive(Clone, Debug)]
pub struct Vertex {
	pub id: VertexId,
	pub kind: VertexKind,
	/// (longitude, latitude), WGS84.
	pub point: (f64, f64),
	pub name: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum EdgeKind {
	Trail,
	LotWalk { valid: bool },
}

#[derive(Clone, Debug)]
pub struct EdgeData {
	pub a: VertexId,
	pub b: VertexId,
	pub length_km: f64,
	/// Elevation gain/loss in meters, oriented from `a` to `b`.
	pub gain_m: f64,
	pub loss_m: f64,
	pub kind: EdgeKind,
	/// Ordered (lon, lat) pairs; endpoints coincide with `a` and `b`'s
	/// coordinates (in `a`-to-`b` order).
	pub polyline: Vec<(f64, f64)>,
}

impl EdgeData {
	pub fn other(&self, from: VertexId) -> VertexId {
		if from == self.a {
			self.b
		} else {
			self.a
		}
	}

	/// Elevation gain/loss when traversed starting at `from`.
	pub fn gain_loss_from(&self, from: VertexId) -> (f64, f64) {
		if from == self.a {
			(self.gain_m, self.loss_m)
		} else {
			(self.loss_m, self.gain_m)
		}
	}

	pub fn is_usable(&self) -> bool {
		!matches!(self.kind, EdgeKind::LotWalk { valid: false })
	}
}

#[derive(Clone, Debug, Default)]
pub struct Graph {
	vertices: Vec<Vertex>,
	edges: Vec<EdgeData>,
	adjacency: Vec<Vec<EdgeIndex>>,
}

impl Graph {
	/// Builds a graph from vertices and edges, validating the invariants
	/// from spec.md §3: dense ids, no dangling endpoints, positive lengths,
	/// non-negative elevation deltas.
	pub fn new(vertices: Vec<Vertex>, edges: Vec<EdgeData>) -> Result<Self> {
		for (i, v) in vertices.iter().enumerate() {
			if v.id.0 as usize != i {
				return Err(HikeError::MalformedGraph {
					reason: format!("vertex ids must be dense; expected {i}, found {}", v.id),
				});
			}
		}
		let n = vertices.len();
		let mut adjacency = vec![Vec::new(); n];
		for (idx, e) in edges.iter().enumerate() {
			if e.length_km <= 0.0 {
				return Err(HikeError::MalformedGraph {
					reason: format!("edge {}-{} has non-positive length {}", e.a, e.b, e.length_km),
				});
			}
			if e.gain_m < 0.0 || e.loss_m < 0.0 {
				return Err(HikeError::MalformedGraph {
					reason: format!("edge {}-{} has negative elevation delta", e.a, e.b),
				});
			}
			if e.a == e.b {
				return Err(HikeError::MalformedGraph {
					reason: format!("edge endpoints must be distinct (vertex {})", e.a),
				});
			}
			let a = e.a.0 as usize;
			let b = e.b.0 as usize;
			if a >= n || b >= n {
				return Err(HikeError::MalformedGraph {
					reason: format!("edge references unknown vertex ({a} or {b})"),
				});
			}
			adjacency[a].push(idx);
			adjacency[b].push(idx);
		}
		Ok(Self { vertices, edges, adjacency })
	}

	pub fn vertex(&self, id: VertexId) -> Result<&Vertex> {
		self.vertices
			.get(id.0 as usize)
			.ok_or(HikeError::MissingVertex { id })
	}

	pub fn edge(&self, idx: EdgeIndex) -> &EdgeData {
		&self.edges[idx]
	}

	pub fn edges_of(&self, id: VertexId) -> &[EdgeIndex] {
		self.adjacency
			.get(id.0 as usize)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	pub fn degree(&self, id: VertexId) -> usize {
		self.edges_of(id).len()
	}

	pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
		self.vertices.iter()
	}

	pub fn peaks(&self) -> impl Iterator<Item = &Vertex> {
		self.vertices.iter().filter(|v| v.kind.is_peak())
	}

	pub fn lots(&self) -> impl Iterator<Item = &Vertex> {
		self.vertices.iter().filter(|v| v.kind.is_lot())
	}

	/// Single-source shortest paths restricted to vertices/edges accepted
	/// by the given predicates. Ties break lexicographically on predecessor
	/// id (spec.md §4.1) so equal-weight alternatives never destabilize
	/// downstream enumeration.
	pub fn dijkstra_filtered(
		&self,
		start: VertexId,
		allow_vertex: impl Fn(VertexId) -> bool,
		allow_edge: impl Fn(&EdgeData) -> bool,
	) -> FxHashMap<VertexId, (f64, Option<(VertexId, EdgeIndex)>)> {
		let mut best: FxHashMap<VertexId, (f64, Option<(VertexId, EdgeIndex)>)> = FxHashMap::default();
		let mut heap: BinaryHeap<std::cmp::Reverse<(f64s, VertexId)>> = BinaryHeap::new();
		best.insert(start, (0.0, None));
		heap.push(std::cmp::Reverse((f64s::ZERO, start)));
		while let Some(std::cmp::Reverse((d, u))) = heap.pop() {
			let (best_d, _) = best[&u];
			if d.f() > best_d {
				continue;
			}
			for &eidx in self.edges_of(u) {
				let e = &self.edges[eidx];
				if !allow_edge(e) {
					continue;
				}
				let v = e.other(u);
				if v == u || !allow_vertex(v) {
					continue;
				}
				let nd = best_d + e.length_km;
				let improves = match best.get(&v) {
					None => true,
					Some(&(vd, prev)) => {
						nd < vd - 1e-12
							|| ((nd - vd).abs() <= 1e-12
								&& prev.map_or(true, |(p, _)| u < p))
					}
				};
				if improves {
					best.insert(v, (nd, Some((u, eidx))));
					heap.push(std::cmp::Reverse((f64s::try_from(nd).unwrap(), v)));
				}
			}
		}
		best
	}

	/// Shortest path between two vertices under the given filters. Returns
	/// the distance, the vertex chain (inclusive of both endpoints), and the
	/// edges traversed in order.
	pub fn shortest_path(
		&self,
		from: VertexId,
		to: VertexId,
		allow_vertex: impl Fn(VertexId) -> bool,
		allow_edge: impl Fn(&EdgeData) -> bool,
	) -> Option<(f64, Vec<VertexId>, Vec<EdgeIndex>)> {
		let table = self.dijkstra_filtered(from, allow_vertex, allow_edge);
		let (d, _) = *table.get(&to)?;
		let mut nodes = vec![to];
		let mut edges = vec![];
		let mut cur = to;
		while cur != from {
			let (_, prev) = table[&cur];
			let (p, eidx) = prev.expect("path reconstruction reached start without predecessor");
			edges.push(eidx);
			nodes.push(p);
			cur = p;
		}
		nodes.reverse();
		edges.reverse();
		Some((d, nodes, edges))
	}
}

#[cfg(test)]
pub mod test_support {
	use super::*;

	pub struct GraphBuilder {
		vertices: Vec<Vertex>,
		edges: Vec<EdgeData>,
	}

	impl GraphBuilder {
		pub fn new() -> Self {
			Self { vertices: vec![], edges: vec![] }
		}

		pub fn peak(&mut self, code: &str, lon: f64, lat: f64) -> VertexId {
			self.vertex(VertexKind::Peak { code: code.to_string() }, lon, lat, Some(code))
		}

		pub fn trailhead(&mut self, lon: f64, lat: f64) -> VertexId {
			self.vertex(VertexKind::Trailhead, lon, lat, None)
		}

		pub fn junction(&mut self, lon: f64, lat: f64) -> VertexId {
			self.vertex(VertexKind::Junction, lon, lat, None)
		}

		pub fn lot(&mut self, lon: f64, lat: f64) -> VertexId {
			self.vertex(VertexKind::Lot, lon, lat, None)
		}

		fn vertex(&mut self, kind: VertexKind, lon: f64, lat: f64, name: Option<&str>) -> VertexId {
			let id = VertexId(self.vertices.len() as u32);
			self.vertices.push(Vertex { id, kind, point: (lon, lat), name: name.map(String::from) });
			id
		}

		pub fn trail(&mut self, a: VertexId, b: VertexId, length_km: f64, gain_m: f64, loss_m: f64) {
			self.edges.push(EdgeData {
				a,
				b,
				length_km,
				gain_m,
				loss_m,
				kind: EdgeKind::Trail,
				polyline: vec![
					self.vertices[a.0 as usize].point,
					self.vertices[b.0 as usize].point,
				],
			});
		}

		pub fn lot_walk(&mut self, a: VertexId, b: VertexId, length_km: f64, valid: bool) {
			self.edges.push(EdgeData {
				a,
				b,
				length_km,
				gain_m: 0.0,
				loss_m: 0.0,
				kind: EdgeKind::LotWalk { valid },
				polyline: vec![
					self.vertices[a.0 as usize].point,
					self.vertices[b.0 as usize].point,
				],
			});
		}

		pub fn build(self) -> Graph {
			Graph::new(self.vertices, self.edges).unwrap()
		}
	}
}

#[cfg(test)]
mod tests {
	use super::test_support::GraphBuilder;
	use super::*;

	#[test]
	fn shortest_path_along_a_chain() {
		let mut b = GraphBuilder::new();
		let s = b.peak("S", -74.42, 42.00);
		let nd = b.peak("ND", -74.36, 42.03);
		let w = b.peak("W", -74.33, 42.05);
		b.trail(s, nd, 2.18, 300.0, 10.0);
		b.trail(nd, w, 6.67, 400.0, 50.0);
		let g = b.build();

		let (d, nodes, _) = g.shortest_path(s, w, |_| true, |_| true).unwrap();
		assert!((d - 8.85).abs() < 1e-9);
		assert_eq!(nodes, vec![s, nd, w]);
	}

	#[test]
	fn disconnected_peak_has_no_path() {
		let mut b = GraphBuilder::new();
		let a = b.peak("A", 0.0, 0.0);
		let c = b.peak("C", 1.0, 1.0);
		let g = b.build();
		assert!(g.shortest_path(a, c, |_| true, |_| true).is_none());
	}

	#[test]
	fn disallowed_lot_walk_is_excluded() {
		let mut b = GraphBuilder::new();
		let lot = b.lot(0.0, 0.0);
		let th = b.trailhead(0.001, 0.001);
		b.lot_walk(lot, th, 0.1, false);
		let g = b.build();
		assert!(g
			.shortest_path(lot, th, |_| true, EdgeData::is_usable)
			.is_none());
	}
}
