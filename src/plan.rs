//! Top-level pipeline orchestration (spec.md §6): the `build-hikes`,
//! `add-elevation`, and `cover` stages, plus the end-to-end `plan`
//! convenience entry point that chains all three. Keeps `main.rs` a thin
//! CLI shell over a library that does the actual work, so the pipeline is
//! callable and testable without going through the CLI at all.

use rayon::prelude::*;
use serde_json::Value;

use crate::cluster::{discover_clusters, Cluster};
use crate::cover::{self, CoverConfig, Plan as CoverPlan};
use crate::elevation::{annotate_hike, AnnotatedHike, ElevationCache};
use crate::error::{HikeError, Result};
use crate::geojson::GraphBuild;
use crate::graph::{Graph, VertexId};
use crate::hike::{build_hikes, Hike};
use crate::output;
use crate::sequence::{plan_sequences, PeakIndex};

/// Runs C2 through C4 across every cluster, in parallel (§5: "each worker
/// owns its own DP cache"), returning the flat candidate hike list plus
/// any non-fatal diagnostics (`DisconnectedPeak`, `ClusterTooLarge`).
pub fn build_all_hikes(
	graph: &Graph,
	required_peaks: &[VertexId],
	forced_clusters: &[Vec<VertexId>],
	max_length: usize,
) -> (Vec<Hike>, Vec<HikeError>) {
	let (clusters, mut diagnostics) = discover_clusters(graph, required_peaks, forced_clusters);
	log::info!("discovered {} cluster(s) across {} required peaks", clusters.len(), required_peaks.len());

	let results: Vec<(Vec<Hike>, Option<HikeError>)> = clusters
		.into_par_iter()
		.map(|cluster| {
			// Each worker builds and drops its own PeakIndex/SequenceTable;
			// nothing here is shared across clusters.
			let index = PeakIndex::build(graph, &cluster);
			match plan_sequences(&index, max_length) {
				Ok(sequences) => {
					log::debug!(
						"cluster of {} peaks: {} plausible sequence(s)",
						cluster.peaks.len(),
						sequences.entries.len()
					);
					let hikes = build_hikes(graph, &cluster, &index, &sequences);
					(hikes, None)
				}
				Err(e) => {
					log::warn!("skipping cluster of {} peaks: {e}", cluster.peaks.len());
					(Vec::new(), Some(e))
				}
			}
		})
		.collect();

	let mut hikes = Vec::new();
	for (mut cluster_hikes, diagnostic) in results {
		hikes.append(&mut cluster_hikes);
		if let Some(e) = diagnostic {
			diagnostics.push(e);
		}
	}
	log::info!("built {} candidate hike(s)", hikes.len());
	(hikes, diagnostics)
}

/// Runs C5 over a flat hike list. Each hike is annotated against a
/// throwaway cluster built from its own peaks, so the no-surprise-peak
/// rule still treats every peak outside the hike as a hard barrier —
/// `annotate_hike` never reads `trailhead_lots`, only the peak barriers.
pub fn add_elevation(graph: &Graph, hikes: &[Hike]) -> Vec<AnnotatedHike> {
	let mut cache = ElevationCache::new();
	hikes
		.iter()
		.filter_map(|h| {
			let cluster = Cluster { peaks: h.peaks.clone(), trailhead_lots: Vec::new() };
			annotate_hike(graph, &cluster, &mut cache, h)
		})
		.collect()
}

/// Runs C6 over an elevation-annotated hike list.
pub fn solve_cover(hikes: &[AnnotatedHike], required_peaks: &[VertexId], config: &CoverConfig) -> Result<CoverPlan> {
	cover::solve(hikes, required_peaks, config)
}

/// End-to-end pipeline (spec.md §6's `[NEW]` `plan` subcommand): C2
/// through C6 in one call, returning the solved plan (or its error)
/// alongside any non-fatal per-cluster diagnostics collected along the way.
pub fn run_plan(
	graph: &Graph,
	required_peaks: &[VertexId],
	forced_clusters: &[Vec<VertexId>],
	max_length: usize,
	config: &CoverConfig,
) -> (Result<CoverPlan>, Vec<HikeError>) {
	let (hikes, diagnostics) = build_all_hikes(graph, required_peaks, forced_clusters, max_length);
	let annotated = add_elevation(graph, &hikes);
	(solve_cover(&annotated, required_peaks, config), diagnostics)
}

/// Resolves the graph build's peak-code list against its required-peak
/// codes, e.g. the region spec's implicit "every peak vertex is required"
/// default when no explicit peak subset is given.
pub fn required_peaks_from_codes(build: &GraphBuild, codes: &[String]) -> Result<Vec<VertexId>> {
	codes
		.iter()
		.map(|code| {
			build
				.peak_code_to_vertex
				.get(code)
				.copied()
				.ok_or_else(|| HikeError::MalformedGraph { reason: format!("unknown peak code {code}") })
		})
		.collect()
}

/// Every `Peak` vertex in the graph is required by default (the "peak
/// list" of spec.md §1 is baked into the graph input itself); warns, but
/// does not fail, if that count disagrees with the region spec's
/// `required_peak_count` sanity check.
pub fn required_peaks_from_graph(graph: &Graph, region: &crate::region::RegionSpec) -> Vec<VertexId> {
	let peaks: Vec<VertexId> = graph.peaks().map(|v| v.id).collect();
	if peaks.len() != region.required_peak_count {
		log::warn!(
			"graph has {} peak(s) but the region spec expects {}",
			peaks.len(),
			region.required_peak_count
		);
	}
	peaks
}

fn round3(x: f64) -> f64 {
	(x * 1000.0).round() / 1000.0
}

/// Hike list output (spec.md §6): one `[d_km, ele_gain_m_int, [node ids]]`
/// entry per hike. Before C5 runs, the node list is just the hike's stops
/// (start lot, peaks, end lot) and the elevation field is `0`.
pub fn hike_list_json(hikes: &[Hike]) -> Value {
	let entries = hikes
		.iter()
		.map(|h| {
			let mut nodes = vec![h.start_lot.0];
			nodes.extend(h.peaks.iter().map(|p| p.0));
			nodes.push(h.end_lot.0);
			Value::Array(vec![
				Value::from(round3(h.d_km)),
				Value::from(0),
				Value::Array(nodes.into_iter().map(Value::from).collect()),
			])
		})
		.collect();
	Value::Array(entries)
}

/// Same shape, post-elevation: the node list is the fully expanded chain
/// and the elevation field is the true integer gain.
pub fn annotated_hike_list_json(hikes: &[AnnotatedHike]) -> Value {
	let entries = hikes
		.iter()
		.map(|h| {
			let nodes: Vec<Value> = h.node_chain.iter().map(|v| Value::from(v.0)).collect();
			Value::Array(vec![Value::from(round3(h.d_km)), Value::from(h.ele_gain_m), Value::Array(nodes)])
		})
		.collect();
	Value::Array(entries)
}

/// Parses a hike list in the shape `hike_list_json` writes, consulting
/// `graph` to separate a hike's peaks from its bounding lots.
pub fn parse_hike_list(graph: &Graph, value: &Value) -> Result<Vec<Hike>> {
	let entries = value
		.as_array()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list must be a JSON array".into() })?;
	entries.iter().map(|entry| parse_hike_entry(graph, entry)).collect()
}

fn parse_hike_entry(graph: &Graph, entry: &Value) -> Result<Hike> {
	let arr = entry
		.as_array()
		.filter(|a| a.len() == 3)
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry must be [d_km, ele_gain_m, nodes]".into() })?;
	let d_km = arr[0]
		.as_f64()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry d_km must be a number".into() })?;
	let node_ids = arr[2]
		.as_array()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry nodes must be an array".into() })?;
	if node_ids.len() < 2 {
		return Err(HikeError::MalformedGraph { reason: "hike list entry needs at least two stops".into() });
	}
	let stops: Vec<VertexId> = node_ids
		.iter()
		.map(|v| v.as_u64().map(|n| VertexId(n as u32)))
		.collect::<Option<_>>()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list node id must be a non-negative integer".into() })?;

	let start_lot = stops[0];
	let end_lot = *stops.last().unwrap();
	let peaks: Vec<VertexId> = stops[1..stops.len() - 1]
		.iter()
		.copied()
		.filter(|&v| graph.vertex(v).map(|vx| vx.kind.is_peak()).unwrap_or(false))
		.collect();

	Ok(Hike { d_km, peaks, start_lot, end_lot })
}

/// Assembles the final plan output feature collection (C7) as a JSON
/// value ready to be written to disk.
pub fn plan_output_json(graph: &Graph, plan: &CoverPlan) -> Result<Value> {
	let fc = output::assemble_plan(graph, plan);
	serde_json::to_value(::geojson::GeoJson::FeatureCollection(fc))
		.map_err(|e| HikeError::MalformedGraph { reason: format!("could not serialize plan output: {e}") })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graph::test_support::GraphBuilder;

	fn one_peak_one_lot_graph() -> (Graph, VertexId, VertexId) {
		let mut b = GraphBuilder::new();
		let lot = b.lot(0.0, 0.0);
		let th = b.trailhead(0.01, 0.0);
		let peak = b.peak("A", 0.02, 0.0);
		b.lot_walk(lot, th, 0.1, true);
		b.trail(th, peak, 1.0, 100.0, 0.0);
		(b.build(), peak, lot)
	}

	#[test]
	fn build_all_hikes_discovers_and_builds_across_clusters() {
		let (g, peak, _lot) = one_peak_one_lot_graph();
		let (hikes, diagnostics) = build_all_hikes(&g, &[peak], &[], 8);
		assert!(diagnostics.is_empty());
		assert_eq!(hikes.len(), 1);
		assert!(hikes[0].is_loop());
	}

	#[test]
	fn run_plan_chains_every_stage_to_a_solved_cover() {
		let (g, peak, _lot) = one_peak_one_lot_graph();
		let (plan, diagnostics) = run_plan(&g, &[peak], &[], 8, &CoverConfig::default());
		assert!(diagnostics.is_empty());
		let plan = plan.unwrap();
		assert_eq!(plan.hikes.len(), 1);
		assert_eq!(plan.hikes[0].peaks, vec![peak]);
	}

	#[test]
	fn hike_list_round_trips_through_json() {
		let (g, peak, lot) = one_peak_one_lot_graph();
		let (hikes, _) = build_all_hikes(&g, &[peak], &[], 8);
		let json = hike_list_json(&hikes);
		let parsed = parse_hike_list(&g, &json).unwrap();
		assert_eq!(parsed.len(), 1);
		assert_eq!(parsed[0].start_lot, lot);
		assert_eq!(parsed[0].peaks, vec![peak]);
	}

	#[test]
	fn annotated_hike_list_reports_rounded_distance_and_true_elevation() {
		let (g, peak, _lot) = one_peak_one_lot_graph();
		let (hikes, _) = build_all_hikes(&g, &[peak], &[], 8);
		let annotated = add_elevation(&g, &hikes);
		let json = annotated_hike_list_json(&annotated);
		let arr = json.as_array().unwrap();
		assert_eq!(arr.len(), 1);
		let entry = arr[0].as_array().unwrap();
		assert!((entry[0].as_f64().unwrap() - 2.2).abs() < 1e-9);
		assert_eq!(entry[1].as_i64().unwrap(), 100);
	}
}
