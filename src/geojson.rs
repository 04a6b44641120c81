//! Graph input parsing (spec.md §6): turns an annotated GeoJSON feature
//! collection into a `graph::Graph`, applying the region spec's
//! declarative edits (tossed edges, disallowed lot-walks, reclassified
//! trail roads, excluded lots) before the graph is ever handed to C1.
//!
//! Uses the `geojson` crate with its `geo-types` feature.

use std::collections::HashMap;

use ::geojson::{GeoJson, Value as GeomValue};
use serde_json::Value as JsonValue;

use crate::error::{HikeError, Result};
use crate::geo_math::distance_km;
use crate::graph::{EdgeData, EdgeKind, Graph, Vertex, VertexId, VertexKind};
use crate::region::RegionSpec;

/// Everything downstream components need to map external ids back onto
/// the contracted `Graph`'s dense `VertexId`s.
pub struct GraphBuild {
	pub graph: Graph,
	pub peak_code_to_vertex: HashMap<String, VertexId>,
	pub raw_id_to_vertex: HashMap<u64, VertexId>,
}

/// Parses `text` as a GeoJSON `FeatureCollection` in the shape spec.md §6
/// describes and builds a `Graph` from it, applying `region`'s edits.
pub fn build_graph(text: &str, region: &RegionSpec) -> Result<GraphBuild> {
	let parsed: GeoJson = text.parse().map_err(|e| HikeError::MalformedGraph {
		reason: format!("invalid GeoJSON: {e}"),
	})?;
	let GeoJson::FeatureCollection(fc) = parsed else {
		return Err(HikeError::MalformedGraph { reason: "expected a FeatureCollection".into() });
	};

	let invalid_lots = region.invalid_parking_id_set();
	let tossed = region.tossed_edges();
	let disallowed_walks = region.disallowed_lot_walks();

	let mut raw_id_to_vertex: HashMap<u64, VertexId> = HashMap::new();
	let mut peak_code_to_vertex: HashMap<String, VertexId> = HashMap::new();
	let mut vertices = Vec::new();

	for feature in &fc.features {
		let Some(geometry) = &feature.geometry else { continue };
		let GeomValue::Point(coords) = &geometry.value else { continue };
		let props = feature.properties.as_ref();
		let raw_id = prop_u64(props, "id").ok_or_else(|| HikeError::MalformedGraph {
			reason: "point feature missing integer id".into(),
		})?;
		let kind_str = prop_str(props, "type").unwrap_or("junction");
		if kind_str == "lot" && invalid_lots.contains(&raw_id) {
			continue;
		}
		let kind = match kind_str {
			"high-peak" => VertexKind::Peak {
				code: prop_str(props, "code").unwrap_or_default().to_string(),
			},
			"trailhead" => VertexKind::Trailhead,
			"lot" => VertexKind::Lot,
			_ => VertexKind::Junction,
		};
		let id = VertexId(vertices.len() as u32);
		raw_id_to_vertex.insert(raw_id, id);
		if let VertexKind::Peak { code } = &kind {
			if !code.is_empty() {
				peak_code_to_vertex.insert(code.clone(), id);
			}
		}
		vertices.push(Vertex {
			id,
			kind,
			point: (coords[0], coords[1]),
			name: prop_str(props, "name").map(str::to_string),
		});
	}

	let mut edges = Vec::new();
	for feature in &fc.features {
		let Some(geometry) = &feature.geometry else { continue };
		let GeomValue::LineString(coords) = &geometry.value else { continue };
		let props = feature.properties.as_ref();
		let nodes = prop_u64_array(props, "nodes").ok_or_else(|| HikeError::MalformedGraph {
			reason: "line feature missing integer nodes array".into(),
		})?;
		if nodes.len() < 2 {
			return Err(HikeError::MalformedGraph { reason: "line feature nodes array too short".into() });
		}
		let (raw_a, raw_b) = (nodes[0], *nodes.last().unwrap());
		if tossed.contains(&(raw_a, raw_b)) {
			continue;
		}
		let Some(&a) = raw_id_to_vertex.get(&raw_a) else { continue };
		let Some(&b) = raw_id_to_vertex.get(&raw_b) else { continue };

		// d_km is normally supplied; fall back to summing haversine
		// distance along the polyline for features that omit it.
		let d_km = match prop_f64(props, "d_km") {
			Some(d) => d,
			None => polyline_length_km(coords),
		};
		let gain_m = prop_f64(props, "ele_gain").unwrap_or(0.0);
		let loss_m = prop_f64(props, "ele_loss").unwrap_or(0.0);
		let road_name = prop_str(props, "name");
		let line_kind = prop_str(props, "type").unwrap_or("trail");

		// A plain "road" way is only part of the hiking graph if the
		// region spec explicitly promotes it (spec.md §6
		// `roads_that_are_trails`); everything else defaults to a Trail.
		if line_kind == "road" && !road_name.map_or(false, |n| region.is_trail_road(n)) {
			continue;
		}
		let kind = if line_kind == "lot-walk" {
			EdgeKind::LotWalk { valid: !disallowed_walks.contains(&(raw_a, raw_b)) }
		} else {
			EdgeKind::Trail
		};

		edges.push(EdgeData {
			a,
			b,
			length_km: d_km,
			gain_m,
			loss_m,
			kind,
			polyline: coords.iter().map(|p| (p[0], p[1])).collect(),
		});
	}

	let graph = Graph::new(vertices, edges)?;
	Ok(GraphBuild { graph, peak_code_to_vertex, raw_id_to_vertex })
}

fn polyline_length_km(coords: &[Vec<f64>]) -> f64 {
	coords
		.windows(2)
		.map(|w| distance_km(w[0][0], w[0][1], w[1][0], w[1][1]))
		.sum()
}

fn prop_str<'a>(props: Option<&'a ::geojson::JsonObject>, key: &str) -> Option<&'a str> {
	props.and_then(|p| p.get(key)).and_then(JsonValue::as_str)
}

fn prop_f64(props: Option<&::geojson::JsonObject>, key: &str) -> Option<f64> {
	props.and_then(|p| p.get(key)).and_then(JsonValue::as_f64)
}

fn prop_u64(props: Option<&::geojson::JsonObject>, key: &str) -> Option<u64> {
	props.and_then(|p| p.get(key)).and_then(JsonValue::as_u64)
}

fn prop_u64_array(props: Option<&::geojson::JsonObject>, key: &str) -> Option<Vec<u64>> {
	props
		.and_then(|p| p.get(key))
		.and_then(JsonValue::as_array)
		.map(|arr| arr.iter().filter_map(JsonValue::as_u64).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builds_a_graph_from_a_minimal_feature_collection() {
		let text = r#"{
			"type": "FeatureCollection",
			"features": [
				{"type": "Feature", "properties": {"id": 1, "type": "high-peak", "code": "S", "name": "Slide"}, "geometry": {"type": "Point", "coordinates": [-74.39, 42.0]}},
				{"type": "Feature", "properties": {"id": 2, "type": "trailhead"}, "geometry": {"type": "Point", "coordinates": [-74.40, 42.0]}},
				{"type": "Feature", "properties": {"id": 3, "type": "lot"}, "geometry": {"type": "Point", "coordinates": [-74.41, 42.0]}},
				{"type": "Feature", "properties": {"d_km": 1.5, "ele_gain": 100.0, "ele_loss": 0.0, "nodes": [2, 1]}, "geometry": {"type": "LineString", "coordinates": [[-74.40, 42.0], [-74.39, 42.0]]}},
				{"type": "Feature", "properties": {"d_km": 0.2, "type": "lot-walk", "nodes": [3, 2]}, "geometry": {"type": "LineString", "coordinates": [[-74.41, 42.0], [-74.40, 42.0]]}}
			]
		}"#;
		let region = RegionSpec::default();
		let build = build_graph(text, &region).unwrap();
		assert_eq!(build.graph.peaks().count(), 1);
		assert_eq!(build.graph.lots().count(), 1);
		assert!(build.peak_code_to_vertex.contains_key("S"));
	}

	#[test]
	fn missing_d_km_falls_back_to_the_polyline_length() {
		let text = r#"{
			"type": "FeatureCollection",
			"features": [
				{"type": "Feature", "properties": {"id": 1, "type": "high-peak", "code": "S"}, "geometry": {"type": "Point", "coordinates": [-74.39, 42.0]}},
				{"type": "Feature", "properties": {"id": 2, "type": "trailhead"}, "geometry": {"type": "Point", "coordinates": [-74.40, 42.0]}},
				{"type": "Feature", "properties": {"nodes": [2, 1]}, "geometry": {"type": "LineString", "coordinates": [[-74.40, 42.0], [-74.39, 42.0]]}}
			]
		}"#;
		let region = RegionSpec::default();
		let build = build_graph(text, &region).unwrap();
		let d_km = build.graph.edge(0).length_km;
		assert!(d_km > 0.0 && d_km < 1.0, "unexpected fallback distance {d_km}");
	}

	#[test]
	fn invalid_parking_id_drops_the_lot_and_its_edges() {
		let text = r#"{
			"type": "FeatureCollection",
			"features": [
				{"type": "Feature", "properties": {"id": 1, "type": "high-peak", "code": "S"}, "geometry": {"type": "Point", "coordinates": [-74.39, 42.0]}},
				{"type": "Feature", "properties": {"id": 3, "type": "lot"}, "geometry": {"type": "Point", "coordinates": [-74.41, 42.0]}},
				{"type": "Feature", "properties": {"d_km": 0.2, "type": "lot-walk", "nodes": [3, 1]}, "geometry": {"type": "LineString", "coordinates": [[-74.41, 42.0], [-74.39, 42.0]]}}
			]
		}"#;
		let region = RegionSpec { invalid_parking_ids: vec![3], ..Default::default() };
		let build = build_graph(text, &region).unwrap();
		assert_eq!(build.graph.lots().count(), 0);
	}
}
