//! C7: output assembler (spec.md §4.7).
//!
//! Resolves a chosen plan's hikes into a GeoJSON `FeatureCollection`:
//! peak and lot point features, plus one `MultiLineString` per hike whose
//! segments are the underlying edges' polylines, each oriented so its
//! first point matches the vertex the hike actually departs from, so the
//! geometry is monotonically traversed. Orientation here is a plain
//! endpoint-id comparison rather than coordinate matching, since
//! `EdgeData` already knows which end is `a` and which is `b`.

use std::collections::BTreeMap;

use ::geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value as GeomValue};
use serde_json::{Map, Value};

use crate::cover::Plan;
use crate::elevation::AnnotatedHike;
use crate::graph::{Graph, VertexId};

const MI_PER_KM: f64 = 0.621371;
const FT_PER_M: f64 = 3.28084;

/// Builds the plan output feature collection described in spec.md §6.
pub fn assemble_plan(graph: &Graph, plan: &Plan) -> FeatureCollection {
	let mut peak_ids: BTreeMap<u32, VertexId> = BTreeMap::new();
	let mut lot_ids: BTreeMap<u32, VertexId> = BTreeMap::new();
	for hike in &plan.hikes {
		for &p in &hike.peaks {
			peak_ids.insert(p.0, p);
		}
		lot_ids.insert(hike.start_lot.0, hike.start_lot);
		lot_ids.insert(hike.end_lot.0, hike.end_lot);
	}

	let mut features = Vec::new();
	for &id in peak_ids.values() {
		features.push(point_feature(graph, id));
	}
	for &id in lot_ids.values() {
		features.push(point_feature(graph, id));
	}
	for hike in &plan.hikes {
		features.push(hike_feature(graph, hike));
	}

	FeatureCollection { bbox: None, features, foreign_members: None }
}

fn point_feature(graph: &Graph, id: VertexId) -> Feature {
	let vertex = graph.vertex(id).expect("plan references a vertex not in the graph");
	let mut properties = JsonObject::new();
	if let Some(name) = &vertex.name {
		properties.insert("name".to_string(), Value::String(name.clone()));
	}
	Feature {
		bbox: None,
		geometry: Some(Geometry::new(GeomValue::Point(vec![vertex.point.0, vertex.point.1]))),
		id: None,
		properties: Some(properties),
		foreign_members: None,
	}
}

fn hike_feature(graph: &Graph, hike: &AnnotatedHike) -> Feature {
	let mut coordinates = Vec::new();
	let mut cur = hike.start_lot;
	for &eidx in &hike.edge_chain {
		let e = graph.edge(eidx);
		let segment = orient_polyline(e, cur);
		coordinates.push(segment);
		cur = e.other(cur);
	}

	let peak_names: Vec<Value> = hike
		.peaks
		.iter()
		.map(|&p| {
			let name = graph
				.vertex(p)
				.ok()
				.and_then(|v| v.name.clone())
				.unwrap_or_else(|| p.to_string());
			Value::String(name)
		})
		.collect();
	let node_ids: Vec<Value> = hike.node_chain.iter().map(|v| Value::from(v.0)).collect();

	let mut properties = Map::new();
	properties.insert("d_km".to_string(), json_round(hike.d_km, 3));
	properties.insert("d_mi".to_string(), json_round(hike.d_km * MI_PER_KM, 3));
	properties.insert("ele_m".to_string(), Value::from(hike.ele_gain_m));
	properties.insert("ele_ft".to_string(), Value::from((hike.ele_gain_m as f64 * FT_PER_M).round() as i64));
	properties.insert("peaks".to_string(), Value::Array(peak_names));
	properties.insert("nodes".to_string(), Value::Array(node_ids));

	Feature {
		bbox: None,
		geometry: Some(Geometry::new(GeomValue::MultiLineString(coordinates))),
		id: None,
		properties: Some(properties),
		foreign_members: None,
	}
}

fn orient_polyline(edge: &crate::graph::EdgeData, from: VertexId) -> Vec<Vec<f64>> {
	let points: Vec<Vec<f64>> = edge.polyline.iter().map(|&(lon, lat)| vec![lon, lat]).collect();
	if from == edge.a {
		points
	} else {
		points.into_iter().rev().collect()
	}
}

fn json_round(value: f64, decimals: i32) -> Value {
	let factor = 10f64.powi(decimals);
	Value::from((value * factor).round() / factor)
}
