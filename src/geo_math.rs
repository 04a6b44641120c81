//! Great-circle distance between two (lon, lat) points.
//!
//! Design note §9: the choice between haversine and a linearized
//! meters-per-degree approximation is a build-time choice (the
//! `linearized-distance` Cargo feature), not a runtime toggle, so that a
//! single binary always produces the same results.

const EARTH_RADIUS_KM: f64 = 6371.0;

// Meters-per-degree at the Catskills' centroid; good to better than 0.3%
// error within the region.
#[cfg(feature = "linearized-distance")]
const M_PER_LNG: f64 = 82526.71005845172;
#[cfg(feature = "linearized-distance")]
const M_PER_LAT: f64 = 111194.9266445589;

#[cfg(not(feature = "linearized-distance"))]
pub fn distance_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
	let (lon1, lat1, lon2, lat2) = (
		lon1.to_radians(),
		lat1.to_radians(),
		lon2.to_radians(),
		lat2.to_radians(),
	);
	let dlon = lon2 - lon1;
	let dlat = lat2 - lat1;
	let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
	let c = 2.0 * a.sqrt().asin();
	c * EARTH_RADIUS_KM
}

#[cfg(feature = "linearized-distance")]
pub fn distance_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
	0.001 * (((lon2 - lon1) * M_PER_LNG).powi(2) + ((lat2 - lat1) * M_PER_LAT).powi(2)).sqrt()
}
