use std::fs;
use std::process;

use clap::{crate_version, App, Arg, SubCommand};

use hiketrace::cover::CoverConfig;
use hiketrace::error::HikeError;
use hiketrace::geojson;
use hiketrace::plan;
use hiketrace::region::RegionSpec;

const MI_PER_KM: f64 = 0.621371;

fn main() {
	env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

	let cover_flags = |cmd: App<'static, 'static>| -> App<'static, 'static> {
		cmd.arg(
			Arg::with_name("max-iterations")
				.long("max-iterations")
				.takes_value(true)
				.help("Cap on outer Lagrangian passes (default 200)"),
		)
		.arg(
			Arg::with_name("max-day-hike-mi")
				.long("max-day-hike-mi")
				.takes_value(true)
				.help("Drop hikes longer than this many miles before solving"),
		)
		.arg(
			Arg::with_name("non-loop-penalty-km")
				.long("non-loop-penalty-km")
				.takes_value(true)
				.help("Added to a through-hike's cost to bias selection toward loops"),
		)
		.arg(Arg::with_name("loops-only").long("loops-only").help("Drop through-hikes before solving"))
	};

	let matches = App::new("hiketrace")
		.version(crate_version!())
		.about("Plans minimum-distance sets of hikes covering a region's high peaks")
		.subcommand(
			SubCommand::with_name("build-hikes")
				.about("Build the candidate hike list from a network and region spec")
				.arg(Arg::with_name("graph").takes_value(true).required(true).index(1).help("Graph GeoJSON"))
				.arg(Arg::with_name("region").takes_value(true).required(true).index(2).help("Region spec JSON"))
				.arg(Arg::with_name("output").takes_value(true).required(true).index(3).help("Output hike list JSON")),
		)
		.subcommand(
			SubCommand::with_name("add-elevation")
				.about("Attach elevation gain and the full node chain to a hike list")
				.arg(Arg::with_name("graph").takes_value(true).required(true).index(1).help("Graph GeoJSON"))
				.arg(Arg::with_name("hikes").takes_value(true).required(true).index(2).help("Hike list JSON"))
				.arg(Arg::with_name("output").takes_value(true).required(true).index(3).help("Output hike list JSON")),
		)
		.subcommand(cover_flags(
			SubCommand::with_name("cover")
				.about("Solve set cover over an elevation-annotated hike list")
				.arg(Arg::with_name("graph").takes_value(true).required(true).index(1).help("Graph GeoJSON"))
				.arg(Arg::with_name("region").takes_value(true).required(true).index(2).help("Region spec JSON"))
				.arg(Arg::with_name("hikes").takes_value(true).required(true).index(3).help("Elevation-annotated hike list JSON"))
				.arg(Arg::with_name("output").takes_value(true).required(true).index(4).help("Output plan JSON")),
		))
		.subcommand(cover_flags(
			SubCommand::with_name("plan")
				.about("Run build-hikes, add-elevation, and cover in one pass")
				.arg(Arg::with_name("graph").takes_value(true).required(true).index(1).help("Graph GeoJSON"))
				.arg(Arg::with_name("region").takes_value(true).required(true).index(2).help("Region spec JSON"))
				.arg(Arg::with_name("output").takes_value(true).required(true).index(3).help("Output plan JSON")),
		))
		.get_matches();

	let result = if let Some(m) = matches.subcommand_matches("build-hikes") {
		run_build_hikes(m)
	} else if let Some(m) = matches.subcommand_matches("add-elevation") {
		run_add_elevation(m)
	} else if let Some(m) = matches.subcommand_matches("cover") {
		run_cover(m)
	} else if let Some(m) = matches.subcommand_matches("plan") {
		run_plan(m)
	} else {
		eprintln!("no subcommand given; run with --help for usage");
		process::exit(1);
	};

	if let Err(e) = result {
		eprintln!("error: {e}");
		process::exit(exit_code_for(&e));
	}
}

fn exit_code_for(e: &HikeError) -> i32 {
	match e {
		HikeError::InfeasibleCover { .. } => 2,
		_ => 1,
	}
}

fn read_region(path: &str) -> Result<RegionSpec, HikeError> {
	let text = fs::read_to_string(path)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("could not read {path}: {err}") })?;
	serde_json::from_str(&text)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("invalid region spec {path}: {err}") })
}

fn read_text(path: &str) -> Result<String, HikeError> {
	fs::read_to_string(path).map_err(|err| HikeError::MalformedGraph { reason: format!("could not read {path}: {err}") })
}

fn write_json(path: &str, value: &serde_json::Value) -> Result<(), HikeError> {
	let file = fs::File::create(path)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("could not create {path}: {err}") })?;
	serde_json::to_writer_pretty(file, value)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("could not write {path}: {err}") })
}

fn cover_config_from(matches: &clap::ArgMatches) -> Result<CoverConfig, HikeError> {
	let parse_num = |name: &str| -> Result<Option<f64>, HikeError> {
		matches
			.value_of(name)
			.map(|s| {
				s.parse::<f64>()
					.map_err(|_| HikeError::MalformedGraph { reason: format!("--{name} must be a number") })
			})
			.transpose()
	};
	let max_iterations = match matches.value_of("max-iterations") {
		Some(s) => s
			.parse::<usize>()
			.map_err(|_| HikeError::MalformedGraph { reason: "--max-iterations must be a non-negative integer".into() })?,
		None => CoverConfig::default().max_iterations,
	};
	let max_hike_km = parse_num("max-day-hike-mi")?.map(|mi| mi / MI_PER_KM);
	let non_loop_penalty_km = parse_num("non-loop-penalty-km")?.unwrap_or(0.0);
	Ok(CoverConfig {
		max_iterations,
		non_loop_penalty_km,
		max_hike_km,
		loops_only: matches.is_present("loops-only"),
	})
}

fn log_diagnostics(diagnostics: &[HikeError]) {
	for d in diagnostics {
		log::warn!("{d}");
	}
}

fn run_build_hikes(matches: &clap::ArgMatches) -> Result<(), HikeError> {
	let region = read_region(matches.value_of("region").unwrap())?;
	let graph_text = read_text(matches.value_of("graph").unwrap())?;
	let build = geojson::build_graph(&graph_text, &region)?;
	log::info!("loaded graph: {} vertices", build.graph.vertices().count());

	let required = plan::required_peaks_from_graph(&build.graph, &region);
	let forced = resolve_forced_clusters(&build, &region)?;
	let (hikes, diagnostics) = plan::build_all_hikes(&build.graph, &required, &forced, hiketrace::sequence::DEFAULT_MAX_LENGTH);
	log_diagnostics(&diagnostics);

	write_json(matches.value_of("output").unwrap(), &plan::hike_list_json(&hikes))
}

fn run_add_elevation(matches: &clap::ArgMatches) -> Result<(), HikeError> {
	let graph_text = read_text(matches.value_of("graph").unwrap())?;
	let build = geojson::build_graph(&graph_text, &RegionSpec::default())?;

	let hikes_text = read_text(matches.value_of("hikes").unwrap())?;
	let hikes_json: serde_json::Value = serde_json::from_str(&hikes_text)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("invalid hike list: {err}") })?;
	let hikes = plan::parse_hike_list(&build.graph, &hikes_json)?;
	log::info!("annotating {} hike(s) with elevation", hikes.len());

	let annotated = plan::add_elevation(&build.graph, &hikes);
	write_json(matches.value_of("output").unwrap(), &plan::annotated_hike_list_json(&annotated))
}

fn run_cover(matches: &clap::ArgMatches) -> Result<(), HikeError> {
	let region = read_region(matches.value_of("region").unwrap())?;
	let graph_text = read_text(matches.value_of("graph").unwrap())?;
	let build = geojson::build_graph(&graph_text, &region)?;
	let required = plan::required_peaks_from_graph(&build.graph, &region);

	let hikes_text = read_text(matches.value_of("hikes").unwrap())?;
	let hikes_json: serde_json::Value = serde_json::from_str(&hikes_text)
		.map_err(|err| HikeError::MalformedGraph { reason: format!("invalid hike list: {err}") })?;
	let annotated = parse_annotated_hike_list(&build.graph, &hikes_json)?;

	let config = cover_config_from(matches)?;
	let solved = plan::solve_cover(&annotated, &required, &config)?;
	log::info!("cover solved: {} hike(s), {:.2} total km", solved.hikes.len(), solved.total_d_km);

	write_json(matches.value_of("output").unwrap(), &plan::plan_output_json(&build.graph, &solved)?)
}

fn run_plan(matches: &clap::ArgMatches) -> Result<(), HikeError> {
	let region = read_region(matches.value_of("region").unwrap())?;
	let graph_text = read_text(matches.value_of("graph").unwrap())?;
	let build = geojson::build_graph(&graph_text, &region)?;
	let required = plan::required_peaks_from_graph(&build.graph, &region);
	let forced = resolve_forced_clusters(&build, &region)?;

	let config = cover_config_from(matches)?;
	let (solved, diagnostics) = plan::run_plan(
		&build.graph,
		&required,
		&forced,
		hiketrace::sequence::DEFAULT_MAX_LENGTH,
		&config,
	);
	log_diagnostics(&diagnostics);
	let solved = solved?;
	log::info!("plan solved: {} hike(s), {:.2} total km", solved.hikes.len(), solved.total_d_km);

	write_json(matches.value_of("output").unwrap(), &plan::plan_output_json(&build.graph, &solved)?)
}

fn resolve_forced_clusters(
	build: &geojson::GraphBuild,
	region: &RegionSpec,
) -> Result<Vec<Vec<hiketrace::graph::VertexId>>, HikeError> {
	region
		.forced_clusters
		.iter()
		.map(|codes| plan::required_peaks_from_codes(build, codes))
		.collect()
}

fn parse_annotated_hike_list(
	graph: &hiketrace::graph::Graph,
	value: &serde_json::Value,
) -> Result<Vec<hiketrace::elevation::AnnotatedHike>, HikeError> {
	// An elevation-annotated hike list carries the same [d_km, ele_gain_m,
	// nodes] shape as the pre-elevation one; re-deriving peaks/lots and
	// edges from the full node chain just means running `add_elevation`'s
	// own leg resolution isn't necessary here, since the chain already
	// names every intermediate vertex.
	let entries = value
		.as_array()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list must be a JSON array".into() })?;
	entries
		.iter()
		.map(|entry| parse_annotated_hike_entry(graph, entry))
		.collect()
}

fn parse_annotated_hike_entry(
	graph: &hiketrace::graph::Graph,
	entry: &serde_json::Value,
) -> Result<hiketrace::elevation::AnnotatedHike, HikeError> {
	let arr = entry
		.as_array()
		.filter(|a| a.len() == 3)
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry must be [d_km, ele_gain_m, nodes]".into() })?;
	let d_km = arr[0]
		.as_f64()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry d_km must be a number".into() })?;
	let ele_gain_m = arr[1]
		.as_i64()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry ele_gain_m must be an integer".into() })?;
	let node_ids = arr[2]
		.as_array()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list entry nodes must be an array".into() })?;
	if node_ids.len() < 2 {
		return Err(HikeError::MalformedGraph { reason: "hike list entry needs at least two stops".into() });
	}
	let node_chain: Vec<hiketrace::graph::VertexId> = node_ids
		.iter()
		.map(|v| v.as_u64().map(|n| hiketrace::graph::VertexId(n as u32)))
		.collect::<Option<_>>()
		.ok_or_else(|| HikeError::MalformedGraph { reason: "hike list node id must be a non-negative integer".into() })?;

	let start_lot = node_chain[0];
	let end_lot = *node_chain.last().unwrap();
	let peaks: Vec<hiketrace::graph::VertexId> = node_chain[1..node_chain.len() - 1]
		.iter()
		.copied()
		.filter(|&v| graph.vertex(v).map(|vx| vx.kind.is_peak()).unwrap_or(false))
		.collect();

	let mut edge_chain = Vec::with_capacity(node_chain.len() - 1);
	for w in node_chain.windows(2) {
		let (a, b) = (w[0], w[1]);
		let eidx = graph
			.edges_of(a)
			.iter()
			.copied()
			.find(|&e| graph.edge(e).other(a) == b)
			.ok_or_else(|| HikeError::MalformedGraph { reason: format!("no edge between {a} and {b} in hike list") })?;
		edge_chain.push(eidx);
	}

	Ok(hiketrace::elevation::AnnotatedHike {
		d_km,
		ele_gain_m,
		peaks,
		start_lot,
		end_lot,
		node_chain,
		edge_chain,
	})
}
