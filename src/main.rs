//! flow-atlas CLI
//!
//! Build flow graphs and corridor statistics from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Build a Sankey-ready graph from an edge list
//! flow-atlas graph --input edges.json --top-k 10
//!
//! # Dashboard statistics for a record file
//! flow-atlas stats --input records.json --start 2020-01 --end 2021-12 --granularity quarterly
//!
//! # Generate a synthetic record file
//! flow-atlas generate --entities 12 --months 36 --output records.json
//! ```

use flow_atlas::aggregation::engine::{AggregationEngine, DashboardRequest};
use flow_atlas::aggregation::source::InMemoryFlowSource;
use flow_atlas::aggregation::stats::{
    growth_rates, net_flows, rank_corridors_by_year, rolling_average, trend_slopes,
};
use flow_atlas::config::ExplorerConfig;
use flow_atlas::core::entity::CatalogEntry;
use flow_atlas::core::filter::{normalize_with, RawFilterInput};
use flow_atlas::core::flow::{CorridorKey, FlowRecord, FlowRecordSet};
use flow_atlas::graph::flow_graph::{build_graph, AggregatedEdge, GraphOutcome};
use flow_atlas::simulation::generator::{generate_dataset, DatasetConfig};
use std::fs;
use std::process;
use std::sync::Arc;

fn print_usage() {
    eprintln!(
        r#"flow-atlas — migration corridor aggregation and flow graphs

USAGE:
    flow-atlas <COMMAND> [OPTIONS]

COMMANDS:
    graph       Build a netted, acyclic flow graph from an edge list
    stats       Compute dashboard statistics for a record file
    generate    Generate a synthetic record file (for testing)
    help        Show this message

OPTIONS (all commands):
    --config <FILE>         JSON file overriding explorer defaults

OPTIONS (graph):
    --input <FILE>          Path to JSON edges file
    --top-k <N>             Number of edges to keep (default from config)
    --format <FORMAT>       Output format: text (default) or json

OPTIONS (stats):
    --input <FILE>          Path to JSON records file
    --start <DATE>          Period start, YYYY-MM or YYYY-MM-DD
    --end <DATE>            Period end, YYYY-MM or YYYY-MM-DD
    --granularity <G>       monthly (default), quarterly or yearly
    --min-flow <N>          Smallest record count to include
    --max-flow <N>          Largest record count to include, or no_limit
    --region <NAME>         Restrict to a region (repeatable)
    --exclude <CODE>        Exclude a country (repeatable)
    --limit <N>             Number of corridors to rank (default from config)
    --format <FORMAT>       Output format: text (default) or json

OPTIONS (generate):
    --entities <N>          Number of entities (default: 10)
    --regions <N>           Number of regions (default: 3)
    --months <N>            Number of months from 2019-01 (default: 48)
    --seed <N>              Random seed for reproducible output
    --output <FILE>         Write to file instead of stdout

EXAMPLES:
    flow-atlas graph --input edges.json --top-k 5
    flow-atlas stats --input records.json --granularity yearly --format json
    flow-atlas generate --entities 20 --months 24 --seed 7 --output records.json"#
    );
}

/// JSON schema for the graph command.
#[derive(serde::Deserialize)]
struct EdgesFile {
    edges: Vec<AggregatedEdge>,
}

/// JSON schema for record files, as read by `stats` and written by
/// `generate`.
#[derive(serde::Deserialize, serde::Serialize)]
struct RecordsFile {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    records: Vec<FlowRecord>,
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    })
}

fn load_config(path: Option<&str>) -> ExplorerConfig {
    match path {
        Some(path) => ExplorerConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => ExplorerConfig::default(),
    }
}

fn load_edges(path: &str) -> Vec<AggregatedEdge> {
    let file: EdgesFile = serde_json::from_str(&read_file(path)).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "edges": [
    {{ "source": "Venezuela", "target": "Colombia", "value": "1200" }}
  ]
}}"#
        );
        process::exit(1);
    });
    file.edges
}

fn load_records(path: &str) -> RecordsFile {
    serde_json::from_str(&read_file(path)).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "catalog": [
    {{ "code": "VE", "display_name": "Venezuela", "region": "South America" }}
  ],
  "records": [
    {{ "origin": "VE", "destination": "CO", "month": "2020-01", "count": 1200 }}
  ]
}}"#
        );
        process::exit(1);
    })
}

/// Value following the flag at `args[*i]`; advances `i` past it.
fn take_value(args: &[String], i: &mut usize, hint: &str) -> String {
    let flag = &args[*i];
    *i += 1;
    args.get(*i).cloned().unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, hint);
        process::exit(1);
    })
}

fn take_number<T: std::str::FromStr>(args: &[String], i: &mut usize) -> T {
    let flag = args[*i].clone();
    take_value(args, i, "a number")
        .parse()
        .unwrap_or_else(|_| {
            eprintln!("{} requires a number", flag);
            process::exit(1);
        })
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

fn print_outcome(outcome: &GraphOutcome) {
    match outcome {
        GraphOutcome::Graph(graph) => {
            println!(
                "Flow graph: {} nodes, {} edges",
                graph.node_count(),
                graph.edge_count()
            );
            for edge in graph.edges() {
                println!("  {} → {}: {}", edge.source, edge.target, edge.value);
            }
            println!("Total flow: {}", graph.total_flow());
        }
        GraphOutcome::CycleDetected(report) => {
            println!("{}", report);
            for (i, component) in report.components.iter().enumerate() {
                let names: Vec<&str> = component.iter().map(|n| n.as_str()).collect();
                println!("  Circular group {}: {}", i, names.join(", "));
            }
        }
    }
}

fn cmd_graph(args: &[String]) {
    let mut input_path = None;
    let mut config_path = None;
    let mut top_k: Option<usize> = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input_path = Some(take_value(args, &mut i, "a file path")),
            "--config" => config_path = Some(take_value(args, &mut i, "a file path")),
            "--top-k" => top_k = Some(take_number(args, &mut i)),
            "--format" => format = take_value(args, &mut i, "'text' or 'json'"),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });
    let config = load_config(config_path.as_deref());

    let edges = load_edges(&path);
    let outcome = build_graph(&edges, top_k.unwrap_or(config.default_top_k));

    if format == "json" {
        println!("{}", to_json(&outcome));
    } else {
        print_outcome(&outcome);
    }
}

async fn cmd_stats(args: &[String]) {
    let mut input_path = None;
    let mut config_path = None;
    let mut raw = RawFilterInput::default();
    let mut limit: Option<usize> = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => input_path = Some(take_value(args, &mut i, "a file path")),
            "--config" => config_path = Some(take_value(args, &mut i, "a file path")),
            "--start" => raw.period_start = Some(take_value(args, &mut i, "a date")),
            "--end" => raw.period_end = Some(take_value(args, &mut i, "a date")),
            "--granularity" => {
                raw.granularity = Some(take_value(args, &mut i, "a granularity"))
            }
            "--min-flow" => raw.min_flow = Some(take_value(args, &mut i, "a number")),
            "--max-flow" => raw.max_flow = Some(take_value(args, &mut i, "a number")),
            "--region" => raw
                .include_regions
                .get_or_insert_with(Vec::new)
                .push(take_value(args, &mut i, "a region name")),
            "--exclude" => raw
                .exclude_countries
                .get_or_insert_with(Vec::new)
                .push(take_value(args, &mut i, "a country code")),
            "--limit" => limit = Some(take_number(args, &mut i)),
            "--format" => format = take_value(args, &mut i, "'text' or 'json'"),
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });
    let config = load_config(config_path.as_deref());

    let normalized = normalize_with(&raw, &config);
    for issue in &normalized.issues {
        eprintln!("Warning: {}", issue);
    }
    let descriptor = normalized.descriptor;

    let file = load_records(&path);
    let records: FlowRecordSet = file.records.into_iter().collect();
    let engine = AggregationEngine::new(Arc::new(InMemoryFlowSource::new(records, file.catalog)));
    let catalog = engine.entity_catalog().await.into_data();

    let corridor_limit = limit.unwrap_or(config.default_corridor_limit);
    let dashboard = engine
        .dashboard(&descriptor, &DashboardRequest::new(corridor_limit))
        .await;

    if format == "json" {
        println!("{}", to_json(&dashboard));
        return;
    }

    let summary = &dashboard.summary.data;
    println!(
        "Period:               {} to {} ({})",
        descriptor.period_start(),
        descriptor.period_end(),
        descriptor.granularity()
    );
    println!("Total flow:           {}", summary.total_flow);
    println!("Corridors:            {}", summary.unique_corridor_count);
    println!("Active periods:       {}", summary.active_period_count);
    println!("Average per period:   {}", summary.average_per_period.round_dp(2));

    println!("\nPeriod totals:");
    for row in &dashboard.period_totals.data {
        println!("  {:<10} {}", row.period.to_string(), row.total);
    }

    println!("\nTop corridors:");
    for (rank, row) in dashboard.top_corridors.data.iter().enumerate() {
        println!(
            "  {:>2}. {} → {}: {}",
            rank + 1,
            catalog.display_name(&row.origin),
            catalog.display_name(&row.destination),
            row.total
        );
    }

    println!("\nSeasonal pattern:");
    for row in &dashboard.seasonal_pattern.data {
        println!(
            "  {:<6} avg {:>12}  max {:>10}  min {:>10}",
            row.period_label,
            row.average.round_dp(2),
            row.max,
            row.min
        );
    }

    println!("\nMost volatile corridors:");
    for row in &dashboard.volatility.data {
        println!(
            "  {}: mean {:.1}, std dev {:.1}, cv {:.3}",
            row.corridor, row.mean, row.std_dev, row.coefficient_of_variation
        );
    }

    let netting = net_flows(&dashboard.top_corridors.data, &catalog);
    println!(
        "\nNet flows ({} gross, {} net):",
        netting.gross_total, netting.net_total
    );
    for edge in &netting.edges {
        println!("  {} → {}: {}", edge.source, edge.target, edge.value);
    }

    let leading: Vec<CorridorKey> = dashboard
        .top_corridors
        .data
        .iter()
        .take(3)
        .map(|row| row.key())
        .collect();
    let series = engine
        .corridor_time_series(&leading, &descriptor)
        .await
        .into_data();
    if !series.is_empty() {
        println!("\nLeading corridor trends:");
        for trend in trend_slopes(&series, config.trend_window) {
            let slope = trend
                .slope
                .map(|v| format!("{:+.1} per period", v))
                .unwrap_or_else(|| format!("needs {} points", config.trend_window));
            println!("  {} ({} points): {}", trend.corridor, trend.points, slope);
        }

        let short = rolling_average(&series, config.rolling_window);
        let long = rolling_average(&series, config.long_rolling_window);
        let growth = growth_rates(&series);
        let dash = || "-".to_string();
        for ((s, l), g) in short.iter().zip(&long).zip(&growth) {
            let short_avg = s.rolling.map(|v| v.round_dp(1).to_string()).unwrap_or_else(dash);
            let long_avg = l.rolling.map(|v| v.round_dp(1).to_string()).unwrap_or_else(dash);
            let change = g
                .growth_percent
                .map(|v| format!("{}%", v.round_dp(1)))
                .unwrap_or_else(dash);
            let velocity = g
                .growth_velocity
                .map(|v| format!("{}pp", v.round_dp(1)))
                .unwrap_or_else(dash);
            println!(
                "  {} {:<8} {:>10}  avg{} {:>10}  avg{} {:>10}  change {:>8}  velocity {:>8}",
                s.corridor,
                s.period.to_string(),
                s.value,
                config.rolling_window,
                short_avg,
                config.long_rolling_window,
                long_avg,
                change,
                velocity
            );
        }
    }

    let matching: Vec<&FlowRecord> = engine
        .source()
        .records()
        .records()
        .iter()
        .filter(|r| descriptor.matches(r, &catalog))
        .collect();
    let rankings = rank_corridors_by_year(&matching);
    if !rankings.is_empty() {
        println!("\nLeading corridors by year:");
        for row in rankings.iter().filter(|r| r.rank <= 3) {
            println!(
                "  {} #{} {} → {}: {} (p{:.0})",
                row.year,
                row.rank,
                catalog.display_name(&row.origin),
                catalog.display_name(&row.destination),
                row.total,
                row.percentile
            );
        }
    }

    if !dashboard.is_complete() {
        eprintln!("Warning: {} panel(s) failed", dashboard.failed_panels());
    }
}

fn cmd_generate(args: &[String]) {
    let mut config = DatasetConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--entities" => config.entity_count = take_number(args, &mut i),
            "--regions" => config.region_count = take_number(args, &mut i),
            "--months" => config.months = take_number(args, &mut i),
            "--seed" => config.seed = Some(take_number(args, &mut i)),
            "--output" => output_path = Some(take_value(args, &mut i, "a file path")),
            // Generated months start at the configured dataset start.
            "--config" => {
                let path = take_value(args, &mut i, "a file path");
                config.start = load_config(Some(&path)).dataset_start;
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let dataset = generate_dataset(&config);
    let output = RecordsFile {
        catalog: dataset.catalog,
        records: dataset.records.records().to_vec(),
    };
    let json = to_json(&output);

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} records across {} entities → {}",
            output.records.len(),
            config.entity_count,
            path
        );
    } else {
        println!("{}", json);
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "graph" => cmd_graph(rest),
        "stats" => cmd_stats(rest).await,
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
