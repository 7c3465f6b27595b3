//! bjdb - command line front end for the block-join index
//!
//! Usage:
//!   bjdb demo
//!   bjdb query --data blocks.jsonl --child color=blue --child size=small \
//!        [--parent name=wolf] [--score-mode avg] [--limit 10] [--children] [--json]
//!   bjdb stats --data blocks.jsonl
//!
//! Logging goes to stderr; set RUST_LOG (e.g. `RUST_LOG=bjdb=debug`) for
//! per-commit and per-query detail.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use bjdb::flatten::{flatten_block, prefix_predicate, DEFAULT_CHILD_PREFIX};
use bjdb::ingest::{load_blocks, parse_blocks};
use bjdb::{
    BlockDocument, BlockJoinIndex, BlockJoinQuery, IndexConfig, ParentMarker, Position,
    Predicate, Record, ScoreMode, Snapshot,
};

const DEMO_DATA: &str = include_str!("../../data/shirts.jsonl");

#[derive(Parser, Debug)]
#[command(name = "bjdb", version, about = "Parent/child block-join index")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Index configuration shared by every subcommand.
#[derive(Args, Debug)]
struct GlobalArgs {
    /// JSON index configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Field/value pair identifying parent records (overrides config).
    #[arg(long, global = true, value_parser = parse_pair)]
    parent_marker: Option<(String, String)>,

    /// Minimum range size evaluated in parallel (overrides config).
    #[arg(long, global = true)]
    parallel_threshold: Option<usize>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the built-in shirt catalogue and walk through the block join.
    Demo,
    /// Run a block-join query over a JSON / JSON Lines block file.
    Query(QueryArgs),
    /// Print index statistics for a block file.
    Stats(DataArgs),
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Block file (JSON array or JSON Lines).
    #[arg(long)]
    data: PathBuf,
}

#[derive(Args, Debug)]
struct QueryArgs {
    #[command(flatten)]
    data: DataArgs,

    /// Child clause `field=value`; repeated clauses must all match one child.
    #[arg(long = "child", value_parser = parse_pair)]
    child: Vec<(String, String)>,

    /// Parent clause `field=value`; repeated clauses must all match.
    #[arg(long = "parent", value_parser = parse_pair)]
    parent: Vec<(String, String)>,

    /// none, avg, max, min or total.
    #[arg(long)]
    score_mode: Option<ScoreMode>,

    #[arg(long)]
    limit: Option<usize>,

    /// Also list the matching children of every hit.
    #[arg(long)]
    children: bool,

    /// Emit JSON instead of text.
    #[arg(long)]
    json: bool,
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field.to_string(), value.to_string())),
        _ => Err(format!("expected field=value, got '{}'", s)),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(args: &GlobalArgs) -> Result<IndexConfig> {
    let mut config = match &args.config {
        Some(path) => IndexConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => IndexConfig::default(),
    };
    if let Some((field, value)) = &args.parent_marker {
        config.parent_marker = ParentMarker::new(field.as_str(), value.as_str());
    }
    if let Some(threshold) = args.parallel_threshold {
        config.parallel_threshold = threshold;
    }
    Ok(config)
}

fn build_index(config: IndexConfig, blocks: Vec<BlockDocument>) -> Result<BlockJoinIndex> {
    let index = BlockJoinIndex::with_config(config).context("invalid index configuration")?;
    let marker = index.config().parent_marker.clone();
    let blocks: Vec<_> = blocks.into_iter().map(|b| b.with_marker(&marker)).collect();
    let count = blocks.len();
    index.write_blocks(blocks).context("failed to write blocks")?;
    let snapshot = index.commit();
    tracing::info!(blocks = count, records = snapshot.len(), "index loaded");
    Ok(index)
}

fn conjunction(pairs: &[(String, String)]) -> Predicate {
    match pairs {
        [] => Predicate::MatchAll,
        [(field, value)] => Predicate::term(field.as_str(), value.as_str()),
        _ => Predicate::all_of(
            pairs
                .iter()
                .map(|(f, v)| Predicate::term(f.as_str(), v.as_str())),
        ),
    }
}

// ============================================================================
// query
// ============================================================================

#[derive(Serialize)]
struct HitOutput {
    position: Position,
    score: f32,
    parent: Record,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<ChildOutput>>,
}

#[derive(Serialize)]
struct ChildOutput {
    position: Position,
    record: Record,
}

#[derive(Serialize)]
struct QueryOutput {
    generation: u64,
    total_hits: usize,
    hits: Vec<HitOutput>,
}

fn run_query(config: IndexConfig, args: QueryArgs) -> Result<()> {
    let blocks = load_blocks(&args.data.data)
        .with_context(|| format!("failed to read {}", args.data.data.display()))?;
    let index = build_index(config, blocks)?;
    let snapshot = index.snapshot();

    let child = conjunction(&args.child);
    let mut query = BlockJoinQuery::new(child.clone());
    if !args.parent.is_empty() {
        query = query.parent(conjunction(&args.parent));
    }
    if let Some(mode) = args.score_mode {
        query = query.score_mode(mode);
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let results = snapshot.find_parents_matching(&query);
    let mut hits = Vec::with_capacity(results.hits.len());
    for hit in &results.hits {
        let children = if args.children {
            Some(children_output(&snapshot, hit.position, &child)?)
        } else {
            None
        };
        hits.push(HitOutput {
            position: hit.position,
            score: hit.score,
            parent: snapshot.get(hit.position)?.clone(),
            children,
        });
    }
    let output = QueryOutput {
        generation: snapshot.generation(),
        total_hits: results.total_hits,
        hits,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    println!("{} parent(s)", output.total_hits);
    for hit in &output.hits {
        println!("  [{}] score={:.2} {}", hit.position, hit.score, hit.parent);
        for child in hit.children.iter().flatten() {
            println!("      [{}] {}", child.position, child.record);
        }
    }
    Ok(())
}

fn children_output(snapshot: &Snapshot, parent: Position, child: &Predicate) -> Result<Vec<ChildOutput>> {
    let mut out = Vec::new();
    for position in snapshot.find_children_of(parent, child)? {
        out.push(ChildOutput {
            position,
            record: snapshot.get(position)?.clone(),
        });
    }
    Ok(out)
}

// ============================================================================
// stats
// ============================================================================

fn run_stats(config: IndexConfig, args: DataArgs) -> Result<()> {
    let blocks = load_blocks(&args.data)
        .with_context(|| format!("failed to read {}", args.data.display()))?;
    let index = build_index(config, blocks)?;
    println!("{}", serde_json::to_string_pretty(&index.stats())?);
    Ok(())
}

// ============================================================================
// demo
// ============================================================================

fn run_demo(config: IndexConfig) -> Result<()> {
    let blocks = parse_blocks(DEMO_DATA).context("built-in demo data is malformed")?;
    let index = build_index(config, blocks.clone())?;
    let snapshot = index.snapshot();

    println!("Layout (children first, parent last):");
    for (pos, record) in snapshot.iter() {
        let role = if snapshot.is_parent(pos) { "parent" } else { "child " };
        println!("  [{}] {} {}", pos, role, record);
    }

    let blue_medium = Predicate::terms([("color", "blue"), ("size", "medium")]);
    let blue_small = Predicate::terms([("color", "blue"), ("size", "small")]);

    println!();
    println!("Flattened model, child.color=blue AND child.size=medium:");
    let flat_query = prefix_predicate(&blue_medium, DEFAULT_CHILD_PREFIX);
    for block in &blocks {
        let flat = flatten_block(&block.children, &block.parent, DEFAULT_CHILD_PREFIX);
        if flat_query.matches(&flat) {
            println!("  matches {} (no child is blue and medium)", block.parent);
        }
    }

    println!();
    println!("Block join, color=blue AND size=medium:");
    report(&snapshot, &BlockJoinQuery::new(blue_medium.clone()));

    println!();
    println!("Block join, color=blue AND size=medium, parent name=wolf:");
    report(
        &snapshot,
        &BlockJoinQuery::new(blue_medium).parent(Predicate::term("name", "wolf")),
    );

    println!();
    println!("Block join, color=blue AND size=small, parent name=wolf:");
    let results = report(
        &snapshot,
        &BlockJoinQuery::new(blue_small.clone()).parent(Predicate::term("name", "wolf")),
    );
    for hit in &results {
        for child in children_output(&snapshot, *hit, &blue_small)? {
            println!("      matching child [{}] {}", child.position, child.record);
        }
    }

    println!();
    println!("Ranked by average child score, (blue AND small) OR red:");
    report(
        &snapshot,
        &BlockJoinQuery::new(Predicate::any_of([blue_small, Predicate::term("color", "red")]))
            .score_mode(ScoreMode::Avg),
    );
    Ok(())
}

fn report(snapshot: &Snapshot, query: &BlockJoinQuery) -> Vec<Position> {
    let results = snapshot.find_parents_matching(query);
    println!("  {} parent(s)", results.total_hits);
    for hit in &results.hits {
        let parent = snapshot
            .get(hit.position)
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("  [{}] score={:.2} {}", hit.position, hit.score, parent);
    }
    results.positions()
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    let config = load_config(&cli.global)?;

    match cli.command {
        Commands::Demo => run_demo(config),
        Commands::Query(args) => run_query(config, args),
        Commands::Stats(args) => run_stats(config, args),
    }
}
