use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hierarchy_prep::pipeline::DEFAULT_CACHE_CAPACITY;
use hierarchy_prep::table::load_dataset;
use hierarchy_prep::{
    ColorScale, FieldMapping, NodeIndex, NodeStyle, NodeStyler, Pipeline, RenderSettings,
    SizeScale, TreeNode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    Tree,
    Nodes,
    Scales,
    All,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Dataset: a JSON array of rows or a summary table.
    #[arg(long)]
    input: PathBuf,

    /// Render settings as a flat JSON object. Defaults to the identity mapping.
    #[arg(long)]
    settings: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Output::All)]
    output: Output,

    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    cache_capacity: usize,

    /// Print the dataset's columns grouped by type and stop.
    #[arg(long)]
    columns: bool,

    /// Print fuzzy matches from the node index instead of the hierarchy.
    #[arg(long)]
    search: Option<String>,

    #[arg(long, default_value_t = 20)]
    limit: usize,

    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tree: Option<&'a TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nodes: Option<&'a NodeIndex>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_scale: Option<&'a SizeScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    color_scale: Option<&'a ColorScale>,
    #[serde(skip_serializing_if = "Option::is_none")]
    styles: Option<Vec<NodeStyle>>,
    #[serde(skip_serializing_if = "no_duplicates")]
    duplicates: &'a [String],
}

#[derive(Serialize)]
struct SearchHit<'a> {
    id: &'a str,
    score: i64,
    tooltip: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let raw = read_file(&args.input)?;
    let dataset = load_dataset(&raw)
        .with_context(|| format!("failed to load dataset {}", args.input.display()))?;
    info!(
        records = dataset.records.len(),
        columns = dataset.columns.all.len(),
        "loaded dataset"
    );

    if args.columns {
        println!("{}", to_json(&dataset.columns, args.pretty)?);
        return Ok(ExitCode::SUCCESS);
    }

    let settings = match &args.settings {
        Some(path) => serde_json::from_str::<RenderSettings>(&read_file(path)?)
            .with_context(|| format!("invalid settings in {}", path.display()))?,
        None => RenderSettings::with_mapping(FieldMapping::identity()),
    };

    let mut pipeline = Pipeline::new(args.cache_capacity);
    let prepared = match pipeline.prepare(&dataset.records, &settings) {
        Ok(prepared) => prepared,
        Err(err) if err.is_not_ready() => {
            eprintln!("not ready: {err}");
            return Ok(ExitCode::from(2));
        }
        Err(err) => return Err(err).context("failed to prepare hierarchy"),
    };
    debug!(stats = ?pipeline.stats(), "pipeline caches");

    let styler = NodeStyler::new(&prepared, &settings);

    let text = if let Some(query) = &args.search {
        let hits = prepared
            .nodes
            .search(query, args.limit)
            .into_iter()
            .map(|(id, score)| SearchHit {
                id,
                score,
                tooltip: styler.tooltip_for(id).unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        to_json(&hits, args.pretty)?
    } else {
        let wants = |output: Output| args.output == output || args.output == Output::All;
        let report = Report {
            tree: wants(Output::Tree).then_some(&*prepared.tree),
            nodes: wants(Output::Nodes).then_some(&*prepared.nodes),
            size_scale: wants(Output::Scales).then_some(&*prepared.size_scale),
            color_scale: wants(Output::Scales).then_some(&*prepared.color_scale),
            styles: wants(Output::Scales).then(|| styler.node_styles()),
            duplicates: prepared.nodes.duplicate_ids(),
        };
        to_json(&report, args.pretty)?
    };

    println!("{text}");
    Ok(ExitCode::SUCCESS)
}

fn no_duplicates(ids: &&[String]) -> bool {
    ids.is_empty()
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let text = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    text.context("failed to encode output")
}
