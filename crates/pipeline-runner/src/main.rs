//! Command-line runner for pipeline descriptions
//!
//! Loads a JSON pipeline description, builds it against the builtin node
//! registry and pulls outputs on demand.

mod summary;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pipeline_engine::{
    validate_description, EventError, EventSink, NodeCategory, NodeRegistry, Pipeline,
    PipelineDescription, PipelineEvent, UpdateRequest,
};
// Linked for its inventory registrations.
use pipeline_nodes as _;

use crate::summary::OutputSummary;

#[derive(Parser, Debug)]
#[command(name = "pipeline-runner", version, about = "Run pipeline descriptions")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the builtin node types.
    Nodes,
    /// Check a description without building it.
    Validate {
        /// Pipeline description JSON.
        #[arg(long = "in")]
        in_path: PathBuf,
    },
    /// Print the information of an output without executing.
    Info(TargetArgs),
    /// Update outputs and print what they hold.
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct TargetArgs {
    /// Pipeline description JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Node whose output to inspect.
    #[arg(long)]
    node: String,

    /// Output port index.
    #[arg(long, default_value_t = 0)]
    output: usize,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Pipeline description JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Node to update; every sink when omitted.
    #[arg(long)]
    node: Option<String>,

    /// Output port index (with --node).
    #[arg(long, default_value_t = 0)]
    output: usize,

    /// Time value to request (with --node); overrides the description.
    #[arg(long)]
    time: Option<f64>,

    /// Print summaries as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Write the live pipeline's description here after running.
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Forwards pipeline events to the log
struct LogEventSink;

impl EventSink for LogEventSink {
    fn send(&self, event: PipelineEvent) -> Result<(), EventError> {
        match &event {
            PipelineEvent::NodeFailed { node_id, error } => {
                log::warn!("{} failed: {}", node_id, error)
            }
            PipelineEvent::NodeExecuted {
                node_id,
                duration_ms,
                ..
            } => log::info!("{} executed in {} ms", node_id, duration_ms),
            other => log::debug!("{:?}", other),
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let registry = NodeRegistry::with_builtins();
    match cli.cmd {
        Command::Nodes => cmd_nodes(&registry),
        Command::Validate { in_path } => cmd_validate(&registry, in_path),
        Command::Info(args) => cmd_info(&registry, args),
        Command::Run(args) => cmd_run(&registry, args),
    }
}

fn load(in_path: &Path) -> anyhow::Result<PipelineDescription> {
    PipelineDescription::load(in_path)
        .with_context(|| format!("load description '{}'", in_path.display()))
}

fn build(registry: &NodeRegistry, in_path: &Path) -> anyhow::Result<Pipeline> {
    let description = load(in_path)?;
    let mut pipeline = Pipeline::from_description(&description, registry)
        .with_context(|| format!("build pipeline '{}'", description.id))?;
    pipeline.set_event_sink(Some(Arc::new(LogEventSink)));
    Ok(pipeline)
}

fn cmd_nodes(registry: &NodeRegistry) -> anyhow::Result<()> {
    let grouped = registry.metadata_by_category();
    for category in [NodeCategory::Source, NodeCategory::Filter, NodeCategory::Sink] {
        let Some(entries) = grouped.get(&category) else {
            continue;
        };
        let mut entries = entries.clone();
        entries.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        println!("{:?}:", category);
        for meta in entries {
            println!(
                "  {:<20} {} ({} in, {} out)",
                meta.node_type,
                meta.description,
                meta.inputs.len(),
                meta.outputs.len()
            );
        }
    }
    Ok(())
}

fn cmd_validate(registry: &NodeRegistry, in_path: PathBuf) -> anyhow::Result<()> {
    let description = load(&in_path)?;
    let errors = validate_description(&description, Some(registry));
    if errors.is_empty() {
        println!(
            "'{}' is valid: {} nodes, {} edges",
            description.id,
            description.nodes.len(),
            description.edges.len()
        );
        return Ok(());
    }
    for error in &errors {
        println!("{}", error);
    }
    anyhow::bail!("'{}' has {} problems", description.id, errors.len())
}

fn cmd_info(registry: &NodeRegistry, args: TargetArgs) -> anyhow::Result<()> {
    let pipeline = build(registry, &args.in_path)?;
    let info = pipeline.output_port(&args.node, args.output)?.information()?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

fn cmd_run(registry: &NodeRegistry, args: RunArgs) -> anyhow::Result<()> {
    let pipeline = build(registry, &args.in_path)?;

    let targets: Vec<(String, usize)> = match &args.node {
        Some(node) => {
            let target = pipeline.node(node)?;
            if args.time.is_some() {
                target.set_requested_time(args.time);
            }
            target
                .update(&UpdateRequest::default())
                .with_context(|| format!("update '{}'", node))?;
            vec![(node.clone(), args.output)]
        }
        None => {
            pipeline.update_all()?;
            let mut sinks = Vec::new();
            for id in pipeline.topological_order()? {
                if pipeline.dependents(&id)?.is_empty() {
                    let outputs = pipeline.node(&id)?.metadata().outputs.len();
                    sinks.extend((0..outputs).map(|output| (id.clone(), output)));
                }
            }
            sinks
        }
    };

    let mut summaries = Vec::new();
    for (id, output) in targets {
        let node = pipeline.node(&id)?;
        let data = node.executive().output(output).with_context(|| {
            format!("'{}' has no output {} after updating", id, output)
        })?;
        summaries.push(OutputSummary::new(&id, output, &data, &node.executive().stats()));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for summary in &summaries {
            println!("{}", summary.render());
        }
    }

    if let Some(path) = &args.save {
        pipeline.describe()?.save(path)?;
        log::info!("Saved description to {}", path.display());
    }
    Ok(())
}
