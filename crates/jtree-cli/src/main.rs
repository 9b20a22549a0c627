//! jtree CLI: triangulate graph documents and list candidate changes.

mod document;

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use jtree_core::config::EngineConfig;
use jtree_core::{DomainSizes, UndiGraph};
use jtree_learning::{
    GraphChange, GraphChangesGenerator, InducedWidthFilter, MaxNeighbours, NoConstraint,
    StructuralConstraint,
};
use jtree_triangulation::{verify, BinaryJoinTree, BinaryJoinTreeConverter, Triangulation};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::document::{apply_document_config, parse_document, GraphDocument, StrategyChoice};

#[derive(Parser)]
#[command(name = "jtree")]
#[command(about = "Triangulation and junction trees for graphs with finite domains", long_about = None)]
struct Cli {
    /// Debug-level logs (otherwise RUST_LOG, default `warn`)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Triangulate a graph and print its junction tree
    Triangulate {
        /// Path to the YAML/JSON graph document
        #[arg(short, long)]
        graph: PathBuf,

        /// Elimination strategy
        #[arg(long, value_enum, default_value_t = StrategyArg::Auto)]
        strategy: StrategyArg,

        /// Also build the binary join tree
        #[arg(long)]
        binary: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Check that a graph document is well formed
    Validate {
        /// Path to the YAML/JSON graph document
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// List the edge additions/deletions a structure search may try
    Candidates {
        /// Path to the YAML/JSON graph document
        #[arg(short, long)]
        graph: PathBuf,

        /// Worker threads (overrides config)
        #[arg(long)]
        threads: Option<usize>,

        /// Reject additions giving a node more neighbours than this
        #[arg(long)]
        max_neighbours: Option<usize>,

        /// Reject changes whose largest clique exceeds this log10 size
        /// (overrides config)
        #[arg(long)]
        max_log10_clique_size: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Auto,
    Greedy,
    Ordered,
    Partial,
}

impl From<StrategyArg> for StrategyChoice {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Auto => StrategyChoice::Auto,
            StrategyArg::Greedy => StrategyChoice::Greedy,
            StrategyArg::Ordered => StrategyChoice::Ordered,
            StrategyArg::Partial => StrategyChoice::Partial,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Triangulate {
            graph,
            strategy,
            binary,
            json,
        } => triangulate(&graph, strategy.into(), binary, json),
        Commands::Validate { graph } => validate(&graph),
        Commands::Candidates {
            graph,
            threads,
            max_neighbours,
            max_log10_clique_size,
        } => candidates(&graph, threads, max_neighbours, max_log10_clique_size),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::builder()
            .with_default_directive(tracing::Level::WARN.into())
            .from_env_lossy()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<(GraphDocument, EngineConfig), Box<dyn Error>> {
    let src = fs::read_to_string(path)?;
    let doc = parse_document(&src, path)?;
    let mut config = EngineConfig::from_env();
    if let Some(doc_config) = &doc.config {
        apply_document_config(&mut config, doc_config);
    }
    Ok((doc, config))
}

#[derive(Debug, Serialize)]
struct TriangulationReport {
    strategy: &'static str,
    elimination_order: Vec<u64>,
    fill_ins: Vec<(u64, u64)>,
    cliques: BTreeMap<u64, Vec<u64>>,
    tree_edges: Vec<(u64, u64)>,
    induced_width: usize,
    max_log10_clique_domain_size: f64,
    fingerprint: String,
    binary_join_tree: Option<BinaryJoinTree>,
}

fn triangulate(
    path: &Path,
    choice: StrategyChoice,
    binary: bool,
    json: bool,
) -> Result<(), Box<dyn Error>> {
    let (doc, _) = load(path)?;
    let (graph, domain_sizes) = doc.to_graph()?;
    let strategy = doc.strategy(choice)?;
    let name = strategy.name();

    let mut t = Triangulation::with_graph(strategy, &graph, &domain_sizes);
    let out = t.triangulate()?;

    let binary_join_tree = if binary {
        Some(BinaryJoinTreeConverter::new().convert(
            out.junction_tree(),
            &domain_sizes,
            &Default::default(),
        )?)
    } else {
        None
    };

    let report = TriangulationReport {
        strategy: name,
        elimination_order: out.elimination_order().iter().map(|n| n.get()).collect(),
        fill_ins: out
            .fill_ins()
            .iter()
            .map(|e| (e.first().get(), e.second().get()))
            .collect(),
        cliques: out
            .junction_tree()
            .cliques()
            .map(|(id, nodes)| (id.get(), nodes.iter().map(|n| n.get()).collect()))
            .collect(),
        tree_edges: out
            .junction_tree()
            .edges()
            .into_iter()
            .map(|(a, b)| (a.get(), b.get()))
            .collect(),
        induced_width: out.induced_width(),
        max_log10_clique_domain_size: out.max_log10_clique_domain_size(),
        fingerprint: out.fingerprint()?.to_hex(),
        binary_join_tree,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Triangulation ({} strategy)", report.strategy);
    println!("======================");
    println!("  Elimination order: {:?}", report.elimination_order);
    println!("  Fill-ins: {}", report.fill_ins.len());
    for (a, b) in &report.fill_ins {
        println!("    {a} - {b}");
    }
    println!("  Induced width: {}", report.induced_width);
    println!(
        "  Max clique size: 10^{:.3}",
        report.max_log10_clique_domain_size
    );
    println!("  Fingerprint: {}", report.fingerprint);
    println!();
    println!("Junction tree: {} cliques, {} edges", report.cliques.len(), report.tree_edges.len());
    for (id, nodes) in &report.cliques {
        println!("  {id}: {nodes:?}");
    }
    for (a, b) in &report.tree_edges {
        println!("  {a} - {b}");
    }
    if let Some(bjt) = &report.binary_join_tree {
        println!();
        println!(
            "Binary join tree: {} cliques ({} auxiliary), roots {:?}",
            bjt.tree.size(),
            bjt.auxiliary.len(),
            bjt.roots.iter().map(|r| r.get()).collect::<Vec<_>>()
        );
        for (child, parent) in &bjt.parents {
            println!("  {} -> {}", child.get(), parent.get());
        }
    }
    Ok(())
}

fn validate(path: &Path) -> Result<(), Box<dyn Error>> {
    let (doc, config) = load(path)?;
    config.validate()?;
    let (graph, domain_sizes) = doc.to_graph()?;
    let strategy = doc.strategy(StrategyChoice::Auto)?;
    // Orders are only checked against the graph once elimination starts.
    Triangulation::with_graph(strategy, &graph, &domain_sizes).triangulate()?;

    println!(
        "✓ Graph is valid: {} nodes, {} edges, {}",
        graph.size(),
        graph.size_edges(),
        if verify::is_chordal(&graph) { "chordal" } else { "not chordal" }
    );
    Ok(())
}

fn candidates(
    path: &Path,
    threads: Option<usize>,
    max_neighbours: Option<usize>,
    max_log10_clique_size: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let (doc, mut config) = load(path)?;
    if let Some(t) = threads {
        config.learning_threads = t;
    }
    if let Some(limit) = max_log10_clique_size {
        config.max_log10_clique_domain_size = Some(limit);
    }
    config.validate()?;

    let (graph, domain_sizes) = doc.to_graph()?;
    let changes = match max_neighbours {
        Some(max) => generate(MaxNeighbours::new(max), &config, &graph, &domain_sizes)?,
        None => generate(NoConstraint, &config, &graph, &domain_sizes)?,
    };

    println!("{} candidate change(s)", changes.len());
    for change in &changes {
        println!("  {change}");
    }
    Ok(())
}

fn generate<C: StructuralConstraint>(
    constraint: C,
    config: &EngineConfig,
    graph: &UndiGraph,
    domain_sizes: &DomainSizes,
) -> Result<Vec<GraphChange>, Box<dyn Error>> {
    let changes = GraphChangesGenerator::from_config(constraint, config).generate(graph)?;
    match InducedWidthFilter::from_config(config) {
        Some(filter) => Ok(filter.filter(graph, domain_sizes, &changes)?),
        None => Ok(changes),
    }
}
