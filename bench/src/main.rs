mod generators;
mod parse;
mod sweep;
mod tasks;

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use route_search_core::{Graph, GraphSearcher, Order, SearcherConfig, DEFAULT_MAX_PARALLEL_BRANCHES};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use generators::Shape;
use sweep::{ShapeReport, SweepOptions};
use tasks::{Mode, CLASSIC};

#[derive(Parser)]
#[command(name = "route-search-bench", version, about = "Route search demo and benchmark")]
struct Cli {
    /// Print reports as JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    /// Dedicated worker threads; 0 shares rayon's global pool.
    #[arg(long, global = true, default_value_t = 0)]
    threads: usize,

    /// Worker stack size in bytes.
    #[arg(long, global = true)]
    stack_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer the classic route queries over a town graph like "AB5, BC4, CD8".
    Graph {
        description: String,
        #[arg(long, value_enum, default_value_t = OrderArg::Depth)]
        order: OrderArg,
        /// Fork a branch wherever a query would continue.
        #[arg(long)]
        fork: bool,
        #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL_BRANCHES)]
        max_parallel: usize,
    },
    /// Count routes over synthetic graphs at increasing depth limits.
    Generate {
        #[arg(long, value_enum, default_value_t = ShapeArg::All)]
        shape: ShapeArg,
        #[arg(long, default_value_t = 50_000)]
        nodes: u32,
        #[arg(long, default_value_t = 4)]
        depth: usize,
        /// Never extend a route through a node it already contains.
        #[arg(long)]
        stop_on_repeat: bool,
        /// Forked runs fork at depths below this.
        #[arg(long, default_value_t = 2)]
        fork_below: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL_BRANCHES)]
        max_parallel: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OrderArg {
    Depth,
    Breadth,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeArg {
    All,
    Lsystem,
    Scalefree,
    Smallworld,
    Random,
    Barbell,
    Dla,
}

impl ShapeArg {
    fn shapes(self) -> Vec<Shape> {
        let one = match self {
            ShapeArg::All => return Shape::ALL.to_vec(),
            ShapeArg::Lsystem => Shape::Lsystem,
            ShapeArg::Scalefree => Shape::Scalefree,
            ShapeArg::Smallworld => Shape::Smallworld,
            ShapeArg::Random => Shape::Random,
            ShapeArg::Barbell => Shape::Barbell,
            ShapeArg::Dla => Shape::Dla,
        };
        vec![one]
    }
}

impl From<OrderArg> for Order {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Depth => Order::DepthFirst,
            OrderArg::Breadth => Order::BreadthFirst,
        }
    }
}

#[derive(Serialize)]
struct Answer {
    output: usize,
    query: String,
    answer: String,
}

#[derive(Serialize)]
struct ClassicReport {
    nodes: usize,
    edges: usize,
    millis: f64,
    answers: Vec<Answer>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut searcher_config = SearcherConfig::default().with_worker_threads(cli.threads);
    if let Some(bytes) = cli.stack_size {
        searcher_config = searcher_config.with_stack_size(bytes);
    }

    let result = match cli.command {
        Command::Graph {
            description,
            order,
            fork,
            max_parallel,
        } => {
            let mode = Mode {
                order: order.into(),
                fork,
                max_parallel_branches: max_parallel,
            };
            run_classic(&description, mode, searcher_config, cli.json)
        }
        Command::Generate {
            shape,
            nodes,
            depth,
            stop_on_repeat,
            fork_below,
            max_parallel,
        } => {
            let options = SweepOptions {
                nodes,
                max_depth: depth,
                stop_on_repeat,
                fork_below,
                max_parallel_branches: max_parallel,
            };
            run_sweep(&shape.shapes(), &options, &searcher_config, cli.json)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_classic(description: &str, mode: Mode, config: SearcherConfig, json: bool) -> Result<()> {
    let edges = parse::parse_graph(description).context("failed to parse town graph")?;
    let graph = Graph::from_edges(edges).context("failed to build town graph")?;
    let (nodes, edges) = (graph.node_count(), graph.edge_count());
    let searcher = GraphSearcher::from_graph(graph, config).context("failed to start searcher")?;
    info!(nodes, edges, ?mode, "running classic queries");

    let t = Instant::now();
    let answers = CLASSIC
        .iter()
        .enumerate()
        .map(|(i, query)| -> Result<Answer> {
            let answer = query
                .run(&searcher, mode)
                .with_context(|| format!("query #{} ({}) failed", i + 1, query.label()))?;
            Ok(Answer {
                output: i + 1,
                query: query.label(),
                answer,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let report = ClassicReport {
        nodes,
        edges,
        millis: t.elapsed().as_secs_f64() * 1000.0,
        answers,
    };

    if json {
        return print_json(&report);
    }
    for answer in &report.answers {
        println!("Output #{}: {}", answer.output, answer.answer);
    }
    Ok(())
}

fn run_sweep(
    shapes: &[Shape],
    options: &SweepOptions,
    config: &SearcherConfig,
    json: bool,
) -> Result<()> {
    let mut reports = Vec::with_capacity(shapes.len());
    for &shape in shapes {
        let report = sweep::run_shape(shape, options, config)
            .with_context(|| format!("{} sweep failed", shape.title()))?;
        if !json {
            print_table(&report);
        }
        reports.push(report);
    }
    if json {
        print_json(&reports)?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{}", text);
    Ok(())
}

fn print_table(report: &ShapeReport) {
    println!("--- {} ---", report.title);
    println!(
        "Built in {:.1}ms: {} nodes, {} edges, {} trimmed rows, ~{:.1}MB",
        report.build_millis,
        report.nodes,
        report.edges,
        report.trimmed_rows,
        report.memory_bytes as f64 / 1_048_576.0
    );
    println!();
    println!(
        "{:>6} {:>14} {:>10} {:>10} {:>10} {:>8}",
        "depth", "routes", "dfs", "bfs", "forked", "forks"
    );
    println!("{:->6} {:->14} {:->10} {:->10} {:->10} {:->8}", "", "", "", "", "", "");
    for row in &report.depths {
        println!(
            "{:>6} {:>14} {:>8.1}ms {:>8.1}ms {:>8.1}ms {:>8}",
            row.depth,
            row.depth_first.routes,
            row.depth_first.millis,
            row.breadth_first.millis,
            row.forked.millis,
            row.forked_branches
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode() -> Mode {
        Mode {
            order: Order::DepthFirst,
            fork: false,
            max_parallel_branches: 1,
        }
    }

    #[test]
    fn test_classic_reports_error_chain() {
        let err = run_classic("AB", mode(), SearcherConfig::default(), false).unwrap_err();
        let chain = format!("{:#}", err);
        assert!(chain.starts_with("failed to parse town graph: "), "{}", chain);
        assert!(chain.contains("invalid weight"), "{}", chain);
        assert!(matches!(
            err.downcast_ref::<parse::ParseError>(),
            Some(parse::ParseError::BadWeight { index: 0, .. })
        ));
    }

    #[test]
    fn test_bad_pool_config_has_context() {
        let config = SearcherConfig::default().with_stack_size(16);
        let err = run_classic("AB5", mode(), config, false).unwrap_err();
        assert!(format!("{:#}", err).starts_with("failed to start searcher: "));
        assert!(err.downcast_ref::<route_search_core::SearchError>().is_some());
    }

    #[test]
    fn test_classic_runs_on_towns() {
        run_classic("AB5, BC4, CD8, DC8, DE6, AD5, CE2, EB3, AE7", mode(), SearcherConfig::default(), true)
            .unwrap();
    }
}
