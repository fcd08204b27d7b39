use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use squall_check::models::explicit::{ExplicitModelKind, build_model};
use squall_check::{
    CheckConfig, CheckValues, ConvergenceCriterion, Model, OptimizationDirection, SolutionMethod,
    check,
};
use squall_parser::{LabelFile, StateRewardFile, TransitionFile, parse_property};

#[derive(Parser)]
#[command(name = "squall", version, about = "Explicit-state probabilistic model checker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check properties against an explicit-state model.
    Check(CheckArgs),
}

#[derive(Args)]
struct CheckArgs {
    /// Transition file in the triples format.
    #[arg(long)]
    transitions: PathBuf,

    /// Kind of model the transition file describes.
    #[arg(long, value_enum, default_value_t = ModelKindArg::Dtmc)]
    model_type: ModelKindArg,

    /// Label file (`name idx idx ...` per line).
    #[arg(long)]
    labels: PathBuf,

    /// State reward files as name=path pairs; repeatable.
    #[arg(long = "rewards", value_name = "NAME=PATH")]
    rewards: Vec<String>,

    /// Properties to check; repeatable.
    #[arg(long = "property", required = true)]
    properties: Vec<String>,

    /// Convergence threshold of the iterative solvers.
    #[arg(long, default_value_t = 1e-6)]
    precision: f64,

    /// Iteration cap; hitting it is reported in the result status.
    #[arg(long, default_value_t = 20_000)]
    max_iterations: u64,

    /// Use the relative instead of the absolute convergence criterion.
    #[arg(long)]
    relative: bool,

    #[arg(long, value_enum, default_value_t = MethodArg::GaussSeidel)]
    method: MethodArg,

    /// SOR relaxation factor.
    #[arg(long, default_value_t = 0.9)]
    omega: f64,

    /// Default optimization direction for nondeterministic models.
    #[arg(long, value_enum)]
    direction: Option<DirectionArg>,

    /// Print full result vectors as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ModelKindArg {
    Dtmc,
    Ctmc,
    Mdp,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
    Jacobi,
    GaussSeidel,
    Sor,
    ValueIteration,
    PolicyIteration,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DirectionArg {
    Min,
    Max,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Check(args) => run_check(args),
    }
}

fn run_check(args: CheckArgs) -> Result<()> {
    let transitions = TransitionFile::from_file(&args.transitions)
        .with_context(|| format!("reading {}", args.transitions.display()))?;
    let labels = LabelFile::from_file(&args.labels)
        .with_context(|| format!("reading {}", args.labels.display()))?;
    let mut rewards = Vec::new();
    for pair in &args.rewards {
        let (name, path) = pair
            .split_once('=')
            .with_context(|| format!("expected NAME=PATH, got {pair:?}"))?;
        let file = StateRewardFile::from_file(path).with_context(|| format!("reading {path}"))?;
        rewards.push((name.to_string(), file));
    }

    let kind = match args.model_type {
        ModelKindArg::Dtmc => ExplicitModelKind::Dtmc,
        ModelKindArg::Ctmc => ExplicitModelKind::Ctmc,
        ModelKindArg::Mdp => ExplicitModelKind::Mdp,
    };
    let model = build_model(kind, &transitions, &labels, &rewards).context("building the model")?;

    let config = CheckConfig {
        precision: args.precision,
        max_iterations: args.max_iterations,
        criterion: if args.relative {
            ConvergenceCriterion::Relative
        } else {
            ConvergenceCriterion::Absolute
        },
        method: match args.method {
            MethodArg::Jacobi => SolutionMethod::Jacobi,
            MethodArg::GaussSeidel => SolutionMethod::GaussSeidel,
            MethodArg::Sor => SolutionMethod::Sor,
            MethodArg::ValueIteration => SolutionMethod::ValueIteration,
            MethodArg::PolicyIteration => SolutionMethod::PolicyIteration,
        },
        omega: args.omega,
        track_scheduler: false,
        direction: args.direction.map(|d| match d {
            DirectionArg::Min => OptimizationDirection::Minimize,
            DirectionArg::Max => OptimizationDirection::Maximize,
        }),
    };

    for input in &args.properties {
        let property = parse_property(input).with_context(|| format!("parsing {input:?}"))?;
        let result = check(&model, &property, &config)
            .with_context(|| format!("checking {input:?}"))?;

        if args.json {
            let values = match &result.values {
                CheckValues::Numeric(values) => serde_json::json!(values),
                CheckValues::Truth(truth) => {
                    serde_json::json!(truth.iter().collect::<Vec<_>>())
                }
            };
            let line = serde_json::json!({
                "property": input,
                "status": result.status,
                "values": values,
            });
            println!("{line}");
        } else {
            for state in initial_states(&model) {
                println!("{input}: {} (state {state})", result.value_at(state));
            }
            if !result.status.converged() {
                eprintln!("warning: {input}: iteration cap reached before convergence");
            }
        }
    }
    Ok(())
}

/// States to report: the ones labeled `init`, or state 0 if the label is
/// missing or empty.
fn initial_states(model: &Model<f64>) -> Vec<usize> {
    if let Ok(init) = model.labeling().states_with("init") {
        let states: Vec<usize> = init.iter().collect();
        if !states.is_empty() {
            return states;
        }
    }
    if model.state_count() == 0 {
        return Vec::new();
    }
    vec![0]
}
