use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use continuo::{
    orchestrator, BackendConfig, OpenAiBackend, RunLimits, DEFAULT_MODEL, DEFAULT_STYLE_PROMPT,
};
use score::{piece_to_midi, read_piece};
use theory::{PieceSummary, Rulebook};

#[derive(Parser)]
#[command(
    name = "continuo",
    version,
    about = "Extend solo-piano MIDI excerpts with an LLM agent pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extend a MIDI excerpt by composing additional measures
    Extend(ExtendArgs),
    /// Print the analysis summary and rulebook for a MIDI excerpt
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct ExtendArgs {
    /// Input MIDI file (solo piano, at most two parts)
    input: PathBuf,

    /// Where to write the extended MIDI (default: input stem + "_extended.mid")
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Measures to add beyond the input
    #[arg(short, long, default_value_t = 8)]
    measures: u32,

    /// Stylistic guidance for the composer
    #[arg(long, default_value = DEFAULT_STYLE_PROMPT)]
    style_prompt: String,

    /// Cap on total model invocations for the run
    #[arg(long, default_value_t = 50)]
    recursion_limit: u32,

    /// Cap on reviewer correction rounds
    #[arg(long, default_value_t = 3)]
    max_review_iterations: u32,

    /// Model name
    #[arg(long, env = "CONTINUO_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "CONTINUO_BASE_URL")]
    base_url: Option<String>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Input MIDI file
    input: PathBuf,

    /// Print the summary as JSON instead of the rendered rulebook
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Extend(args) => extend(args).await,
        Command::Analyze(args) => analyze(args),
    }
}

async fn extend(args: ExtendArgs) -> Result<()> {
    let bytes =
        std::fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let mut piece = read_piece(&bytes)?;
    info!(
        measures = piece.measure_count(),
        notes = piece.note_count(),
        time_sig = %piece.time_sig,
        "loaded excerpt"
    );

    let backend = OpenAiBackend::new(&BackendConfig {
        base_url: args.base_url,
        api_key: std::env::var("OPENAI_API_KEY").ok(),
        model: args.model,
        max_tokens: None,
    });
    let limits = RunLimits {
        target_measures: args.measures,
        recursion_limit: args.recursion_limit,
        max_review_iterations: args.max_review_iterations,
    };

    let report = orchestrator::run(&backend, &mut piece, &limits, &args.style_prompt).await?;

    let output = args.output.unwrap_or_else(|| {
        let mut name = args
            .input
            .file_stem()
            .map(|stem| stem.to_os_string())
            .unwrap_or_default();
        name.push("_extended.mid");
        args.input.with_file_name(name)
    });
    std::fs::write(&output, piece_to_midi(&piece))
        .with_context(|| format!("writing {}", output.display()))?;
    println!(
        "Saved {} ({} measures, {} added, {})",
        output.display(),
        piece.measure_count(),
        report.measures_added,
        report.outcome.describe()
    );
    Ok(())
}

fn analyze(args: AnalyzeArgs) -> Result<()> {
    let bytes =
        std::fs::read(&args.input).with_context(|| format!("reading {}", args.input.display()))?;
    let piece = read_piece(&bytes)?;
    let summary = PieceSummary::analyze(&piece);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let mut rulebook = Rulebook::new();
        rulebook.set_piece_context(summary);
        println!("{}", rulebook.render_text());
    }
    Ok(())
}
