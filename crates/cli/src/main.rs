//! CLI for building and inspecting conversational fine-tuning datasets.
//!
//! Transcripts live in plain-text files under `conversations/<source>/`,
//! optionally next to a `base.txt` template supplying a default system
//! message. This tool combines them into JSONL datasets, estimates their
//! training cost, and renders datasets back into transcripts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokenizers::Tokenizer as HfTokenizer;
use tracing::{info, warn};

use ftutils_core::{
    build_datasets, estimate_cost, write_datasets, CharApproxTokenizer, Conversation, Dataset,
    PipelineConfig, Role, RoleSet, Tokenizer, TranscriptConfig, DEFAULT_EPOCHS,
    DEFAULT_PRICE_PER_1K_TOKENS,
};

/// Fine-tuning utilities for conversational transcripts.
#[derive(Parser, Debug)]
#[command(name = "ftutils")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Combine transcript directories into train/eval JSONL datasets
    CreateDataset(CreateDatasetArgs),
    /// Estimate tokens and training cost of a dataset or transcript
    Estimate(EstimateArgs),
    /// Write every conversation of a JSONL dataset as a transcript file
    Render(RenderArgs),
}

#[derive(Args, Debug)]
struct RoleArgs {
    /// Extra speaker labels that start a new message (repeatable)
    #[arg(long = "extra-role")]
    extra_roles: Vec<String>,
}

impl RoleArgs {
    fn role_set(&self) -> Result<RoleSet> {
        RoleSet::with_extra_roles(self.extra_roles.iter().cloned())
            .context("invalid --extra-role")
    }
}

#[derive(Args, Debug)]
struct CreateDatasetArgs {
    /// Input directories, relative to --root
    #[arg(short, long, num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Dataset name; writes <name>.train.jsonl and <name>.eval.jsonl
    #[arg(short, long)]
    output: String,

    /// Fraction of conversations to put into the eval set (0.0-1.0)
    #[arg(short, long, default_value = "0.0", value_parser = parse_fraction)]
    split: f64,

    /// Directory containing the transcript sources
    #[arg(long, default_value = "conversations")]
    root: PathBuf,

    /// Directory the datasets are written to
    #[arg(long, default_value = "datasets")]
    out_dir: PathBuf,

    /// Do not inherit system messages from base templates
    #[arg(long)]
    no_inherit: bool,

    #[command(flatten)]
    roles: RoleArgs,
}

#[derive(Args, Debug)]
struct EstimateArgs {
    /// A JSONL dataset or a transcript file
    path: PathBuf,

    /// HuggingFace tokenizer.json; defaults to a character approximation
    #[arg(long)]
    tokenizer: Option<PathBuf>,

    /// Number of training epochs
    #[arg(short = 'n', long, default_value_t = DEFAULT_EPOCHS)]
    epochs: u32,

    /// Price in dollars per 1000 training tokens
    #[arg(long, default_value_t = DEFAULT_PRICE_PER_1K_TOKENS)]
    price_per_1k: f64,

    /// Skip invalid JSONL lines instead of failing
    #[arg(long)]
    skip_invalid: bool,

    #[command(flatten)]
    roles: RoleArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// JSONL dataset to render
    path: PathBuf,

    /// Directory the transcripts are written to
    #[arg(long)]
    out_dir: PathBuf,

    #[command(flatten)]
    roles: RoleArgs,
}

fn parse_fraction(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0.0 and 1.0"))
    }
}

/// Wrapper around HuggingFace tokenizers for token counting.
struct RustTokenizer {
    inner: HfTokenizer,
}

impl RustTokenizer {
    /// Load a tokenizer from a `tokenizer.json` file.
    fn load(path: &Path) -> Result<Self> {
        let inner = HfTokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer {}: {e}", path.display()))?;
        Ok(Self { inner })
    }
}

impl Tokenizer for RustTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.inner
            .encode(text, false)
            .expect("Failed to encode text with tokenizer")
            .get_ids()
            .len()
    }
}

fn create_dataset(args: CreateDatasetArgs) -> Result<()> {
    let config = PipelineConfig {
        transcript: TranscriptConfig {
            roles: args.roles.role_set()?,
            inherit: !args.no_inherit,
            ..Default::default()
        },
        eval_fraction: args.split,
    };
    let roots: Vec<PathBuf> = args.input.iter().map(|input| args.root.join(input)).collect();

    info!(sources = roots.len(), split = args.split, "building datasets");
    let split = build_datasets(&roots, &config)?;
    let result = write_datasets(&split, &args.out_dir, &args.output)?;

    println!("\n[summary]");
    println!("  Train conversations: {}", result.train_conversations);
    println!("  Eval conversations: {}", result.eval_conversations);
    println!("  Total messages: {}", result.total_messages);
    println!("  Train: {:?}", result.train_path);
    if let Some(eval_path) = &result.eval_path {
        println!("  Eval: {:?}", eval_path);
    }
    Ok(())
}

fn load_for_estimate(args: &EstimateArgs) -> Result<Dataset> {
    let is_jsonl = args.path.extension().is_some_and(|ext| ext == "jsonl");
    if !is_jsonl {
        let config = TranscriptConfig {
            roles: args.roles.role_set()?,
            ..Default::default()
        };
        let conversation = Conversation::load_with(&args.path, &config)?;
        return Ok(Dataset::new(vec![conversation]));
    }

    if !args.skip_invalid {
        return Dataset::load(&args.path)
            .with_context(|| format!("failed to load dataset {:?}", args.path));
    }
    let (dataset, errors) = Dataset::load_lenient(&args.path)?;
    if !errors.is_empty() {
        warn!(skipped = errors.len(), "some records could not be parsed");
    }
    Ok(dataset)
}

fn estimate(args: EstimateArgs) -> Result<()> {
    let dataset = load_for_estimate(&args)?;

    let tokens = match &args.tokenizer {
        Some(path) => {
            info!(tokenizer = %path.display(), "loading tokenizer");
            dataset.tokens(&RustTokenizer::load(path)?)
        }
        None => dataset.tokens(&CharApproxTokenizer),
    };
    let cost = estimate_cost(tokens, args.price_per_1k, args.epochs);

    println!("Conversations: {}", dataset.len());
    println!("Messages: {}", dataset.message_count());
    println!("Estimated tokens (per epoch): {}", tokens);
    println!("Estimated cost ({} epochs): ${:.2}", args.epochs, cost);
    Ok(())
}

/// Render a dataset into transcript files and return the role set they were
/// written with.
///
/// Speaker names in the dataset join the role set so that every named
/// message reads back as its own message.
fn render(args: &RenderArgs) -> Result<RoleSet> {
    let dataset = Dataset::load(&args.path)
        .with_context(|| format!("failed to load dataset {:?}", args.path))?;
    if dataset.is_empty() {
        bail!("dataset {:?} has no conversations", args.path);
    }
    let roles = dataset
        .transcript_roles(args.roles.extra_roles.iter().cloned())
        .context("speaker names cannot be written as transcript labels")?;

    for (i, conversation) in dataset.conversations().iter().enumerate() {
        let path = args.out_dir.join(format!("conversation_{i:04}.txt"));
        conversation.save_with(&path, &roles)?;
    }

    println!("Wrote {} transcripts to {:?}", dataset.len(), args.out_dir);
    let extra: Vec<String> = extra_labels(&roles)
        .map(|label| format!("--extra-role {label:?}"))
        .collect();
    if !extra.is_empty() {
        println!("Load them back with: {}", extra.join(" "));
    }
    Ok(roles)
}

fn extra_labels(roles: &RoleSet) -> impl Iterator<Item = &str> {
    roles
        .labels()
        .iter()
        .map(String::as_str)
        .filter(|label| Role::from_label(label).is_none())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "ftutils=debug,ftutils_core=debug"
    } else {
        "ftutils=info,ftutils_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::CreateDataset(args) => create_dataset(args),
        Command::Estimate(args) => estimate(args),
        Command::Render(args) => render(&args).map(|_| ()),
    }
}
