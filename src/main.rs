//! fewshot CLI - few-shot classification experiments over remote LLM backends.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fewshot::{
    build_sampler, AdapterRegistry, Config, Dataset, ExperimentPipeline, Gate, HttpTransport,
    RemoteEngine, RetryPolicy, RunOutcome,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "fewshot")]
#[command(version)]
#[command(about = "Few-shot LLM classification experiments with multi-backend cost accounting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the experiment: estimate, confirm, then the real pass
    Run {
        /// Skip the confirmation gate and accept any estimate
        #[arg(short, long)]
        yes: bool,
    },

    /// Dry pass only: print the cumulative cost estimate
    Estimate,

    /// Validate the configuration file
    Validate,

    /// Show an example configuration
    Example,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");
}

fn print_example_config() {
    let example = r#"# fewshot configuration file

provider = "openai"          # openai | anthropic | mistral | yandex | sber
engine = "gpt-3.5-turbo"     # must match the provider's pricing table
api_url = "http://localhost:8000"
subject = "chemistry"        # prompt template key
name = "chemistry_doctor"    # identity label (required by openai)
# catalog = "b1g..."         # cloud folder id (required by yandex)

retry_number = 5
timeout_secs = 180
vision = false

seed = 42
test_size = 0.2
n_for_train = 5
sampler = "strict"           # strict | occurrence | equal

dataset = "data/synthesis.csv"
classes = ["Cube", "Stick", "Sphere", "Flat", "Amorphous"]
data_format = "table"        # table | text

[output]
directory = "experiments"
"#;
    println!("{example}");
}

/// The interactive operator gate: show the estimate, ask to continue.
struct StdinGate;

impl Gate for StdinGate {
    fn confirm(&self, estimated_cost: f64) -> bool {
        println!("Total cost will be approximately {estimated_cost:.2}$");
        print!("Do you want to continue? (y/n) ");
        let _ = std::io::stdout().flush();

        let mut answer = String::new();
        if std::io::stdin().read_line(&mut answer).is_err() {
            return false;
        }
        answer.trim().eq_ignore_ascii_case("y")
    }
}

/// A gate that accepts any estimate (`run --yes`).
struct AcceptGate;

impl Gate for AcceptGate {
    fn confirm(&self, _estimated_cost: f64) -> bool {
        true
    }
}

/// Next numbered result directory under `<base>/<provider>/`.
fn create_result_directory(base: &Path, provider: &str) -> Result<PathBuf> {
    let provider_dir = base.join(provider);
    std::fs::create_dir_all(&provider_dir)
        .with_context(|| format!("Failed to create {}", provider_dir.display()))?;

    let next = std::fs::read_dir(&provider_dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_string_lossy().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
        + 1;

    let result_dir = provider_dir.join(next.to_string());
    std::fs::create_dir(&result_dir)
        .with_context(|| format!("Failed to create {}", result_dir.display()))?;
    Ok(result_dir)
}

fn load_splits(config: &Config) -> Result<(Dataset, Dataset)> {
    let dataset_path = config
        .dataset
        .as_deref()
        .context("Missing required field: dataset")?;
    let dataset = Dataset::from_csv_path(dataset_path, config)
        .with_context(|| format!("Failed to load dataset from {}", dataset_path.display()))?;

    info!(entries = dataset.len(), "Loaded dataset");
    Ok(dataset.train_test_split(config.test_size, config.seed))
}

fn build_pipeline(config: &Config) -> Result<ExperimentPipeline<HttpTransport>> {
    if config.vision {
        bail!(
            "vision mode needs an image converter, which only the library API can inject; \
             disable vision in the config or drive the pipeline programmatically"
        );
    }

    let adapter_config = config.adapter_config()?;
    let adapter = AdapterRegistry::resolve(&config.provider, &adapter_config, None)?;
    let sampler = build_sampler(config)?;
    let engine = RemoteEngine::new(
        HttpTransport::new(Duration::from_secs(adapter_config.timeout_secs))?,
        RetryPolicy::new(adapter_config.retry_number),
    );

    Ok(ExperimentPipeline::new(
        adapter,
        engine,
        sampler,
        adapter_config.engine,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Example => {
            print_example_config();
            return Ok(());
        }

        Commands::Validate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;

            // Resolving the adapter checks endpoint, template, engine and
            // provider-specific fields in one go.
            let adapter_config = config.adapter_config()?;
            AdapterRegistry::resolve(&config.provider, &adapter_config, None)?;
            build_sampler(&config)?;

            info!("Configuration is valid");
            info!("  Provider: {} ({})", config.provider, config.engine);
            info!("  Sampler:  {} ({} examples)", config.sampler, config.n_for_train);
            info!("  Retries:  {}", config.retry_number);
            return Ok(());
        }

        Commands::Estimate => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let (train, test) = load_splits(&config)?;
            let mut pipeline = build_pipeline(&config)?;

            let estimated = pipeline.estimate(&train.entries, &test.entries).await?;
            println!("Total cost will be approximately {estimated:.2}$");
        }

        Commands::Run { yes } => {
            let config = Config::from_file(&cli.config)
                .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
            let (train, test) = load_splits(&config)?;
            let mut pipeline = build_pipeline(&config)?;

            let outcome = if yes {
                pipeline.run(&train.entries, &test.entries, &AcceptGate).await?
            } else {
                pipeline.run(&train.entries, &test.entries, &StdinGate).await?
            };

            match outcome {
                RunOutcome::Cancelled { estimated_cost } => {
                    // Deliberate operator cancellation, not a failure.
                    info!(
                        estimated_cost = format!("{estimated_cost:.2}$"),
                        "Run cancelled by operator"
                    );
                }
                RunOutcome::Completed { results, stats } => {
                    let result_dir =
                        create_result_directory(&config.output.directory, &config.provider)?;

                    let results_path = result_dir.join("results.json");
                    let json = serde_json::to_string_pretty(&results)?;
                    std::fs::write(&results_path, json)
                        .with_context(|| format!("Failed to write {}", results_path.display()))?;

                    let stats_path = result_dir.join("stats.json");
                    std::fs::write(&stats_path, serde_json::to_string_pretty(&stats)?)
                        .with_context(|| format!("Failed to write {}", stats_path.display()))?;

                    if !config.classes.is_empty() {
                        let report =
                            fewshot::metrics::classification_metrics(&results, &config.classes);
                        report.write_csv(&result_dir.join("metrics.csv"))?;
                    }

                    println!("\n=== Experiment Complete ===");
                    println!("Items:       {}", stats.total_items);
                    println!("Classified:  {}", stats.completed);
                    println!("Skipped:     {}", stats.skipped);
                    println!("Estimated:   ${:.2}", stats.estimated_cost);
                    println!("Actual cost: ${:.2}", stats.actual_cost);
                    println!("Runtime:     {:.1}s", stats.runtime_secs);
                    println!("Output:      {}", result_dir.display());
                }
            }
        }
    }

    Ok(())
}
