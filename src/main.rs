//! # vire
//!
//! Visual question answering with tool-using analyst agents.
//!
//! - `ask`: answer one question about one image
//! - `run`: run a dataset experiment and write a JSON report
//! - `graph`: print the Mermaid diagram of a tier's pipeline
//!
//! `--tier all` chains the Junior, Senior and Manager analysts.
//!
//! ## Quick Start
//! ```bash
//! vire ask --tier manager --image images/1.jpg "What is the man doing?"
//! ```

mod config;
mod dataset;
mod harness;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use vire_agents::ImageRef;

use crate::config::{Config, TierSelection};

// =============================================================================
// CLI ARGUMENTS
// =============================================================================
#[derive(Parser, Debug)]
#[command(
    name = "vire",
    version,
    about = "Answer questions about images with tool-using analyst agents",
    long_about = r#"
vire - visual question answering with analyst agents

A captioner describes the image, then a Junior, Senior or Manager analyst
gathers evidence with its permitted tools and reasons to a short answer
with an explanation. With --tier all the three analysts answer in turn
and the Manager's answer is final.

PREREQUISITES:
  - An OpenAI-compatible chat endpoint (VIRE_LLM_BASE_URL)
  - The vision service for captions and candidates (VIRE_VISION_BASE_URL)

EXAMPLES:
  vire ask --image images/1.jpg "What animal is this?"
  vire run --dataset data/test.json --tier senior --samples 50
  vire graph --tier manager
  vire ask --tier all --image images/1.jpg "What is the man riding?"
"#
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose", global = true, default_value = "false")]
    verbose: bool,

    /// Analyst model (overrides VIRE_LLM_MODEL)
    #[arg(short = 'm', long = "model", global = true)]
    model: Option<String>,

    /// Dispatch rounds before synthesis is forced (overrides VIRE_MAX_TOOL_CALLS)
    #[arg(long = "max-tool-calls", global = true)]
    max_tool_calls: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question about an image
    Ask {
        /// The question to answer
        #[arg(value_name = "QUESTION")]
        question: String,

        /// Path to the image
        #[arg(short = 'i', long = "image")]
        image: PathBuf,

        /// Analyst tier: junior, senior, manager or all
        #[arg(short = 't', long = "tier", default_value = "junior")]
        tier: TierSelection,
    },

    /// Run a dataset experiment
    Run {
        /// Dataset JSON file
        #[arg(short = 'd', long = "dataset", env = "VIRE_DATASET")]
        dataset: PathBuf,

        /// Image directory (defaults to `<dataset dir>/images`)
        #[arg(long = "images", env = "VIRE_IMAGE_DIR")]
        images: Option<PathBuf>,

        /// Analyst tier: junior, senior, manager or all
        #[arg(short = 't', long = "tier", default_value = "junior")]
        tier: TierSelection,

        /// Process only the first N samples
        #[arg(short = 'n', long = "samples")]
        samples: Option<usize>,

        /// Experiment name (defaults to `<tier>_experiment`)
        #[arg(long = "name")]
        name: Option<String>,

        /// Results directory (overrides VIRE_RESULTS_DIR)
        #[arg(short = 'o', long = "results-dir")]
        results_dir: Option<PathBuf>,
    },

    /// Print the Mermaid diagram of a tier's pipeline
    Graph {
        /// Analyst tier: junior, senior, manager or all
        #[arg(short = 't', long = "tier", default_value = "junior")]
        tier: TierSelection,
    },
}

// =============================================================================
// MAIN FUNCTION
// =============================================================================
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose)?;

    let mut config = Config::from_env()?;
    if let Some(model) = args.model {
        info!(model = %model, "Using model from command line");
        config.llm_model = model;
    }
    if let Some(max) = args.max_tool_calls {
        config.max_tool_calls = max;
    }
    config.validate()?;

    info!(
        model = %config.llm_model,
        llm = %config.llm_base_url,
        vision = %config.vision_base_url,
        "Configuration loaded"
    );

    match args.command {
        Command::Ask {
            question,
            image,
            tier,
        } => {
            let pipeline = config.pipeline(tier)?;
            match pipeline.invoke(question, ImageRef::new(image)).await {
                Ok(output) => {
                    println!("\n{}", "=".repeat(60));
                    let heading = match tier {
                        TierSelection::All => "ALL ANALYSTS".to_string(),
                        TierSelection::Single(t) => format!("{} ANALYST", t.as_str().to_uppercase()),
                    };
                    println!("{heading}");
                    println!("{}\n", "=".repeat(60));
                    println!("Caption:     {}", output.image_caption);
                    if output.results.len() > 1 {
                        for (analyst, answer) in output.results.iter().flatten() {
                            println!("  {analyst:<10} {answer}");
                        }
                    }
                    println!("Answer:      {}", output.final_answer);
                    println!("Explanation: {}", output.explanation);
                    println!("\n{}", "=".repeat(60));
                }
                Err(e) => {
                    error!(error = %e, "Question failed");
                    eprintln!("\nQuestion failed: {e}");
                    if e.to_string().to_lowercase().contains("connect") {
                        eprintln!("\nTip: check that the model and vision services are running:");
                        eprintln!("   {}", config.llm_base_url);
                        eprintln!("   {}", config.vision_base_url);
                    }
                    return Err(e.into());
                }
            }
        }

        Command::Run {
            dataset: dataset_path,
            images,
            tier,
            samples,
            name,
            results_dir,
        } => {
            let image_dir = images.unwrap_or_else(|| dataset::default_image_dir(&dataset_path));
            let items = dataset::load(&dataset_path, &image_dir, samples)?;
            let name = name.unwrap_or_else(|| format!("{tier}_experiment"));
            let results_dir = results_dir.unwrap_or_else(|| config.results_dir.clone());

            let pipeline = config.pipeline(tier)?;
            let report = harness::run(&pipeline, &tier.to_string(), &name, items).await;
            let path = report.write_to(&results_dir)?;

            println!(
                "{}: {} succeeded, {} failed of {} samples",
                report.experiment_name, report.successful, report.failed, report.num_samples
            );
            println!("Results written to {}", path.display());
        }

        Command::Graph { tier } => {
            let pipeline = config.pipeline(tier)?;
            println!("{}", pipeline.to_mermaid());
        }
    }

    Ok(())
}

// =============================================================================
// LOGGING INITIALIZATION
// =============================================================================
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
