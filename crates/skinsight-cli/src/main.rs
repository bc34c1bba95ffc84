use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skinsight_core::{explain, Advice, Advisor, OnnxAnalyzer, RawFaceAnalysis, RecommendationTable};
use std::path::{Path, PathBuf};

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "skinsight", about = "Skincare recommendations from a face photo")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a face photo and print a recommendation
    Advise {
        /// Photo to analyze (JPEG or PNG)
        image: PathBuf,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Look up a recommendation from known attributes, without running models
    Lookup {
        #[arg(long)]
        age: f32,
        /// Detector gender label (e.g., "female")
        #[arg(long)]
        gender: String,
        /// Detector race label (e.g., "black")
        #[arg(long)]
        race: String,
        /// Detector emotion label (e.g., "happy")
        #[arg(long, default_value = "")]
        emotion: String,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate and list a recommendation table
    Table {
        /// Table file (defaults to SKINSIGHT_TABLE_PATH, then the built-in table)
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    tracing::debug!(
        model_dir = %config.model_dir.display(),
        table = ?config.table_path,
        lenient = config.lenient_detection,
        "configuration loaded"
    );

    match cli.command {
        Commands::Advise { image, json } => {
            let table = load_table(config.table_path.as_deref())?;
            let analyzer = OnnxAnalyzer::load(&config.model_dir, config.analyzer_options())
                .with_context(|| {
                    format!("loading face models from {}", config.model_dir.display())
                })?;
            let advisor = Advisor::new(table, analyzer);
            let advice = advisor
                .advise_file(&image)
                .with_context(|| format!("analyzing {}", image.display()))?;
            print_advice(&advice, json)?;
        }
        Commands::Lookup {
            age,
            gender,
            race,
            emotion,
            json,
        } => {
            let table = load_table(config.table_path.as_deref())?;
            let analysis = RawFaceAnalysis {
                age,
                dominant_gender: gender,
                dominant_race: race,
                dominant_emotion: emotion,
            };
            print_advice(&explain(&table, analysis), json)?;
        }
        Commands::Table { path } => {
            let path = path.or(config.table_path);
            let table = load_table(path.as_deref())?;
            for (key, record) in table.iter() {
                println!("{:<40} {}", key.to_string(), record.skin_condition);
            }
            println!("{} entries, fallback present", table.len());
        }
    }

    Ok(())
}

/// Load the override table if one is configured, else the built-in one.
/// Either way an invalid table stops the program here, before any request.
fn load_table(path: Option<&Path>) -> Result<RecommendationTable> {
    match path {
        Some(path) => RecommendationTable::load(path)
            .with_context(|| format!("loading recommendation table {}", path.display())),
        None => RecommendationTable::builtin().context("built-in recommendation table"),
    }
}

fn print_advice(advice: &Advice, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(advice)?);
        return Ok(());
    }

    let profile = &advice.profile;
    let record = &advice.recommendation;

    println!(
        "Profile: age {}, {}, {}, mood {}",
        profile.age_group, profile.gender, profile.race, profile.mood
    );
    println!(
        "Matched: step {} ({}) {}",
        advice.step.number(),
        advice.step.describe(),
        advice.key
    );
    println!();
    println!("Analysis result: {}", record.skin_condition);

    if !record.products.is_empty() {
        println!();
        println!("Recommended products:");
        for product in &record.products {
            println!("  - {} <{}>", product.name, product.link);
        }
    }

    if !record.lifestyle_changes.is_empty() {
        println!();
        println!("Lifestyle changes:");
        for tip in &record.lifestyle_changes {
            println!("  - {tip}");
        }
    }

    println!();
    println!("Source: {}", record.source);
    Ok(())
}
