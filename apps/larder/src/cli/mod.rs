//! # Larder CLI Module
//!
//! ## Available Commands
//!
//! - `recommend` - Run the full pipeline for a set of ingredients
//! - `evaluate` - Success probability for a preparation time and difficulty
//! - `details` - Knowledge-base record and alternatives for a recipe
//! - `learn` - Fit a posterior model from the dataset and persist it
//! - `validate` - Cross-validate the posterior model
//! - `init-kb` - Import a JSON knowledge base into redb

mod commands;

use crate::config::LarderConfig;
use clap::{Parser, Subcommand};
use larder_core::{InferenceMode, LarderError};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Larder - recipe recommender
///
/// Matches recipes against the ingredients at hand and estimates how likely
/// each one is to turn out well.
#[derive(Parser, Debug)]
#[command(name = "larder")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to larder.toml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Inference mode: "prior" (authored tables) or "posterior" (learned)
    #[arg(short, long, global = true)]
    pub mode: Option<InferenceMode>,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Recommend recipes
    Recommend {
        /// Available ingredients (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        ingredients: Vec<String>,

        /// Time budget in minutes
        #[arg(short, long)]
        time: u32,

        /// Dietary preference tags (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        preferences: Vec<String>,
    },

    /// Estimate success probability without matching
    Evaluate {
        /// Preparation time in minutes; omitted = marginalised
        #[arg(long)]
        prep_time: Option<u32>,

        /// Difficulty (easy, medium, hard); omitted = marginalised
        #[arg(long)]
        difficulty: Option<larder_core::Difficulty>,
    },

    /// Show a recipe's knowledge-base record and alternatives
    Details {
        /// Recipe ID
        id: u64,
    },

    /// Fit a posterior model from the dataset
    Learn {
        /// Output model path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Cross-validate the posterior model on the dataset
    Validate {
        /// Number of folds
        #[arg(short, long, default_value_t = larder_core::primitives::DEFAULT_FOLDS)]
        folds: usize,
    },

    /// Import a JSON knowledge base into a redb database
    InitKb {
        /// JSON array of recipe details
        #[arg(short, long)]
        input: PathBuf,

        /// Output redb database
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing database
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), LarderError> {
    let mut config = LarderConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli.mode);
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Recommend {
            ingredients,
            time,
            preferences,
        } => cmd_recommend(&config, json_mode, &ingredients, time, &preferences),
        Commands::Evaluate {
            prep_time,
            difficulty,
        } => cmd_evaluate(&config, json_mode, prep_time, difficulty),
        Commands::Details { id } => cmd_details(&config, json_mode, id),
        Commands::Learn { output } => cmd_learn(&config, json_mode, &output),
        Commands::Validate { folds } => cmd_validate(&config, json_mode, folds),
        Commands::InitKb {
            input,
            output,
            force,
        } => cmd_init_kb(json_mode, &input, &output, force),
    }
}
