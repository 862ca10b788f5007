//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::LarderConfig;
use crate::loader::{
    load_catalog, load_dataset, load_details, load_knowledge, load_model, load_prior,
    save_model, validate_output_path,
};
use larder_core::{
    BayesNetwork, Difficulty, Evidence, Fact, InferenceMode, InferenceStrategy, LarderError,
    LearnReport, Orchestrator, PipelineContext, PosteriorStrategy, ProbabilisticEvaluator,
    RecipeDetails, RecipeId, RecipeLookup, RedbKnowledgeBase, TimeBucket, TrainingRecord,
    cross_validate,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// EVALUATOR
// =============================================================================

/// Build the evaluator for the configured inference mode.
///
/// - `prior`: the authored network from `[data].prior`, or the expert network
/// - `posterior`: the persisted `[data].model` if set, otherwise a fit of
///   `[data].dataset`. Back-off is `[data].prior` when configured, uniform
///   otherwise.
pub fn build_evaluator(config: &LarderConfig) -> Result<ProbabilisticEvaluator, LarderError> {
    match config.inference.mode {
        InferenceMode::Prior => {
            ProbabilisticEvaluator::prior(load_prior(config.data.prior.as_deref())?)
        }
        InferenceMode::Posterior => {
            let strategy = if let Some(model) = &config.data.model {
                let network = load_model(model)?;
                tracing::info!(path = %model.display(), "resuming persisted model");
                PosteriorStrategy::from_network(
                    network,
                    backoff(config)?,
                    config.inference.pseudo_count,
                )?
            } else {
                let (strategy, _) = fit_dataset(config)?;
                strategy
            };
            Ok(ProbabilisticEvaluator::posterior(Arc::new(strategy)))
        }
    }
}

fn backoff(config: &LarderConfig) -> Result<Option<Arc<BayesNetwork>>, LarderError> {
    match &config.data.prior {
        Some(path) => Ok(Some(Arc::new(load_prior(Some(path))?))),
        None => Ok(None),
    }
}

fn dataset(config: &LarderConfig) -> Result<Vec<TrainingRecord>, LarderError> {
    let path = config.data.dataset.as_deref().ok_or_else(|| {
        LarderError::InvalidDataset("no dataset configured; set [data].dataset".to_string())
    })?;
    load_dataset(path)
}

fn fit_dataset(config: &LarderConfig) -> Result<(PosteriorStrategy, LearnReport), LarderError> {
    let rows = dataset(config)?;
    PosteriorStrategy::fit(&rows, backoff(config)?, config.inference.pseudo_count)
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// RECOMMEND COMMAND
// =============================================================================

/// Run the full pipeline and show the ranked results.
pub fn cmd_recommend(
    config: &LarderConfig,
    json_mode: bool,
    ingredients: &[String],
    time: u32,
    preferences: &[String],
) -> Result<(), LarderError> {
    let catalog = Arc::new(load_catalog(&config.data.catalog)?);
    let knowledge = load_knowledge(config.data.knowledge.as_deref(), &catalog)?;
    let evaluator = Arc::new(build_evaluator(config)?);
    let context = PipelineContext::new(catalog, knowledge, evaluator)
        .with_resolver_config(config.resolver);

    let mut orchestrator = Orchestrator::new(context);
    let recommendation = orchestrator.run(Fact::new(ingredients, time, preferences))?;
    let top = match recommendation.results.first() {
        Some(best) => Some(orchestrator.describe(best.recipe_id)?),
        None => None,
    };

    if json_mode {
        let output = serde_json::json!({
            "mode": config.inference.mode,
            "recommendation": recommendation,
            "top": top,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Recommendations ({} mode)", config.inference.mode);
    println!("==========================");
    println!("Source: {:?}", recommendation.source);
    println!();
    if recommendation.results.is_empty() {
        println!("No recipes in the catalog.");
        return Ok(());
    }
    for (rank, result) in recommendation.results.iter().enumerate() {
        println!(
            "{:>3}. {} {} - p(success) = {:.3}, constraints = {}{}",
            rank + 1,
            result.recipe_id,
            result.recipe_name,
            result.probability,
            result.matched_constraint_count,
            if result.degraded { " (low confidence)" } else { "" }
        );
    }

    if let Some(lookup) = top {
        println!();
        print_lookup(&lookup);
    }

    Ok(())
}

// =============================================================================
// EVALUATE COMMAND
// =============================================================================

/// Query the network directly. Unspecified evidence is marginalised.
pub fn cmd_evaluate(
    config: &LarderConfig,
    json_mode: bool,
    prep_time: Option<u32>,
    difficulty: Option<Difficulty>,
) -> Result<(), LarderError> {
    let evaluator = build_evaluator(config)?;
    let evidence = Evidence {
        time: prep_time.map(TimeBucket::from_minutes),
        difficulty,
    };
    let probability = evaluator.query(&evidence);
    let degraded = match (evidence.time, evidence.difficulty) {
        (Some(time), Some(difficulty)) => evaluator.snapshot().estimate(time, difficulty).degraded,
        _ => false,
    };

    if json_mode {
        let output = serde_json::json!({
            "mode": evaluator.mode(),
            "time": evidence.time,
            "difficulty": evidence.difficulty,
            "probability": probability,
            "degraded": degraded,
        });
        print_json(&output);
        return Ok(());
    }

    let describe = |v: Option<String>| v.unwrap_or_else(|| "any".to_string());
    println!("Mode:        {}", evaluator.mode());
    println!("Time:        {}", describe(evidence.time.map(|t| t.to_string())));
    println!(
        "Difficulty:  {}",
        describe(evidence.difficulty.map(|d| d.to_string()))
    );
    println!(
        "P(success):  {:.4}{}",
        probability,
        if degraded { " (low confidence)" } else { "" }
    );

    Ok(())
}

// =============================================================================
// DETAILS COMMAND
// =============================================================================

/// Show the knowledge-base record of a recipe.
pub fn cmd_details(config: &LarderConfig, json_mode: bool, id: u64) -> Result<(), LarderError> {
    let catalog = Arc::new(load_catalog(&config.data.catalog)?);
    let knowledge = load_knowledge(config.data.knowledge.as_deref(), &catalog)?;
    // Lookups never evaluate; the expert network avoids loading a model.
    let evaluator = Arc::new(ProbabilisticEvaluator::expert()?);
    let context = PipelineContext::new(catalog, knowledge, evaluator)
        .with_resolver_config(config.resolver);

    let lookup = Orchestrator::new(context).describe(RecipeId(id))?;

    if json_mode {
        print_json(&serde_json::json!(lookup));
        return Ok(());
    }

    print_lookup(&lookup);
    Ok(())
}

fn print_lookup(lookup: &RecipeLookup) {
    match lookup {
        RecipeLookup::Found {
            details,
            alternatives,
        } => {
            println!("{} {}", details.id, details.name);
            println!("  Category:  {}", details.category);
            println!("  Prep time: {} min", details.prep_time);
            if !details.description.is_empty() {
                println!("  {}", details.description);
            }
            if !alternatives.is_empty() {
                println!("  Alternatives:");
                for alt in alternatives.iter().take(10) {
                    println!("    {} {}", alt.id, alt.name);
                }
                if alternatives.len() > 10 {
                    println!("    ... and {} more", alternatives.len() - 10);
                }
            }
        }
        RecipeLookup::Unavailable { recipe_id, message } => {
            println!("Recipe {} unavailable: {}", recipe_id, message);
        }
    }
}

// =============================================================================
// LEARN COMMAND
// =============================================================================

/// Fit a posterior network from the dataset and persist it.
pub fn cmd_learn(
    config: &LarderConfig,
    json_mode: bool,
    output: &Path,
) -> Result<(), LarderError> {
    let (strategy, report) = fit_dataset(config)?;
    let snapshot = strategy.snapshot();
    let written = save_model(snapshot.network(), output)?;

    let insufficient: Vec<String> = report
        .insufficient()
        .into_iter()
        .map(|(time, difficulty)| format!("{}/{}", time, difficulty))
        .collect();

    if json_mode {
        let output = serde_json::json!({
            "output": written.to_string_lossy(),
            "rows": report.rows,
            "insufficient_data": insufficient,
        });
        print_json(&output);
        return Ok(());
    }

    println!("Fitted posterior model from {} rows", report.rows);
    println!();
    println!("  time    difficulty  rows  p(success)");
    for time in TimeBucket::ALL {
        for difficulty in Difficulty::ALL {
            let rows = report
                .observations
                .get(&(time, difficulty))
                .copied()
                .unwrap_or(0);
            println!(
                "  {:<7} {:<11} {:>4}  {:.4}",
                time.to_string(),
                difficulty.to_string(),
                rows,
                snapshot.network().success_probability(time, difficulty)
            );
        }
    }
    if !insufficient.is_empty() {
        println!();
        println!("No data for: {}", insufficient.join(", "));
    }
    println!();
    println!("Model written to {}", written.display());

    Ok(())
}

// =============================================================================
// VALIDATE COMMAND
// =============================================================================

/// Cross-validate the posterior strategy on the dataset.
pub fn cmd_validate(
    config: &LarderConfig,
    json_mode: bool,
    folds: usize,
) -> Result<(), LarderError> {
    let rows = dataset(config)?;
    let backoff = backoff(config)?;
    let report = cross_validate(
        &rows,
        backoff.as_deref(),
        config.inference.pseudo_count,
        folds,
    )?;

    if json_mode {
        print_json(&serde_json::json!(report));
        return Ok(());
    }

    println!(
        "Cross-validation ({} folds, {} rows)",
        report.folds.len(),
        rows.len()
    );
    println!("=====================================");
    println!("  fold  train  test  accuracy  precision  recall  f1");
    for fold in &report.folds {
        println!(
            "  {:>4}  {:>5}  {:>4}  {:>8.3}  {:>9.3}  {:>6.3}  {:.3}",
            fold.fold,
            fold.train_rows,
            fold.test_rows,
            fold.metrics.accuracy,
            fold.metrics.precision,
            fold.metrics.recall,
            fold.metrics.f1
        );
    }
    println!(
        "  mean               {:>8.3}  {:>9.3}  {:>6.3}  {:.3}",
        report.mean.accuracy, report.mean.precision, report.mean.recall, report.mean.f1
    );

    Ok(())
}

// =============================================================================
// INIT-KB COMMAND
// =============================================================================

/// Import a JSON knowledge base into a new redb database.
///
/// The records are written to a staging file next to `output` and renamed
/// over it only once the import and compaction succeeded, so a bad input
/// never touches an existing database.
pub fn cmd_init_kb(
    json_mode: bool,
    input: &Path,
    output: &Path,
    force: bool,
) -> Result<(), LarderError> {
    let output = validate_output_path(output)?;
    if output.exists() && !force {
        return Err(LarderError::IoError(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    let records: Vec<RecipeDetails> = load_details(input)?;
    let mut staging = output.clone().into_os_string();
    staging.push(".staging");
    let staging = PathBuf::from(staging);
    if staging.exists() {
        std::fs::remove_file(&staging).map_err(|e| LarderError::IoError(e.to_string()))?;
    }

    let (imported, categories) = match stage_kb(&staging, records) {
        Ok(counts) => counts,
        Err(e) => {
            if let Err(cleanup) = std::fs::remove_file(&staging) {
                tracing::warn!(
                    path = %staging.display(),
                    error = %cleanup,
                    "staging file left behind"
                );
            }
            return Err(e);
        }
    };
    std::fs::rename(&staging, &output).map_err(|e| LarderError::IoError(e.to_string()))?;
    tracing::info!(path = %output.display(), records = imported, "knowledge base written");

    if json_mode {
        let output = serde_json::json!({
            "output": output.to_string_lossy(),
            "records": imported,
            "categories": categories,
        });
        print_json(&output);
        return Ok(());
    }

    println!(
        "Imported {} records ({} categories) into {}",
        imported,
        categories,
        output.display()
    );
    Ok(())
}

fn stage_kb(path: &Path, records: Vec<RecipeDetails>) -> Result<(usize, usize), LarderError> {
    let mut kb = RedbKnowledgeBase::open(path)?;
    let imported = kb.import(records)?;
    kb.compact()?;
    Ok((imported, kb.categories().count()))
}
