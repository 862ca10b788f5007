//! # Pipeline Tier Tests (T0-T3)
//!
//! End-to-end checks of the recommendation pipeline, leaf-first.
//!
//! ## Tiers
//! - T0: Fact & Catalog Integrity
//! - T1: Strict Matching
//! - T2: Fallback Ordering
//! - T3: Evaluation & Learning

use larder_core::{
    BayesNetwork, Catalog, Difficulty, Fact, InMemoryKnowledgeBase, LarderError, MatchSource,
    Orchestrator, PipelineContext, PipelineState, ProbabilisticEvaluator, Recipe, RecipeId,
    RecipeLookup,
};
use std::sync::Arc;

const EPS: f64 = 1e-9;

fn no_preferences() -> Vec<String> {
    Vec::new()
}

fn orchestrator(catalog: Catalog, evaluator: ProbabilisticEvaluator) -> Orchestrator {
    let catalog = Arc::new(catalog);
    let knowledge = Arc::new(InMemoryKnowledgeBase::from_catalog(&catalog));
    Orchestrator::new(PipelineContext::new(catalog, knowledge, Arc::new(evaluator)))
}

fn flat_evaluator() -> ProbabilisticEvaluator {
    ProbabilisticEvaluator::prior(
        BayesNetwork::from_success_table([[0.5; 3]; 3]).expect("network"),
    )
    .expect("evaluator")
}

// =============================================================================
// TIER T0: FACT & CATALOG INTEGRITY
// =============================================================================

mod t0_integrity {
    use super::*;

    /// T0.1: Empty ingredient sets are rejected.
    #[test]
    fn recipe_without_ingredients_rejected() {
        let result = Catalog::new([Recipe::new(
            1,
            "Air",
            Vec::<String>::new(),
            5,
            Difficulty::Easy,
        )]);
        assert!(matches!(result, Err(LarderError::InvalidCatalog(_))));
    }

    /// T0.2: Zero preparation time is rejected.
    #[test]
    fn zero_prep_time_rejected() {
        let result = Catalog::new([Recipe::new(1, "Toast", ["bread"], 0, Difficulty::Easy)]);
        assert!(matches!(result, Err(LarderError::InvalidCatalog(_))));
    }

    /// T0.3: Duplicate ids are rejected.
    #[test]
    fn duplicate_ids_rejected() {
        let result = Catalog::new([
            Recipe::new(1, "Toast", ["bread"], 5, Difficulty::Easy),
            Recipe::new(1, "Jam Toast", ["bread", "jam"], 5, Difficulty::Easy),
        ]);
        assert!(matches!(result, Err(LarderError::InvalidCatalog(_))));
    }

    /// T0.4: Facts normalise user input.
    #[test]
    fn fact_input_normalised() {
        let fact = Fact::new(["  EGG", "Egg"], 20, ["Vegetarian "]);
        assert_eq!(fact.available_ingredients().len(), 1);
        assert!(fact.preference_tags().contains("vegetarian"));
    }
}

// =============================================================================
// TIER T1: STRICT MATCHING
// =============================================================================

mod t1_strict_matching {
    use super::*;

    /// T1.1: Exact match with an authored table yields a single scored result.
    #[test]
    fn exact_match_end_to_end() {
        let catalog = Catalog::new([
            Recipe::new(1, "R1", ["egg", "flour"], 15, Difficulty::Easy),
            Recipe::new(2, "R2", ["egg", "milk"], 30, Difficulty::Medium),
        ])
        .expect("catalog");
        let mut table = [[0.5; 3]; 3];
        table[0][0] = 0.9;
        let evaluator = ProbabilisticEvaluator::prior(
            BayesNetwork::from_success_table(table).expect("network"),
        )
        .expect("evaluator");

        let mut orch = orchestrator(catalog, evaluator);
        let out = orch
            .run(Fact::new(["egg", "flour"], 20, no_preferences()))
            .expect("run");

        assert_eq!(out.source, MatchSource::Exact);
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.results[0].recipe_id, RecipeId(1));
        assert!((out.results[0].probability - 0.9).abs() < EPS);
        assert!(!out.results[0].degraded);
    }

    /// T1.2: Preferences are a subset requirement.
    #[test]
    fn preferences_must_all_be_present() {
        let catalog = Catalog::new([
            Recipe::new(1, "Salad", ["lettuce"], 5, Difficulty::Easy)
                .with_tags(["vegan", "vegetarian"]),
            Recipe::new(2, "Cheese Plate", ["cheese"], 5, Difficulty::Easy)
                .with_tags(["vegetarian"]),
        ])
        .expect("catalog");

        let mut orch = orchestrator(catalog, flat_evaluator());
        let out = orch
            .run(Fact::new(["lettuce", "cheese"], 10, ["vegan"]))
            .expect("run");

        let ids: Vec<RecipeId> = out.results.iter().map(|r| r.recipe_id).collect();
        assert_eq!(ids, vec![RecipeId(1)]);
    }

    /// T1.3: Repeated runs over the same inputs are identical.
    #[test]
    fn runs_are_deterministic() {
        let build = || {
            Catalog::new([
                Recipe::new(4, "D", ["egg"], 10, Difficulty::Hard),
                Recipe::new(2, "B", ["egg"], 50, Difficulty::Easy),
                Recipe::new(9, "I", ["egg", "milk"], 70, Difficulty::Medium),
            ])
            .expect("catalog")
        };
        let fact = Fact::new(["egg", "milk"], 90, no_preferences());

        let first = orchestrator(build(), ProbabilisticEvaluator::expert().expect("expert"))
            .run(fact.clone())
            .expect("run");
        let second = orchestrator(build(), ProbabilisticEvaluator::expert().expect("expert"))
            .run(fact)
            .expect("run");
        assert_eq!(first, second);
    }
}

// =============================================================================
// TIER T2: FALLBACK ORDERING
// =============================================================================

mod t2_fallback {
    use super::*;

    /// T2.1: Fallback candidates are ordered by constraint count desc, id asc.
    #[test]
    fn fallback_orders_by_count_then_id() {
        // Nothing fits 5 minutes; partial ingredients is reached.
        let catalog = Catalog::new([
            Recipe::new(1, "A", ["egg", "flour", "sugar"], 30, Difficulty::Easy),
            Recipe::new(2, "B", ["egg", "rice"], 30, Difficulty::Easy),
            Recipe::new(3, "C", ["egg", "flour", "milk"], 30, Difficulty::Easy),
        ])
        .expect("catalog");

        let mut orch = orchestrator(catalog, flat_evaluator());
        let out = orch
            .run(Fact::new(["egg", "flour"], 5, no_preferences()))
            .expect("run");

        assert_eq!(out.source, MatchSource::Catalog);
        let ids: Vec<u64> = out.results.iter().map(|r| r.recipe_id.0).collect();
        // A and C share egg + flour (2), B only egg (1).
        assert_eq!(ids, vec![1, 3, 2]);
        assert!(orch.history().contains(&PipelineState::Fallback));
    }

    /// T2.2: Fallback is never empty for a nonempty catalog.
    #[test]
    fn fallback_never_empty() {
        let catalog = Catalog::new([Recipe::new(7, "Stew", ["beef"], 120, Difficulty::Hard)])
            .expect("catalog");

        let mut orch = orchestrator(catalog, flat_evaluator());
        let out = orch
            .run(Fact::new(["tofu"], 10, ["vegan"]))
            .expect("run");
        assert_eq!(out.results.len(), 1);
    }

    /// T2.3: Missing knowledge-base records become an explanatory result.
    #[test]
    fn describe_unknown_recipe() {
        let catalog = Catalog::new([Recipe::new(1, "Toast", ["bread"], 5, Difficulty::Easy)])
            .expect("catalog");
        let orch = orchestrator(catalog, flat_evaluator());

        let lookup = orch.describe(RecipeId(77)).expect("describe");
        assert!(matches!(lookup, RecipeLookup::Unavailable { .. }));
    }
}

// =============================================================================
// TIER T3: EVALUATION & LEARNING
// =============================================================================

mod t3_evaluation {
    use super::*;
    use larder_core::{
        InferenceStrategy, PosteriorStrategy, Relaxation, TimeBucket, TrainingRecord,
        network_from_bytes, network_to_bytes,
    };

    /// T3.1: All-success rows drive the learned probability toward one.
    #[test]
    fn all_success_rows_learned() {
        let seed = vec![TrainingRecord::new(20, Difficulty::Easy, false); 4];
        let (strategy, _) = PosteriorStrategy::fit_default(&seed, None).expect("fit");
        let strategy = Arc::new(strategy);
        let evaluator = ProbabilisticEvaluator::posterior(Arc::clone(&strategy));
        let recipe = Recipe::new(1, "Omelette", ["egg"], 20, Difficulty::Easy);
        assert!(evaluator.evaluate(&recipe) < 0.5);

        let data = vec![TrainingRecord::new(20, Difficulty::Easy, true); 200];
        let report = strategy.learn(&data).expect("learn");

        let p = evaluator.evaluate(&recipe);
        assert!(p > 0.99);
        assert!(p < 1.0);
        assert_eq!(report.insufficient().len(), 8);
    }

    /// T3.2: Posterior results flag back-off estimates as degraded.
    #[test]
    fn posterior_pipeline_flags_degraded() {
        // Training rows sit in the long bucket, which is where a 120 minute
        // budget places both recipes.
        let data = vec![TrainingRecord::new(100, Difficulty::Easy, true); 10];
        let (strategy, _) = PosteriorStrategy::fit_default(&data, None).expect("fit");
        let evaluator = ProbabilisticEvaluator::posterior(Arc::new(strategy));

        let catalog = Catalog::new([
            Recipe::new(1, "Quick", ["egg"], 10, Difficulty::Easy),
            Recipe::new(2, "Slow", ["egg"], 90, Difficulty::Hard),
        ])
        .expect("catalog");

        let mut orch = orchestrator(catalog, evaluator);
        let out = orch
            .run(Fact::new(["egg"], 120, no_preferences()))
            .expect("run");

        assert_eq!(out.results[0].recipe_id, RecipeId(1));
        assert!(!out.results[0].degraded);
        assert!(out.results[1].degraded);
    }

    /// T3.4: Time evidence is the budget bucket, even when a widened budget
    /// admitted a recipe from a slower bucket.
    #[test]
    fn widened_budget_scored_on_available_time() {
        let expert = BayesNetwork::expert().expect("expert");
        let catalog = Catalog::new([Recipe::new(1, "Frittata", ["egg"], 22, Difficulty::Medium)])
            .expect("catalog");

        let mut orch = orchestrator(catalog, ProbabilisticEvaluator::expert().expect("evaluator"));
        let out = orch
            .run(Fact::new(["egg"], 15, no_preferences()))
            .expect("run");

        assert_eq!(
            out.source,
            MatchSource::Relaxed(Relaxation::WidenTimeBudget)
        );
        let available = expert.success_probability(TimeBucket::Short, Difficulty::Medium);
        let recipe_time = expert.success_probability(TimeBucket::Medium, Difficulty::Medium);
        assert!((out.results[0].probability - available).abs() < EPS);
        assert!(out.results[0].probability < recipe_time);
    }

    /// T3.3: A persisted model evaluates identically after reload.
    #[test]
    fn persisted_model_evaluates_identically() {
        let data = vec![
            TrainingRecord::new(15, Difficulty::Easy, true),
            TrainingRecord::new(45, Difficulty::Medium, false),
            TrainingRecord::new(90, Difficulty::Hard, false),
        ];
        let (strategy, _) = PosteriorStrategy::fit_default(&data, None).expect("fit");
        let snapshot = strategy.snapshot();
        let network = snapshot.network();

        let bytes = network_to_bytes(network).expect("serialize");
        let restored = network_from_bytes(&bytes).expect("deserialize");

        for time in TimeBucket::ALL {
            for difficulty in Difficulty::ALL {
                let a = network.success_probability(time, difficulty);
                let b = restored.success_probability(time, difficulty);
                assert!((a - b).abs() < EPS);
            }
        }
    }
}
