//! # Pipeline Primitives
//!
//! Hardcoded constants for the Larder pipeline.
//!
//! These are compiled into the binary and immutable at runtime. Tunables that
//! a deployment may change (pseudo-count, time tolerance) have their defaults
//! here and are overridden through configuration.

// =============================================================================
// TIME DISCRETISATION
// =============================================================================

/// Upper bound (inclusive, minutes) of the "short" time bucket.
pub const SHORT_TIME_MAX: u32 = 20;

/// Upper bound (inclusive, minutes) of the "medium" time bucket.
pub const MEDIUM_TIME_MAX: u32 = 60;

// =============================================================================
// PROBABILITY MODEL
// =============================================================================

/// Tolerance for a CPT row to count as summing to one.
pub const CPT_TOLERANCE: f64 = 1e-6;

/// Default Laplace pseudo-count applied per outcome during posterior learning.
pub const DEFAULT_PSEUDO_COUNT: f64 = 1.0;

/// Decision threshold used when turning a success probability into a prediction.
pub const PREDICTION_THRESHOLD: f64 = 0.5;

/// Lower clamp for the authored success heuristic.
pub const MIN_AUTHORED_SUCCESS: f64 = 0.10;

/// Upper clamp for the authored success heuristic.
pub const MAX_AUTHORED_SUCCESS: f64 = 0.95;

// =============================================================================
// SEARCH BOUNDS
// =============================================================================

/// Maximum number of forward-chaining passes.
///
/// The rule set has a fixed dependency depth, so real runs need at most three
/// passes; this only guards against a malformed rule table.
pub const MAX_CHAINING_PASSES: usize = 16;

/// Maximum number of relaxation steps the resolver will attempt.
pub const MAX_RELAXATION_STEPS: usize = 8;

/// Default fractional overrun of the time budget allowed once time is relaxed.
pub const DEFAULT_TIME_TOLERANCE: f64 = 0.5;

// =============================================================================
// CROSS-VALIDATION
// =============================================================================

/// Default number of folds for cross-validation.
pub const DEFAULT_FOLDS: usize = 10;

// =============================================================================
// PERSISTENCE FORMAT
// =============================================================================

/// Magic bytes for the Larder model file header.
pub const MAGIC_BYTES: &[u8; 4] = b"LRDR";

/// Current model serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed model file size.
///
/// A network is a handful of small tables, so anything larger is corrupt.
pub const MAX_MODEL_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Maximum number of rows accepted in a training dataset.
pub const MAX_DATASET_ROWS: usize = 1_000_000;
