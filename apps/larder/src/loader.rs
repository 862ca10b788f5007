//! # Collaborator Loaders
//!
//! Reads the catalog, knowledge base, training dataset and networks from disk.
//! Every input path is canonicalized and size-checked before it is read.

use larder_core::{
    BayesNetwork, Catalog, Difficulty, InMemoryKnowledgeBase, KnowledgeBase, LarderError, Recipe,
    RecipeDetails, RedbKnowledgeBase, TrainingRecord, network_from_bytes, network_to_bytes,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a JSON collaborator file (50 MB).
const MAX_JSON_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Maximum size of a training dataset (100 MB).
const MAX_DATASET_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a persisted model (2 MB).
const MAX_MODEL_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), LarderError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| LarderError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(LarderError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
pub fn validate_file_path(path: &Path) -> Result<PathBuf, LarderError> {
    let canonical = path.canonicalize().map_err(|e| {
        LarderError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(LarderError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its canonical parent directory.
pub fn validate_output_path(path: &Path) -> Result<PathBuf, LarderError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        LarderError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(LarderError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| LarderError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn read_text(path: &Path, max_size: u64) -> Result<String, LarderError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, max_size)?;
    std::fs::read_to_string(&path).map_err(|e| LarderError::IoError(e.to_string()))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

// =============================================================================
// CATALOG & KNOWLEDGE BASE
// =============================================================================

/// Load and validate a JSON recipe catalog.
pub fn load_catalog(path: &Path) -> Result<Catalog, LarderError> {
    let content = read_text(path, MAX_JSON_FILE_SIZE)?;
    let recipes: Vec<Recipe> = serde_json::from_str(&content)
        .map_err(|e| LarderError::SerializationError(format!("Invalid catalog JSON: {}", e)))?;
    let catalog = Catalog::new(recipes)?;

    tracing::info!(path = %path.display(), recipes = catalog.len(), "loaded catalog");
    Ok(catalog)
}

/// Read knowledge-base records from a JSON array.
pub fn load_details(path: &Path) -> Result<Vec<RecipeDetails>, LarderError> {
    let content = read_text(path, MAX_JSON_FILE_SIZE)?;
    serde_json::from_str(&content).map_err(|e| {
        LarderError::SerializationError(format!("Invalid knowledge base JSON: {}", e))
    })
}

/// Open the knowledge base.
///
/// - no path: records derived from the catalog
/// - `.redb`: an existing redb database
/// - anything else: a JSON array of records
pub fn load_knowledge(
    path: Option<&Path>,
    catalog: &Catalog,
) -> Result<Arc<dyn KnowledgeBase>, LarderError> {
    let Some(path) = path else {
        tracing::debug!("no knowledge base configured; deriving records from catalog");
        return Ok(Arc::new(InMemoryKnowledgeBase::from_catalog(catalog)));
    };

    let knowledge: Arc<dyn KnowledgeBase> = if has_extension(path, "redb") {
        let path = validate_file_path(path)?;
        Arc::new(RedbKnowledgeBase::open(path)?)
    } else {
        Arc::new(InMemoryKnowledgeBase::new(load_details(path)?)?)
    };

    tracing::info!(
        path = %path.display(),
        records = knowledge.record_count()?,
        "loaded knowledge base"
    );
    Ok(knowledge)
}

// =============================================================================
// TRAINING DATASET
// =============================================================================

/// Load training rows from CSV, or from a JSON array when the extension is `.json`.
pub fn load_dataset(path: &Path) -> Result<Vec<TrainingRecord>, LarderError> {
    let content = read_text(path, MAX_DATASET_FILE_SIZE)?;
    let rows = if has_extension(path, "json") {
        serde_json::from_str(&content)
            .map_err(|e| LarderError::InvalidDataset(format!("Invalid dataset JSON: {}", e)))?
    } else {
        parse_dataset_csv(&content)?
    };

    tracing::info!(path = %path.display(), rows = rows.len(), "loaded dataset");
    Ok(rows)
}

/// Parse `time,difficulty,success` rows.
///
/// The header is required; columns are located by name so their order is
/// free. Blank lines and lines starting with `#` are skipped.
pub fn parse_dataset_csv(content: &str) -> Result<Vec<TrainingRecord>, LarderError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

    let Some((_, header)) = lines.next() else {
        return Ok(Vec::new());
    };
    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_lowercase())
        .collect();
    let column = |name: &str| {
        columns.iter().position(|c| c == name).ok_or_else(|| {
            LarderError::InvalidDataset(format!("missing column '{}' in header", name))
        })
    };
    let (time_col, difficulty_col, success_col) =
        (column("time")?, column("difficulty")?, column("success")?);

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != columns.len() {
            return Err(LarderError::InvalidDataset(format!(
                "line {}: expected {} fields, found {}",
                line_no,
                columns.len(),
                fields.len()
            )));
        }

        let time = fields[time_col].parse::<u32>().map_err(|e| {
            LarderError::InvalidDataset(format!(
                "line {}: invalid time '{}': {}",
                line_no, fields[time_col], e
            ))
        })?;
        let difficulty = fields[difficulty_col]
            .parse::<Difficulty>()
            .map_err(|e| LarderError::InvalidDataset(format!("line {}: {}", line_no, e)))?;
        let success = parse_flag(fields[success_col]).ok_or_else(|| {
            LarderError::InvalidDataset(format!(
                "line {}: invalid success flag '{}'",
                line_no, fields[success_col]
            ))
        })?;

        rows.push(TrainingRecord::new(time, difficulty, success));
    }

    Ok(rows)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

// =============================================================================
// NETWORKS
// =============================================================================

/// Load an authored prior from JSON, or the built-in expert network.
pub fn load_prior(path: Option<&Path>) -> Result<BayesNetwork, LarderError> {
    let Some(path) = path else {
        return BayesNetwork::expert();
    };
    let content = read_text(path, MAX_JSON_FILE_SIZE)?;
    let network: BayesNetwork = serde_json::from_str(&content)
        .map_err(|e| LarderError::InvalidModel(format!("Invalid prior JSON: {}", e)))?;
    network.validate()?;

    tracing::info!(path = %path.display(), "loaded authored prior");
    Ok(network)
}

/// Load a persisted model.
pub fn load_model(path: &Path) -> Result<BayesNetwork, LarderError> {
    let path = validate_file_path(path)?;
    validate_file_size(&path, MAX_MODEL_FILE_SIZE)?;
    let bytes = std::fs::read(&path).map_err(|e| LarderError::IoError(e.to_string()))?;
    network_from_bytes(&bytes)
}

/// Persist a model.
pub fn save_model(network: &BayesNetwork, path: &Path) -> Result<PathBuf, LarderError> {
    let path = validate_output_path(path)?;
    let bytes = network_to_bytes(network)?;
    std::fs::write(&path, bytes).map_err(|e| LarderError::IoError(e.to_string()))?;
    Ok(path)
}
