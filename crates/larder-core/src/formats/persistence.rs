//! # Persistence Format
//!
//! Binary serialization for fitted networks.
//!
//! Format: Header (5 bytes) + postcard-serialized `BayesNetwork`.
//! - 4 bytes: Magic ("LRDR")
//! - 1 byte: Version
//!
//! Size and header are checked before the payload is decoded, and the decoded
//! network is validated before it is returned.

use crate::bayes::BayesNetwork;
use crate::{LarderError, primitives};

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every persisted model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl ModelHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), LarderError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(LarderError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(LarderError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LarderError> {
        if bytes.len() < HEADER_LEN {
            return Err(LarderError::SerializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for ModelHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a network to bytes (header + payload). No file I/O.
pub fn network_to_bytes(network: &BayesNetwork) -> Result<Vec<u8>, LarderError> {
    let payload = postcard::to_stdvec(network)
        .map_err(|e| LarderError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&ModelHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize and validate a network. No file I/O.
///
/// Malformed tables surface as `LarderError::InvalidModel`; framing problems
/// as `LarderError::SerializationError`.
pub fn network_from_bytes(bytes: &[u8]) -> Result<BayesNetwork, LarderError> {
    if bytes.len() < HEADER_LEN {
        return Err(LarderError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_LEN
        )));
    }
    if bytes.len() > primitives::MAX_MODEL_PAYLOAD_SIZE {
        return Err(LarderError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            primitives::MAX_MODEL_PAYLOAD_SIZE
        )));
    }

    let header = ModelHeader::from_bytes(bytes)?;
    header.validate()?;

    let network: BayesNetwork = postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| {
        LarderError::SerializationError(format!("Failed to deserialize model data: {}", e))
    })?;
    network.validate()?;
    Ok(network)
}

// =============================================================================
// TESTS
// =============================================================================
