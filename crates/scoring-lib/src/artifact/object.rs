//! Generic object format codec
//!
//! Artifacts are UTF-8 JSON documents describing one estimator object,
//! tagged by its `estimator` field.

use crate::model::ObjectModel;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObjectDecodeError {
    #[error("not a valid estimator object: {0}")]
    Syntax(#[from] serde_json::Error),

    #[error("invalid estimator structure: {0}")]
    Structure(String),
}

/// Decode an object artifact
pub fn decode(bytes: &[u8]) -> Result<ObjectModel, ObjectDecodeError> {
    let model: ObjectModel = serde_json::from_slice(bytes)?;
    model
        .validate()
        .map_err(|e| ObjectDecodeError::Structure(e.to_string()))?;
    Ok(model)
}

/// Encode an estimator object
pub fn encode(model: &ObjectModel) -> Vec<u8> {
    // Plain data types with string keys; serialization cannot fail
    serde_json::to_vec_pretty(model).unwrap_or_default()
}

impl ObjectModel {
    /// Serialize into the object artifact format
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }
}
