//! Data models for printer status and layers
//!
//! This module provides:
//! - The printer state tags reported to observers
//! - Front panel UI substates
//! - The `PrinterStatus` snapshot broadcast on every state change
//! - Layer classification (first, burn-in, model)

pub mod status;

pub use status::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a layer for parameter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    /// The very first layer, bonded to the build head
    First,
    /// Intermediate layers directly after the first
    BurnIn,
    /// Steady-state model layers
    Model,
}

impl LayerType {
    /// Classify a 1-based layer index given the number of burn-in layers
    pub fn for_layer(layer: u32, burn_in_layers: u32) -> Self {
        if layer <= 1 {
            LayerType::First
        } else if layer <= burn_in_layers + 1 {
            LayerType::BurnIn
        } else {
            LayerType::Model
        }
    }
}

impl fmt::Display for LayerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerType::First => write!(f, "first"),
            LayerType::BurnIn => write!(f, "burn-in"),
            LayerType::Model => write!(f, "model"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_classification() {
        assert_eq!(LayerType::for_layer(1, 2), LayerType::First);
        assert_eq!(LayerType::for_layer(2, 2), LayerType::BurnIn);
        assert_eq!(LayerType::for_layer(3, 2), LayerType::BurnIn);
        assert_eq!(LayerType::for_layer(4, 2), LayerType::Model);
        assert_eq!(LayerType::for_layer(2, 0), LayerType::Model);
    }
}
