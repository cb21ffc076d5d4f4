//! Common error types.

use thiserror::Error;

/// Main error type for the paint engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid layer id: {0}")]
    InvalidLayerId(String),

    #[error("Invalid blend mode: {0}")]
    InvalidBlendMode(String),

    #[error("Invalid effect type: {0}")]
    InvalidEffectType(String),

    #[error("Cyclic group nesting: {0}")]
    CyclicGroup(String),

    #[error("Surface allocation failed for {width}x{height}")]
    SurfaceAllocation { width: u32, height: u32 },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidLayerId(msg.into())
    }

    pub fn invalid_blend(msg: impl Into<String>) -> Self {
        Self::InvalidBlendMode(msg.into())
    }

    pub fn invalid_effect(msg: impl Into<String>) -> Self {
        Self::InvalidEffectType(msg.into())
    }

    pub fn cyclic(msg: impl Into<String>) -> Self {
        Self::CyclicGroup(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
