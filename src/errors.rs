// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth visualization pipeline
//!
//! The error taxonomy follows the recovery policy of the pipeline:
//! transient conditions (effect still loading, no new frame) are expressed
//! as `bool`/`Option` returns and never reach these types; input-contract
//! violations are rejected in place with a log entry; only fatal GPU
//! resource failures and device loss surface as errors.

use std::fmt;

/// Result type alias using PanelError
pub type PanelResult<T> = Result<T, PanelError>;

/// Top-level error type for panel operations
#[derive(Debug, Clone)]
pub enum PanelError {
    /// GPU resource creation failed (texture, buffer, sampler)
    Resource(ResourceError),
    /// Shader effect creation failed
    Effect(EffectError),
    /// The GPU device was lost; triggers the lifecycle rebuild path
    DeviceLost,
    /// Generic error with message
    Other(String),
}

/// Fatal GPU resource errors
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// No suitable GPU adapter found
    NoAdapter(String),
    /// Device creation failed
    DeviceCreationFailed(String),
    /// Texture or buffer allocation failed
    AllocationFailed(String),
}

/// Fatal shader effect errors
#[derive(Debug, Clone)]
pub enum EffectError {
    /// Shader module or pipeline creation failed
    CreationFailed(String),
    /// Effect was applied before any device resources exist
    NoDevice,
}

impl fmt::Display for PanelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PanelError::Resource(e) => write!(f, "Resource error: {}", e),
            PanelError::Effect(e) => write!(f, "Effect error: {}", e),
            PanelError::DeviceLost => write!(f, "GPU device lost"),
            PanelError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NoAdapter(msg) => write!(f, "No GPU adapter: {}", msg),
            ResourceError::DeviceCreationFailed(msg) => {
                write!(f, "Device creation failed: {}", msg)
            }
            ResourceError::AllocationFailed(msg) => write!(f, "Allocation failed: {}", msg),
        }
    }
}

impl fmt::Display for EffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectError::CreationFailed(msg) => write!(f, "Shader creation failed: {}", msg),
            EffectError::NoDevice => write!(f, "No GPU device available"),
        }
    }
}

impl std::error::Error for PanelError {}
impl std::error::Error for ResourceError {}
impl std::error::Error for EffectError {}

impl From<ResourceError> for PanelError {
    fn from(err: ResourceError) -> Self {
        PanelError::Resource(err)
    }
}

impl From<EffectError> for PanelError {
    fn from(err: EffectError) -> Self {
        PanelError::Effect(err)
    }
}

// GPU-internal helpers report `Result<_, String>`; convert at module edges
impl From<String> for PanelError {
    fn from(msg: String) -> Self {
        PanelError::Other(msg)
    }
}

impl From<&str> for PanelError {
    fn from(msg: &str) -> Self {
        PanelError::Other(msg.to_string())
    }
}
