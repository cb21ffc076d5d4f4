//! Engine configuration.

use common::error::{EngineError, EngineResult};
use common::geometry::Size;
use serde::{Deserialize, Serialize};

/// Startup configuration for a [`crate::PaintEngine`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Gradient-to-channel scale for normal map encoding.
    pub normal_strength: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 2048,
            height: 2048,
            normal_strength: displacement::engine::DEFAULT_NORMAL_STRENGTH,
        }
    }
}

impl EngineConfig {
    pub fn canvas(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::invalid(format!("bad config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.canvas(), Size::new(2048, 2048));
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"width": 512, "height": 256}"#).unwrap();
        assert_eq!(config.canvas(), Size::new(512, 256));
        assert_eq!(
            config.normal_strength,
            displacement::engine::DEFAULT_NORMAL_STRENGTH
        );
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
