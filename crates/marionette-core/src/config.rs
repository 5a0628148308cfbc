//! Runtime playback configuration.

use serde::{Deserialize, Serialize};

/// Per-instance playback flags.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Interpolate between mainline keys. When false every tick holds the
    /// most recent key pose, which is useful for comparing raw keyframes.
    pub tween_frames: bool,
    /// Emit bone visual sizes so a host can draw the skeleton.
    pub show_bones: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tween_frames: true,
            show_bones: false,
        }
    }
}
