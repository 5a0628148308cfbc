//! Output contracts of the pose compositor.
//!
//! Each tick produces a flat list of pose records plus a separate list of
//! discrete events. A host renderer applies the records to its own scene
//! representation and transports the events.

use serde::{Deserialize, Serialize};

use crate::data::Vec2;

#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PoseKind {
    Bone,
    Object,
}

/// The image a sprite record displays, addressed through the project model.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextureRef {
    pub folder: i32,
    pub file: i32,
}

/// One bone/object placement for the current tick.
///
/// Position and angle are relative to the parent record's frame; scale is
/// already composed down the hierarchy, so a host never re-applies parent
/// scale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoseRecord {
    /// The stable identity of this instance across the whole animation.
    pub timeline: i32,
    pub kind: PoseKind,
    /// Timeline id of the parent bone, if any.
    pub parent: Option<i32>,
    pub position: Vec2,
    pub angle: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub alpha: f32,
    /// Normalized anchor; sprites only.
    pub pivot: Option<Vec2>,
    pub z_index: i32,
    pub texture: Option<TextureRef>,
    /// Bone visual size, present when bone display is enabled.
    pub size: Option<Vec2>,
}

/// Discrete signals emitted during stepping.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub enum PlaybackEvent {
    /// A point-kind object fired at the active key.
    PointTriggered {
        timeline: i32,
        position: Vec2,
        angle: f32,
    },
    /// Playback time crossed a named eventline key.
    EventTriggered { name: String },
    /// A non-looping animation ran out of keys.
    Finished,
}

/// Outputs returned by [`EntityInstance::update`](crate::EntityInstance::update).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(default)]
    pub poses: Vec<PoseRecord>,
    #[serde(default)]
    pub events: Vec<PlaybackEvent>,
}

impl Outputs {
    #[inline]
    pub fn clear(&mut self) {
        self.poses.clear();
        self.events.clear();
    }

    #[inline]
    pub fn push_pose(&mut self, pose: PoseRecord) {
        self.poses.push(pose);
    }

    #[inline]
    pub fn push_event(&mut self, event: PlaybackEvent) {
        self.events.push(event);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.poses.is_empty() && self.events.is_empty()
    }
}
