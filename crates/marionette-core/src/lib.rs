//! Marionette animation core (renderer-agnostic).
//!
//! Parses a 2D skeletal sprite project exported as SCML (tag stream) or SCON
//! (JSON tree) into an immutable [`Project`] model, and computes interpolated
//! bone/sprite poses for playback: curve evaluation, timeline key resolution
//! and hierarchical pose composition. A host renderer consumes the flat pose
//! stream and event notifications; it never shares mutable state with the
//! core.

pub mod config;
pub mod data;
pub mod engine;
pub mod interp;
pub mod outputs;
pub mod parse;
pub mod sampling;

// Re-exports for consumers (adapters)
pub use config::Config;
pub use data::{
    Animation, Bone, BoneRef, CurveType, Entity, Eventline, EventlineKey, File, Folder,
    KeyPayload, Mainline, MainlineKey, Object, ObjectInfo, ObjectKind, ObjectRef, Project, Spin,
    Timeline, TimelineKey, Vec2, DEFAULT_PIVOT, NO_PARENT,
};
pub use engine::{EntityInstance, PlaybackError};
pub use outputs::{Outputs, PlaybackEvent, PoseKind, PoseRecord, TextureRef};
pub use parse::{parse_scml, parse_scon, ParseError};
pub use sampling::{resolve, ResolveError};
