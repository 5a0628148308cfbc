//! Canonical project model built by the SCML/SCON parsers.
//!
//! Everything here is passive data: a parser populates a [`Project`] once and
//! the playback layer only ever reads it. Times are seconds, angles radians.

use serde::{Deserialize, Serialize};

/// 2D vector used for positions, pivots and sizes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Parent id carried by bone/object refs that have no parent bone.
pub const NO_PARENT: i32 = -1;

/// Objects and files anchor to the top-left corner until a real pivot is
/// known; the parsers replace this sentinel with the referenced file's pivot.
pub const DEFAULT_PIVOT: Vec2 = Vec2 { x: 0.0, y: 1.0 };

/// Rotation direction constraint applied when tweening an angle.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Spin {
    None,
    #[default]
    Clockwise,
    CounterClockwise,
}

impl Spin {
    /// Maps the serialized encoding (-1, 0, 1) onto a spin.
    pub fn from_raw(raw: i32) -> Option<Spin> {
        match raw {
            0 => Some(Spin::None),
            1 => Some(Spin::Clockwise),
            -1 => Some(Spin::CounterClockwise),
            _ => None,
        }
    }
}

/// The part types a timeline or object-info record can be tagged with.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ObjectKind {
    Sprite,
    Bone,
    Box,
    Point,
    Sound,
    Entity,
    Variable,
}

impl ObjectKind {
    pub fn from_name(name: &str) -> Option<ObjectKind> {
        match name {
            "sprite" => Some(ObjectKind::Sprite),
            "bone" => Some(ObjectKind::Bone),
            "box" => Some(ObjectKind::Box),
            "point" => Some(ObjectKind::Point),
            "sound" => Some(ObjectKind::Sound),
            "entity" => Some(ObjectKind::Entity),
            "variable" => Some(ObjectKind::Variable),
            _ => None,
        }
    }
}

/// Timing curve of a key; the arity of the control-point payload differs per
/// family. Serialized as a string name (SCML) or an integer code 0-6 (SCON).
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub enum CurveType {
    Instant,
    #[default]
    Linear,
    Quadratic {
        c1: f32,
    },
    Cubic {
        c1: f32,
        c2: f32,
    },
    Quartic {
        c1: f32,
        c2: f32,
        c3: f32,
    },
    Quintic {
        c1: f32,
        c2: f32,
        c3: f32,
        c4: f32,
    },
    Bezier {
        c1: f32,
        c2: f32,
        c3: f32,
        c4: f32,
    },
}

/// The whole parsed project: image folders plus entity skeletons.
/// Read-only after a successful parse.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    /// Format version recorded in the document root, when present.
    pub version: Option<String>,
    pub generator: Option<String>,
    pub generator_version: Option<String>,
    pub folders: Vec<Folder>,
    pub entities: Vec<Entity>,
}

impl Project {
    pub fn folder(&self, id: i32) -> Option<&Folder> {
        self.folders.iter().find(|f| f.id == id)
    }

    pub fn entity(&self, id: i32) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    /// Looks a file up through its folder.
    pub fn file(&self, folder: i32, file: i32) -> Option<&File> {
        self.folder(folder).and_then(|f| f.file(file))
    }
}

/// A group of image assets.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Folder {
    pub id: i32,
    /// Folders are not required to be named; unnamed ones get this default.
    pub name: String,
    pub files: Vec<File>,
}

impl Folder {
    pub fn file(&self, id: i32) -> Option<&File> {
        self.files.iter().find(|f| f.id == id)
    }
}

/// One image asset: pixel size plus its normalized anchor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct File {
    pub id: i32,
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub pivot: Vec2,
}

/// A named skeleton definition with its animations and per-part metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entity {
    pub id: i32,
    pub name: String,
    pub animations: Vec<Animation>,
    pub object_infos: Vec<ObjectInfo>,
}

impl Entity {
    pub fn animation(&self, id: i32) -> Option<&Animation> {
        self.animations.iter().find(|a| a.id == id)
    }

    pub fn object_info(&self, name: &str) -> Option<&ObjectInfo> {
        self.object_infos.iter().find(|i| i.name == name)
    }
}

/// Per-part metadata; the visual size feeds bone display only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub kind: Option<ObjectKind>,
}

/// One animation of an entity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Animation {
    pub id: i32,
    pub name: String,
    /// Total length in seconds.
    pub length: f32,
    /// Authoring snap interval in seconds; also the tail duration of the
    /// wraparound frame.
    pub interval: f32,
    pub looping: bool,
    pub mainline: Mainline,
    pub timelines: Vec<Timeline>,
    pub eventlines: Vec<Eventline>,
}

impl Animation {
    pub fn timeline(&self, id: i32) -> Option<&Timeline> {
        self.timelines.iter().find(|t| t.id == id)
    }
}

/// The per-animation skeleton schedule: each key lists which bones/objects
/// are active at that instant and how they parent to one another.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Mainline {
    pub keys: Vec<MainlineKey>,
}

impl Mainline {
    /// All key times, sorted ascending.
    pub fn key_times(&self) -> Vec<f32> {
        let mut times: Vec<f32> = self.keys.iter().map(|k| k.time).collect();
        times.sort_by(|a, b| a.total_cmp(b));
        times
    }

    /// The latest key at or before `time`.
    pub fn key_at(&self, time: f32) -> &MainlineKey {
        let mut result = 0;
        for (index, key) in self.keys.iter().enumerate() {
            if key.time <= time {
                result = index;
            }
            if key.time >= time {
                break;
            }
        }
        &self.keys[result]
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MainlineKey {
    pub id: i32,
    pub time: f32,
    pub curve: Option<CurveType>,
    pub bone_refs: Vec<BoneRef>,
    pub object_refs: Vec<ObjectRef>,
}

/// Placement record binding a timeline key to a parent for one mainline key.
/// The `id` is renumbered freely between keys; only `timeline` is stable.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BoneRef {
    pub id: i32,
    pub parent: i32,
    pub timeline: i32,
    pub key: i32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ObjectRef {
    pub id: i32,
    pub parent: i32,
    pub timeline: i32,
    pub key: i32,
    pub z_index: Option<i32>,
}

/// The stable-identity keyframe stream for one bone or object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Timeline {
    pub id: i32,
    pub name: String,
    pub object_kind: Option<ObjectKind>,
    pub keys: Vec<TimelineKey>,
}

/// One keyframe of a timeline: timing plus exactly one payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineKey {
    pub id: i32,
    pub time: f32,
    pub spin: Spin,
    pub curve: CurveType,
    pub payload: KeyPayload,
}

/// A timeline key animates either a bone or an object, never both.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum KeyPayload {
    Bone(Bone),
    Object(Object),
}

/// Authored local state of a bone at one key.
///
/// The combined scales accumulate every ancestor's scale during pose
/// composition; they are kept apart from the raw scale so the hierarchy pass
/// never destroys the authored local value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bone {
    pub position: Vec2,
    pub angle: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub alpha: f32,
    pub spin: Spin,
    /// Visual size from the matching object-info; only used for bone display.
    pub size: Vec2,
    pub combined_scale_x: f32,
    pub combined_scale_y: f32,
}

impl Default for Bone {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            alpha: 1.0,
            spin: Spin::default(),
            size: Vec2::ZERO,
            combined_scale_x: 1.0,
            combined_scale_y: 1.0,
        }
    }
}

/// Authored local state of a sprite object at one key.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Object {
    /// Image reference; absent for non-sprite objects such as points.
    pub folder: Option<i32>,
    pub file: Option<i32>,
    pub position: Vec2,
    pub angle: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub pivot: Vec2,
    pub alpha: f32,
    pub spin: Spin,
    /// Not authored on the timeline: merged in from the object ref during
    /// playback, which is where a z-order change can appear.
    pub z_index: Option<i32>,
}

impl Default for Object {
    fn default() -> Self {
        Self {
            folder: None,
            file: None,
            position: Vec2::ZERO,
            angle: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            pivot: DEFAULT_PIVOT,
            alpha: 1.0,
            spin: Spin::default(),
            z_index: None,
        }
    }
}

/// Named trigger points in time, independent of any bone or object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Eventline {
    pub id: i32,
    pub name: String,
    pub keys: Vec<EventlineKey>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EventlineKey {
    pub id: i32,
    pub time: f32,
}
