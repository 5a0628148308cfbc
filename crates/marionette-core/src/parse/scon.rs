//! SCON builder: a recursive walk over the JSON value tree.
//!
//! Absent optional fields yield empty collections; a record missing a
//! required field is dropped with a warning and the walk continues. Scalar
//! fields tolerate both native and string encodings, since the format
//! string-encodes some ids (a timeline id is a string on an object ref but
//! an integer on a bone ref).

use log::warn;
use serde_json::Value;

use super::{apply_inherited_defaults, ParseError};
use crate::data::{
    Animation, Bone, BoneRef, CurveType, Entity, Eventline, EventlineKey, File, Folder,
    KeyPayload, Mainline, MainlineKey, Object, ObjectInfo, ObjectKind, ObjectRef, Project, Spin,
    Timeline, TimelineKey, Vec2, DEFAULT_PIVOT, NO_PARENT,
};

/// Parses an SCON document into a [`Project`].
///
/// The document aborts as a whole only when the root is not an object or the
/// required `entity` member is missing; individual malformed records are
/// dropped.
pub fn parse_scon(bytes: &[u8]) -> Result<Project, ParseError> {
    let root: Value = serde_json::from_slice(bytes)?;
    let doc = root
        .as_object()
        .ok_or(ParseError::InvalidDocument("root is not an object"))?;
    if !doc.contains_key("entity") {
        return Err(ParseError::MissingDocumentField("entity"));
    }

    let mut project = Project {
        version: get_str(&root, "scon_version").map(str::to_string),
        generator: get_str(&root, "generator").map(str::to_string),
        generator_version: get_str(&root, "generator_version").map(str::to_string),
        folders: records(root.get("folder"), "folder", folder_record),
        entities: records(root.get("entity"), "entity", entity_record),
    };
    apply_inherited_defaults(&mut project);
    Ok(project)
}

/// Walks an optional array of records, dropping the malformed ones.
fn records<T>(value: Option<&Value>, what: &str, record: fn(&Value) -> Option<T>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
        .filter_map(|v| {
            let item = record(v);
            if item.is_none() {
                warn!("dropping malformed {what} record");
            }
            item
        })
        .collect()
}

fn get_str<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Number or string-encoded number.
fn get_f32(value: &Value, key: &str) -> Option<f32> {
    match value.get(key)? {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn get_i32(value: &Value, key: &str) -> Option<i32> {
    match value.get(key)? {
        Value::Number(n) => n.as_i64().map(|v| v as i32),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn get_bool(value: &Value, key: &str) -> Option<bool> {
    match value.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s == "true"),
        _ => None,
    }
}

/// Integer milliseconds to seconds.
fn get_ms(value: &Value, key: &str) -> Option<f32> {
    get_f32(value, key).map(|ms| ms / 1000.0)
}

/// Degrees to radians.
fn get_deg(value: &Value, key: &str) -> Option<f32> {
    get_f32(value, key).map(f32::to_radians)
}

fn get_spin(value: &Value) -> Spin {
    get_i32(value, "spin")
        .and_then(Spin::from_raw)
        .unwrap_or_default()
}

fn get_kind(value: &Value) -> Option<ObjectKind> {
    get_str(value, "object_type")
        .or_else(|| get_str(value, "type"))
        .and_then(ObjectKind::from_name)
}

/// Curve code 0-6 with per-family control points.
fn curve_record(value: &Value) -> Option<CurveType> {
    let c1 = get_f32(value, "c1").unwrap_or(0.0);
    let c2 = get_f32(value, "c2").unwrap_or(0.0);
    let c3 = get_f32(value, "c3").unwrap_or(0.0);
    let c4 = get_f32(value, "c4").unwrap_or(0.0);
    match get_i32(value, "curve_type")? {
        0 => Some(CurveType::Instant),
        1 => Some(CurveType::Linear),
        2 => Some(CurveType::Quadratic { c1 }),
        3 => Some(CurveType::Cubic { c1, c2 }),
        4 => Some(CurveType::Quartic { c1, c2, c3 }),
        5 => Some(CurveType::Quintic { c1, c2, c3, c4 }),
        6 => Some(CurveType::Bezier { c1, c2, c3, c4 }),
        _ => None,
    }
}

fn folder_record(value: &Value) -> Option<Folder> {
    Some(Folder {
        id: get_i32(value, "id")?,
        name: get_str(value, "name").unwrap_or("unnamed").to_string(),
        files: records(value.get("file"), "file", file_record),
    })
}

fn file_record(value: &Value) -> Option<File> {
    Some(File {
        id: get_i32(value, "id")?,
        name: get_str(value, "name")?.to_string(),
        width: get_f32(value, "width")?,
        height: get_f32(value, "height")?,
        pivot: Vec2::new(
            get_f32(value, "pivot_x").unwrap_or(DEFAULT_PIVOT.x),
            get_f32(value, "pivot_y").unwrap_or(DEFAULT_PIVOT.y),
        ),
    })
}

fn entity_record(value: &Value) -> Option<Entity> {
    Some(Entity {
        id: get_i32(value, "id")?,
        name: get_str(value, "name")?.to_string(),
        animations: records(value.get("animation"), "animation", animation_record),
        object_infos: records(value.get("obj_info"), "obj_info", object_info_record),
    })
}

fn object_info_record(value: &Value) -> Option<ObjectInfo> {
    Some(ObjectInfo {
        name: get_str(value, "name")?.to_string(),
        width: get_f32(value, "w")?,
        height: get_f32(value, "h")?,
        kind: get_kind(value),
    })
}

fn animation_record(value: &Value) -> Option<Animation> {
    Some(Animation {
        id: get_i32(value, "id")?,
        name: get_str(value, "name")?.to_string(),
        length: get_ms(value, "length")?,
        interval: get_ms(value, "interval")?,
        looping: get_bool(value, "looping").unwrap_or(true),
        mainline: mainline_record(value.get("mainline")?)?,
        timelines: records(value.get("timeline"), "timeline", timeline_record),
        eventlines: records(value.get("eventline"), "eventline", eventline_record),
    })
}

fn mainline_record(value: &Value) -> Option<Mainline> {
    Some(Mainline {
        keys: records(value.get("key"), "mainline key", mainline_key_record),
    })
}

fn mainline_key_record(value: &Value) -> Option<MainlineKey> {
    Some(MainlineKey {
        id: get_i32(value, "id")?,
        time: get_ms(value, "time").unwrap_or(0.0),
        curve: curve_record(value),
        bone_refs: records(value.get("bone_ref"), "bone_ref", bone_ref_record),
        object_refs: records(value.get("object_ref"), "object_ref", object_ref_record),
    })
}

fn bone_ref_record(value: &Value) -> Option<BoneRef> {
    Some(BoneRef {
        id: get_i32(value, "id")?,
        parent: get_i32(value, "parent").unwrap_or(NO_PARENT),
        timeline: get_i32(value, "timeline")?,
        key: get_i32(value, "key")?,
    })
}

fn object_ref_record(value: &Value) -> Option<ObjectRef> {
    Some(ObjectRef {
        id: get_i32(value, "id")?,
        parent: get_i32(value, "parent").unwrap_or(NO_PARENT),
        timeline: get_i32(value, "timeline")?,
        key: get_i32(value, "key")?,
        z_index: get_i32(value, "z_index"),
    })
}

fn timeline_record(value: &Value) -> Option<Timeline> {
    Some(Timeline {
        id: get_i32(value, "id")?,
        name: get_str(value, "name")?.to_string(),
        object_kind: get_kind(value),
        keys: records(value.get("key"), "timeline key", timeline_key_record),
    })
}

fn timeline_key_record(value: &Value) -> Option<TimelineKey> {
    let payload = if let Some(bone) = value.get("bone") {
        KeyPayload::Bone(bone_record(bone))
    } else if let Some(object) = value.get("object") {
        KeyPayload::Object(object_record(object))
    } else {
        return None;
    };
    Some(TimelineKey {
        id: get_i32(value, "id")?,
        time: get_ms(value, "time").unwrap_or(0.0),
        spin: get_spin(value),
        curve: curve_record(value).unwrap_or_default(),
        payload,
    })
}

fn bone_record(value: &Value) -> Bone {
    let scale_x = get_f32(value, "scale_x").unwrap_or(1.0);
    let scale_y = get_f32(value, "scale_y").unwrap_or(1.0);
    Bone {
        position: Vec2::new(
            get_f32(value, "x").unwrap_or(0.0),
            get_f32(value, "y").unwrap_or(0.0),
        ),
        angle: get_deg(value, "angle").unwrap_or(0.0),
        scale_x,
        scale_y,
        alpha: get_f32(value, "a").unwrap_or(1.0),
        combined_scale_x: scale_x,
        combined_scale_y: scale_y,
        ..Default::default()
    }
}

fn object_record(value: &Value) -> Object {
    Object {
        folder: get_i32(value, "folder"),
        file: get_i32(value, "file"),
        position: Vec2::new(
            get_f32(value, "x").unwrap_or(0.0),
            get_f32(value, "y").unwrap_or(0.0),
        ),
        angle: get_deg(value, "angle").unwrap_or(0.0),
        scale_x: get_f32(value, "scale_x").unwrap_or(1.0),
        scale_y: get_f32(value, "scale_y").unwrap_or(1.0),
        pivot: Vec2::new(
            get_f32(value, "pivot_x").unwrap_or(DEFAULT_PIVOT.x),
            get_f32(value, "pivot_y").unwrap_or(DEFAULT_PIVOT.y),
        ),
        alpha: get_f32(value, "a").unwrap_or(1.0),
        ..Default::default()
    }
}

fn eventline_record(value: &Value) -> Option<Eventline> {
    Some(Eventline {
        id: get_i32(value, "id")?,
        name: get_str(value, "name")?.to_string(),
        keys: records(value.get("key"), "eventline key", eventline_key_record),
    })
}

fn eventline_key_record(value: &Value) -> Option<EventlineKey> {
    Some(EventlineKey {
        id: get_i32(value, "id")?,
        time: get_ms(value, "time").unwrap_or(0.0),
    })
}
