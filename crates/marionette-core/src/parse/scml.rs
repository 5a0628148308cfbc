//! SCML builder: a finite-state machine driven by the markup tag stream.
//!
//! Each state owns a fixed table of valid child states; any other child tag
//! aborts the parse with a diagnostic naming the tag, source line and the
//! enclosing parent. Closing a tag pops back to the parent state.

use std::collections::HashMap;

use log::warn;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{apply_inherited_defaults, ParseError};
use crate::data::{
    Animation, Bone, BoneRef, CurveType, Entity, Eventline, EventlineKey, File, Folder,
    KeyPayload, MainlineKey, Object, ObjectInfo, ObjectKind, ObjectRef, Project, Spin, Timeline,
    TimelineKey, Vec2, DEFAULT_PIVOT, NO_PARENT,
};

/// Parses an SCML document into a [`Project`].
///
/// Structural violations are terminal: the first misplaced element aborts
/// the whole parse and no partial model is returned.
pub fn parse_scml(bytes: &[u8]) -> Result<Project, ParseError> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut builder = ScmlBuilder::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(element) => {
                let line = line_of(bytes, reader.buffer_position() as usize);
                builder.open(&element, line)?;
            }
            Event::Empty(element) => {
                let line = line_of(bytes, reader.buffer_position() as usize);
                builder.open(&element, line)?;
                builder.close();
            }
            Event::End(_) => builder.close(),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !builder.saw_root {
        return Err(ParseError::MissingDocumentField("spriter_data"));
    }

    let mut project = builder.project;
    apply_inherited_defaults(&mut project);
    Ok(project)
}

fn line_of(bytes: &[u8], position: usize) -> usize {
    let end = position.min(bytes.len());
    bytes[..end].iter().filter(|b| **b == b'\n').count() + 1
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Document,
    SpriterData,
    Folder,
    File,
    Entity,
    ObjInfo,
    CharacterMap,
    Map,
    Animation,
    Mainline,
    MainlineKey,
    BoneRef,
    ObjectRef,
    Timeline,
    TimelineKey,
    Bone,
    Object,
    Eventline,
    EventlineKey,
}

impl State {
    fn tag(self) -> &'static str {
        match self {
            State::Document => "document",
            State::SpriterData => "spriter_data",
            State::Folder => "folder",
            State::File => "file",
            State::Entity => "entity",
            State::ObjInfo => "obj_info",
            State::CharacterMap => "character_map",
            State::Map => "map",
            State::Animation => "animation",
            State::Mainline => "mainline",
            State::MainlineKey | State::TimelineKey | State::EventlineKey => "key",
            State::BoneRef => "bone_ref",
            State::ObjectRef => "object_ref",
            State::Timeline => "timeline",
            State::Bone => "bone",
            State::Object => "object",
            State::Eventline => "eventline",
        }
    }

    /// The state a tag maps to, given the state it appears in. `key` is
    /// ambiguous and resolves through its parent.
    fn for_tag(tag: &str, current: State) -> Option<State> {
        match tag {
            "spriter_data" => Some(State::SpriterData),
            "folder" => Some(State::Folder),
            "file" => Some(State::File),
            "entity" => Some(State::Entity),
            "obj_info" => Some(State::ObjInfo),
            "character_map" => Some(State::CharacterMap),
            "map" => Some(State::Map),
            "animation" => Some(State::Animation),
            "mainline" => Some(State::Mainline),
            "bone_ref" => Some(State::BoneRef),
            "object_ref" => Some(State::ObjectRef),
            "timeline" => Some(State::Timeline),
            "bone" => Some(State::Bone),
            "object" => Some(State::Object),
            "eventline" => Some(State::Eventline),
            "key" => match current {
                State::Mainline => Some(State::MainlineKey),
                State::Timeline => Some(State::TimelineKey),
                State::Eventline => Some(State::EventlineKey),
                _ => None,
            },
            _ => None,
        }
    }

    fn valid_children(self) -> &'static [State] {
        match self {
            State::Document => &[State::SpriterData],
            State::SpriterData => &[State::Folder, State::Entity],
            State::Folder => &[State::File],
            State::Entity => &[State::Animation, State::ObjInfo, State::CharacterMap],
            State::CharacterMap => &[State::Map],
            State::Animation => &[State::Mainline, State::Timeline, State::Eventline],
            State::Mainline => &[State::MainlineKey],
            State::MainlineKey => &[State::ObjectRef, State::BoneRef],
            State::Timeline => &[State::TimelineKey],
            State::TimelineKey => &[State::Object, State::Bone],
            State::Eventline => &[State::EventlineKey],
            State::File
            | State::ObjInfo
            | State::Map
            | State::BoneRef
            | State::ObjectRef
            | State::Bone
            | State::Object
            | State::EventlineKey => &[],
        }
    }

    fn parent(self) -> State {
        match self {
            State::Document | State::SpriterData => State::Document,
            State::Folder | State::Entity => State::SpriterData,
            State::File => State::Folder,
            State::ObjInfo | State::CharacterMap | State::Animation => State::Entity,
            State::Map => State::CharacterMap,
            State::Mainline | State::Timeline | State::Eventline => State::Animation,
            State::MainlineKey => State::Mainline,
            State::BoneRef | State::ObjectRef => State::MainlineKey,
            State::TimelineKey => State::Timeline,
            State::Bone | State::Object => State::TimelineKey,
            State::EventlineKey => State::Eventline,
        }
    }
}

type Attrs = HashMap<String, String>;

/// A timeline key whose payload child has not been seen yet.
struct PartialKey {
    id: i32,
    time: f32,
    spin: Spin,
    curve: CurveType,
    payload: Option<KeyPayload>,
}

struct ScmlBuilder {
    state: State,
    saw_root: bool,
    project: Project,
    folder: Option<Folder>,
    entity: Option<Entity>,
    animation: Option<Animation>,
    has_mainline: bool,
    mainline_key: Option<MainlineKey>,
    timeline: Option<Timeline>,
    timeline_key: Option<PartialKey>,
    eventline: Option<Eventline>,
}

impl ScmlBuilder {
    fn new() -> Self {
        Self {
            state: State::Document,
            saw_root: false,
            project: Project::default(),
            folder: None,
            entity: None,
            animation: None,
            has_mainline: false,
            mainline_key: None,
            timeline: None,
            timeline_key: None,
            eventline: None,
        }
    }

    fn open(&mut self, element: &BytesStart, line: usize) -> Result<(), ParseError> {
        let tag = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        let next = match State::for_tag(&tag, self.state) {
            Some(next) if self.state.valid_children().contains(&next) => next,
            _ => {
                return Err(ParseError::UnexpectedElement {
                    tag,
                    line,
                    parent: self.state.tag().to_string(),
                })
            }
        };

        let attrs = attributes(element)?;
        self.state = next;

        match next {
            State::Document => {}
            State::SpriterData => {
                self.saw_root = true;
                self.project.version = attrs.get("scml_version").cloned();
                self.project.generator = attrs.get("generator").cloned();
                self.project.generator_version = attrs.get("generator_version").cloned();
            }
            State::Folder => {
                self.folder = or_warn(folder_record(&attrs), "folder");
            }
            State::File => {
                if let Some(folder) = &mut self.folder {
                    if let Some(file) = or_warn(file_record(&attrs), "file") {
                        folder.files.push(file);
                    }
                }
            }
            State::Entity => {
                self.entity = or_warn(entity_record(&attrs), "entity");
            }
            State::ObjInfo => {
                if let Some(entity) = &mut self.entity {
                    if let Some(info) = or_warn(object_info_record(&attrs), "obj_info") {
                        entity.object_infos.push(info);
                    }
                }
            }
            State::CharacterMap | State::Map => {}
            State::Animation => {
                self.has_mainline = false;
                if self.entity.is_some() {
                    self.animation = or_warn(animation_record(&attrs), "animation");
                }
            }
            State::Mainline => {
                if self.animation.is_some() {
                    self.has_mainline = true;
                }
            }
            State::MainlineKey => {
                if self.animation.is_some() {
                    self.mainline_key = or_warn(mainline_key_record(&attrs), "mainline key");
                }
            }
            State::BoneRef => {
                if let Some(key) = &mut self.mainline_key {
                    if let Some(bone_ref) = or_warn(bone_ref_record(&attrs), "bone_ref") {
                        key.bone_refs.push(bone_ref);
                    }
                }
            }
            State::ObjectRef => {
                if let Some(key) = &mut self.mainline_key {
                    if let Some(object_ref) = or_warn(object_ref_record(&attrs), "object_ref") {
                        key.object_refs.push(object_ref);
                    }
                }
            }
            State::Timeline => {
                if self.animation.is_some() {
                    self.timeline = or_warn(timeline_record(&attrs), "timeline");
                }
            }
            State::TimelineKey => {
                if self.timeline.is_some() {
                    self.timeline_key = or_warn(timeline_key_record(&attrs), "timeline key");
                }
            }
            State::Bone => {
                if let Some(key) = &mut self.timeline_key {
                    key.payload = Some(KeyPayload::Bone(bone_record(&attrs)));
                }
            }
            State::Object => {
                if let Some(key) = &mut self.timeline_key {
                    key.payload = Some(KeyPayload::Object(object_record(&attrs)));
                }
            }
            State::Eventline => {
                if self.animation.is_some() {
                    self.eventline = or_warn(eventline_record(&attrs), "eventline");
                }
            }
            State::EventlineKey => {
                if let Some(eventline) = &mut self.eventline {
                    if let Some(key) = or_warn(eventline_key_record(&attrs), "eventline key") {
                        eventline.keys.push(key);
                    }
                }
            }
        }

        Ok(())
    }

    fn close(&mut self) {
        match self.state {
            State::Folder => {
                if let Some(folder) = self.folder.take() {
                    self.project.folders.push(folder);
                }
            }
            State::Entity => {
                if let Some(entity) = self.entity.take() {
                    self.project.entities.push(entity);
                }
            }
            State::Animation => {
                if let Some(animation) = self.animation.take() {
                    if self.has_mainline {
                        if let Some(entity) = &mut self.entity {
                            entity.animations.push(animation);
                        }
                    } else {
                        warn!("dropping animation `{}`: no mainline", animation.name);
                    }
                }
            }
            State::MainlineKey => {
                if let Some(key) = self.mainline_key.take() {
                    if let Some(animation) = &mut self.animation {
                        animation.mainline.keys.push(key);
                    }
                }
            }
            State::Timeline => {
                if let Some(timeline) = self.timeline.take() {
                    if let Some(animation) = &mut self.animation {
                        animation.timelines.push(timeline);
                    }
                }
            }
            State::TimelineKey => {
                if let Some(partial) = self.timeline_key.take() {
                    match partial.payload {
                        Some(payload) => {
                            if let Some(timeline) = &mut self.timeline {
                                timeline.keys.push(TimelineKey {
                                    id: partial.id,
                                    time: partial.time,
                                    spin: partial.spin,
                                    curve: partial.curve,
                                    payload,
                                });
                            }
                        }
                        None => warn!("dropping timeline key {}: no payload", partial.id),
                    }
                }
            }
            State::Eventline => {
                if let Some(eventline) = self.eventline.take() {
                    if let Some(animation) = &mut self.animation {
                        animation.eventlines.push(eventline);
                    }
                }
            }
            _ => {}
        }
        self.state = self.state.parent();
    }
}

fn attributes(element: &BytesStart) -> Result<Attrs, ParseError> {
    let mut map = Attrs::new();
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn or_warn<T>(record: Option<T>, what: &str) -> Option<T> {
    if record.is_none() {
        warn!("dropping malformed {what} record");
    }
    record
}

fn attr_i32(attrs: &Attrs, key: &str) -> Option<i32> {
    attrs.get(key).and_then(|v| v.parse().ok())
}

fn attr_f32(attrs: &Attrs, key: &str) -> Option<f32> {
    attrs.get(key).and_then(|v| v.parse().ok())
}

/// Integer milliseconds to seconds.
fn attr_ms(attrs: &Attrs, key: &str) -> Option<f32> {
    attr_f32(attrs, key).map(|ms| ms / 1000.0)
}

/// Degrees to radians.
fn attr_deg(attrs: &Attrs, key: &str) -> Option<f32> {
    attr_f32(attrs, key).map(f32::to_radians)
}

fn attr_spin(attrs: &Attrs) -> Spin {
    attr_i32(attrs, "spin")
        .and_then(Spin::from_raw)
        .unwrap_or_default()
}

fn attr_kind(attrs: &Attrs) -> Option<ObjectKind> {
    attrs
        .get("object_type")
        .or_else(|| attrs.get("type"))
        .and_then(|name| ObjectKind::from_name(name))
}

fn curve_record(attrs: &Attrs) -> Option<CurveType> {
    let c1 = attr_f32(attrs, "c1").unwrap_or(0.0);
    let c2 = attr_f32(attrs, "c2").unwrap_or(0.0);
    let c3 = attr_f32(attrs, "c3").unwrap_or(0.0);
    let c4 = attr_f32(attrs, "c4").unwrap_or(0.0);
    match attrs.get("curve_type")?.as_str() {
        "instant" => Some(CurveType::Instant),
        "linear" => Some(CurveType::Linear),
        "quadratic" => Some(CurveType::Quadratic { c1 }),
        "cubic" => Some(CurveType::Cubic { c1, c2 }),
        "quartic" => Some(CurveType::Quartic { c1, c2, c3 }),
        "quintic" => Some(CurveType::Quintic { c1, c2, c3, c4 }),
        "bezier" => Some(CurveType::Bezier { c1, c2, c3, c4 }),
        _ => None,
    }
}

fn folder_record(attrs: &Attrs) -> Option<Folder> {
    Some(Folder {
        id: attr_i32(attrs, "id")?,
        name: attrs
            .get("name")
            .cloned()
            .unwrap_or_else(|| "unnamed".to_string()),
        files: Vec::new(),
    })
}

fn file_record(attrs: &Attrs) -> Option<File> {
    Some(File {
        id: attr_i32(attrs, "id")?,
        name: attrs.get("name")?.clone(),
        width: attr_f32(attrs, "width")?,
        height: attr_f32(attrs, "height")?,
        pivot: Vec2::new(
            attr_f32(attrs, "pivot_x").unwrap_or(DEFAULT_PIVOT.x),
            attr_f32(attrs, "pivot_y").unwrap_or(DEFAULT_PIVOT.y),
        ),
    })
}

fn entity_record(attrs: &Attrs) -> Option<Entity> {
    Some(Entity {
        id: attr_i32(attrs, "id")?,
        name: attrs.get("name")?.clone(),
        animations: Vec::new(),
        object_infos: Vec::new(),
    })
}

fn object_info_record(attrs: &Attrs) -> Option<ObjectInfo> {
    Some(ObjectInfo {
        name: attrs.get("name")?.clone(),
        width: attr_f32(attrs, "w")?,
        height: attr_f32(attrs, "h")?,
        kind: attr_kind(attrs),
    })
}

fn animation_record(attrs: &Attrs) -> Option<Animation> {
    Some(Animation {
        id: attr_i32(attrs, "id")?,
        name: attrs.get("name")?.clone(),
        length: attr_ms(attrs, "length")?,
        interval: attr_ms(attrs, "interval")?,
        looping: attrs.get("looping").map(|v| v == "true").unwrap_or(true),
        mainline: Default::default(),
        timelines: Vec::new(),
        eventlines: Vec::new(),
    })
}

fn mainline_key_record(attrs: &Attrs) -> Option<MainlineKey> {
    Some(MainlineKey {
        id: attr_i32(attrs, "id")?,
        time: attr_ms(attrs, "time").unwrap_or(0.0),
        curve: curve_record(attrs),
        bone_refs: Vec::new(),
        object_refs: Vec::new(),
    })
}

fn bone_ref_record(attrs: &Attrs) -> Option<BoneRef> {
    Some(BoneRef {
        id: attr_i32(attrs, "id")?,
        parent: attr_i32(attrs, "parent").unwrap_or(NO_PARENT),
        timeline: attr_i32(attrs, "timeline")?,
        key: attr_i32(attrs, "key")?,
    })
}

fn object_ref_record(attrs: &Attrs) -> Option<ObjectRef> {
    Some(ObjectRef {
        id: attr_i32(attrs, "id")?,
        parent: attr_i32(attrs, "parent").unwrap_or(NO_PARENT),
        timeline: attr_i32(attrs, "timeline")?,
        key: attr_i32(attrs, "key")?,
        z_index: attr_i32(attrs, "z_index"),
    })
}

fn timeline_record(attrs: &Attrs) -> Option<Timeline> {
    Some(Timeline {
        id: attr_i32(attrs, "id")?,
        name: attrs.get("name")?.clone(),
        object_kind: attr_kind(attrs),
        keys: Vec::new(),
    })
}

fn timeline_key_record(attrs: &Attrs) -> Option<PartialKey> {
    Some(PartialKey {
        id: attr_i32(attrs, "id")?,
        time: attr_ms(attrs, "time").unwrap_or(0.0),
        spin: attr_spin(attrs),
        curve: curve_record(attrs).unwrap_or_default(),
        payload: None,
    })
}

fn bone_record(attrs: &Attrs) -> Bone {
    let scale_x = attr_f32(attrs, "scale_x").unwrap_or(1.0);
    let scale_y = attr_f32(attrs, "scale_y").unwrap_or(1.0);
    Bone {
        position: Vec2::new(
            attr_f32(attrs, "x").unwrap_or(0.0),
            attr_f32(attrs, "y").unwrap_or(0.0),
        ),
        angle: attr_deg(attrs, "angle").unwrap_or(0.0),
        scale_x,
        scale_y,
        alpha: attr_f32(attrs, "a").unwrap_or(1.0),
        combined_scale_x: scale_x,
        combined_scale_y: scale_y,
        ..Default::default()
    }
}

fn object_record(attrs: &Attrs) -> Object {
    Object {
        folder: attr_i32(attrs, "folder"),
        file: attr_i32(attrs, "file"),
        position: Vec2::new(
            attr_f32(attrs, "x").unwrap_or(0.0),
            attr_f32(attrs, "y").unwrap_or(0.0),
        ),
        angle: attr_deg(attrs, "angle").unwrap_or(0.0),
        scale_x: attr_f32(attrs, "scale_x").unwrap_or(1.0),
        scale_y: attr_f32(attrs, "scale_y").unwrap_or(1.0),
        pivot: Vec2::new(
            attr_f32(attrs, "pivot_x").unwrap_or(DEFAULT_PIVOT.x),
            attr_f32(attrs, "pivot_y").unwrap_or(DEFAULT_PIVOT.y),
        ),
        alpha: attr_f32(attrs, "a").unwrap_or(1.0),
        ..Default::default()
    }
}

fn eventline_record(attrs: &Attrs) -> Option<Eventline> {
    Some(Eventline {
        id: attr_i32(attrs, "id")?,
        name: attrs.get("name")?.clone(),
        keys: Vec::new(),
    })
}

fn eventline_key_record(attrs: &Attrs) -> Option<EventlineKey> {
    Some(EventlineKey {
        id: attr_i32(attrs, "id")?,
        time: attr_ms(attrs, "time").unwrap_or(0.0),
    })
}
