//! Pose compositor: per-instance playback that walks an animation's mainline,
//! tracks bone/object identity by timeline id, propagates combined scale down
//! the skeleton and emits a flat pose stream plus discrete events.
//!
//! One [`EntityInstance`] exists per animated entity. Instances only share
//! the immutable [`Project`] (behind an `Arc`), so distinct instances are
//! safely independent.

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;

use log::warn;
use thiserror::Error;

use crate::config::Config;
use crate::data::{
    Animation, Bone, Entity, KeyPayload, Object, ObjectKind, Project, NO_PARENT,
};
use crate::outputs::{Outputs, PlaybackEvent, PoseKind, PoseRecord, TextureRef};
use crate::sampling::{self, tween_bone, tween_object};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("unknown entity id {0}")]
    UnknownEntity(i32),
    #[error("unknown animation id {0}")]
    UnknownAnimation(i32),
    #[error("animation {0} has no mainline keys")]
    EmptyMainline(i32),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PlaybackState {
    /// Created but not yet stepped; the first update snaps to key 0.
    Uninitialized,
    /// Inside a frame window, counting down to the next mainline key.
    KeyActive,
    /// A non-looping animation ran past its final key.
    Finished,
    /// Cancelled; the pending frame never fires again.
    Stopped,
}

/// Previous/current resolved payload pair for one timeline, the endpoints of
/// the inter-key tween.
#[derive(Clone, Debug)]
struct Slot<T> {
    prev: T,
    curr: T,
    /// Timeline id of the parent bone at the current key.
    parent: Option<i32>,
}

/// Playback state machine for one animated entity.
pub struct EntityInstance {
    project: Arc<Project>,
    cfg: Config,
    entity_index: usize,
    animation_index: usize,

    /// Sorted mainline key times.
    key_times: Vec<f32>,
    key_index: usize,
    state: PlaybackState,
    initialized: bool,
    /// Seconds elapsed inside the current frame window.
    clock: f32,
    /// Length of the current frame window.
    frame_duration: f32,
    /// Absolute animation time, driving eventline triggers.
    event_clock: f32,

    /// timeline id -> active this frame. Entries that stay false after a key
    /// is processed are retired.
    live: HashMap<i32, bool>,
    /// Raw parent bone id -> timeline id. Raw ids are renumbered freely
    /// between keys; this table, filled the first time a bone timeline is
    /// seen, is how refs find their parents.
    timeline_for_bone: HashMap<i32, i32>,
    bones: HashMap<i32, Slot<Bone>>,
    objects: HashMap<i32, Slot<Object>>,
    /// Emission order for the current key: bones parent-first, then objects.
    bone_emit: Vec<i32>,
    object_emit: Vec<i32>,

    outputs: Outputs,
}

impl EntityInstance {
    pub fn new(
        project: Arc<Project>,
        entity_id: i32,
        animation_id: i32,
        cfg: Config,
    ) -> Result<Self, PlaybackError> {
        let entity_index = project
            .entities
            .iter()
            .position(|e| e.id == entity_id)
            .ok_or(PlaybackError::UnknownEntity(entity_id))?;
        let animation_index = project.entities[entity_index]
            .animations
            .iter()
            .position(|a| a.id == animation_id)
            .ok_or(PlaybackError::UnknownAnimation(animation_id))?;
        let key_times =
            project.entities[entity_index].animations[animation_index].mainline.key_times();
        if key_times.is_empty() {
            return Err(PlaybackError::EmptyMainline(animation_id));
        }

        Ok(Self {
            project,
            cfg,
            entity_index,
            animation_index,
            key_times,
            key_index: 0,
            state: PlaybackState::Uninitialized,
            initialized: false,
            clock: 0.0,
            frame_duration: 0.0,
            event_clock: 0.0,
            live: HashMap::new(),
            timeline_for_bone: HashMap::new(),
            bones: HashMap::new(),
            objects: HashMap::new(),
            bone_emit: Vec::new(),
            object_emit: Vec::new(),
            outputs: Outputs::default(),
        })
    }

    pub fn entity(&self) -> &Entity {
        &self.project.entities[self.entity_index]
    }

    pub fn animation(&self) -> &Animation {
        &self.project.entities[self.entity_index].animations[self.animation_index]
    }

    /// Current playback time in seconds.
    pub fn time(&self) -> f32 {
        self.event_clock
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            PlaybackState::Uninitialized | PlaybackState::KeyActive
        )
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlaybackState::Finished
    }

    /// Cancels the pending frame. Later updates produce no output.
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.outputs.clear();
    }

    /// The outputs of the most recent update.
    pub fn outputs(&self) -> &Outputs {
        &self.outputs
    }

    /// Steps playback by `dt` seconds and returns this tick's poses/events.
    ///
    /// The very first update snaps to the initial key. Subsequent updates
    /// advance the frame countdown, re-entering the mainline whenever it
    /// expires, and tween each live instance from its previous toward its
    /// current resolved payload.
    pub fn update(&mut self, dt: f32) -> &Outputs {
        self.outputs.clear();
        let project = Arc::clone(&self.project);
        let animation = &project.entities[self.entity_index].animations[self.animation_index];

        match self.state {
            PlaybackState::Stopped | PlaybackState::Finished => return &self.outputs,
            PlaybackState::Uninitialized => {
                self.state = PlaybackState::KeyActive;
                self.fire_events_at(animation, 0.0);
                self.process_key(animation);
                self.emit_poses();
                return &self.outputs;
            }
            PlaybackState::KeyActive => {}
        }

        self.advance_events(animation, dt);
        self.clock += dt;

        let mut advances = 0;
        while self.state == PlaybackState::KeyActive
            && self.clock >= self.frame_duration
            && advances <= self.key_times.len()
        {
            self.clock -= self.frame_duration;
            self.advance_key(animation);
            advances += 1;
        }

        match self.state {
            PlaybackState::KeyActive => self.emit_poses(),
            PlaybackState::Finished => {
                // hold the final key pose on the finishing tick
                self.clock = self.frame_duration;
                self.emit_poses();
            }
            _ => {}
        }
        &self.outputs
    }

    fn next_key_index(&self) -> usize {
        if self.key_index < self.key_times.len() - 1 {
            self.key_index + 1
        } else {
            0
        }
    }

    /// Time from the current key to the next one; at the wraparound key this
    /// is the animation's snap interval.
    fn next_duration(&self, animation: &Animation) -> f32 {
        let next = self.next_key_index();
        if next == 0 {
            animation.interval
        } else {
            self.key_times[next] - self.key_times[self.key_index]
        }
    }

    fn advance_key(&mut self, animation: &Animation) {
        let next = self.next_key_index();
        if next == 0 && !animation.looping {
            self.state = PlaybackState::Finished;
            self.outputs.push_event(PlaybackEvent::Finished);
            return;
        }
        self.key_index = next;
        self.process_key(animation);
    }

    /// Re-enters the mainline at the current key: resolves every referenced
    /// timeline, composes the hierarchy (bones before objects, parents before
    /// children) and rolls the previous/current payload pairs.
    fn process_key(&mut self, animation: &Animation) {
        let key_time = self.key_times[self.key_index];
        let key = animation.mainline.key_at(key_time);

        let mut duration = if self.initialized {
            self.next_duration(animation)
        } else {
            0.0
        };
        self.initialized = true;
        // The wraparound frame also covers the gap from the last key to the
        // end of the animation.
        if self.next_key_index() == 0 {
            duration += animation.length - self.key_times[self.key_index];
        }
        self.frame_duration = duration;

        for flag in self.live.values_mut() {
            *flag = false;
        }
        self.bone_emit.clear();
        self.object_emit.clear();

        for bone_ref in &key.bone_refs {
            let resolved =
                match sampling::resolve(animation, bone_ref.timeline, bone_ref.key, key.time) {
                    Ok(resolved) => resolved,
                    Err(err) => {
                        warn!("skipping bone ref in `{}`: {err}", animation.name);
                        continue;
                    }
                };
            let KeyPayload::Bone(mut bone) = resolved.payload else {
                continue;
            };

            let parent = if bone_ref.parent == NO_PARENT {
                None
            } else {
                self.timeline_for_bone.get(&bone_ref.parent).copied()
            };
            if let Some(parent_timeline) = parent {
                if let Some(parent_slot) = self.bones.get(&parent_timeline) {
                    compose_bone(&mut bone, &parent_slot.curr);
                }
            }

            match self.bones.get_mut(&bone_ref.timeline) {
                Some(slot) => {
                    slot.prev = mem::replace(&mut slot.curr, bone);
                    slot.parent = parent;
                }
                None => {
                    self.timeline_for_bone
                        .entry(bone_ref.id)
                        .or_insert(bone_ref.timeline);
                    // fresh instances snap: previous == current
                    self.bones.insert(
                        bone_ref.timeline,
                        Slot {
                            prev: bone.clone(),
                            curr: bone,
                            parent,
                        },
                    );
                }
            }
            self.live.insert(bone_ref.timeline, true);
            self.bone_emit.push(bone_ref.timeline);
        }

        for object_ref in &key.object_refs {
            let is_point = animation
                .timeline(object_ref.timeline)
                .and_then(|t| t.object_kind)
                == Some(ObjectKind::Point);

            let resolved = match sampling::resolve(
                animation,
                object_ref.timeline,
                object_ref.key,
                key.time,
            ) {
                Ok(resolved) => resolved,
                Err(err) => {
                    warn!("skipping object ref in `{}`: {err}", animation.name);
                    continue;
                }
            };
            let KeyPayload::Object(mut object) = resolved.payload else {
                continue;
            };

            // The z order lives on the ref, not the timeline payload.
            object.z_index = object_ref.z_index.or(object.z_index);

            if is_point {
                if resolved.time == key.time {
                    self.outputs.push_event(PlaybackEvent::PointTriggered {
                        timeline: object_ref.timeline,
                        position: object.position,
                        angle: object.angle,
                    });
                }
                continue;
            }

            let parent = if object_ref.parent == NO_PARENT {
                None
            } else {
                self.timeline_for_bone.get(&object_ref.parent).copied()
            };
            if let Some(parent_timeline) = parent {
                if let Some(parent_slot) = self.bones.get(&parent_timeline) {
                    compose_object(&mut object, &parent_slot.curr);
                }
            }

            match self.objects.get_mut(&object_ref.timeline) {
                Some(slot) => {
                    slot.prev = mem::replace(&mut slot.curr, object);
                    slot.parent = parent;
                }
                None => {
                    self.objects.insert(
                        object_ref.timeline,
                        Slot {
                            prev: object.clone(),
                            curr: object,
                            parent,
                        },
                    );
                }
            }
            self.live.insert(object_ref.timeline, true);
            self.object_emit.push(object_ref.timeline);
        }

        // Anything not referenced by this key is gone until it reappears.
        let retired: Vec<i32> = self
            .live
            .iter()
            .filter(|(_, live)| !**live)
            .map(|(id, _)| *id)
            .collect();
        for id in retired {
            self.live.remove(&id);
            self.bones.remove(&id);
            self.objects.remove(&id);
        }
    }

    /// Emits the full pose list for the current tick, tweening previous
    /// toward current at the in-window percentage.
    fn emit_poses(&mut self) {
        let percent = if self.frame_duration > 0.0 {
            (self.clock / self.frame_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let tween = self.cfg.tween_frames;

        for id in &self.bone_emit {
            let Some(slot) = self.bones.get(id) else {
                continue;
            };
            let pose = if tween {
                tween_bone(&slot.prev, &slot.curr, percent)
            } else {
                slot.curr.clone()
            };
            self.outputs.poses.push(PoseRecord {
                timeline: *id,
                kind: PoseKind::Bone,
                parent: slot.parent,
                position: pose.position,
                angle: pose.angle,
                scale_x: pose.combined_scale_x,
                scale_y: pose.combined_scale_y,
                alpha: pose.alpha,
                pivot: None,
                z_index: 0,
                texture: None,
                size: self.cfg.show_bones.then_some(pose.size),
            });
        }

        for id in &self.object_emit {
            let Some(slot) = self.objects.get(id) else {
                continue;
            };
            let pose = if tween {
                tween_object(&slot.prev, &slot.curr, percent)
            } else {
                slot.curr.clone()
            };
            // Image reference and z order are step values: always the
            // current key's, never interpolated.
            let texture = match (slot.curr.folder, slot.curr.file) {
                (Some(folder), Some(file)) => Some(TextureRef { folder, file }),
                _ => None,
            };
            self.outputs.poses.push(PoseRecord {
                timeline: *id,
                kind: PoseKind::Object,
                parent: slot.parent,
                position: pose.position,
                angle: pose.angle,
                scale_x: pose.scale_x,
                scale_y: pose.scale_y,
                alpha: pose.alpha,
                pivot: Some(pose.pivot),
                z_index: slot.curr.z_index.unwrap_or(0),
                texture,
                size: None,
            });
        }
    }

    /// Fires eventline keys crossed by the window `(event_clock, event_clock
    /// + dt]`, wrapping at the animation length while looping.
    fn advance_events(&mut self, animation: &Animation, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let length = animation.length;
        let start = self.event_clock;
        let end = start + dt;

        if !animation.looping {
            let clamped = if length > 0.0 { end.min(length) } else { end };
            self.fire_events_between(animation, start, clamped);
            self.event_clock = clamped;
            return;
        }
        if length <= 0.0 {
            return;
        }
        if end < length {
            self.fire_events_between(animation, start, end);
            self.event_clock = end;
            return;
        }

        self.fire_events_between(animation, start, length);
        let mut remaining = end - length;
        while remaining >= length {
            self.fire_events_at(animation, 0.0);
            self.fire_events_between(animation, 0.0, length);
            remaining -= length;
        }
        self.fire_events_at(animation, 0.0);
        self.fire_events_between(animation, 0.0, remaining);
        self.event_clock = remaining;
    }

    /// Fires keys with `from < time <= to`.
    fn fire_events_between(&mut self, animation: &Animation, from: f32, to: f32) {
        for eventline in &animation.eventlines {
            for key in &eventline.keys {
                if key.time > from && key.time <= to {
                    self.outputs.push_event(PlaybackEvent::EventTriggered {
                        name: eventline.name.clone(),
                    });
                }
            }
        }
    }

    fn fire_events_at(&mut self, animation: &Animation, time: f32) {
        for eventline in &animation.eventlines {
            for key in &eventline.keys {
                if key.time == time {
                    self.outputs.push_event(PlaybackEvent::EventTriggered {
                        name: eventline.name.clone(),
                    });
                }
            }
        }
    }
}

/// Applies a parent bone to a child bone: combined scale is the product down
/// the chain, a negative combined-scale product mirror-flips the child's
/// angle, and the local position is scaled into the parent's space. The raw
/// scale is left untouched.
fn compose_bone(bone: &mut Bone, parent: &Bone) {
    bone.combined_scale_x = bone.scale_x * parent.combined_scale_x;
    bone.combined_scale_y = bone.scale_y * parent.combined_scale_y;
    if parent.combined_scale_x * parent.combined_scale_y < 0.0 {
        bone.angle = -bone.angle;
    }
    bone.position.x *= parent.combined_scale_x;
    bone.position.y *= parent.combined_scale_y;
}

/// Objects have no children, so the parent's combined scale folds straight
/// into their own scale.
fn compose_object(object: &mut Object, parent: &Bone) {
    object.scale_x *= parent.combined_scale_x;
    object.scale_y *= parent.combined_scale_y;
    object.position.x *= parent.combined_scale_x;
    object.position.y *= parent.combined_scale_y;
    if parent.combined_scale_x * parent.combined_scale_y < 0.0 {
        object.angle = -object.angle;
    }
}
