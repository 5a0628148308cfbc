//! Compositor behavior: spin-constrained tweening, hierarchy composition,
//! identity retirement, event/point notifications and frame scheduling.

use std::f32::consts::FRAC_PI_2;
use std::sync::Arc;

use marionette_core::{
    sampling, Animation, Bone, BoneRef, Config, CurveType, Entity, EntityInstance, Eventline,
    EventlineKey, KeyPayload, Mainline, MainlineKey, Object, ObjectKind, ObjectRef, PlaybackEvent,
    PoseKind, Project, Spin, Timeline, TimelineKey, Vec2, NO_PARENT,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn mk_bone(x: f32, y: f32, angle_deg: f32, scale_x: f32, scale_y: f32) -> Bone {
    Bone {
        position: Vec2::new(x, y),
        angle: angle_deg.to_radians(),
        scale_x,
        scale_y,
        combined_scale_x: scale_x,
        combined_scale_y: scale_y,
        ..Default::default()
    }
}

fn bone_key(id: i32, time: f32, spin: Spin, mut bone: Bone) -> TimelineKey {
    bone.spin = spin;
    TimelineKey {
        id,
        time,
        spin,
        curve: CurveType::Linear,
        payload: KeyPayload::Bone(bone),
    }
}

fn object_key(id: i32, time: f32, spin: Spin, mut object: Object) -> TimelineKey {
    object.spin = spin;
    TimelineKey {
        id,
        time,
        spin,
        curve: CurveType::Linear,
        payload: KeyPayload::Object(object),
    }
}

fn bone_timeline(id: i32, name: &str, keys: Vec<TimelineKey>) -> Timeline {
    Timeline {
        id,
        name: name.to_string(),
        object_kind: Some(ObjectKind::Bone),
        keys,
    }
}

fn object_timeline(id: i32, name: &str, kind: Option<ObjectKind>, keys: Vec<TimelineKey>) -> Timeline {
    Timeline {
        id,
        name: name.to_string(),
        object_kind: kind,
        keys,
    }
}

fn bone_ref(id: i32, parent: i32, timeline: i32, key: i32) -> BoneRef {
    BoneRef {
        id,
        parent,
        timeline,
        key,
    }
}

fn object_ref(id: i32, parent: i32, timeline: i32, key: i32, z_index: Option<i32>) -> ObjectRef {
    ObjectRef {
        id,
        parent,
        timeline,
        key,
        z_index,
    }
}

fn main_key(id: i32, time: f32, bone_refs: Vec<BoneRef>, object_refs: Vec<ObjectRef>) -> MainlineKey {
    MainlineKey {
        id,
        time,
        curve: None,
        bone_refs,
        object_refs,
    }
}

fn mk_animation(
    length: f32,
    looping: bool,
    keys: Vec<MainlineKey>,
    timelines: Vec<Timeline>,
    eventlines: Vec<Eventline>,
) -> Animation {
    Animation {
        id: 0,
        name: "test".to_string(),
        length,
        interval: 0.1,
        looping,
        mainline: Mainline { keys },
        timelines,
        eventlines,
    }
}

fn mk_project(animation: Animation) -> Arc<Project> {
    Arc::new(Project {
        entities: vec![Entity {
            id: 0,
            name: "test".to_string(),
            animations: vec![animation],
            object_infos: Vec::new(),
        }],
        ..Default::default()
    })
}

/// Looping 1000 ms animation, bone keys at 0 (angle 0) and 500 (angle 180,
/// clockwise spin): sampling at 250 ms must pass through the clockwise arc
/// and read 90 degrees.
#[test]
fn clockwise_spin_resolves_through_the_long_arc() {
    let animation = mk_animation(
        1.0,
        true,
        vec![
            main_key(0, 0.0, vec![bone_ref(0, NO_PARENT, 0, 0)], vec![]),
            main_key(1, 0.5, vec![bone_ref(0, NO_PARENT, 0, 1)], vec![]),
        ],
        vec![bone_timeline(
            0,
            "root",
            vec![
                bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 1.0, 1.0)),
                bone_key(1, 0.5, Spin::Clockwise, mk_bone(0.0, 0.0, 180.0, 1.0, 1.0)),
            ],
        )],
        vec![],
    );

    let resolved = sampling::resolve(&animation, 0, 0, 0.25).unwrap();
    match resolved.payload {
        KeyPayload::Bone(bone) => approx(bone.angle, FRAC_PI_2, 1e-5),
        other => panic!("expected bone payload, got {other:?}"),
    }
}

#[test]
fn unknown_timeline_is_reported() {
    let animation = mk_animation(1.0, true, vec![], vec![], vec![]);
    let err = sampling::resolve(&animation, 42, 0, 0.0).unwrap_err();
    assert_eq!(err, sampling::ResolveError::UnknownTimeline(42));
}

/// Parent combined scale (2, -1) times child raw scale (1, 1) gives child
/// combined (2, -1); the negative product mirror-flips the child's angle and
/// the child position is scaled into the parent's space.
#[test]
fn combined_scale_and_mirror_flip_propagate() {
    let animation = mk_animation(
        1.0,
        true,
        vec![main_key(
            0,
            0.0,
            vec![bone_ref(0, NO_PARENT, 0, 0), bone_ref(1, 0, 1, 0)],
            vec![],
        )],
        vec![
            bone_timeline(
                0,
                "root",
                vec![bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 2.0, -1.0))],
            ),
            bone_timeline(
                1,
                "child",
                vec![bone_key(0, 0.0, Spin::Clockwise, mk_bone(10.0, 10.0, 30.0, 1.0, 1.0))],
            ),
        ],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    let outputs = instance.update(0.0);

    assert_eq!(outputs.poses.len(), 2);
    let root = &outputs.poses[0];
    assert_eq!(root.parent, None);
    approx(root.scale_x, 2.0, 1e-6);
    approx(root.scale_y, -1.0, 1e-6);

    let child = &outputs.poses[1];
    assert_eq!(child.kind, PoseKind::Bone);
    assert_eq!(child.parent, Some(0));
    approx(child.scale_x, 2.0, 1e-6);
    approx(child.scale_y, -1.0, 1e-6);
    approx(child.angle, -(30.0f32.to_radians()), 1e-5);
    approx(child.position.x, 20.0, 1e-5);
    approx(child.position.y, -10.0, 1e-5);
}

/// The inter-key tween moves from the previous resolved payload toward the
/// current one at elapsed/duration.
#[test]
fn inter_key_motion_tweens_previous_toward_current() {
    let animation = mk_animation(
        1.0,
        true,
        vec![
            main_key(0, 0.0, vec![bone_ref(0, NO_PARENT, 0, 0)], vec![]),
            main_key(1, 0.5, vec![bone_ref(0, NO_PARENT, 0, 1)], vec![]),
        ],
        vec![bone_timeline(
            0,
            "root",
            vec![
                bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 1.0, 1.0)),
                bone_key(1, 0.5, Spin::Clockwise, mk_bone(0.0, 0.0, 90.0, 1.0, 1.0)),
            ],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    // First frame snaps to the initial pose and opens the second key's
    // window immediately (the first wait is zero).
    let outputs = instance.update(0.0);
    approx(outputs.poses[0].angle, 0.0, 1e-5);
    // Halfway through the 0.6 s window (0.5 tail + 0.1 interval).
    let outputs = instance.update(0.3);
    approx(outputs.poses[0].angle, 45.0f32.to_radians(), 1e-4);
}

/// A non-looping animation fires an eventline key exactly once as playback
/// crosses its time, and never again afterward.
#[test]
fn eventline_fires_exactly_once() {
    let animation = mk_animation(
        1.0,
        false,
        vec![main_key(0, 0.0, vec![], vec![])],
        vec![],
        vec![Eventline {
            id: 0,
            name: "footstep".to_string(),
            keys: vec![EventlineKey { id: 0, time: 0.3 }],
        }],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    let mut fired = 0;
    let mut finished = 0;
    for _ in 0..15 {
        let outputs = instance.update(0.1);
        fired += outputs
            .events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::EventTriggered { name } if name == "footstep"))
            .count();
        finished += outputs
            .events
            .iter()
            .filter(|e| matches!(e, PlaybackEvent::Finished))
            .count();
    }
    assert_eq!(fired, 1);
    assert_eq!(finished, 1);
    assert!(instance.is_finished());
    assert!(instance.update(0.1).is_empty());
}

/// An object missing from one mainline key is retired, and snaps to its
/// freshly resolved pose when it reappears later.
#[test]
fn retired_objects_reappear_with_a_fresh_snap() {
    let animation = mk_animation(
        1.0,
        false,
        vec![
            main_key(0, 0.0, vec![], vec![object_ref(0, NO_PARENT, 0, 0, None)]),
            main_key(1, 0.4, vec![], vec![]),
            main_key(2, 0.8, vec![], vec![object_ref(0, NO_PARENT, 0, 1, None)]),
        ],
        vec![object_timeline(
            0,
            "prop",
            Some(ObjectKind::Sprite),
            vec![
                object_key(
                    0,
                    0.0,
                    Spin::Clockwise,
                    Object {
                        position: Vec2::new(0.0, 0.0),
                        ..Default::default()
                    },
                ),
                object_key(
                    1,
                    0.8,
                    Spin::Clockwise,
                    Object {
                        position: Vec2::new(100.0, 0.0),
                        ..Default::default()
                    },
                ),
            ],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();

    let outputs = instance.update(0.0);
    assert_eq!(outputs.poses.len(), 1);

    // Key at 0.4 does not reference the object: retired.
    let outputs = instance.update(0.05);
    assert!(outputs.poses.is_empty());

    // Key at 0.8 references it again: present, snapped to the new pose even
    // though the tick lands mid-window.
    let outputs = instance.update(0.4);
    assert_eq!(outputs.poses.len(), 1);
    approx(outputs.poses[0].position.x, 100.0, 1e-5);
}

/// The wraparound frame lasts (length - last key time) + interval, so a
/// non-looping two-key animation ends only after that tail has elapsed.
#[test]
fn wraparound_frame_covers_the_tail_plus_interval() {
    let animation = mk_animation(
        1.0,
        false,
        vec![
            main_key(0, 0.0, vec![bone_ref(0, NO_PARENT, 0, 0)], vec![]),
            main_key(1, 0.5, vec![bone_ref(0, NO_PARENT, 0, 1)], vec![]),
        ],
        vec![bone_timeline(
            0,
            "root",
            vec![
                bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 1.0, 1.0)),
                bone_key(1, 0.5, Spin::Clockwise, mk_bone(0.0, 0.0, 90.0, 1.0, 1.0)),
            ],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    // The zero-length first frame opens the final key's 0.6 s window
    // ((1.0 - 0.5) tail + 0.1 interval) right away.
    instance.update(0.0);
    instance.update(0.5);
    instance.update(0.09);
    assert!(instance.is_active());
    instance.update(0.02);
    assert!(instance.is_finished());
}

#[test]
fn point_objects_notify_instead_of_posing() {
    let animation = mk_animation(
        1.0,
        true,
        vec![main_key(0, 0.0, vec![], vec![object_ref(0, NO_PARENT, 0, 0, None)])],
        vec![object_timeline(
            0,
            "muzzle",
            Some(ObjectKind::Point),
            vec![object_key(
                0,
                0.0,
                Spin::Clockwise,
                Object {
                    position: Vec2::new(3.0, 4.0),
                    angle: 1.0,
                    ..Default::default()
                },
            )],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    let outputs = instance.update(0.0);
    assert!(outputs.poses.is_empty());
    assert!(outputs.events.iter().any(|e| matches!(
        e,
        PlaybackEvent::PointTriggered { timeline: 0, position, .. } if position.x == 3.0 && position.y == 4.0
    )));
}

/// A dangling timeline reference skips that instance for the frame; the rest
/// of the skeleton keeps animating.
#[test]
fn dangling_refs_skip_only_their_instance() {
    let animation = mk_animation(
        1.0,
        true,
        vec![main_key(
            0,
            0.0,
            vec![bone_ref(0, NO_PARENT, 0, 0)],
            vec![object_ref(0, NO_PARENT, 99, 0, None)],
        )],
        vec![bone_timeline(
            0,
            "root",
            vec![bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 1.0, 1.0))],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    let outputs = instance.update(0.0);
    assert_eq!(outputs.poses.len(), 1);
    assert_eq!(outputs.poses[0].kind, PoseKind::Bone);
}

#[test]
fn z_order_merges_from_the_object_ref() {
    let animation = mk_animation(
        1.0,
        true,
        vec![main_key(0, 0.0, vec![], vec![object_ref(0, NO_PARENT, 0, 0, Some(7))])],
        vec![object_timeline(
            0,
            "prop",
            Some(ObjectKind::Sprite),
            vec![object_key(0, 0.0, Spin::Clockwise, Object::default())],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    let outputs = instance.update(0.0);
    assert_eq!(outputs.poses[0].z_index, 7);
}

#[test]
fn stop_cancels_the_pending_frame() {
    let animation = mk_animation(
        1.0,
        true,
        vec![main_key(0, 0.0, vec![bone_ref(0, NO_PARENT, 0, 0)], vec![])],
        vec![bone_timeline(
            0,
            "root",
            vec![bone_key(0, 0.0, Spin::Clockwise, mk_bone(0.0, 0.0, 0.0, 1.0, 1.0))],
        )],
        vec![],
    );

    let mut instance = EntityInstance::new(mk_project(animation), 0, 0, Config::default()).unwrap();
    assert!(!instance.update(0.0).poses.is_empty());
    instance.stop();
    assert!(!instance.is_active());
    assert!(instance.update(0.1).is_empty());
    assert!(instance.update(10.0).is_empty());
}
