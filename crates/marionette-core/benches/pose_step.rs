use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use marionette_core::{
    Animation, Bone, BoneRef, Config, CurveType, Entity, EntityInstance, KeyPayload, Mainline,
    MainlineKey, Object, ObjectKind, ObjectRef, Project, Spin, Timeline, TimelineKey, Vec2,
    NO_PARENT,
};

const BONES: i32 = 32;
const OBJECTS: i32 = 32;

fn bone_key(id: i32, time: f32, angle: f32) -> TimelineKey {
    TimelineKey {
        id,
        time,
        spin: Spin::Clockwise,
        curve: CurveType::Linear,
        payload: KeyPayload::Bone(Bone {
            position: Vec2::new(10.0, 0.0),
            angle,
            ..Default::default()
        }),
    }
}

fn object_key(id: i32, time: f32, x: f32) -> TimelineKey {
    TimelineKey {
        id,
        time,
        spin: Spin::Clockwise,
        curve: CurveType::Linear,
        payload: KeyPayload::Object(Object {
            folder: Some(0),
            file: Some(0),
            position: Vec2::new(x, 0.0),
            ..Default::default()
        }),
    }
}

/// A chain of bones with one sprite hanging off each, two mainline keys.
fn build_project() -> Arc<Project> {
    let mut timelines = Vec::new();
    let mut refs_a = (Vec::new(), Vec::new());
    let mut refs_b = (Vec::new(), Vec::new());

    for i in 0..BONES {
        timelines.push(Timeline {
            id: i,
            name: format!("bone_{i}"),
            object_kind: Some(ObjectKind::Bone),
            keys: vec![bone_key(0, 0.0, 0.0), bone_key(1, 0.5, 0.4)],
        });
        let parent = if i == 0 { NO_PARENT } else { i - 1 };
        refs_a.0.push(BoneRef {
            id: i,
            parent,
            timeline: i,
            key: 0,
        });
        refs_b.0.push(BoneRef {
            id: i,
            parent,
            timeline: i,
            key: 1,
        });
    }
    for i in 0..OBJECTS {
        let timeline = BONES + i;
        timelines.push(Timeline {
            id: timeline,
            name: format!("sprite_{i}"),
            object_kind: Some(ObjectKind::Sprite),
            keys: vec![object_key(0, 0.0, 5.0), object_key(1, 0.5, 8.0)],
        });
        refs_a.1.push(ObjectRef {
            id: i,
            parent: i % BONES,
            timeline,
            key: 0,
            z_index: Some(i),
        });
        refs_b.1.push(ObjectRef {
            id: i,
            parent: i % BONES,
            timeline,
            key: 1,
            z_index: Some(i),
        });
    }

    let animation = Animation {
        id: 0,
        name: "bench".to_string(),
        length: 1.0,
        interval: 0.1,
        looping: true,
        mainline: Mainline {
            keys: vec![
                MainlineKey {
                    id: 0,
                    time: 0.0,
                    curve: None,
                    bone_refs: refs_a.0,
                    object_refs: refs_a.1,
                },
                MainlineKey {
                    id: 1,
                    time: 0.5,
                    curve: None,
                    bone_refs: refs_b.0,
                    object_refs: refs_b.1,
                },
            ],
        },
        timelines,
        eventlines: Vec::new(),
    };

    Arc::new(Project {
        entities: vec![Entity {
            id: 0,
            name: "bench".to_string(),
            animations: vec![animation],
            object_infos: Vec::new(),
        }],
        ..Default::default()
    })
}

fn bench_pose_step(c: &mut Criterion) {
    let project = build_project();

    c.bench_function("pose_step_64_instances", |b| {
        let mut instance = EntityInstance::new(project.clone(), 0, 0, Config::default()).unwrap();
        instance.update(0.0);
        b.iter(|| black_box(instance.update(0.004).poses.len()));
    });
}

criterion_group!(benches, bench_pose_step);
criterion_main!(benches);
