//! Timeline key resolution: producing a tweened key payload for an arbitrary
//! time between a reference key and its successor.

use thiserror::Error;

use crate::data::{Animation, Bone, CurveType, KeyPayload, Object, TimelineKey};
use crate::interp::{apply_curve, lerp, lerp_vec2, tween_angle};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("unknown timeline id {0}")]
    UnknownTimeline(i32),
    #[error("timeline {timeline} has no key {key}")]
    UnknownKey { timeline: i32, key: i32 },
}

/// Tween of a bone payload; angle honors the source key's spin, everything
/// else is linear.
pub fn tween_bone(a: &Bone, b: &Bone, t: f32) -> Bone {
    Bone {
        position: lerp_vec2(a.position, b.position, t),
        angle: tween_angle(a.angle, b.angle, t, a.spin),
        scale_x: lerp(a.scale_x, b.scale_x, t),
        scale_y: lerp(a.scale_y, b.scale_y, t),
        alpha: lerp(a.alpha, b.alpha, t),
        spin: a.spin,
        size: a.size,
        combined_scale_x: lerp(a.combined_scale_x, b.combined_scale_x, t),
        combined_scale_y: lerp(a.combined_scale_y, b.combined_scale_y, t),
    }
}

/// Tween of an object payload. The image reference and z-order are step
/// values and stay on the source key.
pub fn tween_object(a: &Object, b: &Object, t: f32) -> Object {
    Object {
        folder: a.folder,
        file: a.file,
        position: lerp_vec2(a.position, b.position, t),
        angle: tween_angle(a.angle, b.angle, t, a.spin),
        scale_x: lerp(a.scale_x, b.scale_x, t),
        scale_y: lerp(a.scale_y, b.scale_y, t),
        pivot: lerp_vec2(a.pivot, b.pivot, t),
        alpha: lerp(a.alpha, b.alpha, t),
        spin: a.spin,
        z_index: a.z_index,
    }
}

/// Tweens key `a` toward key `b`; mismatched payload kinds hold `a`.
pub fn tween_key(a: &TimelineKey, b: &TimelineKey, t: f32) -> TimelineKey {
    let payload = match (&a.payload, &b.payload) {
        (KeyPayload::Bone(ba), KeyPayload::Bone(bb)) => KeyPayload::Bone(tween_bone(ba, bb, t)),
        (KeyPayload::Object(oa), KeyPayload::Object(ob)) => {
            KeyPayload::Object(tween_object(oa, ob, t))
        }
        _ => a.payload.clone(),
    };
    TimelineKey {
        payload,
        ..a.clone()
    }
}

/// Curve-adjusted ratio for `time` between `key` and the key starting at
/// `next_key_time`.
fn adjusted_ratio(key: &TimelineKey, next_key_time: f32, time: f32) -> f32 {
    if matches!(key.curve, CurveType::Instant) || key.time == next_key_time {
        return 0.0;
    }
    let ratio = (time - key.time) / (next_key_time - key.time);
    apply_curve(&key.curve, ratio)
}

/// Resolves the payload of `timeline_id` at `time`, tweening from the key
/// referenced by `ref_key` toward its successor.
///
/// The reference key is returned unchanged when the timeline has a single
/// key, when its curve is instant, or when it is the final key of a
/// non-looping animation. A successor that precedes the reference key in
/// authored time is shifted by the animation length (loop wraparound).
pub fn resolve(
    animation: &Animation,
    timeline_id: i32,
    ref_key: i32,
    time: f32,
) -> Result<TimelineKey, ResolveError> {
    let timeline = animation
        .timeline(timeline_id)
        .ok_or(ResolveError::UnknownTimeline(timeline_id))?;
    let index = usize::try_from(ref_key)
        .ok()
        .filter(|i| *i < timeline.keys.len())
        .ok_or(ResolveError::UnknownKey {
            timeline: timeline_id,
            key: ref_key,
        })?;
    let key_a = &timeline.keys[index];

    if timeline.keys.len() == 1 || matches!(key_a.curve, CurveType::Instant) {
        return Ok(key_a.clone());
    }

    let mut next = index + 1;
    if next >= timeline.keys.len() {
        if animation.looping {
            next = 0;
        } else {
            return Ok(key_a.clone());
        }
    }

    let key_b = &timeline.keys[next];
    let mut key_b_time = key_b.time;
    if key_b_time < key_a.time {
        key_b_time += animation.length;
    }

    Ok(tween_key(key_a, key_b, adjusted_ratio(key_a, key_b_time, time)))
}
