//! Properties of the curve evaluator: endpoint behavior for every easing
//! family, the wrap-angle range, and spin-constrained angle tweening.

use std::f32::consts::PI;

use marionette_core::interp::{apply_curve, bezier_2d, tween_angle, wrap_angle};
use marionette_core::{CurveType, Spin};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn every_family() -> Vec<CurveType> {
    vec![
        CurveType::Linear,
        CurveType::Quadratic { c1: 0.3 },
        CurveType::Cubic { c1: 0.1, c2: 0.9 },
        CurveType::Quartic {
            c1: 0.2,
            c2: 0.5,
            c3: 0.8,
        },
        CurveType::Quintic {
            c1: 0.1,
            c2: 0.3,
            c3: 0.6,
            c4: 0.9,
        },
        CurveType::Bezier {
            c1: 0.42,
            c2: 0.0,
            c3: 0.58,
            c4: 1.0,
        },
    ]
}

#[test]
fn every_curve_fixes_its_endpoints() {
    for curve in every_family() {
        approx(apply_curve(&curve, 0.0), 0.0, 1e-4);
        approx(apply_curve(&curve, 1.0), 1.0, 1e-4);
    }
}

#[test]
fn instant_is_always_zero() {
    for r in [0.0, 0.25, 0.5, 0.99, 1.0] {
        assert_eq!(apply_curve(&CurveType::Instant, r), 0.0);
    }
}

#[test]
fn wrap_angle_stays_in_half_open_pi_range() {
    let mut x = -10.0f32;
    while x <= 10.0 {
        let wrapped = wrap_angle(x);
        assert!(
            wrapped > -PI && wrapped <= PI,
            "wrap_angle({x}) = {wrapped} out of range"
        );
        x += 0.37;
    }
    assert_eq!(wrap_angle(PI), PI);
    assert_eq!(wrap_angle(-PI), PI);
}

#[test]
fn spin_constrains_the_rotation_direction() {
    // Clockwise across the wrap: 170 deg -> -170 deg passes through 180.
    let half = tween_angle(
        170.0f32.to_radians(),
        (-170.0f32).to_radians(),
        0.5,
        Spin::Clockwise,
    );
    approx(half, PI, 1e-5);

    // Counter-clockwise forces the target below the source.
    let half = tween_angle(
        10.0f32.to_radians(),
        350.0f32.to_radians(),
        0.5,
        Spin::CounterClockwise,
    );
    approx(half, 0.0, 1e-5);

    // No spin holds the source angle.
    assert_eq!(tween_angle(1.2, 2.4, 0.7, Spin::None), 1.2);
}

#[test]
fn ease_in_out_bezier_is_symmetric_and_monotonic() {
    approx(bezier_2d(0.42, 0.0, 0.58, 1.0, 0.5), 0.5, 1e-2);

    let mut previous = 0.0f32;
    for i in 1..=20 {
        let t = i as f32 / 20.0;
        let eased = bezier_2d(0.42, 0.0, 0.58, 1.0, t);
        assert!(
            eased >= previous - 1e-3,
            "not monotonic at t={t}: {eased} < {previous}"
        );
        previous = eased;
    }
}

#[test]
fn slow_start_bezier_stays_below_linear_early_on() {
    // Ease-in control points keep the first half below the diagonal.
    for t in [0.1, 0.2, 0.3, 0.4] {
        let eased = bezier_2d(0.9, 0.0, 1.0, 0.6, t);
        assert!(eased < t, "t={t} eased={eased}");
    }
}
