//! Curve evaluation math: the easing families applied to key timing plus the
//! 2-D cubic Bezier solver, and spin-aware angle interpolation.
//!
//! Everything here is a pure function over normalized inputs.

use std::f32::consts::{PI, TAU};

use crate::data::{CurveType, Spin, Vec2};

/// Linear interpolation of scalars.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec2(a: Vec2, b: Vec2, t: f32) -> Vec2 {
    Vec2::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t))
}

/// Normalizes an angle into the half-open range (-PI, PI].
pub fn wrap_angle(angle: f32) -> f32 {
    let wrapped = if angle <= 0.0 {
        (angle - PI) % TAU + PI
    } else {
        (angle + PI) % TAU - PI
    };
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Interpolates an angle honoring the key's rotation-direction constraint.
///
/// A spin of `None` holds the source angle. Clockwise spins force the target
/// above the source (counter-clockwise below) by a full turn before the
/// linear blend; the result is re-normalized into (-PI, PI].
pub fn tween_angle(a: f32, b: f32, t: f32, spin: Spin) -> f32 {
    let mut b = b;
    match spin {
        Spin::None => return a,
        Spin::Clockwise => {
            if b - a < 0.0 {
                b += TAU;
            }
        }
        Spin::CounterClockwise => {
            if b - a > 0.0 {
                b -= TAU;
            }
        }
    }
    wrap_angle(lerp(a, b, t))
}

/// 1-D quadratic Bezier via De Casteljau composition.
#[inline]
pub fn bezier_quadratic(c0: f32, c1: f32, c2: f32, f: f32) -> f32 {
    lerp(lerp(c0, c1, f), lerp(c1, c2, f), f)
}

#[inline]
pub fn bezier_cubic(c0: f32, c1: f32, c2: f32, c3: f32, f: f32) -> f32 {
    lerp(
        bezier_quadratic(c0, c1, c2, f),
        bezier_quadratic(c1, c2, c3, f),
        f,
    )
}

#[inline]
pub fn bezier_quartic(c0: f32, c1: f32, c2: f32, c3: f32, c4: f32, f: f32) -> f32 {
    lerp(
        bezier_cubic(c0, c1, c2, c3, f),
        bezier_cubic(c1, c2, c3, c4, f),
        f,
    )
}

#[inline]
pub fn bezier_quintic(c0: f32, c1: f32, c2: f32, c3: f32, c4: f32, c5: f32, f: f32) -> f32 {
    lerp(
        bezier_quartic(c0, c1, c2, c3, c4, f),
        bezier_quartic(c1, c2, c3, c4, c5, f),
        f,
    )
}

/// Two-axis cubic easing defined by control points (x1, y1), (x2, y2):
/// solves the x-curve for the parametric t matching the input ratio, then
/// samples the y-curve there.
pub fn bezier_2d(x1: f32, y1: f32, x2: f32, y2: f32, t: f32) -> f32 {
    let duration = 1.0f32;
    let cx = 3.0 * x1;
    let bx = 3.0 * (x2 - x1) - cx;
    let ax = 1.0 - cx - bx;
    let cy = 3.0 * y1;
    let by = 3.0 * (y2 - y1) - cy;
    let ay = 1.0 - cy - by;

    sample_curve(ay, by, cy, solve_curve_x(ax, bx, cx, t, solve_epsilon(duration)))
}

#[inline]
fn sample_curve(a: f32, b: f32, c: f32, t: f32) -> f32 {
    ((a * t + b) * t + c) * t
}

#[inline]
fn sample_curve_derivative_x(ax: f32, bx: f32, cx: f32, t: f32) -> f32 {
    (3.0 * ax * t + 2.0 * bx) * t + cx
}

#[inline]
fn solve_epsilon(duration: f32) -> f32 {
    1.0 / (200.0 * duration)
}

/// Newton-Raphson on the x-curve, falling back to bisection over [0, 1] when
/// the derivative collapses.
fn solve_curve_x(ax: f32, bx: f32, cx: f32, x: f32, epsilon: f32) -> f32 {
    let mut t2 = x;

    for _ in 0..8 {
        let x2 = sample_curve(ax, bx, cx, t2) - x;
        if x2.abs() < epsilon {
            return t2;
        }
        let d2 = sample_curve_derivative_x(ax, bx, cx, t2);
        if d2.abs() < 1e-6 {
            break;
        }
        t2 -= x2 / d2;
    }

    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    t2 = x;

    if t2 < t0 {
        return t0;
    }
    if t2 > t1 {
        return t1;
    }

    while t0 < t1 {
        let x2 = sample_curve(ax, bx, cx, t2);
        if (x2 - x).abs() < epsilon {
            return t2;
        }
        if x > x2 {
            t0 = t2;
        } else {
            t1 = t2;
        }
        t2 = (t1 - t0) * 0.5 + t0;
    }

    t2
}

/// Applies a key's timing curve to a normalized ratio in [0, 1].
pub fn apply_curve(curve: &CurveType, r: f32) -> f32 {
    match *curve {
        CurveType::Instant => 0.0,
        CurveType::Linear => r,
        CurveType::Quadratic { c1 } => bezier_quadratic(0.0, c1, 1.0, r),
        CurveType::Cubic { c1, c2 } => bezier_cubic(0.0, c1, c2, 1.0, r),
        CurveType::Quartic { c1, c2, c3 } => bezier_quartic(0.0, c1, c2, c3, 1.0, r),
        CurveType::Quintic { c1, c2, c3, c4 } => bezier_quintic(0.0, c1, c2, c3, c4, 1.0, r),
        CurveType::Bezier { c1, c2, c3, c4 } => bezier_2d(c1, c2, c3, c4, r),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_boundaries() {
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
        assert_eq!(wrap_angle(0.0), 0.0);
        assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-5);
    }

    #[test]
    fn tween_angle_holds_on_no_spin() {
        assert_eq!(tween_angle(1.0, 2.0, 0.5, Spin::None), 1.0);
    }

    #[test]
    fn bezier_2d_is_identity_for_linear_control_points() {
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            let eased = bezier_2d(1.0 / 3.0, 1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0, t);
            assert!((eased - t).abs() < 0.01, "t={t} eased={eased}");
        }
    }
}
