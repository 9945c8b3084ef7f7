//! Vector kernel over `[f64; 3]` plus palm-normal and signed joint angles.
//!
//! Every function returns a defined neutral value (zero vector, 0°) for
//! degenerate input so NaN never reaches the classifier.

use super::landmarks::{HandLandmark, HandObservation, Handedness, JointTriplet};

pub type Vec3 = [f64; 3];

/// Lengths at or below this are treated as zero.
pub const EPSILON: f64 = 1e-6;

pub fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn length(v: Vec3) -> f64 {
    dot(v, v).sqrt()
}

pub fn negate(v: Vec3) -> Vec3 {
    [-v[0], -v[1], -v[2]]
}

/// Unit vector along `v`, or the zero vector when `|v| <= EPSILON`.
pub fn normalize(v: Vec3) -> Vec3 {
    let l = length(v);
    if l <= EPSILON {
        return [0.0; 3];
    }
    [v[0] / l, v[1] / l, v[2] / l]
}

/// Euclidean distance between two points.
pub fn distance(a: Vec3, b: Vec3) -> f64 {
    length(sub(a, b))
}

/// Angle between two vectors in degrees, in `[0, 180]`.
///
/// Returns 0 when either vector is degenerate.
pub fn angle_between(a: Vec3, b: Vec3) -> f64 {
    let la = length(a);
    let lb = length(b);
    if la <= EPSILON || lb <= EPSILON {
        return 0.0;
    }
    let cosine = (dot(a, b) / la / lb).clamp(-1.0, 1.0);
    cosine.acos().to_degrees()
}

/// Angle (degrees) at `b` for the points a-b-c.
pub fn angle_at(a: Vec3, b: Vec3, c: Vec3) -> f64 {
    angle_between(sub(a, b), sub(c, b))
}

/// Palm normal facing the back of the hand.
///
/// `normalize(cross(indexMCP - wrist, pinkyMCP - wrist))`, flipped when it
/// points toward the middle-MCP side. Zero vector for a collapsed palm.
pub fn palm_normal(hand: &HandObservation) -> Vec3 {
    let wrist = hand.point(HandLandmark::Wrist);
    let to_index = sub(hand.point(HandLandmark::IndexMcp), wrist);
    let to_pinky = sub(hand.point(HandLandmark::PinkyMcp), wrist);
    let normal = normalize(cross(to_index, to_pinky));

    let to_middle = sub(hand.point(HandLandmark::MiddleMcp), wrist);
    if dot(normal, to_middle) > 0.0 {
        negate(normal)
    } else {
        normal
    }
}

/// Palm normal with the sign convention mirrored for left hands.
pub fn oriented_palm_normal(hand: &HandObservation) -> Vec3 {
    let normal = palm_normal(hand);
    match hand.handedness {
        Handedness::Left => negate(normal),
        _ => normal,
    }
}

/// Signed bend angle for one (prev, joint, next) triplet.
///
/// Magnitude is the angle between `prev - joint` and `next - joint`; the
/// sign is negative only when the bend axis points against `normal`.
pub fn signed_joint_angle(hand: &HandObservation, triplet: JointTriplet, normal: Vec3) -> f64 {
    let (prev, joint, next) = triplet;
    let b = hand.point(joint);
    let v1 = sub(hand.point(prev), b);
    let v2 = sub(hand.point(next), b);
    if length(v1) <= EPSILON || length(v2) <= EPSILON {
        return 0.0;
    }

    let angle = angle_between(v1, v2);
    let axis = cross(v1, v2);
    if length(axis) > EPSILON && length(normal) > EPSILON && dot(normalize(axis), normal) < 0.0 {
        -angle
    } else {
        angle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::landmarks::{open_hand_landmarks, Finger, Landmark, LANDMARK_COUNT};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(normalize([0.0, 0.0, 0.0]), [0.0; 3]);
        assert_eq!(normalize([1e-8, 0.0, 0.0]), [0.0; 3]);
        let n = normalize([3.0, 4.0, 0.0]);
        assert!(approx(n[0], 0.6) && approx(n[1], 0.8));
    }

    #[test]
    fn test_angle_between_self_and_opposite() {
        let units = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            normalize([1.0, 2.0, -3.0]),
            normalize([-0.3, 0.1, 0.9]),
        ];
        for a in units {
            assert!(angle_between(a, a).abs() < 1e-4, "self angle for {:?}", a);
            assert!(
                (angle_between(a, negate(a)) - 180.0).abs() < 1e-4,
                "opposite angle for {:?}",
                a
            );
        }
    }

    #[test]
    fn test_angle_between_degenerate_is_zero() {
        assert_eq!(angle_between([0.0; 3], [1.0, 0.0, 0.0]), 0.0);
        assert_eq!(angle_at([1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_right_angle() {
        assert!(approx(angle_between([1.0, 0.0, 0.0], [0.0, 2.0, 0.0]), 90.0));
    }

    #[test]
    fn test_palm_normal_unit_and_away_from_middle() {
        let hand = HandObservation::new(Handedness::Right, open_hand_landmarks(), 0.0);
        let n = palm_normal(&hand);
        assert!(approx(length(n), 1.0));
        let to_middle = sub(
            hand.point(HandLandmark::MiddleMcp),
            hand.point(HandLandmark::Wrist),
        );
        assert!(dot(n, to_middle) <= 0.0);
    }

    #[test]
    fn test_palm_normal_collapsed_hand() {
        let hand = HandObservation::new(
            Handedness::Right,
            [Landmark::default(); LANDMARK_COUNT],
            0.0,
        );
        assert_eq!(palm_normal(&hand), [0.0; 3]);
    }

    #[test]
    fn test_left_hand_normal_mirrored() {
        let right = HandObservation::new(Handedness::Right, open_hand_landmarks(), 0.0);
        let left = HandObservation::new(Handedness::Left, open_hand_landmarks(), 0.0);
        assert_eq!(oriented_palm_normal(&left), negate(oriented_palm_normal(&right)));
    }

    #[test]
    fn test_straight_joint_is_180() {
        let hand = HandObservation::new(Handedness::Right, open_hand_landmarks(), 0.0);
        let normal = oriented_palm_normal(&hand);
        // MCP-PIP-DIP on a straight finger.
        let angle = signed_joint_angle(&hand, Finger::Index.joint_triplets()[1], normal);
        assert!(approx(angle.abs(), 180.0), "got {}", angle);
    }

    #[test]
    fn test_signed_angle_flips_with_normal() {
        let mut lm = open_hand_landmarks();
        // Bend the index DIP sideways in-plane so the bend axis is along z.
        lm[HandLandmark::IndexDip.index()] = Landmark::new(0.50, 0.55, 0.0);
        let hand = HandObservation::new(Handedness::Right, lm, 0.0);
        let triplet = Finger::Index.joint_triplets()[1];
        let up = signed_joint_angle(&hand, triplet, [0.0, 0.0, 1.0]);
        let down = signed_joint_angle(&hand, triplet, [0.0, 0.0, -1.0]);
        assert!(approx(up, -down));
        assert!(up.abs() > 0.0);
    }

    #[test]
    fn test_coincident_landmarks_yield_zero() {
        let mut lm = open_hand_landmarks();
        lm[HandLandmark::IndexPip.index()] = lm[HandLandmark::IndexMcp.index()];
        let hand = HandObservation::new(Handedness::Right, lm, 0.0);
        let angle = signed_joint_angle(&hand, Finger::Index.joint_triplets()[1], [0.0, 0.0, 1.0]);
        assert_eq!(angle, 0.0);
    }
}
