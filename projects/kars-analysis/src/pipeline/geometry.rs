use crate::pipeline::types::{LandmarkSet, Point};
use geo::{EuclideanDistance, Point as GeoPoint};

/// Face mesh landmark indices used by the mood metrics
pub mod face {
    pub const MOUTH_RIGHT: usize = 61;
    pub const MOUTH_LEFT: usize = 291;
    pub const LEFT_EYE_INNER: usize = 33;
    pub const RIGHT_EYE_INNER: usize = 263;
}

/// Hand landmark indices
pub mod hand {
    pub const WRIST: usize = 0;
}

fn to_geo(p: Point) -> GeoPoint<f64> {
    GeoPoint::new(p.x as f64, p.y as f64)
}

fn distance(a: Point, b: Point) -> f64 {
    to_geo(a).euclidean_distance(&to_geo(b))
}

/// Mouth width over inner-eye distance. Undefined when the eyes coincide.
pub fn mood_ratio(landmarks: &LandmarkSet) -> Option<f64> {
    let mouth_left = landmarks.get(face::MOUTH_LEFT)?;
    let mouth_right = landmarks.get(face::MOUTH_RIGHT)?;
    let eye_left = landmarks.get(face::LEFT_EYE_INNER)?;
    let eye_right = landmarks.get(face::RIGHT_EYE_INNER)?;

    let eye_distance = distance(eye_left, eye_right);
    if eye_distance <= 0.0 {
        return None;
    }
    Some(distance(mouth_left, mouth_right) / eye_distance)
}

/// Mouth width over the mean eye-to-mouth-corner distance on each side.
/// Undefined when that mean is zero.
pub fn smile_ratio(landmarks: &LandmarkSet) -> Option<f64> {
    let mouth_left = landmarks.get(face::MOUTH_LEFT)?;
    let mouth_right = landmarks.get(face::MOUTH_RIGHT)?;
    let eye_left = landmarks.get(face::LEFT_EYE_INNER)?;
    let eye_right = landmarks.get(face::RIGHT_EYE_INNER)?;

    let eye_to_mouth =
        (distance(eye_left, mouth_left) + distance(eye_right, mouth_right)) / 2.0;
    if eye_to_mouth <= 0.0 {
        return None;
    }
    Some(distance(mouth_left, mouth_right) / eye_to_mouth)
}

/// Normalized vertical wrist position.
pub fn wrist_y(landmarks: &LandmarkSet) -> Option<f64> {
    landmarks.get(hand::WRIST).map(|p| p.y as f64)
}
