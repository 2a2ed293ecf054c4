/// Keyframed animation tracks

use glam::{Mat4, Quat, Vec3, Vec4};

/// Values that can be blended between two keyframes
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for f32 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Vec4 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

impl Interpolate for Mat4 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a * (1.0 - t) + b * t
    }
}

/// Sorted keyframes of one animation
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline<T> {
    pub timestamps: Vec<f32>,
    pub values: Vec<T>,
}

impl<T: Interpolate> Timeline<T> {
    pub fn new(timestamps: Vec<f32>, values: Vec<T>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    pub fn constant(value: T) -> Self {
        Self { timestamps: vec![0.0], values: vec![value] }
    }

    /// Value at `time`, clamped to the first/last keyframe
    pub fn sample(&self, time: f32) -> Option<T> {
        let count = self.timestamps.len().min(self.values.len());
        if count == 0 {
            return None;
        }
        if count == 1 || time <= self.timestamps[0] {
            return Some(self.values[0]);
        }
        if time >= self.timestamps[count - 1] {
            return Some(self.values[count - 1]);
        }

        let next = self.timestamps[..count].partition_point(|&t| t <= time);
        let prev = next - 1;
        let span = self.timestamps[next] - self.timestamps[prev];
        let t = if span > 0.0 { (time - self.timestamps[prev]) / span } else { 0.0 };
        Some(T::interpolate(self.values[prev], self.values[next], t))
    }
}

/// One timeline per model animation, with a fallback value
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    pub timelines: Vec<Timeline<T>>,
    pub default: T,
}

impl<T: Interpolate> Track<T> {
    pub fn constant(value: T) -> Self {
        Self { timelines: Vec::new(), default: value }
    }

    pub fn new(timelines: Vec<Timeline<T>>, default: T) -> Self {
        Self { timelines, default }
    }

    /// Sample the timeline of `animation`, falling back to the first timeline
    /// and then to the default value
    pub fn sample(&self, animation: usize, time: f32) -> T {
        self.timelines
            .get(animation)
            .or_else(|| self.timelines.first())
            .and_then(|timeline| timeline.sample(time))
            .unwrap_or(self.default)
    }

    pub fn is_animated(&self) -> bool {
        self.timelines.iter().any(|t| t.values.len() > 1)
    }
}
