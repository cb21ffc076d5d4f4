//! Circular falloff kernel for brush stamps.

/// Radial steps per pixel of radius. Fine enough that adjacent rings differ
/// by well under one displayable height step, so no banding is visible.
const STEPS_PER_RADIUS_PIXEL: f32 = 2.0;

/// One circular stamp: cosine easing from `height_scale · softness` at the
/// center down to zero at the radius, evaluated over discretized radial
/// steps.
#[derive(Clone, Copy, Debug)]
pub struct StampKernel {
    radius: f32,
    peak: f32,
    steps: f32,
}

impl StampKernel {
    pub fn new(radius: f32, height_scale: f32, softness: f32) -> Self {
        let radius = radius.max(0.0);
        Self {
            radius,
            peak: height_scale.max(0.0) * softness.clamp(0.0, 1.0),
            steps: (radius * STEPS_PER_RADIUS_PIXEL).ceil().max(1.0),
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Peak height at the stamp center.
    #[inline]
    pub fn peak(&self) -> f32 {
        self.peak
    }

    /// Height contribution at `distance` from the stamp center.
    pub fn sample(&self, distance: f32) -> f32 {
        if distance > self.radius || self.radius == 0.0 {
            return 0.0;
        }
        let t = (distance / self.radius * self.steps).round() / self.steps;
        self.peak * 0.5 * (1.0 + (std::f32::consts::PI * t.min(1.0)).cos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_is_scaled_peak() {
        let kernel = StampKernel::new(20.0, 2.0, 0.5);
        assert!((kernel.sample(0.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_edge_is_zero() {
        let kernel = StampKernel::new(20.0, 2.0, 0.5);
        assert!(kernel.sample(20.0).abs() < 1e-4);
        assert_eq!(kernel.sample(25.0), 0.0);
    }

    #[test]
    fn test_monotonic_falloff() {
        let kernel = StampKernel::new(16.0, 1.0, 1.0);
        let mut previous = f32::INFINITY;
        for i in 0..=16 {
            let value = kernel.sample(i as f32);
            assert!(value <= previous + 1e-6);
            previous = value;
        }
    }

    #[test]
    fn test_never_exceeds_height_scale() {
        let kernel = StampKernel::new(10.0, 2.0, 1.0);
        for i in 0..=40 {
            assert!(kernel.sample(i as f32 * 0.25) <= 2.0 + 1e-6);
        }
    }
}
