// Adaptive radial fit with logarithmic compression.
//
// 1. Scale the whole cloud so its farthest point lands on the target radius.
// 2. Remap each distance d to R * log2(1 + d / R).
//
// Step 2 maps [0, R] onto [0, R], is monotonic, and lifts the dense center
// while pulling outliers in, so nothing clips the canvas boundary.

use super::Position;

/// Rescale `points` in place to fit `target_radius`. Returns the adaptive
/// scale factor that was applied before compression.
pub fn scale_to_radius(points: &mut [Position], target_radius: f64) -> f64 {
    if !(target_radius.is_finite() && target_radius > 0.0) {
        points.iter_mut().for_each(|p| *p = Position::ORIGIN);
        return 0.0;
    }
    for p in points.iter_mut() {
        if !p.is_finite() {
            *p = Position::ORIGIN;
        }
    }

    let max_radius = points.iter().map(|p| p.length()).fold(0.0, f64::max);
    let adaptive = if max_radius > 0.0 { target_radius / max_radius } else { 1.0 };

    for p in points.iter_mut() {
        let fitted = p.scaled(adaptive);
        let d = fitted.length();
        *p = if d > 0.0 {
            fitted.scaled(compress(d, target_radius) / d).clamp_to_radius(target_radius)
        } else {
            Position::ORIGIN
        };
    }
    adaptive
}

/// Logarithmic radial compression of a distance in `[0, radius]`.
pub fn compress(d: f64, radius: f64) -> f64 {
    radius * (1.0 + d / radius).log2()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farthest_point_lands_on_radius() {
        let mut pts = vec![Position::new(3.0, 4.0), Position::new(-1.0, 0.0)];
        let scale = scale_to_radius(&mut pts, 220.0);
        assert!((scale - 44.0).abs() < 1e-12);
        assert!((pts[0].length() - 220.0).abs() < 1e-9);
        // 1/5 of the radius before compression -> log2(1.2) of it after
        assert!((pts[1].length() - 220.0 * 1.2f64.log2()).abs() < 1e-9);
        assert!(pts[1].x < 0.0 && pts[1].y.abs() < 1e-12);
    }

    #[test]
    fn test_all_at_origin_stays_put() {
        let mut pts = vec![Position::ORIGIN; 3];
        let scale = scale_to_radius(&mut pts, 220.0);
        assert_eq!(scale, 1.0);
        assert!(pts.iter().all(|p| *p == Position::ORIGIN));
    }

    #[test]
    fn test_compression_is_monotonic_along_a_ray() {
        let mut pts: Vec<Position> = (1..=20).map(|i| Position::new(i as f64, i as f64 * 0.5)).collect();
        scale_to_radius(&mut pts, 100.0);
        for w in pts.windows(2) {
            assert!(w[0].length() < w[1].length());
        }
        assert!(pts.iter().all(|p| p.length() <= 100.0 + 1e-9));
    }

    #[test]
    fn test_non_finite_inputs_are_contained() {
        let mut pts = vec![Position::new(f64::NAN, 1.0), Position::new(2.0, 0.0)];
        scale_to_radius(&mut pts, 50.0);
        assert_eq!(pts[0], Position::ORIGIN);
        assert!((pts[1].length() - 50.0).abs() < 1e-9);

        let mut pts = vec![Position::new(2.0, 0.0)];
        scale_to_radius(&mut pts, 0.0);
        assert_eq!(pts[0], Position::ORIGIN);
    }
}
