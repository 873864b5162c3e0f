// Damped pairwise collision relaxation.
//
// Every iteration sweeps all unordered pairs in key order. A pair closer than
// its relation-class threshold is pushed apart by
//
//     (threshold - d) * push_strength * damping^iteration / 2
//
// per body. Each body moves along its own dominant-feature direction so that
// displacement stays meaningful on the map ("more danceable" stays "more
// danceable"); bodies without feature data fall back to the separation
// vector. Moved bodies are clamped back inside the target radius.
//
// Properties:
// - Deterministic: bodies are visited in key order, not input order
// - Early exit on the first iteration without overlaps
// - Best effort: residual overlaps after max_iterations are reported, not fixed
// - Coincident bodies (d == 0) have no defined separation: they are not
//   pushed, but they still count as a residual overlap

use serde::Serialize;

use super::relation::{classify, MinDistances};
use super::spatial_grid::SpatialGrid;
use super::{LayoutConfig, Position, MAX_ITERATIONS_LIMIT};

/// A node taking part in collision resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub key: String,
    pub path: Vec<String>,
    pub position: Position,
    /// Dominant-feature direction; None => push along the separation vector.
    pub push: Option<Position>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollisionReport {
    /// Iterations actually run (including the final clean sweep).
    pub iterations: usize,
    /// Overlapping pairs met during each iteration's sweep.
    pub overlaps_per_iteration: Vec<usize>,
    /// No pair below its threshold when the run ended.
    pub converged: bool,
    pub residual_overlaps: usize,
}

/// Relax overlaps in place.
pub fn resolve_collisions(bodies: &mut [Body], cfg: &LayoutConfig) -> CollisionReport {
    let n = bodies.len();
    let mut report = CollisionReport::default();

    // IMPORTANT: key order, never input order.
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| bodies[a].key.cmp(&bodies[b].key));

    let mut pos: Vec<Position> = order.iter().map(|&i| bodies[i].position).collect();
    let push: Vec<Option<Position>> = order.iter().map(|&i| bodies[i].push).collect();

    // Relations never change during the run; resolve thresholds once.
    let mut thresholds: Vec<f64> = Vec::with_capacity(n * n.saturating_sub(1) / 2);
    for a in 0..n {
        for b in (a + 1)..n {
            let relation = classify(&bodies[order[a]].path, &bodies[order[b]].path);
            thresholds.push(cfg.min_distance.for_relation(relation));
        }
    }

    let radius = cfg.target_radius;
    let mut decay = 1.0;
    for iteration in 0..cfg.max_iterations.min(MAX_ITERATIONS_LIMIT) {
        let mut overlaps = 0;
        let mut pair = 0;

        for a in 0..n {
            for b in (a + 1)..n {
                let min_dist = thresholds[pair];
                pair += 1;

                let dx = pos[b].x - pos[a].x;
                let dy = pos[b].y - pos[a].y;
                let d = (dx * dx + dy * dy).sqrt();
                if !(d > 0.0 && d < min_dist) {
                    continue;
                }
                overlaps += 1;

                let step = (min_dist - d) * cfg.push_strength * decay / 2.0;
                let dir_a = push[a].unwrap_or(Position::new(-dx / d, -dy / d));
                let dir_b = push[b].unwrap_or(Position::new(dx / d, dy / d));

                pos[a] = (pos[a] + dir_a.scaled(step)).clamp_to_radius(radius);
                pos[b] = (pos[b] + dir_b.scaled(step)).clamp_to_radius(radius);
            }
        }

        report.iterations = iteration + 1;
        report.overlaps_per_iteration.push(overlaps);
        log::trace!("collision iteration {}: {} overlapping pairs", iteration, overlaps);
        if overlaps == 0 {
            break;
        }
        decay *= cfg.damping;
    }

    for (slot, &i) in order.iter().enumerate() {
        bodies[i].position = pos[slot];
    }

    report.residual_overlaps = count_overlaps(bodies, &cfg.min_distance);
    report.converged = report.residual_overlaps == 0;
    if report.converged {
        log::debug!("collisions resolved after {} iterations", report.iterations);
    } else {
        log::warn!(
            "{} overlapping pairs remain after {} iterations",
            report.residual_overlaps,
            report.iterations
        );
    }
    report
}

/// Number of pairs with `d < threshold` for their relation class, coincident
/// pairs included.
pub fn count_overlaps(bodies: &[Body], min_distance: &MinDistances) -> usize {
    let mut grid = SpatialGrid::new(min_distance.max());
    for (i, body) in bodies.iter().enumerate() {
        grid.insert(i, body.position);
    }

    let mut count = 0;
    for (i, body) in bodies.iter().enumerate() {
        for j in grid.neighbors(body.position) {
            if j <= i {
                continue;
            }
            let other = &bodies[j];
            let d = body.position.distance(other.position);
            let min_dist = min_distance.for_relation(classify(&body.path, &other.path));
            if d < min_dist {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(key: &str, x: f64, y: f64) -> Body {
        Body {
            key: key.to_string(),
            path: key.split('.').map(str::to_string).collect(),
            position: Position::new(x, y),
            push: None,
        }
    }

    fn cfg(push_strength: f64, damping: f64, max_iterations: usize) -> LayoutConfig {
        LayoutConfig {
            min_distance: MinDistances::uniform(26.0),
            push_strength,
            damping,
            max_iterations,
            target_radius: 220.0,
            ..LayoutConfig::default()
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_no_overlap_leaves_input_unchanged() {
        let mut bodies = vec![body("a", -50.0, 0.0), body("b", 50.0, 0.0), body("c", 0.0, 80.0)];
        let before = bodies.clone();
        let report = resolve_collisions(&mut bodies, &cfg(1.0, 0.9, 50));
        assert_eq!(bodies, before);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.overlaps_per_iteration, vec![0]);
        assert!(report.converged);
    }

    #[test]
    fn test_featureless_pair_separates_along_separation_vector() {
        let mut bodies = vec![body("a", -5.0, 0.0), body("b", 5.0, 0.0)];
        let report = resolve_collisions(&mut bodies, &cfg(1.2, 1.0, 10));

        // overlap 16 -> 16 * 1.2 / 2 = 9.6 each way
        assert!(approx(bodies[0].position.x, -14.6));
        assert!(approx(bodies[1].position.x, 14.6));
        assert_eq!(bodies[0].position.y, 0.0);
        assert_eq!(report.overlaps_per_iteration, vec![1, 0]);
        assert!(report.converged);
    }

    #[test]
    fn test_bodies_follow_their_dominant_direction() {
        let mut a = body("a", -2.0, 0.0);
        a.push = Some(Position::new(-1.0, 0.0));
        let mut b = body("b", 2.0, 0.0);
        b.push = Some(Position::new(0.0, 1.0));
        let mut bodies = vec![a, b];

        let report = resolve_collisions(&mut bodies, &cfg(1.0, 0.9, 1));

        // overlap 22 -> 11 each, not mirrored
        assert!(approx(bodies[0].position.x, -13.0));
        assert!(approx(bodies[0].position.y, 0.0));
        assert!(approx(bodies[1].position.x, 2.0));
        assert!(approx(bodies[1].position.y, 11.0));
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
        assert_eq!(report.residual_overlaps, 1);
    }

    #[test]
    fn test_damping_shrinks_later_pushes() {
        let mut a = body("a", -2.0, 0.0);
        a.push = Some(Position::new(0.0, 1.0));
        let mut b = body("b", 2.0, 0.0);
        b.push = Some(Position::new(0.0, 1.0));
        let mut bodies = vec![a, b];

        // parallel pushes never separate the pair: the run must still stop
        let report = resolve_collisions(&mut bodies, &cfg(1.0, 0.5, 3));
        assert_eq!(report.iterations, 3);
        assert_eq!(report.overlaps_per_iteration, vec![1, 1, 1]);
        // 11 + 5.5 + 2.75
        assert!(approx(bodies[0].position.y, 19.25));
        assert!(approx(bodies[1].position.y, 19.25));
        assert_eq!(report.residual_overlaps, 1);
    }

    #[test]
    fn test_three_siblings_overlap_count_never_grows() {
        let mut bodies = vec![body("a", -4.0, 0.0), body("b", 0.0, 0.0), body("c", 4.0, 0.0)];
        let report = resolve_collisions(&mut bodies, &cfg(1.2, 1.0, 20));

        assert_eq!(report.overlaps_per_iteration, vec![3, 2, 0]);
        assert!(report.converged);
        for w in report.overlaps_per_iteration.windows(2) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_small_cluster_converges() {
        let mut bodies: Vec<Body> = (0..5)
            .map(|i| {
                let a = i as f64 * std::f64::consts::TAU / 5.0;
                body(&format!("n{}", i), 8.0 * a.cos(), 8.0 * a.sin())
            })
            .collect();
        let report = resolve_collisions(&mut bodies, &cfg(1.5, 0.98, 500));
        assert!(report.converged, "{:?}", report);
        assert_eq!(count_overlaps(&bodies, &MinDistances::uniform(26.0)), 0);
    }

    #[test]
    fn test_moved_bodies_stay_inside_radius() {
        let mut a = body("a", 215.0, 0.0);
        a.push = Some(Position::new(1.0, 0.0));
        let mut b = body("b", 205.0, 0.0);
        b.push = Some(Position::new(1.0, 0.0));
        let mut bodies = vec![a, b];
        resolve_collisions(&mut bodies, &cfg(1.0, 1.0, 5));
        for b in &bodies {
            assert!(b.position.length() <= 220.0 + 1e-9);
        }
    }

    #[test]
    fn test_coincident_bodies_are_left_alone() {
        let mut bodies = vec![body("a", 3.0, 3.0), body("b", 3.0, 3.0)];
        let report = resolve_collisions(&mut bodies, &cfg(1.0, 0.9, 10));
        assert_eq!(bodies[0].position, bodies[1].position);
        assert_eq!(report.overlaps_per_iteration, vec![0]);
        // not pushed, but still on top of each other
        assert_eq!(report.residual_overlaps, 1);
        assert!(!report.converged);
    }

    #[test]
    fn test_iterations_are_capped() {
        let mut a = body("a", -2.0, 0.0);
        a.push = Some(Position::new(0.0, 1.0));
        let mut b = body("b", 2.0, 0.0);
        b.push = Some(Position::new(0.0, 1.0));
        let mut bodies = vec![a, b];

        let report = resolve_collisions(&mut bodies, &cfg(1.0, 0.0, usize::MAX));
        assert_eq!(report.iterations, MAX_ITERATIONS_LIMIT);
        assert_eq!(report.residual_overlaps, 1);
        assert!(bodies.iter().all(|b| b.position.is_finite()));
    }

    #[test]
    fn test_result_does_not_depend_on_input_order() {
        let make = || vec![body("c", 4.0, 1.0), body("a", -4.0, 0.0), body("b", 0.0, -1.0)];
        let mut forward = make();
        let mut reversed = make();
        reversed.reverse();

        resolve_collisions(&mut forward, &cfg(1.0, 0.95, 30));
        resolve_collisions(&mut reversed, &cfg(1.0, 0.95, 30));

        for f in &forward {
            let r = reversed.iter().find(|r| r.key == f.key).unwrap();
            assert_eq!(f.position, r.position);
        }
    }

    #[test]
    fn test_relation_thresholds_apply() {
        let d = MinDistances { sibling: 30.0, parent_child: 20.0, unrelated: 10.0 };
        let bodies = vec![
            body("Rock", 0.0, 0.0),
            body("Rock.Punk", 15.0, 0.0),
            body("Jazz.Bebop", 0.0, 12.0),
        ];
        // Rock/Rock.Punk: 15 < 20; Rock/Jazz.Bebop: 12 >= 10; Punk/Bebop: ~19.2 >= 10
        assert_eq!(count_overlaps(&bodies, &d), 1);
    }
}
