//! Arc generator: chord subdivision for G2/G3, spec.md §4.9.
//!
//! No direct teacher analogue (the teacher carries no arc support); built
//! from spec.md's chordal-tolerance formula directly.

use crate::canonical::gcode_state::CanonicalPlane;
use crate::constants::AXES;

/// One linear sub-block emitted by the arc generator, ready to be handed
/// to `CanonicalMachine::straight_feed`.
#[derive(Debug, Clone, Copy)]
pub struct ArcSegment {
    pub target: [f64; AXES],
}

/// Persistent arc-in-progress state, owned by the canonical machine so a
/// feedhold can discard the remainder cleanly without corrupting position
/// (arcs do not survive a hold, spec.md §4.9).
#[derive(Debug, Clone)]
pub struct ArcGenerator {
    segments: Vec<ArcSegment>,
    next: usize,
}

impl ArcGenerator {
    /// Expands a G2/G3 spec into chord-bounded segments. `center_offset` is
    /// `(I, J)`/`(I, K)`/`(J, K)` depending on `plane`; `clockwise` selects
    /// G2 vs G3. `linear_start`/`linear_end` are the out-of-plane axis
    /// endpoints for helical motion.
    pub fn new(
        start: [f64; AXES],
        end: [f64; AXES],
        center_offset: (f64, f64),
        plane: CanonicalPlane,
        clockwise: bool,
        rotations: u32,
        chordal_tolerance: f64,
    ) -> Self {
        let (a_axis, b_axis, linear_axis) = plane_axes(plane);
        let start_a = start[a_axis];
        let start_b = start[b_axis];
        let end_a = end[a_axis];
        let end_b = end[b_axis];

        let center_a = start_a + center_offset.0;
        let center_b = start_b + center_offset.1;
        let radius = ((start_a - center_a).powi(2) + (start_b - center_b).powi(2)).sqrt();

        let mut start_angle = (start_b - center_b).atan2(start_a - center_a);
        let mut end_angle = (end_b - center_b).atan2(end_a - center_a);

        let full_turn = std::f64::consts::TAU;
        if clockwise {
            while start_angle <= end_angle {
                end_angle -= full_turn;
            }
        } else {
            while end_angle <= start_angle {
                end_angle += full_turn;
            }
        }
        let signed_span = if clockwise { start_angle - end_angle } else { end_angle - start_angle };
        let total_angle = signed_span + (rotations as f64) * full_turn;

        // Chord length for a given half-angle theta subtending tolerance e
        // at radius r: chord = 2*sqrt(2*r*e - e^2) (spec.md §8 scenario 6).
        let chord_len = if radius > 0.0 {
            (2.0 * radius * chordal_tolerance - chordal_tolerance * chordal_tolerance).max(0.0).sqrt() * 2.0
        } else {
            0.0
        };
        let arc_len = radius * total_angle.abs();
        let n = if chord_len > 0.0 {
            (arc_len / chord_len).ceil().max(1.0) as usize
        } else {
            1
        };

        let mut segments = Vec::with_capacity(n);
        let angle_step = if clockwise { -total_angle / n as f64 } else { total_angle / n as f64 };
        let mut angle = start_angle;
        for i in 1..=n {
            angle += angle_step;
            let frac = i as f64 / n as f64;
            let mut target = start;
            target[a_axis] = center_a + radius * angle.cos();
            target[b_axis] = center_b + radius * angle.sin();
            target[linear_axis] = start[linear_axis] + frac * (end[linear_axis] - start[linear_axis]);
            segments.push(ArcSegment { target });
        }
        // Force exact endpoint on the last segment to avoid residual drift.
        if let Some(last) = segments.last_mut() {
            last.target = end;
        }

        Self { segments, next: 0 }
    }

    /// Pulls the next chord segment, or `None` once the arc is exhausted.
    pub fn next_segment(&mut self) -> Option<ArcSegment> {
        let seg = self.segments.get(self.next).copied();
        if seg.is_some() {
            self.next += 1;
        }
        seg
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.segments.len()
    }

    pub fn remaining(&self) -> usize {
        self.segments.len().saturating_sub(self.next)
    }

    /// Discards the remainder of the arc (a feedhold abort, spec.md §4.9).
    pub fn abort(&mut self) {
        self.next = self.segments.len();
    }

    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }
}

fn plane_axes(plane: CanonicalPlane) -> (usize, usize, usize) {
    match plane {
        CanonicalPlane::Xy => (0, 1, 2),
        CanonicalPlane::Xz => (0, 2, 1),
        CanonicalPlane::Yz => (1, 2, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quarter_circle_matches_spec_scenario_6() {
        // spec.md §8 scenario 6: G2 X10 Y0 I0 J-5, chordal_tolerance=0.01.
        let start = [0.0; AXES];
        let mut end = [0.0; AXES];
        end[0] = 10.0;
        let mut arc = ArcGenerator::new(start, end, (0.0, -5.0), CanonicalPlane::Xy, true, 0, 0.01);

        // Expected N ~= ceil(pi*5 / chord_len), chord_len = 2*sqrt(2*5*0.01 - 0.01^2).
        let radius = 5.0;
        let chord_len = (2.0 * radius * 0.01 - 0.01f64.powi(2)).sqrt() * 2.0;
        let expected_n = (std::f64::consts::PI * radius / chord_len).ceil() as usize;
        assert_eq!(arc.total_segments(), expected_n.max(1));

        let mut sum_len = 0.0;
        let mut prev = start;
        while let Some(seg) = arc.next_segment() {
            let dx = seg.target[0] - prev[0];
            let dy = seg.target[1] - prev[1];
            sum_len += (dx * dx + dy * dy).sqrt();
            prev = seg.target;
        }
        let arc_len = radius * std::f64::consts::FRAC_PI_2;
        assert!((sum_len - arc_len).abs() < expected_n as f64 * 0.01, "sum {sum_len} vs arc {arc_len}");
        assert!(arc.is_complete());
    }

    #[test]
    fn abort_discards_remainder() {
        let start = [0.0; AXES];
        let mut end = [0.0; AXES];
        end[0] = 10.0;
        let mut arc = ArcGenerator::new(start, end, (0.0, -5.0), CanonicalPlane::Xy, true, 0, 0.01);
        arc.next_segment();
        arc.abort();
        assert!(arc.is_complete());
        assert_eq!(arc.remaining(), 0);
    }
}
