//! Junction (cornering) velocity, spec.md §4.3 "Junction velocity".
//!
//! Grounded on the teacher's `motion/junction.rs` for the unit-vector/delta
//! framing, adapted to the jerk/`T_JT` formula spec.md actually specifies
//! rather than a deviation-radius model.

use crate::constants::AXES;

const EPSILON: f64 = 1e-10;

/// Computes the maximum velocity at which blocks A (exiting with unit
/// vector `unit_a`) and B (entering with `unit_b`) can be joined without
/// exceeding any participating axis's jerk limit, given the junction
/// integration time `t_jt`.
///
/// For each axis `i`, `delta_u_i = unit_b[i] - unit_a[i]`; if `|delta_u_i| >
/// epsilon`, the axis bounds the corner velocity to `a_j_i / |delta_u_i|`
/// where `a_j_i = jerk_max_i * t_jt`. The corner velocity is the minimum
/// over all bounding axes, additionally capped by both blocks' cruise_vmax.
pub fn junction_velocity(
    unit_a: &[f64; AXES],
    unit_b: &[f64; AXES],
    jerk_max: &[f64; AXES],
    t_jt: f64,
    cruise_vmax_a: f64,
    cruise_vmax_b: f64,
) -> f64 {
    let mut v_corner = cruise_vmax_a.min(cruise_vmax_b);
    for i in 0..AXES {
        let delta_u = unit_b[i] - unit_a[i];
        if delta_u.abs() > EPSILON {
            let a_j = jerk_max[i] * t_jt;
            let v_axis = a_j / delta_u.abs();
            if v_axis < v_corner {
                v_corner = v_axis;
            }
        }
    }
    v_corner.max(0.0)
}

/// True when A and B are collinear (no axis bounds the corner, so the
/// junction velocity degenerates to `min(cruise_vmax_a, cruise_vmax_b)`),
/// the "continuous body, no decel between blocks" case of spec.md §8
/// scenario 3.
pub fn is_collinear(unit_a: &[f64; AXES], unit_b: &[f64; AXES]) -> bool {
    (0..AXES).all(|i| (unit_b[i] - unit_a[i]).abs() <= EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ninety_degree_corner_matches_spec_example() {
        // spec.md §8 scenario 2: X then Y, jerk=1000 both axes, T_JT=1.2.
        let unit_a = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let unit_b = [0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let jerk_max = [1000.0; AXES];
        let v = junction_velocity(&unit_a, &unit_b, &jerk_max, 1.2, 1_000_000.0, 1_000_000.0);
        assert!((v - 1200.0).abs() < 1e-6, "got {v}");
    }

    #[test]
    fn collinear_blocks_have_no_axis_bound() {
        let unit_a = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let unit_b = [1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!(is_collinear(&unit_a, &unit_b));
        let v = junction_velocity(&unit_a, &unit_b, &[1000.0; AXES], 1.2, 3000.0, 5000.0);
        assert_eq!(v, 3000.0);
    }
}
