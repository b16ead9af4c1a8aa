//! Step-budget overshoot tolerance.
//!
//! Auto-tune aborts when the accumulated stepper motion exceeds the
//! initially expected count by more than this factor. Short moves get a
//! generous margin (firmware rounding and backlash dominate); million-step
//! moves are expected to land within a percent.

/// Interpolation breakpoints: (planned steps, allowed overshoot factor).
const BREAKPOINTS: [(f64, f64); 6] = [
    (50e3, 10.0),
    (100e3, 5.0),
    (1e6, 1.5),
    (5e6, 1.1),
    (10e6, 1.1),
    (50e6, 1.01),
];

/// Allowed overshoot multiplier for a planned stepper move.
///
/// Pure and deterministic. Clamped to 10 below 50 000 steps and to 1.01
/// above 50 000 000; straight-line interpolation between the bracketing
/// breakpoints in between. The result is always within `[1.0, 10.0]` and
/// non-increasing in `planned_steps`.
pub fn tolerance_factor(planned_steps: f64) -> f64 {
    let (first, last) = (BREAKPOINTS[0], BREAKPOINTS[BREAKPOINTS.len() - 1]);
    if planned_steps <= first.0 {
        return first.1;
    }
    if planned_steps >= last.0 {
        return last.1;
    }
    for pair in BREAKPOINTS.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if planned_steps <= x1 {
            let slope = (y1 - y0) / (x1 - x0);
            return y0 + slope * (planned_steps - x0);
        }
    }
    // Unreachable: the loop covers every value below the last breakpoint.
    last.1
}
