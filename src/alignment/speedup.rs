/// Diffusion step budget the decoders were trained with.
pub const DIFFUSION_STEPS: i64 = 1000;

/// Speedup used when the caller did not ask for a step count.
pub const DEFAULT_SPEEDUP: i64 = 10;

/// Largest divisor of [`DIFFUSION_STEPS`] not above `DIFFUSION_STEPS / steps`.
pub fn speedup_from_steps(steps: i64) -> i64 {
    if steps <= 0 {
        return DEFAULT_SPEEDUP;
    }
    let mut speedup = (DIFFUSION_STEPS / steps).clamp(1, DIFFUSION_STEPS);
    while DIFFUSION_STEPS % speedup != 0 && speedup > 1 {
        speedup -= 1;
    }
    speedup
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values() {
        assert_eq!(speedup_from_steps(1000), 1);
        assert_eq!(speedup_from_steps(0), 10);
        assert_eq!(speedup_from_steps(-5), 10);
        assert_eq!(speedup_from_steps(1), 1000);
        assert_eq!(speedup_from_steps(5000), 1);
    }

    #[test]
    fn rounds_down_to_a_divisor() {
        // 1000 / 30 = 33 -> 25
        assert_eq!(speedup_from_steps(30), 25);
        // 1000 / 20 = 50
        assert_eq!(speedup_from_steps(20), 50);
        // 1000 / 7 = 142 -> 125
        assert_eq!(speedup_from_steps(7), 125);
    }

    #[test]
    fn always_divides_the_step_budget() {
        for steps in 1..=2000 {
            let speedup = speedup_from_steps(steps);
            assert_eq!(DIFFUSION_STEPS % speedup, 0, "steps={steps} speedup={speedup}");
            assert!(speedup <= (DIFFUSION_STEPS / steps).max(1));
        }
    }
}
