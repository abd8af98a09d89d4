/// Maps `value` from one numeric domain to another.
///
/// `(a1, b1)` and `(a2, b2)` are two points of the line joining the domains: `a` values live in
/// the source domain, `b` values in the target one. No clamping is done, so callers must keep
/// `value` inside the range they care about. `a1 == a2` yields a non-finite result.
pub fn translate_interval(value: f32, a1: f32, b1: f32, a2: f32, b2: f32) -> f32 {
    let slope = (b2 - b1) / (a2 - a1);
    let intercept = b1 - slope * a1;
    value * slope + intercept
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn maps_endpoints() {
        assert!((translate_interval(0.0, 0.0, -1.0, 1.0, 1.0) + 1.0).abs() < EPS);
        assert!((translate_interval(1.0, 0.0, -1.0, 1.0, 1.0) - 1.0).abs() < EPS);
        assert!(translate_interval(0.5, 0.0, -1.0, 1.0, 1.0).abs() < EPS);
    }

    #[test]
    fn does_not_clamp() {
        let value = translate_interval(2.0, 0.0, 0.0, 1.0, 10.0);
        assert!((value - 20.0).abs() < EPS);
    }

    #[test]
    fn round_trip_reproduces_value() {
        let (min, max) = (-170.0_f32, 170.0_f32);
        for step in 0..=20 {
            let fraction = step as f32 / 20.0;
            let native = translate_interval(fraction, 0.0, min, 1.0, max);
            let back = translate_interval(native, min, 0.0, max, 1.0);
            assert!((back - fraction).abs() < EPS, "{fraction} -> {native} -> {back}");
        }
    }

    #[test]
    fn degenerate_domain_is_not_finite() {
        assert!(!translate_interval(0.5, 1.0, 0.0, 1.0, 1.0).is_finite());
    }
}
