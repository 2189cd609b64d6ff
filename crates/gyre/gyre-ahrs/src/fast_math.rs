/// Degrees to radians, single precision.
const DEG_TO_RAD: f32 = 0.017453292;

/// Gyro input arrives in milli-degrees per second.
pub const MDEG_TO_RAD: f32 = DEG_TO_RAD / 1000.0;

/// Approximate `1 / sqrt(x)`: exponent halving on the raw bits with the
/// `0x5f3759df` constant, then one Newton-Raphson step.
///
/// Relative error stays under ~0.2% for positive normal inputs. Zero maps to
/// a large finite value rather than infinity, so normalizing a zero vector
/// yields zero instead of NaN.
#[inline(always)]
pub fn inv_sqrt(x: f32) -> f32 {
    let half_x = 0.5 * x;
    let y = f32::from_bits(0x5f37_59df_u32.wrapping_sub(x.to_bits() >> 1));
    y * (1.5 - half_x * y * y)
}

/// Scales `v` to unit length with [`inv_sqrt`].
#[inline(always)]
pub(crate) fn normalized3([x, y, z]: [f32; 3]) -> [f32; 3] {
    let r = inv_sqrt(x * x + y * y + z * z);
    [x * r, y * r, z * r]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_exact_within_newton_error_bound() {
        for &x in &[1.0e-6f32, 0.01, 0.5, 1.0, 2.0, 3.0, 10.0, 981.0, 1.0e6, 2.56e8] {
            let exact = 1.0 / x.sqrt();
            let rel = ((inv_sqrt(x) - exact) / exact).abs();
            assert!(rel < 2.0e-3, "x={x} rel={rel}");
        }
    }

    #[test]
    fn known_bit_pattern_for_one() {
        // 0x5f3759df - (0x3f800000 >> 1) = 0x3f7759df, ~0.966
        let y0 = f32::from_bits(0x3f77_59df);
        let expected = y0 * (1.5 - 0.5 * y0 * y0);
        assert_eq!(inv_sqrt(1.0).to_bits(), expected.to_bits());
    }

    #[test]
    fn zero_vector_normalizes_to_zero() {
        assert!(inv_sqrt(0.0).is_finite());
        assert_eq!(normalized3([0.0; 3]), [0.0; 3]);
    }

    #[test]
    fn milli_degree_conversion() {
        let rad = 90_000.0 * MDEG_TO_RAD;
        assert!((rad - std::f32::consts::FRAC_PI_2).abs() < 1.0e-5);
    }
}
