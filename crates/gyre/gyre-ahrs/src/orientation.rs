use crate::fast_math::inv_sqrt;
use std::f32::consts::FRAC_PI_2;
use std::fmt;

/// Attitude quaternion, scalar first.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Roll, pitch and yaw in degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EulerAngles {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl Quaternion {
    pub const IDENTITY: Self = Self {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn norm(&self) -> f32 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    #[inline(always)]
    pub(crate) fn normalize(&mut self) {
        let r = inv_sqrt(self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z);
        self.w *= r;
        self.x *= r;
        self.y *= r;
        self.z *= r;
    }

    /// Converts to roll/pitch/yaw. Pitch saturates at ±90° once the sine
    /// argument reaches ±1, keeping the sign of the argument.
    pub fn to_euler(&self) -> EulerAngles {
        let Self { w, x, y, z } = *self;

        let sin_pitch = 2.0 * (w * y - x * z);
        let pitch = if sin_pitch.abs() >= 1.0 {
            FRAC_PI_2.copysign(sin_pitch)
        } else {
            sin_pitch.asin()
        };
        let roll = (2.0 * (w * x + y * z)).atan2(1.0 - 2.0 * (x * x + y * y));
        let yaw = (2.0 * (w * z + x * y)).atan2(1.0 - 2.0 * (y * y + z * z));

        EulerAngles {
            roll: roll.to_degrees(),
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
        }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Quaternion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w={:.4} x={:.4} y={:.4} z={:.4}", self.w, self.x, self.y, self.z)
    }
}

impl fmt::Display for EulerAngles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roll={:.2} pitch={:.2} yaw={:.2}",
            self.roll, self.pitch, self.yaw
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn axis_angle(axis: [f32; 3], deg: f32) -> Quaternion {
        let half = deg.to_radians() / 2.0;
        let s = half.sin();
        Quaternion {
            w: half.cos(),
            x: axis[0] * s,
            y: axis[1] * s,
            z: axis[2] * s,
        }
    }

    #[test]
    fn identity_has_zero_angles() {
        assert_eq!(Quaternion::IDENTITY.to_euler(), EulerAngles::default());
    }

    #[test]
    fn single_axis_rotations() {
        let roll = axis_angle([1.0, 0.0, 0.0], 30.0).to_euler();
        assert_abs_diff_eq!(roll.roll, 30.0, epsilon = 1e-3);
        assert_abs_diff_eq!(roll.pitch, 0.0, epsilon = 1e-3);

        let pitch = axis_angle([0.0, 1.0, 0.0], -45.0).to_euler();
        assert_abs_diff_eq!(pitch.pitch, -45.0, epsilon = 1e-3);

        let yaw = axis_angle([0.0, 0.0, 1.0], 120.0).to_euler();
        assert_abs_diff_eq!(yaw.yaw, 120.0, epsilon = 1e-3);
    }

    #[test]
    fn pitch_clamps_at_gimbal_lock() {
        // 2(wy - xz) = 2 * 0.75 = 1.5 > 1
        let q = Quaternion {
            w: 0.75,
            x: 0.0,
            y: 1.0,
            z: 0.0,
        };
        assert_abs_diff_eq!(q.to_euler().pitch, 90.0, epsilon = 1e-4);

        let q = Quaternion { y: -1.0, ..q };
        assert_abs_diff_eq!(q.to_euler().pitch, -90.0, epsilon = 1e-4);

        // exactly at the boundary
        let s = std::f32::consts::FRAC_1_SQRT_2;
        let q = Quaternion {
            w: s,
            x: 0.0,
            y: s,
            z: 0.0,
        };
        let pitch = q.to_euler().pitch;
        assert!(pitch.is_finite());
        assert_abs_diff_eq!(pitch, 90.0, epsilon = 5e-2);
    }

    #[test]
    fn normalize_restores_unit_length() {
        let mut q = Quaternion {
            w: 2.0,
            x: 1.0,
            y: -1.0,
            z: 0.5,
        };
        q.normalize();
        assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 5e-3);
    }
}
