use crate::fast_math::{MDEG_TO_RAD, inv_sqrt, normalized3};
use crate::orientation::Quaternion;
use gyre_events::ImuPayload;

const DEFAULT_BETA: f32 = 0.1;

/// Gradient-descent complementary filter.
///
/// Integrates the gyro-derived quaternion rate and, whenever the accelerometer
/// reading is non-zero, pulls it toward the orientation that best explains the
/// measured gravity and magnetic field, weighted by `beta`.
#[derive(Clone, Debug)]
pub struct Madgwick {
    q: Quaternion,
    beta: f32,
    period: f32,
}

impl Madgwick {
    pub fn new(frequency_hz: f32) -> Self {
        Self::with_gain(frequency_hz, DEFAULT_BETA)
    }

    pub fn with_gain(frequency_hz: f32, beta: f32) -> Self {
        Self {
            q: Quaternion::IDENTITY,
            beta,
            period: 1.0 / frequency_hz,
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    pub fn beta(&self) -> f32 {
        self.beta
    }

    pub fn update(&mut self, sample: &ImuPayload) {
        let [gx, gy, gz] = sample.gyro().map(|g| g * MDEG_TO_RAD);
        let accel = sample.accel();
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;

        let mut q_dot = [
            0.5 * (-q1 * gx - q2 * gy - q3 * gz),
            0.5 * (q0 * gx + q2 * gz - q3 * gy),
            0.5 * (q0 * gy - q1 * gz + q3 * gx),
            0.5 * (q0 * gz + q1 * gy - q2 * gx),
        ];

        // An all-zero accelerometer cannot be normalized; integrate gyro only.
        if accel != [0.0; 3] {
            let s = self.gradient_step(normalized3(accel), normalized3(sample.mag()));
            for (dot, step) in q_dot.iter_mut().zip(s) {
                *dot -= self.beta * step;
            }
        }

        self.q.w += q_dot[0] * self.period;
        self.q.x += q_dot[1] * self.period;
        self.q.y += q_dot[2] * self.period;
        self.q.z += q_dot[3] * self.period;
        self.q.normalize();
    }

    /// Normalized gradient of the gravity + magnetic field objective at the
    /// current estimate. Inputs must already be unit vectors.
    fn gradient_step(&self, [ax, ay, az]: [f32; 3], [mx, my, mz]: [f32; 3]) -> [f32; 4] {
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;

        let _2q0mx = 2.0 * q0 * mx;
        let _2q0my = 2.0 * q0 * my;
        let _2q0mz = 2.0 * q0 * mz;
        let _2q1mx = 2.0 * q1 * mx;
        let _2q0 = 2.0 * q0;
        let _2q1 = 2.0 * q1;
        let _2q2 = 2.0 * q2;
        let _2q3 = 2.0 * q3;
        let _2q0q2 = 2.0 * q0 * q2;
        let _2q2q3 = 2.0 * q2 * q3;
        let q0q0 = q0 * q0;
        let q0q1 = q0 * q1;
        let q0q2 = q0 * q2;
        let q0q3 = q0 * q3;
        let q1q1 = q1 * q1;
        let q1q2 = q1 * q2;
        let q1q3 = q1 * q3;
        let q2q2 = q2 * q2;
        let q2q3 = q2 * q3;
        let q3q3 = q3 * q3;

        // Earth's field in the reference frame, rotated back from the sensor.
        let hx = mx * q0q0 - _2q0my * q3 + _2q0mz * q2 + mx * q1q1 + _2q1 * my * q2 + _2q1 * mz * q3
            - mx * q2q2
            - mx * q3q3;
        let hy = _2q0mx * q3 + my * q0q0 - _2q0mz * q1 + _2q1mx * q2 - my * q1q1 + my * q2q2 + _2q2 * mz * q3
            - my * q3q3;
        let _2bx = (hx * hx + hy * hy).sqrt();
        let _2bz = -_2q0mx * q2 + _2q0my * q1 + mz * q0q0 + _2q1mx * q3 - mz * q1q1 + _2q2 * my * q3 - mz * q2q2
            + mz * q3q3;
        let _4bx = 2.0 * _2bx;
        let _4bz = 2.0 * _2bz;

        // objective residuals
        let fx = 2.0 * q1q3 - _2q0q2 - ax;
        let fy = 2.0 * q0q1 + _2q2q3 - ay;
        let fz = 1.0 - 2.0 * q1q1 - 2.0 * q2q2 - az;
        let bx_res = _2bx * (0.5 - q2q2 - q3q3) + _2bz * (q1q3 - q0q2) - mx;
        let by_res = _2bx * (q1q2 - q0q3) + _2bz * (q0q1 + q2q3) - my;
        let bz_res = _2bx * (q0q2 + q1q3) + _2bz * (0.5 - q1q1 - q2q2) - mz;

        let s0 = -_2q2 * fx + _2q1 * fy - _2bz * q2 * bx_res + (-_2bx * q3 + _2bz * q1) * by_res + _2bx * q2 * bz_res;
        let s1 = _2q3 * fx + _2q0 * fy - 4.0 * q1 * fz
            + _2bz * q3 * bx_res
            + (_2bx * q2 + _2bz * q0) * by_res
            + (_2bx * q3 - _4bz * q1) * bz_res;
        let s2 = -_2q0 * fx + _2q3 * fy - 4.0 * q2 * fz
            + (-_4bx * q2 - _2bz * q0) * bx_res
            + (_2bx * q1 + _2bz * q3) * by_res
            + (_2bx * q0 - _4bz * q2) * bz_res;
        let s3 = _2q1 * fx + _2q2 * fy
            + (-_4bx * q3 + _2bz * q1) * bx_res
            + (-_2bx * q0 + _2bz * q2) * by_res
            + _2bx * q1 * bz_res;

        let r = inv_sqrt(s0 * s0 + s1 * s1 + s2 * s2 + s3 * s3);
        [s0 * r, s1 * r, s2 * r, s3 * r]
    }
}
