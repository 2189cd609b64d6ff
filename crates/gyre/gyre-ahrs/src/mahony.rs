use crate::fast_math::{MDEG_TO_RAD, normalized3};
use crate::orientation::Quaternion;
use gyre_events::ImuPayload;

const DEFAULT_KP: f32 = 4.5;
const DEFAULT_KI: f32 = 1.0;

/// Proportional-integral complementary filter.
///
/// The cross product between measured and predicted gravity/flux directions
/// is fed back into the gyro rate as `kp * e + ∫ ki * e`.
#[derive(Clone, Debug)]
pub struct Mahony {
    q: Quaternion,
    kp: f32,
    ki: f32,
    integral: [f32; 3],
    half_period: f32,
}

impl Mahony {
    pub fn new(frequency_hz: f32) -> Self {
        Self::with_gains(frequency_hz, DEFAULT_KP, DEFAULT_KI)
    }

    pub fn with_gains(frequency_hz: f32, kp: f32, ki: f32) -> Self {
        Self {
            q: Quaternion::IDENTITY,
            kp,
            ki,
            integral: [0.0; 3],
            half_period: (1.0 / frequency_hz) / 2.0,
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        self.q
    }

    pub fn integral_error(&self) -> [f32; 3] {
        self.integral
    }

    pub fn update(&mut self, sample: &ImuPayload) {
        let [mut gx, mut gy, mut gz] = sample.gyro().map(|g| g * MDEG_TO_RAD);
        let [ax, ay, az] = normalized3(sample.accel());
        let [mx, my, mz] = normalized3(sample.mag());
        let Quaternion { w: q0, x: q1, y: q2, z: q3 } = self.q;
        let half_t = self.half_period;

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

        // measured flux rotated into the earth frame
        let hx = 2.0 * mx * (0.5 - q2q2 - q3q3) + 2.0 * my * (q1q2 - q0q3) + 2.0 * mz * (q1q3 + q0q2);
        let hy = 2.0 * mx * (q1q2 + q0q3) + 2.0 * my * (0.5 - q1q1 - q3q3) + 2.0 * mz * (q2q3 - q0q1);
        let hz = 2.0 * mx * (q1q3 - q0q2) + 2.0 * my * (q2q3 + q0q1) + 2.0 * mz * (0.5 - q1q1 - q2q2);
        let bx = (hx * hx + hy * hy).sqrt();
        let bz = hz;

        // predicted gravity (v) and flux (w) in the sensor frame
        let vx = 2.0 * (q1q3 - q0q2);
        let vy = 2.0 * (q0q1 + q2q3);
        let vz = q0q0 - q1q1 - q2q2 + q3q3;
        // the 0.5 terms of wx and wz are evaluated in double precision
        let wx = (f64::from(2.0 * bx) * (0.5 - f64::from(q2q2) - f64::from(q3q3))
            + f64::from(2.0 * bz * (q1q3 - q0q2))) as f32;
        let wy = 2.0 * bx * (q1q2 - q0q3) + 2.0 * bz * (q0q1 + q2q3);
        let wz = (f64::from(2.0 * bx * (q0q2 + q1q3))
            + f64::from(2.0 * bz) * (0.5 - f64::from(q1q1) - f64::from(q2q2))) as f32;

        let ex = (ay * vz - az * vy) + (my * wz - mz * wy);
        let ey = (az * vx - ax * vz) + (mz * wx - mx * wz);
        let ez = (ax * vy - ay * vx) + (mx * wy - my * wx);

        // Correction only applies when every axis carries error.
        if ex != 0.0 && ey != 0.0 && ez != 0.0 {
            self.integral[0] += ex * self.ki * half_t;
            self.integral[1] += ey * self.ki * half_t;
            self.integral[2] += ez * self.ki * half_t;

            gx = gx + self.kp * ex + self.integral[0];
            gy = gy + self.kp * ey + self.integral[1];
            gz = gz + self.kp * ez + self.integral[2];
        }

        // Sequential update: each component sees the ones already advanced.
        let q = &mut self.q;
        q.w += (-q.x * gx - q.y * gy - q.z * gz) * half_t;
        q.x += (q.w * gx + q.y * gz - q.z * gy) * half_t;
        q.y += (q.w * gy - q.x * gz + q.z * gx) * half_t;
        q.z += (q.w * gz + q.x * gy - q.y * gx) * half_t;
        q.normalize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn aligned_references_produce_no_correction() {
        // gravity on z, field in the x-z plane: zero cross-product error at identity
        let mut filter = Mahony::new(500.0);
        let sample = ImuPayload {
            acc_z: 1000.0,
            mag_x: 400.0,
            mag_z: -300.0,
            ..Default::default()
        };
        for _ in 0..100 {
            filter.update(&sample);
        }
        assert_eq!(filter.integral_error(), [0.0; 3]);
        let q = filter.quaternion();
        assert_abs_diff_eq!(q.w, 1.0, epsilon = 5e-3);
        assert_abs_diff_eq!(q.x, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn integral_accumulates_only_with_error_on_all_axes() {
        let mut filter = Mahony::new(100.0);
        let sample = ImuPayload {
            acc_x: 300.0,
            acc_y: 400.0,
            acc_z: 800.0,
            mag_x: 300.0,
            mag_y: 250.0,
            mag_z: 500.0,
            ..Default::default()
        };
        filter.update(&sample);
        let integral = filter.integral_error();
        assert!(integral.iter().all(|e| *e != 0.0), "{integral:?}");
    }

    #[test]
    fn rotation_about_z_with_zero_references() {
        // Without accel or mag the error is zero and the filter integrates gyro.
        let mut filter = Mahony::new(100.0);
        let sample = ImuPayload {
            gyro_z: 90_000.0,
            ..Default::default()
        };
        for _ in 0..50 {
            filter.update(&sample);
        }
        let yaw = filter.quaternion().to_euler().yaw;
        // 0.5 s at 90 deg/s
        assert_abs_diff_eq!(yaw, 45.0, epsilon = 1.0);
    }

    #[test]
    fn zero_references_normalize_to_zero_and_stay_finite() {
        // both vectors are normalized unconditionally
        let mut filter = Mahony::new(500.0);
        let sample = ImuPayload {
            gyro_x: 3_000.0,
            gyro_y: -1_000.0,
            ..Default::default()
        };
        for _ in 0..1_000 {
            filter.update(&sample);
        }
        let q = filter.quaternion();
        assert!([q.w, q.x, q.y, q.z].iter().all(|c| c.is_finite()), "{q:?}");
        assert_eq!(filter.integral_error(), [0.0; 3]);
    }

    /// Straight-line port of the single-precision reference filter, kept
    /// free of the crate's helpers so the two can be compared bit for bit.
    struct ReferenceMahony {
        quat: [f32; 4],
        ex_int: f32,
        ey_int: f32,
        ez_int: f32,
        update_period: f32,
    }

    impl ReferenceMahony {
        const KP: f32 = 4.50;
        const KI: f32 = 1.0;

        fn new(update_frequency_hz: f32) -> Self {
            Self {
                quat: [1.0, 0.0, 0.0, 0.0],
                ex_int: 0.0,
                ey_int: 0.0,
                ez_int: 0.0,
                update_period: 1.0 / update_frequency_hz,
            }
        }

        fn inv_sqrt(x: f32) -> f32 {
            let halfx = 0.5 * x;
            let i = 0x5f3759df_i32 - (x.to_bits() as i32 >> 1);
            let y = f32::from_bits(i as u32);
            y * (1.5 - (halfx * y * y))
        }

        fn update(&mut self, p: &ImuPayload) {
            let half_t = self.update_period / 2.0;
            let deg_to_rad: f32 = 0.017453292;
            let mdeg_to_rad = deg_to_rad / 1000.0;
            let mut gx = p.gyro_x * mdeg_to_rad;
            let mut gy = p.gyro_y * mdeg_to_rad;
            let mut gz = p.gyro_z * mdeg_to_rad;
            let (mut ax, mut ay, mut az) = (p.acc_x, p.acc_y, p.acc_z);
            let (mut mx, mut my, mut mz) = (p.mag_x, p.mag_y, p.mag_z);
            let q = &mut self.quat;

            let q0q0 = q[0] * q[0];
            let q0q1 = q[0] * q[1];
            let q0q2 = q[0] * q[2];
            let q0q3 = q[0] * q[3];
            let q1q1 = q[1] * q[1];
            let q1q2 = q[1] * q[2];
            let q1q3 = q[1] * q[3];
            let q2q2 = q[2] * q[2];
            let q2q3 = q[2] * q[3];
            let q3q3 = q[3] * q[3];

            let norm = Self::inv_sqrt(ax * ax + ay * ay + az * az);
            ax *= norm;
            ay *= norm;
            az *= norm;
            let norm = Self::inv_sqrt(mx * mx + my * my + mz * mz);
            mx *= norm;
            my *= norm;
            mz *= norm;

            let hx = 2.0 * mx * (0.5 - q2q2 - q3q3) + 2.0 * my * (q1q2 - q0q3) + 2.0 * mz * (q1q3 + q0q2);
            let hy = 2.0 * mx * (q1q2 + q0q3) + 2.0 * my * (0.5 - q1q1 - q3q3) + 2.0 * mz * (q2q3 - q0q1);
            let hz = 2.0 * mx * (q1q3 - q0q2) + 2.0 * my * (q2q3 + q0q1) + 2.0 * mz * (0.5 - q1q1 - q2q2);
            let bx = (hx * hx + hy * hy).sqrt();
            let bz = hz;

            let vx = 2.0 * (q1q3 - q0q2);
            let vy = 2.0 * (q0q1 + q2q3);
            let vz = q0q0 - q1q1 - q2q2 + q3q3;
            // double-precision literal promotes the whole expression
            let wx = ((2.0 * bx) as f64 * (0.5_f64 - q2q2 as f64 - q3q3 as f64)
                + (2.0 * bz * (q1q3 - q0q2)) as f64) as f32;
            let wy = 2.0 * bx * (q1q2 - q0q3) + 2.0 * bz * (q0q1 + q2q3);
            let wz = ((2.0 * bx * (q0q2 + q1q3)) as f64
                + (2.0 * bz) as f64 * (0.5_f64 - q1q1 as f64 - q2q2 as f64)) as f32;

            let ex = (ay * vz - az * vy) + (my * wz - mz * wy);
            let ey = (az * vx - ax * vz) + (mz * wx - mx * wz);
            let ez = (ax * vy - ay * vx) + (mx * wy - my * wx);

            if ex != 0.0 && ey != 0.0 && ez != 0.0 {
                self.ex_int = self.ex_int + ex * Self::KI * half_t;
                self.ey_int = self.ey_int + ey * Self::KI * half_t;
                self.ez_int = self.ez_int + ez * Self::KI * half_t;
                gx = gx + Self::KP * ex + self.ex_int;
                gy = gy + Self::KP * ey + self.ey_int;
                gz = gz + Self::KP * ez + self.ez_int;
            }

            q[0] = q[0] + (-q[1] * gx - q[2] * gy - q[3] * gz) * half_t;
            q[1] = q[1] + (q[0] * gx + q[2] * gz - q[3] * gy) * half_t;
            q[2] = q[2] + (q[0] * gy - q[1] * gz + q[3] * gx) * half_t;
            q[3] = q[3] + (q[0] * gz + q[1] * gy - q[2] * gx) * half_t;

            let norm = Self::inv_sqrt(q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]);
            for c in q.iter_mut() {
                *c *= norm;
            }
        }
    }

    fn wobbling_sample(tick: u32) -> ImuPayload {
        let t = tick as f32 * 0.01;
        ImuPayload {
            acc_x: 120.0 * (1.3 * t).sin() + 15.0,
            acc_y: -80.0 * (0.7 * t).cos(),
            acc_z: 980.0 + 30.0 * (2.1 * t).sin(),
            gyro_x: 4_000.0 * (0.9 * t).sin(),
            gyro_y: -2_500.0 * (1.7 * t).cos() + 300.0,
            gyro_z: 12_000.0 * (0.3 * t).sin(),
            mag_x: 220.0 + 40.0 * (0.5 * t).cos(),
            mag_y: -60.0 * (1.1 * t).sin(),
            mag_z: -410.0 + 25.0 * (0.8 * t).sin(),
            ..Default::default()
        }
    }

    #[test]
    fn matches_reference_in_place_update_bit_for_bit() {
        for &hz in &[100.0f32, 500.0, 1000.0] {
            let mut filter = Mahony::new(hz);
            let mut reference = ReferenceMahony::new(hz);
            for tick in 0..1_000 {
                let sample = wobbling_sample(tick);
                filter.update(&sample);
                reference.update(&sample);

                let q = filter.quaternion();
                let got = [q.w, q.x, q.y, q.z].map(f32::to_bits);
                let want = reference.quat.map(f32::to_bits);
                assert_eq!(got, want, "{hz} Hz diverged at tick {tick}");
                let integral = filter.integral_error().map(f32::to_bits);
                let want_integral = [reference.ex_int, reference.ey_int, reference.ez_int].map(f32::to_bits);
                assert_eq!(integral, want_integral, "{hz} Hz integral at tick {tick}");
            }
        }
    }
}
