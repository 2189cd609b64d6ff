use gyre_ahrs::{EulerAngles, OrientationFilter, Quaternion};
use gyre_events::ImuPayload;
use std::fmt;
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Orientation {
    pub quaternion: Quaternion,
    pub angles: EulerAngles,
}

impl Orientation {
    pub fn from_filter(filter: &OrientationFilter) -> Self {
        let quaternion = filter.quaternion();
        Self {
            quaternion,
            angles: quaternion.to_euler(),
        }
    }
}

/// A received sample plus the filter state after it was applied.
#[derive(Clone, Copy, Debug)]
pub struct OrientedSample {
    pub payload: ImuPayload,
    pub orientation: Option<Orientation>,
    pub received_at: Instant,
}

impl fmt::Display for OrientedSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // copy out of the packed record before formatting
        let p = self.payload;
        let (acc_ts, gyro_ts, mag_ts) = (p.acc_timestamp_ms, p.gyro_timestamp_ms, p.mag_timestamp_ms);
        let [ax, ay, az] = p.accel();
        let [gx, gy, gz] = p.gyro();
        let [mx, my, mz] = p.mag();

        writeln!(f, "=== IMU Data ===")?;
        writeln!(f, "TimestampAcc: {acc_ts} ms")?;
        writeln!(f, "Accel: [{ax:.2}, {ay:.2}, {az:.2}]")?;
        writeln!(f, "TimestampGyro: {gyro_ts} ms")?;
        writeln!(f, "Gyro:  [{gx:.2}, {gy:.2}, {gz:.2}]")?;
        writeln!(f, "TimestampMag: {mag_ts} ms")?;
        writeln!(f, "Mag:   [{mx:.2}, {my:.2}, {mz:.2}]")?;

        if let Some(o) = &self.orientation {
            let q = o.quaternion;
            let a = o.angles;
            writeln!(f, "=== AHRS Data ===")?;
            writeln!(f, "Quaternion: [{:.2}, {:.2}, {:.2}, {:.2}]", q.w, q.x, q.y, q.z)?;
            writeln!(
                f,
                "Angles: [Roll: {:.2}°, Pitch: {:.2}°, Yaw: {:.2}°]",
                a.roll, a.pitch, a.yaw
            )?;
        }

        write!(f, "----------------------------------")
    }
}
