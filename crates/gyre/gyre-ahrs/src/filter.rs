use crate::madgwick::Madgwick;
use crate::mahony::Mahony;
use crate::orientation::{EulerAngles, Quaternion};
use gyre_config::AhrsKind;
use gyre_events::ImuPayload;
use tracing::info;

/// One of the two attitude estimators, chosen once at construction.
#[derive(Clone, Debug)]
pub enum OrientationFilter {
    Madgwick(Madgwick),
    Mahony(Mahony),
}

impl OrientationFilter {
    /// Builds the configured estimator, or `None` for [`AhrsKind::None`].
    pub fn from_kind(kind: AhrsKind, frequency_hz: u32) -> Option<Self> {
        let f = frequency_hz as f32;
        let filter = match kind {
            AhrsKind::None => return None,
            AhrsKind::Madgwick => Self::Madgwick(Madgwick::new(f)),
            AhrsKind::Simple => Self::Mahony(Mahony::new(f)),
        };
        info!(%kind, frequency_hz, "orientation filter created");
        Some(filter)
    }

    #[inline]
    pub fn update(&mut self, sample: &ImuPayload) {
        match self {
            Self::Madgwick(f) => f.update(sample),
            Self::Mahony(f) => f.update(sample),
        }
    }

    pub fn quaternion(&self) -> Quaternion {
        match self {
            Self::Madgwick(f) => f.quaternion(),
            Self::Mahony(f) => f.quaternion(),
        }
    }

    pub fn angles(&self) -> EulerAngles {
        self.quaternion().to_euler()
    }

    pub fn kind(&self) -> AhrsKind {
        match self {
            Self::Madgwick(_) => AhrsKind::Madgwick,
            Self::Mahony(_) => AhrsKind::Simple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Deterministic, non-degenerate sample sequence.
    fn wobble(i: usize) -> ImuPayload {
        let t = i as f32 * 0.01;
        ImuPayload {
            acc_x: 120.0 * t.sin(),
            acc_y: -80.0 * (1.3 * t).cos(),
            acc_z: 980.0 + 30.0 * (0.7 * t).sin(),
            gyro_x: 15_000.0 * (0.5 * t).sin(),
            gyro_y: -22_000.0 * (0.9 * t).cos(),
            gyro_z: 40_000.0,
            mag_x: 350.0 + 50.0 * t.cos(),
            mag_y: 120.0 * (0.3 * t).sin(),
            mag_z: -410.0,
            ..Default::default()
        }
    }

    #[test]
    fn none_builds_nothing() {
        assert!(OrientationFilter::from_kind(AhrsKind::None, 500).is_none());
    }

    #[test]
    fn kinds_map_to_strategies() {
        let m = OrientationFilter::from_kind(AhrsKind::Madgwick, 500).unwrap();
        assert_eq!(m.kind(), AhrsKind::Madgwick);
        let s = OrientationFilter::from_kind(AhrsKind::Simple, 500).unwrap();
        assert_eq!(s.kind(), AhrsKind::Simple);
        assert_eq!(s.quaternion(), Quaternion::IDENTITY);
    }

    #[test]
    fn norm_stays_unit_over_ten_thousand_updates() {
        for kind in [AhrsKind::Madgwick, AhrsKind::Simple] {
            let mut filter = OrientationFilter::from_kind(kind, 500).unwrap();
            for i in 0..10_000 {
                filter.update(&wobble(i));
                let q = filter.quaternion();
                assert_abs_diff_eq!(q.norm(), 1.0, epsilon = 5e-3);
                let a = filter.angles();
                assert!(a.roll.is_finite() && a.pitch.is_finite() && a.yaw.is_finite(), "{kind} tick {i}");
            }
        }
    }

    #[test]
    fn constant_bias_input_keeps_angles_in_range() {
        // gravity on z, fixed field, small constant gyro bias on every axis
        let sample = ImuPayload {
            acc_z: 1000.0,
            gyro_x: 500.0,
            gyro_y: -300.0,
            gyro_z: 200.0,
            mag_x: 400.0,
            mag_z: -300.0,
            ..Default::default()
        };
        for kind in [AhrsKind::Madgwick, AhrsKind::Simple] {
            let mut filter = OrientationFilter::from_kind(kind, 500).unwrap();
            for _ in 0..1_000 {
                filter.update(&sample);
                let a = filter.angles();
                assert!(a.roll.abs() <= 180.001 && a.yaw.abs() <= 180.001, "{kind}: {a}");
                assert!(a.pitch.abs() <= 90.001, "{kind}: {a}");
            }
            let a = filter.angles();
            assert!(a.roll.abs() < 10.0 && a.pitch.abs() < 10.0, "{kind} drifted: {a}");
        }
    }
}
