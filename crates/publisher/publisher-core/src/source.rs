use crate::clock::wall_clock_ms;
use gyre_events::ImuPayload;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to seed random generator: {0}")]
    Entropy(String),

    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies one sample per publisher tick.
///
/// `initialize` runs once, before the loop starts; a failure there aborts the
/// publisher's startup. `sample` is called from the loop thread and must not
/// block.
pub trait DataSource: Send {
    fn initialize(&mut self) -> Result<(), SourceError>;

    fn sample(&mut self) -> ImuPayload;

    fn name(&self) -> &'static str;
}

impl<S: DataSource + ?Sized> DataSource for Box<S> {
    fn initialize(&mut self) -> Result<(), SourceError> {
        (**self).initialize()
    }

    fn sample(&mut self) -> ImuPayload {
        (**self).sample()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

const ACC_RANGE_MG: f32 = 16_000.0;
const GYRO_RANGE_MDPS: f32 = 2_000_000.0;
const MAG_MIN_MG: f32 = 200.0;
const MAG_MAX_MG: f32 = 600.0;

/// Uniformly random samples across the full sensor ranges, stamped with the
/// wall clock. All three timestamps of a sample are equal.
pub struct RandomSource {
    rng: StdRng,
    seed: Option<u64>,
}

impl RandomSource {
    /// Reseeded from the OS at `initialize`.
    pub fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(0),
            seed: None,
        }
    }

    /// Reproducible sequence; `initialize` keeps the seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl DataSource for RandomSource {
    fn initialize(&mut self) -> Result<(), SourceError> {
        match self.seed {
            Some(seed) => {
                self.rng = StdRng::seed_from_u64(seed);
                info!(seed, "random data source initialized");
            }
            None => {
                self.rng = StdRng::try_from_os_rng().map_err(|e| SourceError::Entropy(e.to_string()))?;
                info!("random data source initialized");
            }
        }
        Ok(())
    }

    fn sample(&mut self) -> ImuPayload {
        let now = wall_clock_ms();
        let rng = &mut self.rng;

        ImuPayload {
            acc_x: rng.random_range(-ACC_RANGE_MG..=ACC_RANGE_MG),
            acc_y: rng.random_range(-ACC_RANGE_MG..=ACC_RANGE_MG),
            acc_z: rng.random_range(-ACC_RANGE_MG..=ACC_RANGE_MG),
            acc_timestamp_ms: now,
            gyro_x: rng.random_range(-GYRO_RANGE_MDPS..=GYRO_RANGE_MDPS),
            gyro_y: rng.random_range(-GYRO_RANGE_MDPS..=GYRO_RANGE_MDPS),
            gyro_z: rng.random_range(-GYRO_RANGE_MDPS..=GYRO_RANGE_MDPS),
            gyro_timestamp_ms: now,
            mag_x: rng.random_range(MAG_MIN_MG..=MAG_MAX_MG),
            mag_y: rng.random_range(MAG_MIN_MG..=MAG_MAX_MG),
            mag_z: rng.random_range(MAG_MIN_MG..=MAG_MAX_MG),
            mag_timestamp_ms: now,
        }
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Constant gravity, magnetic field and gyro bias. Timestamps start at the
/// wall clock when initialized and advance by exactly one period per sample.
#[derive(Clone, Debug)]
pub struct SyntheticSource {
    accel: [f32; 3],
    gyro: [f32; 3],
    mag: [f32; 3],
    period: Duration,
    start_ms: u32,
    ticks: u64,
}

impl SyntheticSource {
    /// Level and still: 1 g on +z, a field in the x-z plane, no rotation.
    pub fn new(period: Duration) -> Self {
        Self {
            accel: [0.0, 0.0, 1000.0],
            gyro: [0.0; 3],
            mag: [400.0, 0.0, -300.0],
            period,
            start_ms: 0,
            ticks: 0,
        }
    }

    /// Milli-degrees per second added on every axis.
    pub fn with_gyro_bias(mut self, bias: [f32; 3]) -> Self {
        self.gyro = bias;
        self
    }

    pub fn with_accel(mut self, accel: [f32; 3]) -> Self {
        self.accel = accel;
        self
    }

    pub fn with_mag(mut self, mag: [f32; 3]) -> Self {
        self.mag = mag;
        self
    }

    fn timestamp_ms(&self) -> u32 {
        let elapsed_ms = self.period.as_nanos().saturating_mul(u128::from(self.ticks)) / 1_000_000;
        self.start_ms.wrapping_add(elapsed_ms as u32)
    }
}

impl DataSource for SyntheticSource {
    fn initialize(&mut self) -> Result<(), SourceError> {
        if self.period.is_zero() {
            return Err(SourceError::Unavailable("synthetic period must be non-zero".into()));
        }
        self.start_ms = wall_clock_ms();
        self.ticks = 0;
        info!(
            period_us = self.period.as_micros() as u64,
            gyro_bias = ?self.gyro,
            "synthetic data source initialized"
        );
        Ok(())
    }

    fn sample(&mut self) -> ImuPayload {
        let ts = self.timestamp_ms();
        self.ticks += 1;
        let [acc_x, acc_y, acc_z] = self.accel;
        let [gyro_x, gyro_y, gyro_z] = self.gyro;
        let [mag_x, mag_y, mag_z] = self.mag;
        ImuPayload {
            acc_x,
            acc_y,
            acc_z,
            acc_timestamp_ms: ts,
            gyro_x,
            gyro_y,
            gyro_z,
            gyro_timestamp_ms: ts,
            mag_x,
            mag_y,
            mag_z,
            mag_timestamp_ms: ts,
        }
    }

    fn name(&self) -> &'static str {
        "synthetic"
    }
}
