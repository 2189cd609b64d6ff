//! Quaternion attitude estimation from accelerometer, gyroscope and
//! magnetometer samples.
//!
//! Two complementary filters share one update contract through
//! [`OrientationFilter`]; the strategy is fixed at construction.

#![forbid(unsafe_code)]

mod fast_math;
mod filter;
mod madgwick;
mod mahony;
mod orientation;

pub use fast_math::{MDEG_TO_RAD, inv_sqrt};
pub use filter::OrientationFilter;
pub use madgwick::Madgwick;
pub use mahony::Mahony;
pub use orientation::{EulerAngles, Quaternion};
