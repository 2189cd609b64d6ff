pub mod imu_payload;
pub mod registration;

pub use imu_payload::{ImuPayload, WIRE_SIZE};
pub use registration::{REGISTRATION_TOKEN, is_registration};
