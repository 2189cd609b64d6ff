#![forbid(unsafe_code)]

use std::mem::size_of;

// One accelerometer/gyroscope/magnetometer sample, exactly as it travels in a
// datagram. repr(C, packed) -> no padding, field order is the wire order.
// Every process on the bus must agree on this layout.
#[repr(C, packed)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuPayload {
    pub acc_x: f32, // milli-g
    pub acc_y: f32,
    pub acc_z: f32,
    pub acc_timestamp_ms: u32,
    pub gyro_x: f32, // milli-degrees per second
    pub gyro_y: f32,
    pub gyro_z: f32,
    pub gyro_timestamp_ms: u32,
    pub mag_x: f32, // milli-gauss
    pub mag_y: f32,
    pub mag_z: f32,
    pub mag_timestamp_ms: u32,
}

/// Size of one payload on the wire.
pub const WIRE_SIZE: usize = size_of::<ImuPayload>();

impl ImuPayload {
    #[inline]
    pub fn accel(&self) -> [f32; 3] {
        [self.acc_x, self.acc_y, self.acc_z]
    }

    #[inline]
    pub fn gyro(&self) -> [f32; 3] {
        [self.gyro_x, self.gyro_y, self.gyro_z]
    }

    #[inline]
    pub fn mag(&self) -> [f32; 3] {
        [self.mag_x, self.mag_y, self.mag_z]
    }

    /// Serializes the payload in host byte order, field by field.
    ///
    /// Producer and consumers share a host, so the bytes are the same ones a
    /// raw memory copy of the packed struct would produce.
    pub fn to_bytes(&self) -> [u8; WIRE_SIZE] {
        let words: [[u8; 4]; 12] = [
            self.acc_x.to_ne_bytes(),
            self.acc_y.to_ne_bytes(),
            self.acc_z.to_ne_bytes(),
            self.acc_timestamp_ms.to_ne_bytes(),
            self.gyro_x.to_ne_bytes(),
            self.gyro_y.to_ne_bytes(),
            self.gyro_z.to_ne_bytes(),
            self.gyro_timestamp_ms.to_ne_bytes(),
            self.mag_x.to_ne_bytes(),
            self.mag_y.to_ne_bytes(),
            self.mag_z.to_ne_bytes(),
            self.mag_timestamp_ms.to_ne_bytes(),
        ];

        let mut out = [0u8; WIRE_SIZE];
        for (chunk, word) in out.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(word);
        }
        out
    }

    /// Rebuilds a payload from exactly one wire record.
    pub fn from_bytes(bytes: &[u8; WIRE_SIZE]) -> Self {
        let mut words = bytes
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]]);
        // chunks_exact over 48 bytes always yields 12 words
        let mut next = || words.next().unwrap_or_default();

        Self {
            acc_x: f32::from_ne_bytes(next()),
            acc_y: f32::from_ne_bytes(next()),
            acc_z: f32::from_ne_bytes(next()),
            acc_timestamp_ms: u32::from_ne_bytes(next()),
            gyro_x: f32::from_ne_bytes(next()),
            gyro_y: f32::from_ne_bytes(next()),
            gyro_z: f32::from_ne_bytes(next()),
            gyro_timestamp_ms: u32::from_ne_bytes(next()),
            mag_x: f32::from_ne_bytes(next()),
            mag_y: f32::from_ne_bytes(next()),
            mag_z: f32::from_ne_bytes(next()),
            mag_timestamp_ms: u32::from_ne_bytes(next()),
        }
    }

    /// Decodes a received datagram. Anything other than exactly one record
    /// yields `None`; partial records are never reconstructed.
    pub fn decode(datagram: &[u8]) -> Option<Self> {
        let record: &[u8; WIRE_SIZE] = datagram.try_into().ok()?;
        Some(Self::from_bytes(record))
    }
}
