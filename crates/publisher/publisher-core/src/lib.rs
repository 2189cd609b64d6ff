pub mod clock;
pub mod source;

pub use clock::wall_clock_ms;
pub use source::{DataSource, RandomSource, SourceError, SyntheticSource};
