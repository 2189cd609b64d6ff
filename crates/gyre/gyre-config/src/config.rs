use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Per-run configuration shared by the publisher and subscriber processes.
///
/// Built once (file, then command-line overrides) and never mutated after the
/// engines start.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Parameters {
    #[serde(default)]
    pub socket_path: PathBuf,
    #[serde(default = "defaults::frequency_hz")]
    pub frequency_hz: u32,
    #[serde(default = "defaults::timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "defaults::log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ahrs: AhrsKind,
    #[serde(default)]
    pub thread: ThreadParams,
}

/// Real-time request for the engine's loop thread.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadParams {
    #[serde(default)]
    pub real_time: bool,
    #[serde(default = "defaults::priority")]
    pub priority: i32,
    #[serde(default)]
    pub policy: SchedPolicy,
}

/// Orientation filter run by a subscriber on every received sample.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AhrsKind {
    #[default]
    None,
    /// Gradient-descent complementary filter.
    #[serde(alias = "gradient-descent")]
    Madgwick,
    /// Proportional-integral complementary filter.
    #[serde(alias = "mahony", alias = "proportional-integral")]
    Simple,
}

/// Scheduling class applied when `real_time` is set.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    #[default]
    Fifo,
    #[serde(alias = "roundrobin")]
    Rr,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config")]
    Parse(#[from] toml::de::Error),

    #[error("socket path is required")]
    MissingSocketPath,

    #[error("socket path '{path}' is {len} bytes, the platform limit is {max}")]
    SocketPathTooLong { path: String, len: usize, max: usize },

    #[error("sample frequency must be at least 1 Hz")]
    ZeroFrequency,

    #[error("unknown {what} '{value}'")]
    UnknownVariant { what: &'static str, value: String },
}

mod defaults {
    pub fn frequency_hz() -> u32 {
        500
    }

    pub fn timeout_ms() -> u64 {
        100
    }

    pub fn log_level() -> String {
        "info".into()
    }

    pub fn priority() -> i32 {
        50
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::new(),
            frequency_hz: defaults::frequency_hz(),
            timeout_ms: defaults::timeout_ms(),
            log_level: defaults::log_level(),
            ahrs: AhrsKind::default(),
            thread: ThreadParams::default(),
        }
    }
}

impl Default for ThreadParams {
    fn default() -> Self {
        Self {
            real_time: false,
            priority: defaults::priority(),
            policy: SchedPolicy::default(),
        }
    }
}

impl Parameters {
    pub fn load(path: impl AsRef<Path> + ToString) -> Result<Self, ConfigError> {
        let toml_to_str = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&toml_to_str)
    }

    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let params: Parameters = toml::from_str(s)?;
        Ok(params)
    }

    /// Checks everything that must hold before any socket is created.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_socket_path(&self.socket_path)?;
        tick_period(self.frequency_hz)?;
        Ok(())
    }

    pub fn tick_period(&self) -> Result<Duration, ConfigError> {
        tick_period(self.frequency_hz)
    }

    /// Receive timeout for subscribers. Zero means block forever.
    pub fn receive_timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Fixed inter-sample period: one second divided by the frequency, truncated
/// to whole nanoseconds.
pub fn tick_period(frequency_hz: u32) -> Result<Duration, ConfigError> {
    if frequency_hz == 0 {
        return Err(ConfigError::ZeroFrequency);
    }
    Ok(Duration::from_nanos(NANOS_PER_SEC / u64::from(frequency_hz)))
}

/// Longest path that fits `sockaddr_un::sun_path` with its terminating NUL.
pub fn max_socket_path_len() -> usize {
    // SAFETY: sockaddr_un is plain old data; an all-zero value is valid.
    let addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_path.len() - 1
}

pub fn check_socket_path(path: &Path) -> Result<(), ConfigError> {
    let len = path.as_os_str().len();
    if len == 0 {
        return Err(ConfigError::MissingSocketPath);
    }
    let max = max_socket_path_len();
    if len > max {
        return Err(ConfigError::SocketPathTooLong {
            path: path.display().to_string(),
            len,
            max,
        });
    }
    Ok(())
}

impl FromStr for AhrsKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(AhrsKind::None),
            "madgwick" | "gradient-descent" => Ok(AhrsKind::Madgwick),
            "simple" | "mahony" | "proportional-integral" => Ok(AhrsKind::Simple),
            _ => Err(ConfigError::UnknownVariant {
                what: "ahrs type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AhrsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AhrsKind::None => "none",
            AhrsKind::Madgwick => "madgwick",
            AhrsKind::Simple => "simple",
        })
    }
}

impl FromStr for SchedPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(SchedPolicy::Fifo),
            "rr" | "roundrobin" => Ok(SchedPolicy::Rr),
            "other" => Ok(SchedPolicy::Other),
            _ => Err(ConfigError::UnknownVariant {
                what: "scheduling policy",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedPolicy::Fifo => "fifo",
            SchedPolicy::Rr => "rr",
            SchedPolicy::Other => "other",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_period_is_truncated_nanoseconds_for_every_valid_rate() {
        for f in 1u32..=1000 {
            let period = tick_period(f).expect("valid frequency");
            assert_eq!(period.as_nanos(), u128::from(1_000_000_000u64 / u64::from(f)), "f={f}");
        }
        assert_eq!(tick_period(3).unwrap().as_nanos(), 333_333_333);
        assert_eq!(tick_period(500).unwrap(), Duration::from_millis(2));
    }

    #[test]
    fn zero_frequency_is_a_config_error() {
        assert!(matches!(tick_period(0), Err(ConfigError::ZeroFrequency)));
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let p = Parameters::from_toml(r#"socket_path = "/tmp/gyre_test.sock""#).unwrap();
        assert_eq!(p.socket_path, PathBuf::from("/tmp/gyre_test.sock"));
        assert_eq!(p.frequency_hz, 500);
        assert_eq!(p.timeout_ms, 100);
        assert_eq!(p.log_level, "info");
        assert_eq!(p.ahrs, AhrsKind::None);
        assert_eq!(p.thread, ThreadParams::default());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn parses_full_file() {
        let p = Parameters::from_toml(
            r#"
            socket_path = "/tmp/imu.sock"
            frequency_hz = 200
            timeout_ms = 0
            log_level = "debug"
            ahrs = "mahony"

            [thread]
            real_time = true
            priority = 80
            policy = "rr"
            "#,
        )
        .unwrap();
        assert_eq!(p.frequency_hz, 200);
        assert_eq!(p.receive_timeout(), None);
        assert_eq!(p.ahrs, AhrsKind::Simple);
        assert!(p.thread.real_time);
        assert_eq!(p.thread.priority, 80);
        assert_eq!(p.thread.policy, SchedPolicy::Rr);
    }

    #[test]
    fn unknown_filter_in_file_is_a_parse_error() {
        let err = Parameters::from_toml(r#"ahrs = "kalman""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validate_rejects_missing_and_oversized_paths() {
        let p = Parameters::default();
        assert!(matches!(p.validate(), Err(ConfigError::MissingSocketPath)));

        let long = format!("/tmp/{}", "x".repeat(max_socket_path_len()));
        let p = Parameters {
            socket_path: long.into(),
            ..Parameters::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::SocketPathTooLong { .. })));
    }

    #[test]
    fn longest_fitting_path_is_accepted() {
        let max = max_socket_path_len();
        let path = format!("/{}", "a".repeat(max - 1));
        assert!(check_socket_path(Path::new(&path)).is_ok());
    }

    #[test]
    fn validate_rejects_zero_frequency_before_anything_else_runs() {
        let p = Parameters {
            socket_path: "/tmp/gyre.sock".into(),
            frequency_hz: 0,
            ..Parameters::default()
        };
        assert!(matches!(p.validate(), Err(ConfigError::ZeroFrequency)));
    }

    #[test]
    fn cli_spellings_parse() {
        assert_eq!("Madgwick".parse::<AhrsKind>().unwrap(), AhrsKind::Madgwick);
        assert_eq!("simple".parse::<AhrsKind>().unwrap(), AhrsKind::Simple);
        assert_eq!("none".parse::<AhrsKind>().unwrap(), AhrsKind::None);
        assert!("ekf".parse::<AhrsKind>().is_err());
        assert_eq!("FIFO".parse::<SchedPolicy>().unwrap(), SchedPolicy::Fifo);
        assert_eq!("rr".parse::<SchedPolicy>().unwrap(), SchedPolicy::Rr);
        assert!("idle".parse::<SchedPolicy>().is_err());
    }

    #[test]
    fn receive_timeout_maps_milliseconds() {
        let p = Parameters {
            timeout_ms: 50,
            ..Parameters::default()
        };
        assert_eq!(p.receive_timeout(), Some(Duration::from_millis(50)));
    }
}
