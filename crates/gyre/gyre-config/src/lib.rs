mod config;

pub use config::{
    AhrsKind, ConfigError, Parameters, SchedPolicy, ThreadParams, check_socket_path,
    max_socket_path_len, tick_period,
};
