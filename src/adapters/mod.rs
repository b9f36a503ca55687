//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements   | Connects to                        |
//! |---------------|--------------|------------------------------------|
//! | `sensors`     | SensorPort   | hwmon CPU sensor + GPU telemetry   |
//! | `hwmon`       | -            | `/sys/class/hwmon/*/temp*_input`   |
//! | `smc`         | ActuatorPort | SMC `fan{N}_*` sysfs registers     |
//! | `log_sink`    | EventSink    | `log` facade                       |
//! | `config_file` | ConfigPort   | JSON file on disk                  |

pub mod config_file;
pub mod hwmon;
pub mod log_sink;
pub mod sensors;
pub mod smc;
