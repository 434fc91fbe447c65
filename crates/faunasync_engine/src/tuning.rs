//! Engine tuning knobs
//!
//! One value object carried through a whole run. The PID fields feed a fresh
//! controller per scan; the limits bound pagination and batching.

/// Tuning parameters for scans and differential syncs.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Ceiling on continuation chunks per logical query
    pub max_chunks: usize,
    /// Maximum record ids per differential fetch batch
    pub max_list_length: usize,
    /// PID proportional gain
    pub pid_kp: f64,
    /// PID integral gain
    pub pid_ki: f64,
    /// PID derivative gain
    pub pid_kd: f64,
    /// Target record count per request
    pub pid_setpoint: f64,
    /// Smallest window width in days (must stay >= 1 for scan progress)
    pub pid_limit_min: f64,
    /// Largest window width in days
    pub pid_limit_max: f64,
    /// Seed width in days for the first window of a scan
    pub pid_delta_days: i64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            max_chunks: 10,
            max_list_length: 100,
            pid_kp: 0.2,
            pid_ki: 0.003,
            pid_kd: 0.0,
            pid_setpoint: 10_000.0,
            pid_limit_min: 1.0,
            pid_limit_max: 45.0,
            pid_delta_days: 15,
        }
    }
}
