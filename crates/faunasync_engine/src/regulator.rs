//! Discrete PID regulator for window sizing
//!
//! Maps "records received in the last window" to "next window width in
//! days". Pure numeric transform with a unit time step per call; it carries
//! no knowledge of dates and is constructed fresh for every scan invocation,
//! never shared between scans.

/// Discrete-time PID controller.
///
/// Output is clamped to `[output_min, output_max]` and interpreted by the
/// scanner as a whole number of days.
#[derive(Debug, Clone)]
pub struct Pid {
    kp: f64,
    ki: f64,
    kd: f64,
    setpoint: f64,
    output_min: f64,
    output_max: f64,
    integral: f64,
    prior_error: f64,
}

impl Pid {
    /// Build a controller with accumulators at zero.
    ///
    /// `output_min` is raised to at least 1.0: an output of 0 days would
    /// stall the backward sweep.
    pub fn new(kp: f64, ki: f64, kd: f64, setpoint: f64, output_min: f64, output_max: f64) -> Self {
        let output_min = output_min.max(1.0);
        Self {
            kp,
            ki,
            kd,
            setpoint,
            output_min,
            output_max: output_max.max(output_min),
            integral: 0.0,
            prior_error: 0.0,
        }
    }

    /// One controller step: feed the measured count of the completed window,
    /// get the width of the next one.
    pub fn next_width(&mut self, measured: f64) -> f64 {
        let error = self.setpoint - measured;
        self.integral += error;
        let derivative = error - self.prior_error;
        let raw = self.kp * error + self.ki * self.integral + self.kd * derivative;
        self.prior_error = error;
        raw.clamp(self.output_min, self.output_max)
    }
}
