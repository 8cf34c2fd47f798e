//! CPU utilization and thermal telemetry.
//!
//! Pull-based, no lifecycle: a display front end polls [`TelemetrySampler`]
//! on its own cadence. Absence of a thermal sensor is a normal condition
//! (laptops behind EC firmware, most VMs) and is reported as `None`, never
//! as an error.

use std::sync::{Arc, Mutex};
use sysinfo::{Components, System};
use tracing::debug;

use crate::platform::traits::{CpuTelemetry, PlatformResult};

/// One telemetry reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct TelemetrySample {
    /// CPU utilization, clamped to [0, 100]
    pub cpu_usage_percent: f32,
    /// CPU package temperature, when a sensor is accessible
    pub cpu_temperature_celsius: Option<f64>,
}

/// Stateless query object over a [`CpuTelemetry`] source.
pub struct TelemetrySampler {
    source: Arc<dyn CpuTelemetry>,
}

impl TelemetrySampler {
    pub fn new(source: Arc<dyn CpuTelemetry>) -> Self {
        Self { source }
    }

    /// Current CPU utilization in [0, 100]. A failed read reports 0.0 —
    /// telemetry is display-only and transient failures resolve on the
    /// next poll.
    pub fn cpu_usage(&self) -> f32 {
        match self.source.cpu_usage() {
            Ok(usage) => usage.clamp(0.0, 100.0),
            Err(e) => {
                debug!("CPU usage read failed: {}", e);
                0.0
            }
        }
    }

    /// Current CPU temperature, if a sensor is accessible.
    pub fn cpu_temperature(&self) -> Option<f64> {
        self.source.cpu_temperature()
    }

    /// Take a full sample.
    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample {
            cpu_usage_percent: self.cpu_usage(),
            cpu_temperature_celsius: self.cpu_temperature(),
        }
    }
}

/// `sysinfo`-backed telemetry source used on all platforms.
pub struct SysinfoTelemetry {
    system: Mutex<System>,
}

impl SysinfoTelemetry {
    pub fn new() -> Self {
        let mut system = System::new();
        // Prime the counters; utilization is a delta between refreshes.
        system.refresh_cpu_usage();
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuTelemetry for SysinfoTelemetry {
    fn cpu_usage(&self) -> PlatformResult<f32> {
        let mut system = self.system.lock().unwrap_or_else(|e| e.into_inner());
        system.refresh_cpu_usage();
        Ok(system.global_cpu_info().cpu_usage())
    }

    fn cpu_temperature(&self) -> Option<f64> {
        let components = Components::new_with_refreshed_list();
        components
            .iter()
            .find(|c| {
                let label = c.label().to_ascii_lowercase();
                ["cpu", "coretemp", "k10temp", "tctl", "package"]
                    .iter()
                    .any(|probe| label.contains(probe))
            })
            .map(|c| c.temperature() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockTelemetry;

    #[test]
    fn test_usage_is_clamped() {
        let sampler = TelemetrySampler::new(Arc::new(MockTelemetry::with_usage(134.5)));
        assert_eq!(sampler.cpu_usage(), 100.0);

        let sampler = TelemetrySampler::new(Arc::new(MockTelemetry::with_usage(-3.0)));
        assert_eq!(sampler.cpu_usage(), 0.0);

        let sampler = TelemetrySampler::new(Arc::new(MockTelemetry::with_usage(42.5)));
        assert_eq!(sampler.cpu_usage(), 42.5);
    }

    #[test]
    fn test_missing_sensor_is_not_an_error() {
        let sampler = TelemetrySampler::new(Arc::new(MockTelemetry::with_usage(10.0)));
        assert_eq!(sampler.cpu_temperature(), None);

        let sample = sampler.sample();
        assert!(sample.cpu_temperature_celsius.is_none());
        assert!((0.0..=100.0).contains(&sample.cpu_usage_percent));
    }

    #[test]
    fn test_failed_read_reports_zero() {
        let source = MockTelemetry::with_usage(55.0);
        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let sampler = TelemetrySampler::new(Arc::new(source));
        assert_eq!(sampler.cpu_usage(), 0.0);
    }

    #[test]
    fn test_sample_with_sensor() {
        let sampler = TelemetrySampler::new(Arc::new(MockTelemetry::with_temperature(61.0, 48.5)));
        let sample = sampler.sample();
        assert_eq!(sample.cpu_usage_percent, 61.0);
        assert_eq!(sample.cpu_temperature_celsius, Some(48.5));
    }

    #[test]
    fn test_sysinfo_usage_in_range() {
        let sampler = TelemetrySampler::new(Arc::new(SysinfoTelemetry::new()));
        let usage = sampler.cpu_usage();
        assert!((0.0..=100.0).contains(&usage));
    }
}
