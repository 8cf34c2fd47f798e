//! One-shot OS service toggling.
//!
//! Disabling the prefetch service (SysMain on Windows, preload on Linux) is
//! best-effort: a missing service or insufficient privileges is logged and
//! swallowed so it can never abort governor startup.

use std::sync::Arc;

use crate::events::{EventBus, LogLevel};
use crate::platform::traits::{PlatformError, ServiceControl};

pub struct ServiceToggle {
    control: Arc<dyn ServiceControl>,
    bus: EventBus,
}

impl ServiceToggle {
    pub fn new(control: Arc<dyn ServiceControl>, bus: EventBus) -> Self {
        Self { control, bus }
    }

    /// Disable the named service. Idempotent, and infallible from the
    /// caller's point of view: every failure is reported on the event bus.
    pub fn disable_service(&self, name: &str) {
        match self.control.set_disabled(name) {
            Ok(()) => self
                .bus
                .emit(LogLevel::Success, format!("Service {} disabled", name)),
            Err(PlatformError::NotFound(_)) => self.bus.emit(
                LogLevel::Warning,
                format!("Service {} not present on this system", name),
            ),
            Err(e) => self.bus.emit(
                LogLevel::Error,
                format!("Failed to disable service {}: {}", name, e),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockServiceControl;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_disable_reports_success() {
        let control = Arc::new(MockServiceControl::default());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        ServiceToggle::new(control.clone(), bus).disable_service("SysMain");

        assert_eq!(control.disabled.lock().unwrap().as_slice(), ["SysMain"]);
        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, LogLevel::Success);
    }

    #[tokio::test]
    async fn test_disable_failure_is_contained() {
        let control = Arc::new(MockServiceControl::default());
        control.fail.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        // Must not panic or propagate.
        ServiceToggle::new(control, bus).disable_service("SysMain");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, LogLevel::Error);
        assert!(event.message.contains("SysMain"));
    }

    #[tokio::test]
    async fn test_missing_service_is_a_warning() {
        let control = Arc::new(MockServiceControl::default());
        control.missing.store(true, Ordering::SeqCst);
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        ServiceToggle::new(control, bus).disable_service("NoSuchSvc");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.level, LogLevel::Warning);
    }
}
