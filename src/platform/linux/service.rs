//! Service control through systemctl.

use std::process::Command;

use tracing::debug;

use crate::platform::traits::{PlatformError, PlatformResult, ServiceControl};

pub struct SystemdServiceControl;

impl SystemdServiceControl {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SystemdServiceControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceControl for SystemdServiceControl {
    fn set_disabled(&self, name: &str) -> PlatformResult<()> {
        // Idempotence: an already-disabled or masked unit is success.
        let state = Command::new("systemctl")
            .args(["is-enabled", name])
            .output()
            .map_err(|e| PlatformError::Io(format!("systemctl: {}", e)))?;
        let stdout = String::from_utf8_lossy(&state.stdout);
        let stderr = String::from_utf8_lossy(&state.stderr);

        if unit_missing(&stderr) {
            return Err(PlatformError::NotFound(format!("service {}", name)));
        }
        let current = stdout.trim();
        if current == "disabled" || current == "masked" {
            debug!("service {} already {}", name, current);
            return Ok(());
        }

        let output = Command::new("systemctl")
            .args(["disable", "--now", name])
            .output()
            .map_err(|e| PlatformError::Io(format!("systemctl: {}", e)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if unit_missing(&stderr) {
            Err(PlatformError::NotFound(format!("service {}", name)))
        } else if stderr.contains("Access denied")
            || stderr.contains("Permission denied")
            || stderr.contains("Interactive authentication required")
        {
            Err(PlatformError::PermissionDenied(stderr.trim().to_string()))
        } else {
            Err(PlatformError::System {
                code: output.status.code().unwrap_or(-1),
                message: stderr.trim().to_string(),
            })
        }
    }
}

fn unit_missing(stderr: &str) -> bool {
    stderr.contains("No such file or directory")
        || stderr.contains("not found")
        || stderr.contains("does not exist")
}
