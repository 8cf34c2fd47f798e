//! Linux implementations of the platform capability traits.

mod memory;
mod process;
mod service;

pub use memory::LinuxMemoryProbe;
pub use process::LinuxProcessTable;
pub use service::SystemdServiceControl;
