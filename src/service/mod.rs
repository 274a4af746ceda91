//! Inference service lifecycle: spawning and readiness.

pub mod probe;
pub mod supervisor;

pub use probe::{ReadinessProbe, WARMUP_DELAY};
pub use supervisor::{ServiceHandle, ServiceState, ServiceSupervisor};
