// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error types.
//!
//! Calling-contract violations (unknown formats, zero block sizes, writes past a uniform)
//! are not represented here; they panic.  What remains are conditions a correct program
//! can still run into at runtime.

/// The class of a device-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuFault {
    /// The allocation did not fit in device or host memory.
    OutOfMemory,
    /// The adapter was physically removed or the driver was upgraded.
    DeviceRemoved,
    /// The driver reset the device, typically after a hang.
    DeviceReset,
    /// No adapter could be found while creating the device.
    AdapterNotFound,
    /// Any other backend failure.
    Internal,
}

impl GpuFault {
    /// Whether the device itself is gone and must be recreated.
    pub const fn is_device_lost(self) -> bool {
        matches!(self, GpuFault::DeviceRemoved | GpuFault::DeviceReset)
    }
}

impl std::fmt::Display for GpuFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpuFault::OutOfMemory => write!(f, "out of memory"),
            GpuFault::DeviceRemoved => write!(f, "device removed"),
            GpuFault::DeviceReset => write!(f, "device reset"),
            GpuFault::AdapterNotFound => write!(f, "adapter not found"),
            GpuFault::Internal => write!(f, "internal error"),
        }
    }
}

/**
A device-level creation or update failure.

`code` is the backend's native status code.  The wgpu backend has no numeric status of its
own and reports the codes in [`GpuResourceError::WGPU_OUT_OF_MEMORY`] and friends.

The prescribed recovery is not to retry the same call: tear down every device-dependent
resource, recreate the device, then recreate the resources
(see [`crate::images::Engine::recreate_device`]).
*/
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GPU {fault} (status {code:#x}): {detail}")]
pub struct GpuResourceError {
    pub fault: GpuFault,
    pub code: i32,
    pub detail: String,
}

impl GpuResourceError {
    pub const WGPU_OUT_OF_MEMORY: i32 = 0x0e;
    pub const WGPU_VALIDATION: i32 = 0x57;
    pub const WGPU_INTERNAL: i32 = 0x1f;
    pub const WGPU_DEVICE_LOST: i32 = 0x05;

    pub fn new(fault: GpuFault, code: i32, detail: impl Into<String>) -> Self {
        Self {
            fault,
            code,
            detail: detail.into(),
        }
    }
}

/// Crate-wide error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Gpu(#[from] GpuResourceError),
    /// The operation is not available for this resource; nothing was done.
    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),
    /// A handle referred to a resource that has already been destroyed.
    #[error("stale {0} handle")]
    StaleHandle(&'static str),
    #[error("shader reflection failed: {0}")]
    ShaderReflection(String),
}

impl Error {
    /// True when the error means the device is gone and all resources must be recreated.
    pub fn is_device_lost(&self) -> bool {
        match self {
            Error::Gpu(e) => e.fault.is_device_lost(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_classification() {
        let removed: Error = GpuResourceError::new(GpuFault::DeviceRemoved, 5, "unplugged").into();
        assert!(removed.is_device_lost());
        let oom: Error = GpuResourceError::new(GpuFault::OutOfMemory, 14, "full").into();
        assert!(!oom.is_device_lost());
        assert!(!Error::Unsupported("depth resolve").is_device_lost());
    }

    #[test]
    fn display_carries_code() {
        let e = GpuResourceError::new(GpuFault::OutOfMemory, 0x0e, "texture");
        assert_eq!(e.to_string(), "GPU out of memory (status 0xe): texture");
    }
}
