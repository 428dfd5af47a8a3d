// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! wgpu failures as [`GpuResourceError`]s.

use crate::Error;
use crate::error::{GpuFault, GpuResourceError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub(super) fn from_wgpu(error: &wgpu::Error, what: &str) -> Error {
    let (fault, code) = match error {
        wgpu::Error::OutOfMemory { .. } => {
            (GpuFault::OutOfMemory, GpuResourceError::WGPU_OUT_OF_MEMORY)
        }
        wgpu::Error::Validation { .. } => (GpuFault::Internal, GpuResourceError::WGPU_VALIDATION),
        _ => (GpuFault::Internal, GpuResourceError::WGPU_INTERNAL),
    };
    let detail = format!("{what}: {error}");
    logwise::error_sync!("wgpu error {detail}", detail = logwise::privacy::LogIt(&detail));
    GpuResourceError::new(fault, code, detail).into()
}

pub(super) fn device_lost(what: &str) -> Error {
    logwise::error_sync!("wgpu device lost during {what}", what = logwise::privacy::LogIt(&what));
    GpuResourceError::new(
        GpuFault::DeviceRemoved,
        GpuResourceError::WGPU_DEVICE_LOST,
        format!("{what}: device lost"),
    )
    .into()
}

pub(super) fn internal(what: &str, detail: impl std::fmt::Display) -> Error {
    let detail = format!("{what}: {detail}");
    logwise::error_sync!("wgpu failure {detail}", detail = logwise::privacy::LogIt(&detail));
    GpuResourceError::new(GpuFault::Internal, GpuResourceError::WGPU_INTERNAL, detail).into()
}

/// Set from the device-lost callback.
#[derive(Debug, Clone, Default)]
pub(super) struct LostFlag(Arc<AtomicBool>);

impl LostFlag {
    pub(super) fn install(&self, device: &wgpu::Device) {
        let flag = self.0.clone();
        device.set_device_lost_callback(move |reason, message| {
            logwise::error_sync!(
                "wgpu device lost ({reason}): {message}",
                reason = logwise::privacy::LogIt(&reason),
                message = logwise::privacy::LogIt(&message)
            );
            flag.store(true, Ordering::Release);
        });
    }

    pub(super) fn is_lost(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/**
Runs `f` inside out-of-memory and validation error scopes.

Fails without calling `f` once the device is lost.
*/
pub(super) fn scoped<T>(
    device: &wgpu::Device,
    lost: &LostFlag,
    what: &str,
    f: impl FnOnce() -> T,
) -> Result<T, Error> {
    if lost.is_lost() {
        return Err(device_lost(what));
    }
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = test_executors::spin_on(device.pop_error_scope());
    let oom = test_executors::spin_on(device.pop_error_scope());
    if lost.is_lost() {
        return Err(device_lost(what));
    }
    //out of memory takes precedence, it usually causes the validation failure
    match oom.or(validation) {
        Some(error) => Err(from_wgpu(&error, what)),
        None => Ok(value),
    }
}
