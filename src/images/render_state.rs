// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Cull, blend and depth state, applied to the device only when it changes.

use crate::imp::Device;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    None,
    Front,
    #[default]
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    #[default]
    Opaque,
    /// `src * a + dst * (1 - a)`
    Alpha,
    /// `src + dst * (1 - a)`
    Premultiplied,
    Additive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    Never,
    #[default]
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthMode {
    pub test: bool,
    pub write: bool,
    pub compare: CompareFunction,
}

impl Default for DepthMode {
    fn default() -> Self {
        DepthMode {
            test: true,
            write: true,
            compare: CompareFunction::Less,
        }
    }
}

impl DepthMode {
    pub const DISABLED: DepthMode = DepthMode {
        test: false,
        write: false,
        compare: CompareFunction::Always,
    };
}

/// The full fixed-function state the cache tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RasterState {
    pub cull: CullMode,
    pub blend: BlendMode,
    pub depth: DepthMode,
}

/**
Remembers the last state pushed to the device.

The first set after construction (or after [`RenderStateCache::invalidate`]) always
reaches the device, since nothing is known about what the device currently holds.
*/
#[derive(Debug, Default)]
pub struct RenderStateCache {
    state: RasterState,
    applied: bool,
}

impl RenderStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> RasterState {
        self.state
    }

    /// Forgets what the device holds, e.g. after the device was recreated.
    pub fn invalidate(&mut self) {
        self.applied = false;
    }

    pub fn set_cull_mode<D: Device>(&mut self, device: &mut D, cull: CullMode) {
        self.apply(device, RasterState { cull, ..self.state });
    }

    pub fn set_blend_mode<D: Device>(&mut self, device: &mut D, blend: BlendMode) {
        self.apply(device, RasterState { blend, ..self.state });
    }

    pub fn set_depth_mode<D: Device>(&mut self, device: &mut D, depth: DepthMode) {
        self.apply(device, RasterState { depth, ..self.state });
    }

    /// Returns whether the device was touched.
    pub fn apply<D: Device>(&mut self, device: &mut D, state: RasterState) -> bool {
        if self.applied && self.state == state {
            logwise::trace_sync!("raster state unchanged");
            return false;
        }
        device.apply_raster_state(&state);
        self.state = state;
        self.applied = true;
        true
    }
}
