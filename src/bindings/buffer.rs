// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Vertex, index, uniform and compute buffers.

A buffer is created empty with [`BufferManager::create_buffer`] and gets its backing
allocation on the first [`BufferManager::upload`].  Later uploads either rewrite the
allocation in place or replace it:

| Existing allocation                        | Upload                    | Result                  |
|--------------------------------------------|---------------------------|-------------------------|
| immutable, large enough                    | [`BufferUsage::READ_ONLY`] | nothing                 |
| dynamic, large enough                      | dynamic                   | in-place write          |
| none, too small, or other storage kind     | any                       | release and reallocate  |

Uniform and compute allocations are padded to 16 bytes.

```
use textures_and_uniforms::bindings::buffer::{BufferKind, BufferManager, BufferUsage};
use textures_and_uniforms::headless::HeadlessDevice;

let mut device = HeadlessDevice::new();
let mut buffers = BufferManager::new();
let uniforms = buffers.create_buffer(BufferKind::Uniform);
buffers.upload(&mut device, uniforms, BufferUsage::empty(), Some(&[0; 20]), 20).unwrap();
assert_eq!(buffers.info(uniforms).unwrap().allocated_size, Some(32));
```
*/

use crate::Error;
use crate::bittricks::align_up;
use crate::imp::{BufferDescriptor, Device, MapDiscipline};
use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Non-owning reference to a buffer in a [`BufferManager`].
    pub struct BufferHandle;
}

/// What the buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Uniform,
    /// A structured buffer of `element_stride`-byte elements.
    Compute { element_stride: u32 },
}

impl BufferKind {
    /// # Panics
    /// Panics on a zero stride.
    pub fn compute(element_stride: u32) -> Self {
        assert!(element_stride > 0, "compute buffers need an element stride");
        BufferKind::Compute { element_stride }
    }

    fn padded(self) -> bool {
        matches!(self, BufferKind::Uniform | BufferKind::Compute { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Written once at creation, never mapped again.
    Immutable,
    /// CPU-writable.
    Dynamic,
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        /// Contents are fixed; back the buffer with immutable storage.
        const READ_ONLY = 1 << 0;
        /// Update a dynamic buffer without discarding it.  The caller guarantees no
        /// in-flight GPU read overlaps the written bytes.
        const NO_OVERWRITE = 1 << 1;
    }
}

impl BufferUsage {
    fn storage(self) -> StorageKind {
        if self.contains(BufferUsage::READ_ONLY) {
            StorageKind::Immutable
        } else {
            StorageKind::Dynamic
        }
    }

    fn discipline(self) -> MapDiscipline {
        if self.contains(BufferUsage::NO_OVERWRITE) {
            MapDiscipline::NoOverwrite
        } else {
            MapDiscipline::Discard
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    pub kind: BufferKind,
    /// `None` until the first upload.
    pub storage: Option<StorageKind>,
    pub allocated_size: Option<u64>,
}

struct BufferEntry<D: Device> {
    kind: BufferKind,
    backing: Option<(StorageKind, u64, D::Buffer)>,
}

pub struct BufferManager<D: Device> {
    buffers: SlotMap<BufferHandle, BufferEntry<D>>,
}

impl<D: Device> Default for BufferManager<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Device> std::fmt::Debug for BufferManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferManager")
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

impl<D: Device> BufferManager<D> {
    pub fn new() -> Self {
        BufferManager {
            buffers: SlotMap::with_key(),
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Creates an empty, unallocated buffer.
    pub fn create_buffer(&mut self, kind: BufferKind) -> BufferHandle {
        if let BufferKind::Compute { element_stride } = kind {
            assert!(element_stride > 0, "compute buffers need an element stride");
        }
        self.buffers.insert(BufferEntry {
            kind,
            backing: None,
        })
    }

    /**
    Uploads `size` bytes to `handle`.

    `data` may be `None` (or shorter than `size`) for dynamic buffers that will be written
    later; the remainder is zeroed.

    # Panics
    - `data` is longer than `size`.
    - [`BufferUsage::READ_ONLY`] without data.
    - [`BufferUsage::READ_ONLY`] together with [`BufferUsage::NO_OVERWRITE`].
    */
    pub fn upload(
        &mut self,
        device: &mut D,
        handle: BufferHandle,
        usage: BufferUsage,
        data: Option<&[u8]>,
        size: u64,
    ) -> Result<(), Error> {
        let entry = self
            .buffers
            .get_mut(handle)
            .ok_or(Error::StaleHandle("buffer"))?;
        let storage = usage.storage();
        if let Some(data) = data {
            assert!(data.len() as u64 <= size, "{} bytes supplied for a {size}-byte upload", data.len());
        }
        if storage == StorageKind::Immutable {
            assert!(data.is_some(), "immutable buffers must be created with their contents");
            assert!(
                !usage.contains(BufferUsage::NO_OVERWRITE),
                "immutable storage can't be written without discarding"
            );
        }

        let padded = if entry.kind.padded() {
            align_up(size, 16)
        } else {
            size
        };

        if let Some((existing, allocated, buffer)) = &entry.backing
            && *existing == storage
            && *allocated >= padded
        {
            match storage {
                StorageKind::Immutable => {
                    logwise::trace_sync!("immutable buffer already holds its contents");
                    return Ok(());
                }
                StorageKind::Dynamic => {
                    if let Some(data) = data {
                        device.write_buffer(buffer, data, usage.discipline())?;
                    }
                    return Ok(());
                }
            }
        }

        //release before allocating the replacement
        let previous = entry.backing.take();
        drop(previous);
        let desc = BufferDescriptor {
            label: "buffer",
            size: padded,
            kind: entry.kind,
            storage,
        };
        let buffer = device.create_buffer(&desc, data)?;
        logwise::trace_sync!(
            "allocated {kind} buffer of {size} bytes",
            kind = logwise::privacy::LogIt(&entry.kind),
            size = desc.size
        );
        entry.backing = Some((storage, desc.size, buffer));
        Ok(())
    }

    pub fn info(&self, handle: BufferHandle) -> Result<BufferInfo, Error> {
        let entry = self.buffers.get(handle).ok_or(Error::StaleHandle("buffer"))?;
        Ok(BufferInfo {
            kind: entry.kind,
            storage: entry.backing.as_ref().map(|(s, _, _)| *s),
            allocated_size: entry.backing.as_ref().map(|(_, size, _)| *size),
        })
    }

    /// The backend buffer, or `None` before the first upload.
    pub fn native(&self, handle: BufferHandle) -> Result<Option<&D::Buffer>, Error> {
        let entry = self.buffers.get(handle).ok_or(Error::StaleHandle("buffer"))?;
        Ok(entry.backing.as_ref().map(|(_, _, buffer)| buffer))
    }

    pub fn destroy_buffer(&mut self, handle: BufferHandle) -> Result<(), Error> {
        self.buffers
            .remove(handle)
            .map(drop)
            .ok_or(Error::StaleHandle("buffer"))
    }

    pub fn release_all(&mut self) {
        let count = self.buffers.len();
        self.buffers.clear();
        logwise::info_sync!("released {count} buffers", count = count);
    }
}
