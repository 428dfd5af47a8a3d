// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::bindings::buffer::{BufferKind, StorageKind};
use crate::bittricks::align_up;
use crate::imp::{BufferDescriptor, MapDiscipline};
use std::borrow::Cow;

#[derive(Debug)]
pub struct Buffer {
    pub(super) buffer: wgpu::Buffer,
    pub(super) kind: BufferKind,
}

impl Buffer {
    pub fn wgpu(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }
}

fn usage(kind: BufferKind, storage: StorageKind) -> wgpu::BufferUsages {
    let bind = match kind {
        BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
        BufferKind::Index => wgpu::BufferUsages::INDEX,
        BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
        BufferKind::Compute { .. } => wgpu::BufferUsages::STORAGE,
    };
    match storage {
        StorageKind::Immutable => bind,
        StorageKind::Dynamic => bind | wgpu::BufferUsages::COPY_DST,
    }
}

/// wgpu copies in 4-byte units.
fn copy_aligned(data: &[u8]) -> Cow<'_, [u8]> {
    let aligned = align_up(data.len() as u64, wgpu::COPY_BUFFER_ALIGNMENT) as usize;
    if aligned == data.len() {
        Cow::Borrowed(data)
    } else {
        let mut padded = data.to_vec();
        padded.resize(aligned, 0);
        Cow::Owned(padded)
    }
}

pub(super) fn create(
    device: &wgpu::Device,
    desc: &BufferDescriptor<'_>,
    contents: Option<&[u8]>,
) -> Buffer {
    let size = align_up(desc.size, wgpu::COPY_BUFFER_ALIGNMENT).max(wgpu::COPY_BUFFER_ALIGNMENT);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(desc.label),
        size,
        usage: usage(desc.kind, desc.storage),
        mapped_at_creation: contents.is_some(),
    });
    if let Some(data) = contents {
        buffer.slice(..).get_mapped_range_mut()[..data.len()].copy_from_slice(data);
        buffer.unmap();
    }
    Buffer {
        buffer,
        kind: desc.kind,
    }
}

/**
Writes through the queue.

wgpu stages queue writes and orders them before later submissions, so both disciplines
end up the same call; `NoOverwrite` only differs in that the caller promised not to
race the GPU.
*/
pub(super) fn write(queue: &wgpu::Queue, buffer: &Buffer, data: &[u8], discipline: MapDiscipline) {
    logwise::trace_sync!(
        "queue write of {len} bytes ({discipline})",
        len = data.len(),
        discipline = logwise::privacy::LogIt(&discipline)
    );
    queue.write_buffer(&buffer.buffer, 0, &copy_aligned(data));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_buffers_are_copy_targets() {
        assert_eq!(
            usage(BufferKind::Uniform, StorageKind::Dynamic),
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST
        );
        assert_eq!(
            usage(BufferKind::compute(16), StorageKind::Immutable),
            wgpu::BufferUsages::STORAGE
        );
    }

    #[test]
    fn writes_are_padded_to_four() {
        assert_eq!(copy_aligned(&[1, 2, 3, 4, 5]).len(), 8);
        assert!(matches!(copy_aligned(&[0; 8]), Cow::Borrowed(_)));
    }
}
