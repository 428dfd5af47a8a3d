// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Mip chain layout.

A texture's source data arrives as one byte stream holding every mip level back to back,
largest first, tightly packed in blocks (4×4 for BCn, 1×1 pixels otherwise).
[`compute_layout`] walks that stream and decides which levels are uploaded.

On GPUs with little video memory the largest levels are skipped with a [`MipClamp`]: the
texture is allocated at the size of the first level that fits, and the stream offsets of
the skipped levels are still consumed so the retained levels read the right bytes.

```
use textures_and_uniforms::mip_chain::{compute_layout, MipClamp};
use textures_and_uniforms::pixel_formats::BlockInfo;

let bc1 = BlockInfo { bytes: 8, dimension: 4 };
let layout = compute_layout(1024, 1024, bc1, MipClamp::MaxDimension(512), 11);
assert_eq!(layout.requested_mips(), 11);
assert_eq!(layout.effective_mips(), 10);
assert_eq!(layout.skipped_leading_mips(), 1);
assert_eq!((layout.largest_width(), layout.largest_height()), (512, 512));
```
*/

use crate::bittricks::{blocks_at_least_one, full_mip_count, half_dimension};
use crate::pixel_formats::{BlockInfo, ChannelKind};

/// Largest mip dimension a texture may be uploaded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MipClamp {
    #[default]
    Disabled,
    /// Levels whose width or height exceeds this are skipped.
    MaxDimension(u32),
}

impl From<u32> for MipClamp {
    /// `0` means no clamp.
    fn from(value: u32) -> Self {
        if value == 0 {
            MipClamp::Disabled
        } else {
            MipClamp::MaxDimension(value)
        }
    }
}

impl MipClamp {
    const MIB: u64 = 1024 * 1024;

    /// Picks a clamp from the adapter's dedicated video memory.
    ///
    /// ```
    /// use textures_and_uniforms::mip_chain::MipClamp;
    /// assert_eq!(MipClamp::for_video_memory(256 * 1024 * 1024), MipClamp::MaxDimension(512));
    /// assert_eq!(MipClamp::for_video_memory(768 * 1024 * 1024), MipClamp::MaxDimension(1024));
    /// assert_eq!(MipClamp::for_video_memory(4 * 1024 * 1024 * 1024), MipClamp::Disabled);
    /// ```
    pub const fn for_video_memory(bytes: u64) -> Self {
        if bytes < 512 * Self::MIB {
            MipClamp::MaxDimension(512)
        } else if bytes < 1024 * Self::MIB {
            MipClamp::MaxDimension(1024)
        } else {
            MipClamp::Disabled
        }
    }

    const fn admits(self, width: u32, height: u32) -> bool {
        match self {
            MipClamp::Disabled => true,
            MipClamp::MaxDimension(c) => width <= c && height <= c,
        }
    }
}

/// One retained level of a [`SubresourceLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipLevel {
    /// Index of this level in the source stream.
    pub source_level: u32,
    /// Offset of this level's first byte in the source stream.
    pub byte_offset: u64,
    /// Bytes per row of blocks.
    pub row_pitch: u32,
    pub slice_pitch: u64,
    pub width: u32,
    pub height: u32,
    /// Rows of blocks (rows of pixels for uncompressed formats).
    pub block_rows: u32,
}

/// Result of [`compute_layout`]: one entry per retained mip level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubresourceLayout {
    levels: Vec<MipLevel>,
    requested_mips: u32,
    largest_width: u32,
    largest_height: u32,
    source_bytes_consumed: u64,
}

impl SubresourceLayout {
    pub fn levels(&self) -> &[MipLevel] {
        &self.levels
    }

    /// Mip count the caller asked for.
    pub fn requested_mips(&self) -> u32 {
        self.requested_mips
    }

    /// Mip count actually uploaded; the GPU texture is allocated with this many levels.
    pub fn effective_mips(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Leading levels dropped by the clamp.
    ///
    /// Together with [`Self::requested_mips`] this tells "fewer mips because of memory"
    /// apart from "fewer mips because fewer were asked for".
    pub fn skipped_leading_mips(&self) -> u32 {
        self.requested_mips - self.effective_mips()
    }

    pub fn largest_width(&self) -> u32 {
        self.largest_width
    }

    pub fn largest_height(&self) -> u32 {
        self.largest_height
    }

    /// Bytes walked in the source stream, retained and skipped levels alike.
    pub fn source_bytes_consumed(&self) -> u64 {
        self.source_bytes_consumed
    }
}

/**
Computes the layout of a `requested`-level chain with base size `width`×`height`.

`requested == 0` means the full chain down to 1×1.

# Panics
- `block` has a zero byte size or zero dimension (an unresolved format).
- `requested` is longer than the full chain for this base size.
*/
pub fn compute_layout(
    width: u32,
    height: u32,
    block: BlockInfo,
    clamp: MipClamp,
    requested: u32,
) -> SubresourceLayout {
    assert!(block.bytes > 0, "block size of 0 bytes: format was not resolved");
    assert!(block.dimension > 0, "block dimension of 0: format was not resolved");
    assert!(width > 0 && height > 0, "texture of size {width}x{height}");
    let full = full_mip_count(width, height);
    let requested = if requested == 0 { full } else { requested };
    assert!(
        requested <= full,
        "{requested} mips requested for a {width}x{height} base, the chain has {full}"
    );

    let mut levels = Vec::with_capacity(requested as usize);
    let mut offset = 0_u64;
    let (mut w, mut h) = (width, height);
    let mut last = None;
    for level in 0..requested {
        let blocks_wide = blocks_at_least_one(w, block.dimension);
        let block_rows = blocks_at_least_one(h, block.dimension);
        let row_pitch = blocks_wide * block.bytes;
        let slice_pitch = row_pitch as u64 * block_rows as u64;
        let record = MipLevel {
            source_level: level,
            byte_offset: offset,
            row_pitch,
            slice_pitch,
            width: w,
            height: h,
            block_rows,
        };
        if requested == 1 || clamp.admits(w, h) {
            levels.push(record);
        }
        last = Some(record);
        offset += slice_pitch;
        w = half_dimension(w);
        h = half_dimension(h);
    }

    if let (true, Some(smallest)) = (levels.is_empty(), last) {
        //every level exceeds the clamp; upload the smallest rather than nothing
        logwise::warn_sync!(
            "mip clamp {clamp} admits no level of a {w}x{h} chain; keeping the smallest",
            clamp = logwise::privacy::LogIt(&clamp),
            w = width,
            h = height
        );
        levels.push(smallest);
    } else if levels.len() as u32 != requested {
        let dropped = requested - levels.len() as u32;
        logwise::warn_sync!("mip clamp dropped {n} leading levels", n = dropped);
    }

    let first = levels[0];
    SubresourceLayout {
        largest_width: first.width,
        largest_height: first.height,
        levels,
        requested_mips: requested,
        source_bytes_consumed: offset,
    }
}

/// Length in bytes of a tightly packed `mips`-level source stream.
pub fn source_size(width: u32, height: u32, block: BlockInfo, mips: u32) -> u64 {
    let (mut w, mut h) = (width, height);
    let mut total = 0;
    for _ in 0..mips {
        total += blocks_at_least_one(w, block.dimension) as u64
            * blocks_at_least_one(h, block.dimension) as u64
            * block.bytes as u64;
        w = half_dimension(w);
        h = half_dimension(h);
    }
    total
}

/**
Box-filters `base` (one tightly packed uncompressed level) into a `levels`-deep chain.

Returns every level back to back, level 0 first.  Odd edges reuse the last row or column.
*/
pub fn generate_mips(
    base: &[u8],
    width: u32,
    height: u32,
    channels: (ChannelKind, u32),
    levels: u32,
) -> Vec<u8> {
    let (kind, count) = channels;
    let channel_bytes = match kind {
        ChannelKind::Unorm8 => 1,
        ChannelKind::Float16 => 2,
        ChannelKind::Float32 => 4,
    };
    let pixel_bytes = channel_bytes * count as usize;
    assert_eq!(
        base.len(),
        width as usize * height as usize * pixel_bytes,
        "base level does not match {width}x{height}"
    );
    let interval = logwise::perfwarn_begin!("generate_mips");

    let read = |bytes: &[u8]| -> f32 {
        match kind {
            ChannelKind::Unorm8 => bytes[0] as f32,
            ChannelKind::Float16 => half::f16::from_le_bytes([bytes[0], bytes[1]]).to_f32(),
            ChannelKind::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    };
    let write = |value: f32, out: &mut Vec<u8>| match kind {
        ChannelKind::Unorm8 => out.push(value as u8),
        ChannelKind::Float16 => out.extend_from_slice(&half::f16::from_f32(value).to_le_bytes()),
        ChannelKind::Float32 => out.extend_from_slice(&value.to_le_bytes()),
    };

    let mut out = base.to_vec();
    let mut previous_start = 0;
    let (mut w, mut h) = (width, height);
    for _ in 1..levels {
        let nw = half_dimension(w);
        let nh = half_dimension(h);
        let mut next = Vec::with_capacity(nw as usize * nh as usize * pixel_bytes);
        for y in 0..nh {
            for x in 0..nw {
                for c in 0..count as usize {
                    let mut sum = 0.0;
                    for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                        let px = (x * 2 + sx).min(w - 1);
                        let py = (y * 2 + sy).min(h - 1);
                        let at = previous_start
                            + (py as usize * w as usize + px as usize) * pixel_bytes
                            + c * channel_bytes;
                        sum += read(&out[at..at + channel_bytes]);
                    }
                    let avg = match kind {
                        //integer average, truncating
                        ChannelKind::Unorm8 => (sum / 4.0).floor(),
                        _ => sum / 4.0,
                    };
                    write(avg, &mut next);
                }
            }
        }
        previous_start = out.len();
        out.extend(next);
        w = nw;
        h = nh;
    }
    drop(interval);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BC1: BlockInfo = BlockInfo {
        bytes: 8,
        dimension: 4,
    };
    const RGBA8: BlockInfo = BlockInfo {
        bytes: 4,
        dimension: 1,
    };

    #[test]
    fn bc1_single_level() {
        let layout = compute_layout(256, 256, BC1, MipClamp::Disabled, 1);
        assert_eq!(layout.effective_mips(), 1);
        let level = layout.levels()[0];
        assert_eq!(level.row_pitch, 64 * 8);
        assert_eq!(level.slice_pitch, 32768);
    }

    #[test]
    fn dimensions_halve_and_blocks_stay_positive() {
        for (w, h) in [(1, 1), (3, 5), (17, 4), (640, 480), (1024, 1), (2048, 2048)] {
            for block in [BC1, RGBA8] {
                let layout = compute_layout(w, h, block, MipClamp::Disabled, 0);
                let mut expect = (w, h);
                for level in layout.levels() {
                    assert_eq!((level.width, level.height), expect);
                    assert!(level.block_rows >= 1);
                    assert!(level.row_pitch >= block.bytes);
                    expect = ((expect.0 / 2).max(1), (expect.1 / 2).max(1));
                }
                let last = layout.levels().last().unwrap();
                assert_eq!((last.width, last.height), (1, 1));
            }
        }
    }

    #[test]
    fn skipped_levels_still_consume_the_stream() {
        for clamp in [MipClamp::Disabled, MipClamp::MaxDimension(512), MipClamp::MaxDimension(64)] {
            let layout = compute_layout(1024, 512, BC1, clamp, 11);
            assert_eq!(layout.source_bytes_consumed(), source_size(1024, 512, BC1, 11));
            //retained offsets match an unclamped walk
            let full = compute_layout(1024, 512, BC1, MipClamp::Disabled, 11);
            for level in layout.levels() {
                assert_eq!(*level, full.levels()[level.source_level as usize]);
            }
        }
    }

    #[test]
    fn clamp_at_or_above_base_keeps_everything() {
        for clamp in [1024, 1025, 4096] {
            let layout = compute_layout(1024, 1024, BC1, MipClamp::MaxDimension(clamp), 11);
            assert_eq!(layout.effective_mips(), 11);
            assert_eq!(layout.skipped_leading_mips(), 0);
        }
    }

    #[test]
    fn clamp_drops_leading_levels() {
        let layout = compute_layout(1024, 1024, BC1, MipClamp::MaxDimension(512), 11);
        assert_eq!(layout.effective_mips(), 10);
        assert_eq!((layout.largest_width(), layout.largest_height()), (512, 512));
        assert_eq!(layout.levels()[0].source_level, 1);
        assert_eq!(layout.levels()[0].byte_offset, 256 * 256 * 8);

        //either dimension over the clamp drops the level
        let wide = compute_layout(2048, 256, BC1, MipClamp::MaxDimension(512), 12);
        assert_eq!(wide.skipped_leading_mips(), 2);
        assert_eq!((wide.largest_width(), wide.largest_height()), (512, 64));
    }

    #[test]
    fn single_level_ignores_clamp() {
        let layout = compute_layout(1024, 1024, BC1, MipClamp::MaxDimension(256), 1);
        assert_eq!(layout.effective_mips(), 1);
        assert_eq!(layout.largest_width(), 1024);
    }

    #[test]
    fn clamp_below_every_level_keeps_the_smallest() {
        let layout = compute_layout(64, 64, RGBA8, MipClamp::MaxDimension(4), 3);
        assert_eq!(layout.effective_mips(), 1);
        assert_eq!(layout.largest_width(), 16);
    }

    #[test]
    fn zero_clamp_is_disabled() {
        assert_eq!(MipClamp::from(0), MipClamp::Disabled);
        assert_eq!(MipClamp::from(512), MipClamp::MaxDimension(512));
    }

    #[test]
    #[should_panic(expected = "not resolved")]
    fn zero_block_size_is_fatal() {
        compute_layout(16, 16, BlockInfo { bytes: 0, dimension: 4 }, MipClamp::Disabled, 1);
    }

    #[test]
    fn box_filter() {
        let base = [0u8, 0, 0, 255, 100, 100, 100, 255, 200, 200, 200, 255, 100, 100, 100, 255];
        let chain = generate_mips(&base, 2, 2, (ChannelKind::Unorm8, 4), 2);
        assert_eq!(&chain[16..], &[100, 100, 100, 255]);

        let floats: Vec<u8> = [1.0f32, 2.0, 3.0, 6.0].iter().flat_map(|f| f.to_le_bytes()).collect();
        let chain = generate_mips(&floats, 2, 2, (ChannelKind::Float32, 1), 2);
        assert_eq!(f32::from_le_bytes(chain[16..20].try_into().unwrap()), 3.0);
    }
}
