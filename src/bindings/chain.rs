// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
The boundary with whoever owns a multi-buffered texture.

A chain-backed texture is one logical texture backed by N images that rotate, typically
because a compositor reads slot `i` while the application writes slot `i + 1`.  The
owner (a compositor session, a presentation driver) allocates the images, knows which
slot is current, and decides when to advance.  [`TextureManager`](super::texture::TextureManager)
only asks for the current slot when it binds, and reports when the current slot has been
fully written.

```text
Writable(i) --commit--> Committed(i) --owner advances--> Writable(i + 1)
```
*/

use crate::Error;
use crate::imp::{Device, TextureDescriptor};

pub trait TextureChain<D: Device> {
    /// Allocates the backing images.  Called once, at texture creation.
    ///
    /// Every returned image must match `desc`.
    fn create_images(
        &mut self,
        device: &mut D,
        desc: &TextureDescriptor<'_>,
    ) -> Result<Vec<D::Texture>, Error>;

    /// Index of the image the application should write this frame.
    fn current_slot(&self) -> usize;

    /// The current slot has been fully written for this frame.
    ///
    /// May block until the owner accepts the frame.
    fn commit(&mut self) -> Result<(), Error>;

    /// Whether the session the images belong to is still alive.
    ///
    /// The images must be released before the session is torn down.
    fn session_alive(&self) -> bool {
        true
    }
}

/// Where a chain-backed texture is in its frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainState {
    Writable { slot: usize },
    Committed { slot: usize },
}

impl ChainState {
    pub fn slot(self) -> usize {
        match self {
            ChainState::Writable { slot } | ChainState::Committed { slot } => slot,
        }
    }
}
