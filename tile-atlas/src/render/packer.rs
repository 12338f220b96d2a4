//! Rectangle packing collaborator.
//!
//! The atlas only depends on the contract: an ordered list of box sizes goes
//! in, non-overlapping origins plus the overall bounds come out, and the
//! result is a pure function of the input order. The allocation strategy
//! behind it belongs to [`guillotiere`].

use guillotiere::{size2, AtlasAllocator};

use crate::error::AtlasError;

/// Largest supported atlas side. Placements are stored as `u16`
/// coordinates, so anything beyond this cannot be addressed.
const MAX_SIDE: u32 = 32_768;

const INITIAL_SIDE: u32 = 64;

#[derive(Debug)]
pub struct PackedLayout {
    /// One origin per input box, in input order.
    pub placements: Vec<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

/// Packs `bins` into a shared area and returns their origins together with
/// the tight bounds around all of them.
pub fn pack(bins: &[(u32, u32)]) -> Result<PackedLayout, AtlasError> {
    if bins.is_empty() {
        return Ok(PackedLayout {
            placements: Vec::new(),
            width: 0,
            height: 0,
        });
    }
    if bins.iter().any(|(w, h)| *w > MAX_SIDE || *h > MAX_SIDE) {
        return Err(AtlasError::AtlasOverflow {
            width: MAX_SIDE,
            height: MAX_SIDE,
        });
    }

    let mut side = INITIAL_SIDE.max(starting_side(bins)).min(MAX_SIDE);
    loop {
        match try_pack(bins, side) {
            Some(layout) => return Ok(layout),
            None if side >= MAX_SIDE => {
                return Err(AtlasError::AtlasOverflow {
                    width: side,
                    height: side,
                });
            }
            None => side *= 2,
        }
    }
}

fn starting_side(bins: &[(u32, u32)]) -> u32 {
    let area: u64 = bins.iter().map(|(w, h)| *w as u64 * *h as u64).sum();
    let mut side = 1u32;
    while (side as u64 * side as u64) < area {
        side *= 2;
    }
    let largest = bins.iter().map(|(w, h)| (*w).max(*h)).max().unwrap_or(0);
    while side < largest {
        side *= 2;
    }
    side
}

fn try_pack(bins: &[(u32, u32)], side: u32) -> Option<PackedLayout> {
    let mut allocator = AtlasAllocator::new(size2(side as i32, side as i32));
    let mut placements = Vec::with_capacity(bins.len());
    let mut width = 0u32;
    let mut height = 0u32;

    for (w, h) in bins {
        let allocation = allocator.allocate(size2(*w as i32, *h as i32))?;
        let x = allocation.rectangle.min.x as u32;
        let y = allocation.rectangle.min.y as u32;
        placements.push((x, y));
        width = width.max(x + w);
        height = height.max(y + h);
    }

    Some(PackedLayout {
        placements,
        width,
        height,
    })
}
