/*!
alignment arithmetic.

todo: should this be a crate?
*/

/// Rounds `value` up to the next multiple of `alignment`, which must be a power of two.
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// `ceil(value / divisor)`, but never less than 1.
pub const fn blocks_at_least_one(value: u32, divisor: u32) -> u32 {
    let blocks = value.div_ceil(divisor);
    if blocks == 0 { 1 } else { blocks }
}

/// Next mip dimension: halved, floored, clamped at 1.
pub const fn half_dimension(value: u32) -> u32 {
    if value > 1 { value / 2 } else { 1 }
}

/// Number of levels in a full mip chain for the given base size.
pub const fn full_mip_count(width: u32, height: u32) -> u32 {
    let largest = if width > height { width } else { height };
    if largest == 0 {
        1
    } else {
        32 - largest.leading_zeros()
    }
}

#[test] fn alignment() {
    assert_eq!(align_up(20, 16), 32);
    assert_eq!(align_up(32, 16), 32);
    assert_eq!(align_up(0, 16), 0);
    assert_eq!(blocks_at_least_one(1, 4), 1);
    assert_eq!(blocks_at_least_one(0, 4), 1);
    assert_eq!(blocks_at_least_one(5, 4), 2);
    assert_eq!(half_dimension(1), 1);
    assert_eq!(half_dimension(7), 3);
    assert_eq!(full_mip_count(1024, 1024), 11);
    assert_eq!(full_mip_count(1, 1), 1);
    assert_eq!(full_mip_count(640, 480), 10);
}
