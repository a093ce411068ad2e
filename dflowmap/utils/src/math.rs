/// Number of bits needed to represent the value `n`. Zero still occupies a
/// single bit.
pub fn bits_for_value(n: u64) -> u32 {
    std::cmp::max(u64::BITS - n.leading_zeros(), 1)
}

/// Does `value` fit in an unsigned channel of `width` bits?
pub fn fits_in_width(value: u64, width: u32) -> bool {
    bits_for_value(value) <= width
}
