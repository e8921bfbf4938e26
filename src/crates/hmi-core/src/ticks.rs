/// Compute `value * numerator / denominator`, rounding half away from zero.
///
/// Every tick conversion in the crate goes through this function so that
/// tempo normalization and resolution changes round the same way in both
/// conversion directions. Intermediate math is done in 128 bits.
pub fn scale_rounded(value: u128, numerator: u128, denominator: u128) -> u64 {
    assert!(denominator != 0, "denominator cannot be zero");
    let product = value * numerator;
    let quotient = product / denominator;
    // unsigned, so away from zero means up at the midpoint
    let rounded = if (product % denominator) * 2 >= denominator {
        quotient + 1
    } else {
        quotient
    };
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Move a tick from one PPQN to another
pub fn rescale_tick(tick: u64, from_ppqn: u16, to_ppqn: u16) -> u64 {
    if from_ppqn == to_ppqn {
        return tick;
    }
    scale_rounded(tick as u128, to_ppqn as u128, from_ppqn as u128)
}

/// Convert microseconds per quarter note to beats per minute
pub fn tempo_to_bpm(micros_per_quarter: u32) -> f64 {
    60_000_000.0 / micros_per_quarter as f64
}
