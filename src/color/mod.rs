pub mod extractor;
pub mod hex;
pub mod palette;
pub mod selector;

/// Seed for the frame at `index`, so per-frame randomness does not depend on
/// the order frames are processed in.
pub fn frame_seed(base: u64, index: usize) -> u64 {
    base.wrapping_add((index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}
