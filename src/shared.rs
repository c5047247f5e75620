//! Algorithm constants and the integer primitives the rest of the crate
//! builds on.

/// Size in bytes of the cached slice of the DAG (the "cDAG").
pub const PROGPOW_CACHE_BYTES: usize = 16 * 1024;
/// The cached slice as 32-bit words.
pub const PROGPOW_CACHE_WORDS: usize = PROGPOW_CACHE_BYTES / 4;
/// Parallel lanes that coordinate to calculate a single hash instance.
pub const PROGPOW_LANES: usize = 16;
/// The register file usage size per lane.
pub const PROGPOW_REGS: usize = 32;
/// Number of u32 loads from the DAG per lane per loop iteration.
pub const PROGPOW_DAG_LOADS: usize = 4;
/// Cached memory accesses per loop iteration.
pub const PROGPOW_CNT_CACHE: usize = 12;
/// Random math operations per loop iteration.
pub const PROGPOW_CNT_MATH: usize = 20;
/// Blocks sharing one generated program.
pub const PROGPOW_PERIOD_LENGTH: u64 = 50;
/// DAG accesses per hash.
pub const PROGPOW_CNT_DAG: usize = 64;
/// Bytes of DAG bandwidth consumed per loop iteration.
pub const PROGPOW_MIX_BYTES: usize = 256;

/// Bytes per DAG item (one Keccak-512 output).
pub const NODE_BYTES: usize = 64;
/// 32-bit words per DAG item.
pub const NODE_WORDS: usize = NODE_BYTES / 4;

pub const FNV_HASH: u32 = 0x811c9dc5;
pub const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit left rotation. The amount is taken mod 32, so the degenerate
/// zero-rotation case is well defined.
#[inline]
pub fn rotl32(x: u32, n: u32) -> u32 {
	x.rotate_left(n)
}

/// 32-bit right rotation, amount mod 32.
#[inline]
pub fn rotr32(x: u32, n: u32) -> u32 {
	x.rotate_right(n)
}

#[inline]
pub fn lower32(x: u64) -> u32 {
	x as u32
}

#[inline]
pub fn higher32(x: u64) -> u32 {
	(x >> 32) as u32
}

/// One FNV-1a step over a 32-bit word; updates `h` in place and returns
/// the new value.
#[inline]
pub fn fnv1a(h: &mut u32, d: u32) -> u32 {
	*h = (*h ^ d).wrapping_mul(FNV_PRIME);
	*h
}
