//! Keccak-f[800]: the 800-bit permutation over a 25-word u32 state,
//! run for 22 rounds. Distinct from the f[1600] permutation behind
//! SHA-3; ProgPoW uses the narrow variant so the absorb and squeeze
//! work in the same 32-bit registers as the rest of the kernel.
//!
//! Two fixed framings are exposed: `keccak_f800_short` squeezes the
//! 64-bit seed that drives lane initialization, `keccak_f800_long`
//! squeezes the 256-bit final hash. Both absorb the header words into
//! `st[0..8]`, the nonce halves into `st[8..10]` and the result words
//! into `st[10..18]`, leaving the rest of the state zero.

use crate::shared::{higher32, lower32, rotl32};
use crate::types::H256;

const KECCAKF_RNDC: [u32; 24] = [
	0x00000001, 0x00008082, 0x0000808a, 0x80008000, 0x0000808b, 0x80000001,
	0x80008081, 0x00008009, 0x0000008a, 0x00000088, 0x80008009, 0x8000000a,
	0x8000808b, 0x0000008b, 0x00008089, 0x00008003, 0x00008002, 0x00000080,
	0x0000800a, 0x8000000a, 0x80008081, 0x00008080, 0x80000001, 0x80008008,
];

const KECCAKF_ROTC: [u32; 24] = [
	1, 3, 6, 10, 15, 21, 28, 36, 45, 55, 2, 14, 27, 41, 56, 8, 25, 43, 62,
	18, 39, 61, 20, 44,
];

const KECCAKF_PILN: [usize; 24] = [
	10, 7, 11, 17, 18, 3, 5, 16, 8, 21, 24, 4, 15, 23, 19, 13, 12, 2, 20,
	14, 22, 9, 6, 1,
];

fn keccak_f800_round(st: &mut [u32; 25], r: usize) {
	let mut bc = [0u32; 5];

	// Theta
	unroll! {
		for i in 0..5 {
			bc[i] = st[i] ^ st[i + 5] ^ st[i + 10] ^ st[i + 15] ^ st[i + 20];
		}
	}
	for i in 0..5 {
		let t = bc[(i + 4) % 5] ^ rotl32(bc[(i + 1) % 5], 1);
		let mut j = 0;
		while j < 25 {
			st[j + i] ^= t;
			j += 5;
		}
	}

	// Rho Pi
	let mut t = st[1];
	for i in 0..24 {
		let j = KECCAKF_PILN[i];
		bc[0] = st[j];
		st[j] = rotl32(t, KECCAKF_ROTC[i]);
		t = bc[0];
	}

	// Chi
	let mut j = 0;
	while j < 25 {
		unroll! {
			for i in 0..5 {
				bc[i] = st[j + i];
			}
		}
		unroll! {
			for i in 0..5 {
				st[j + i] ^= !bc[(i + 1) % 5] & bc[(i + 2) % 5];
			}
		}
		j += 5;
	}

	// Iota
	st[0] ^= KECCAKF_RNDC[r];
}

fn keccak_f800(header_hash: &H256, nonce: u64, result: &[u32; 8]) -> [u32; 25] {
	let mut st = [0u32; 25];

	for (i, chunk) in header_hash.chunks_exact(4).enumerate() {
		st[i] = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
	}
	st[8] = lower32(nonce);
	st[9] = higher32(nonce);
	st[10..18].copy_from_slice(result);

	for r in 0..22 {
		keccak_f800_round(&mut st, r);
	}
	st
}

/// Short framing: squeezes the 64-bit lane seed. The output assembles
/// `st[1]` then `st[0]` as big-endian bytes and reads them back as a
/// little-endian u64; the swap is part of the wire contract.
pub fn keccak_f800_short(header_hash: &H256, nonce: u64, result: &[u32; 8]) -> u64 {
	let st = keccak_f800(header_hash, nonce, result);

	let mut ret = [0u8; 8];
	ret[..4].copy_from_slice(&st[1].to_be_bytes());
	ret[4..].copy_from_slice(&st[0].to_be_bytes());
	u64::from_le_bytes(ret)
}

/// Long framing: squeezes `st[0..8]` as 32 little-endian bytes. For the
/// final-hash call, `nonce` carries the seed from the short framing.
pub fn keccak_f800_long(header_hash: &H256, nonce: u64, result: &[u32; 8]) -> H256 {
	let st = keccak_f800(header_hash, nonce, result);

	let mut ret = [0u8; 32];
	for i in 0..8 {
		ret[i * 4..i * 4 + 4].copy_from_slice(&st[i].to_le_bytes());
	}
	ret
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn round_zero_from_zero_state() {
		// Theta, Rho-Pi and Chi all fix the zero state; only Iota
		// injects the first round constant.
		let mut st = [0u32; 25];
		keccak_f800_round(&mut st, 0);
		assert_eq!(st[0], 0x00000001);
		assert!(st[1..].iter().all(|&w| w == 0));
	}

	#[test]
	fn seed_matches_long_prefix() {
		// The short framing's byte splice makes the seed equal to the
		// big-endian read of the long framing's first 8 bytes.
		let cases: [(H256, u64, [u32; 8]); 3] = [
			([0u8; 32], 0, [0u32; 8]),
			([0xff; 32], 0x123456789abcdef0, [0u32; 8]),
			([0x5a; 32], 42, [7, 6, 5, 4, 3, 2, 1, 0]),
		];
		for (hash, nonce, result) in cases.iter() {
			let seed = keccak_f800_short(hash, *nonce, result);
			let long = keccak_f800_long(hash, *nonce, result);
			let mut prefix = [0u8; 8];
			prefix.copy_from_slice(&long[..8]);
			assert_eq!(seed, u64::from_be_bytes(prefix));
		}
	}

	#[test]
	fn framings_depend_on_every_input() {
		let zero = keccak_f800_long(&[0u8; 32], 0, &[0u32; 8]);
		assert_ne!(keccak_f800_long(&[1u8; 32], 0, &[0u32; 8]), zero);
		assert_ne!(keccak_f800_long(&[0u8; 32], 1, &[0u32; 8]), zero);
		assert_ne!(keccak_f800_long(&[0u8; 32], 0, &[1u32; 8]), zero);
	}
}
