//! The ProgPoW compute kernel: seed derivation, per-lane register
//! initialization, the deterministic loop of DAG accesses interleaved
//! with cache reads and random math, the per-lane reduction and the
//! closing Keccak-f[800] absorb.
//!
//! The kernel is scalar and single-threaded per hash. Lanes are
//! conceptually parallel but fully convergent: every lane of a loop
//! iteration executes the same generated program, so all divergence
//! comes from the register contents themselves.

use std::cmp;

use crate::keccak::{keccak_f800_long, keccak_f800_short};
use crate::kiss99::Kiss99;
use crate::shared::{
	fnv1a, higher32, lower32, rotl32, rotr32, FNV_HASH, NODE_BYTES, NODE_WORDS,
	PROGPOW_CACHE_WORDS, PROGPOW_CNT_CACHE, PROGPOW_CNT_DAG, PROGPOW_CNT_MATH,
	PROGPOW_DAG_LOADS, PROGPOW_LANES, PROGPOW_MIX_BYTES, PROGPOW_PERIOD_LENGTH,
	PROGPOW_REGS,
};
use crate::types::{CDag, Lookup, ProgPowError, H256};

type MixLane = [u32; PROGPOW_REGS];
type Mix = [MixLane; PROGPOW_LANES];

/// Initial register vector for one lane, drawn from a KISS99 stream
/// seeded with the hash seed and the lane id.
fn fill_mix(seed: u64, lane_id: u32) -> MixLane {
	let mut fnv_hash = FNV_HASH;
	let z = fnv1a(&mut fnv_hash, lower32(seed));
	let w = fnv1a(&mut fnv_hash, higher32(seed));
	let jsr = fnv1a(&mut fnv_hash, lane_id);
	let jcong = fnv1a(&mut fnv_hash, lane_id);
	let mut rnd = Kiss99::new(z, w, jsr, jcong);

	let mut mix = [0u32; PROGPOW_REGS];
	for reg in mix.iter_mut() {
		*reg = rnd.rnd();
	}
	mix
}

/// Derives the program for one period: the KISS99 stream that drives
/// operand selection, a random sequence of merge destinations and a
/// random sequence of cache sources. The sequences are Fisher-Yates
/// permutations, so every destination register is merged at least once
/// per pass and no cache source repeats within one.
fn progpow_init(period: u64) -> (Kiss99, [usize; PROGPOW_REGS], [usize; PROGPOW_REGS]) {
	let mut fnv_hash = FNV_HASH;
	let z = fnv1a(&mut fnv_hash, lower32(period));
	let w = fnv1a(&mut fnv_hash, higher32(period));
	// jsr and jcong reuse the same period halves as z and w; the
	// reference does this and it is observable, so it stays.
	let jsr = fnv1a(&mut fnv_hash, lower32(period));
	let jcong = fnv1a(&mut fnv_hash, higher32(period));
	let mut rnd = Kiss99::new(z, w, jsr, jcong);

	let mut mix_seq_dst = [0usize; PROGPOW_REGS];
	let mut mix_seq_cache = [0usize; PROGPOW_REGS];
	for i in 0..PROGPOW_REGS {
		mix_seq_dst[i] = i;
		mix_seq_cache[i] = i;
	}
	// The two shuffles consume the stream in interleaved order.
	for i in (1..PROGPOW_REGS).rev() {
		let j = rnd.rnd() as usize % (i + 1);
		mix_seq_dst.swap(i, j);
		let j = rnd.rnd() as usize % (i + 1);
		mix_seq_cache.swap(i, j);
	}
	(rnd, mix_seq_dst, mix_seq_cache)
}

/// Folds `b` into `a` without discarding the entropy already in `a`,
/// even when `b` is low entropy.
fn merge(a: u32, b: u32, r: u32) -> u32 {
	match r % 4 {
		0 => a.wrapping_mul(33).wrapping_add(b),
		1 => (a ^ b).wrapping_mul(33),
		2 => rotl32(a, (r >> 16) % 32) ^ b,
		_ => rotr32(a, (r >> 16) % 32) ^ b,
	}
}

/// Random math between two registers.
fn math(a: u32, b: u32, r: u32) -> u32 {
	match r % 11 {
		0 => a.wrapping_add(b),
		1 => a.wrapping_mul(b),
		2 => higher32(u64::from(a) * u64::from(b)),
		3 => cmp::min(a, b),
		4 => rotl32(a, b),
		5 => rotr32(a, b),
		6 => a & b,
		7 => a | b,
		8 => a ^ b,
		9 => a.leading_zeros() + b.leading_zeros(),
		_ => a.count_ones() + b.count_ones(),
	}
}

fn fetch<L: Lookup>(lookup: &L, index: u32) -> Result<Vec<u8>, ProgPowError> {
	let data = lookup.lookup(index);
	if data.len() < NODE_BYTES {
		return Err(ProgPowError::LookupTruncated);
	}
	Ok(data)
}

fn progpow_loop<L: Lookup>(
	period: u64,
	loop_: usize,
	mix: &mut Mix,
	lookup: &L,
	c_dag: &[u32],
	dataset_size: u32,
) -> Result<(), ProgPowError> {
	// All lanes share one base address, so an iteration's DAG traffic is
	// a single sequential 256-byte burst. mix[_][0] feeds the offset,
	// which makes every address depend on the previous load.
	let g_offset = mix[loop_ % PROGPOW_LANES][0]
		% (64u32.wrapping_mul(dataset_size) / (PROGPOW_LANES * PROGPOW_DAG_LOADS) as u32);
	let g_offset = g_offset.wrapping_mul(PROGPOW_LANES as u32);

	let mut dag_data = fetch(lookup, (PROGPOW_DAG_LOADS as u32).wrapping_mul(g_offset))?;

	// The program only depends on the period, so it is derived once per
	// iteration and every lane starts from a fresh copy of the stream.
	let (rnd_init, mix_seq_dst, mix_seq_cache) = progpow_init(period);
	let i_max = cmp::max(PROGPOW_CNT_CACHE, PROGPOW_CNT_MATH);

	for l in 0..PROGPOW_LANES {
		let index = (PROGPOW_DAG_LOADS as u32).wrapping_mul(g_offset.wrapping_add(l as u32));
		// Each successive 16-word boundary crosses into a new DAG item.
		if l != 0 && index % NODE_WORDS as u32 == 0 {
			dag_data = fetch(lookup, index)?;
		}

		let mut g_data = [0u32; PROGPOW_DAG_LOADS];
		let base = (index % NODE_WORDS as u32) as usize * 4;
		unroll! {
			for i in 0..4 {
				g_data[i] = u32::from_le_bytes([
					dag_data[base + i * 4],
					dag_data[base + i * 4 + 1],
					dag_data[base + i * 4 + 2],
					dag_data[base + i * 4 + 3],
				]);
			}
		}

		let mut rnd = rnd_init.clone();
		let mut mix_seq_dst_cnt = 0;
		let mut mix_seq_cache_cnt = 0;
		let lane = &mut mix[l];

		for i in 0..i_max {
			if i < PROGPOW_CNT_CACHE {
				// Cached memory access: a random 32-bit location within
				// the first portion of the DAG.
				let src = mix_seq_cache[mix_seq_cache_cnt % PROGPOW_REGS];
				mix_seq_cache_cnt += 1;
				let offset = lane[src] as usize % PROGPOW_CACHE_WORDS;
				let data = c_dag[offset];
				let dest = mix_seq_dst[mix_seq_dst_cnt % PROGPOW_REGS];
				mix_seq_dst_cnt += 1;
				let r = rnd.rnd();
				lane[dest] = merge(lane[dest], data, r);
			}
			if i < PROGPOW_CNT_MATH {
				let src1 = rnd.rnd() as usize % PROGPOW_REGS;
				let src2 = rnd.rnd() as usize % PROGPOW_REGS;
				let dest = mix_seq_dst[mix_seq_dst_cnt % PROGPOW_REGS];
				mix_seq_dst_cnt += 1;
				let data = math(lane[src1], lane[src2], rnd.rnd());
				lane[dest] = merge(lane[dest], data, rnd.rnd());
			}
		}

		// The global load is consumed at the very end of the iteration
		// to allow full latency hiding. g_data[0] always lands in
		// lane[0] to feed the next offset calculation.
		lane[0] = merge(lane[0], g_data[0], rnd.rnd());
		for i in 1..PROGPOW_DAG_LOADS {
			let dest = mix_seq_dst[mix_seq_dst_cnt % PROGPOW_REGS];
			mix_seq_dst_cnt += 1;
			lane[dest] = merge(lane[dest], g_data[i], rnd.rnd());
		}
	}
	Ok(())
}

/// The full kernel: one hash from a header, a nonce and DAG access.
/// `size` is the total dataset size in bytes; `lookup` serves 64-byte
/// blocks of it. Returns `(mix_hash, final_hash)`.
pub fn progpow<L: Lookup>(
	hash: &H256,
	nonce: u64,
	size: u64,
	block_number: u64,
	c_dag: &[u32],
	lookup: &L,
) -> Result<(H256, H256), ProgPowError> {
	if c_dag.len() < PROGPOW_CACHE_WORDS {
		warn!(
			"rejecting cDAG of {} words, need {}",
			c_dag.len(),
			PROGPOW_CACHE_WORDS
		);
		return Err(ProgPowError::InvalidCacheSize);
	}
	if size == 0 || size % PROGPOW_MIX_BYTES as u64 != 0 {
		warn!("rejecting dataset size {}", size);
		return Err(ProgPowError::InvalidDatasetSize);
	}

	let mut result = [0u32; 8];
	let seed = keccak_f800_short(hash, nonce, &result);

	let mut mix: Mix = [[0u32; PROGPOW_REGS]; PROGPOW_LANES];
	for (lane_id, lane) in mix.iter_mut().enumerate() {
		*lane = fill_mix(seed, lane_id as u32);
	}

	let period = block_number / PROGPOW_PERIOD_LENGTH;
	let dataset_size = (size / PROGPOW_MIX_BYTES as u64) as u32;
	debug!(
		"hashing block {} with period {} over {} dataset rows",
		block_number, period, dataset_size
	);

	for l in 0..PROGPOW_CNT_DAG {
		progpow_loop(period, l, &mut mix, lookup, c_dag, dataset_size)?;
	}

	// Reduce mix data to a single per-lane result.
	let mut lane_results = [0u32; PROGPOW_LANES];
	for (lane, lane_result) in mix.iter().zip(lane_results.iter_mut()) {
		*lane_result = FNV_HASH;
		for &reg in lane.iter() {
			fnv1a(lane_result, reg);
		}
	}

	unroll! {
		for i in 0..8 {
			result[i] = FNV_HASH;
		}
	}
	for (lane, &lane_result) in lane_results.iter().enumerate() {
		fnv1a(&mut result[lane % 8], lane_result);
	}

	let final_hash = keccak_f800_long(hash, seed, &result);
	let mut mix_hash = [0u8; 32];
	for i in 0..8 {
		mix_hash[i * 4..i * 4 + 4].copy_from_slice(&result[i].to_le_bytes());
	}
	Ok((mix_hash, final_hash))
}

/// Light verification: DAG items are derived on demand by the caller's
/// generator (item index to 64-byte item), typically Keccak-512 over
/// the light cache. `size` is the size in bytes of the full dataset the
/// generator models.
pub fn progpow_light<F>(
	size: u64,
	hash: &H256,
	nonce: u64,
	block_number: u64,
	c_dag: &[u32],
	dataset_item: F,
) -> Result<(H256, H256), ProgPowError>
where
	F: Fn(u32) -> Vec<u8>,
{
	let lookup = move |index: u32| dataset_item(index / NODE_WORDS as u32);
	progpow(hash, nonce, size, block_number, c_dag, &lookup)
}

/// Full mode: the dataset is memory resident. The cDAG is extracted
/// from its head and blocks are served straight out of the slice.
pub fn progpow_full(
	dataset: &[u32],
	hash: &H256,
	nonce: u64,
	block_number: u64,
) -> Result<(H256, H256), ProgPowError> {
	let c_dag = extract_cdag(dataset)?;

	let lookup = |index: u32| {
		let mut block = Vec::with_capacity(NODE_BYTES);
		for &word in dataset[index as usize..index as usize + NODE_WORDS].iter() {
			block.extend_from_slice(&word.to_le_bytes());
		}
		block
	};

	progpow(
		hash,
		nonce,
		dataset.len() as u64 * 4,
		block_number,
		&c_dag,
		&lookup,
	)
}

/// Copies the first 16 KiB of the dataset into the fast-access buffer
/// the inner loop reads from.
pub fn extract_cdag(dataset: &[u32]) -> Result<CDag, ProgPowError> {
	if dataset.len() < PROGPOW_CACHE_WORDS {
		return Err(ProgPowError::InvalidDatasetSize);
	}
	let mut c_dag = [0u32; PROGPOW_CACHE_WORDS];
	c_dag.copy_from_slice(&dataset[..PROGPOW_CACHE_WORDS]);
	Ok(c_dag)
}

#[cfg(test)]
mod test {
	use super::*;
	use rustc_hex::FromHex;

	// Deterministic stand-in for a generated dataset; word count must
	// keep the byte size a multiple of 256.
	fn test_dataset(words: usize) -> Vec<u32> {
		let mut h = FNV_HASH;
		(0..words).map(|i| fnv1a(&mut h, i as u32)).collect()
	}

	fn test_header() -> H256 {
		let bytes: Vec<u8> = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100"
			.from_hex()
			.unwrap();
		let mut hash = [0u8; 32];
		hash.copy_from_slice(&bytes);
		hash
	}

	const TEST_WORDS: usize = 8 * 1024;

	#[test]
	fn merge_selectors() {
		assert_eq!(merge(1, 2, 0), 35);
		assert_eq!(merge(1, 2, 1), 99);
		assert_eq!(merge(1, 2, 2), 3);
		assert_eq!(merge(1, 2, 3), 3);
		// High halfword of r picks the rotation distance.
		assert_eq!(merge(0x80000000, 0, 0x00080002), 0x80);
		assert_eq!(merge(0x80000000, 0, 0x00050003), 0x04000000);
		// Selector 0 wraps.
		assert_eq!(merge(0xffffffff, 34, 0), 1);
	}

	#[test]
	fn math_selectors() {
		assert_eq!(math(7, 3, 0), 10);
		assert_eq!(math(7, 3, 1), 21);
		assert_eq!(math(0x80000000, 4, 2), 2);
		assert_eq!(math(7, 3, 3), 3);
		assert_eq!(math(1, 1, 4), 2);
		assert_eq!(math(1, 1, 5), 0x80000000);
		assert_eq!(math(0b1100, 0b1010, 6), 0b1000);
		assert_eq!(math(0b1100, 0b1010, 7), 0b1110);
		assert_eq!(math(0b1100, 0b1010, 8), 0b0110);
		assert_eq!(math(0, 0, 9), 64);
		assert_eq!(math(0xf, 0xf0, 10), 8);
		// Wraparound on add and mul.
		assert_eq!(math(0xffffffff, 2, 0), 1);
		assert_eq!(math(0x80000001, 2, 1), 2);
		// Selector is r mod 11.
		assert_eq!(math(7, 3, 11), 10);
	}

	#[test]
	fn init_sequences_are_permutations() {
		for period in [0u64, 1, 42, 1 << 40].iter() {
			let (_, dst, cache) = progpow_init(*period);
			let mut dst_sorted = dst;
			let mut cache_sorted = cache;
			dst_sorted.sort_unstable();
			cache_sorted.sort_unstable();
			for i in 0..PROGPOW_REGS {
				assert_eq!(dst_sorted[i], i);
				assert_eq!(cache_sorted[i], i);
			}
		}
	}

	#[test]
	fn fill_mix_diverges_per_lane_and_seed() {
		assert_ne!(fill_mix(1, 0), fill_mix(1, 1));
		assert_ne!(fill_mix(1, 0), fill_mix(2, 0));
		assert_eq!(fill_mix(1, 0), fill_mix(1, 0));
	}

	#[test]
	fn deterministic() {
		let dataset = test_dataset(TEST_WORDS);
		let a = progpow_full(&dataset, &test_header(), 0x123456789abcdef0, 30000).unwrap();
		let b = progpow_full(&dataset, &test_header(), 0x123456789abcdef0, 30000).unwrap();
		assert_eq!(a, b);
	}

	#[test]
	fn period_stability() {
		// The program only changes every 50 blocks.
		let dataset = test_dataset(TEST_WORDS);
		let start = progpow_full(&dataset, &test_header(), 1, 0).unwrap();
		let same_period = progpow_full(&dataset, &test_header(), 1, 49).unwrap();
		let next_period = progpow_full(&dataset, &test_header(), 1, 50).unwrap();
		assert_eq!(start, same_period);
		assert_ne!(start, next_period);
	}

	#[test]
	fn nonce_changes_output() {
		let dataset = test_dataset(TEST_WORDS);
		let a = progpow_full(&dataset, &test_header(), 0, 0).unwrap();
		let b = progpow_full(&dataset, &test_header(), 1, 0).unwrap();
		assert_ne!(a, b);
	}

	#[test]
	fn light_matches_full() {
		let dataset = test_dataset(TEST_WORDS);
		let (mix_full, final_full) =
			progpow_full(&dataset, &test_header(), 7, 123).unwrap();

		let c_dag = extract_cdag(&dataset).unwrap();
		let item = |item_index: u32| {
			let start = item_index as usize * NODE_WORDS;
			let mut block = Vec::with_capacity(NODE_BYTES);
			for &word in dataset[start..start + NODE_WORDS].iter() {
				block.extend_from_slice(&word.to_le_bytes());
			}
			block
		};
		let (mix_light, final_light) = progpow_light(
			dataset.len() as u64 * 4,
			&test_header(),
			7,
			123,
			&c_dag,
			item,
		)
		.unwrap();

		assert_eq!(mix_full, mix_light);
		assert_eq!(final_full, final_light);
	}

	#[test]
	fn rejects_short_cache() {
		let dataset = test_dataset(TEST_WORDS);
		let c_dag = vec![0u32; PROGPOW_CACHE_WORDS - 1];
		let lookup = |_: u32| vec![0u8; NODE_BYTES];
		let err = progpow(&test_header(), 0, dataset.len() as u64 * 4, 0, &c_dag, &lookup)
			.unwrap_err();
		assert_eq!(err, ProgPowError::InvalidCacheSize);
	}

	#[test]
	fn rejects_bad_dataset_size() {
		let c_dag = vec![0u32; PROGPOW_CACHE_WORDS];
		let lookup = |_: u32| vec![0u8; NODE_BYTES];
		for size in [0u64, 255, 257, 1000].iter() {
			let err = progpow(&test_header(), 0, *size, 0, &c_dag, &lookup).unwrap_err();
			assert_eq!(err, ProgPowError::InvalidDatasetSize);
		}
		let short = vec![0u32; PROGPOW_CACHE_WORDS - 64];
		assert_eq!(
			extract_cdag(&short).unwrap_err(),
			ProgPowError::InvalidDatasetSize
		);
	}

	#[test]
	fn surfaces_truncated_lookup() {
		let c_dag = vec![0u32; PROGPOW_CACHE_WORDS];
		let lookup = |_: u32| vec![0u8; NODE_BYTES - 1];
		let err = progpow(&test_header(), 0, 1 << 20, 0, &c_dag, &lookup).unwrap_err();
		assert_eq!(err, ProgPowError::LookupTruncated);
	}
}
