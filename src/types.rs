use crate::shared::{NODE_BYTES, PROGPOW_CACHE_WORDS};
use thiserror::Error;

/// 256-bit hash as raw bytes.
pub type H256 = [u8; 32];

/// The first 16 KiB of the DAG, held in a small fast-access buffer and
/// read at random 32-bit offsets by the inner loop.
pub type CDag = [u32; PROGPOW_CACHE_WORDS];

/// Contract violations a caller can feed the kernel. The kernel itself
/// is total; these are the only failure modes and none of them leaves
/// partial results behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgPowError {
	#[error("cDAG shorter than {} words", PROGPOW_CACHE_WORDS)]
	InvalidCacheSize,
	#[error("dataset size is not a positive multiple of 256 bytes")]
	InvalidDatasetSize,
	#[error("lookup returned fewer than {} bytes", NODE_BYTES)]
	LookupTruncated,
}

/// Read-only capability handing out 64-byte DAG blocks. `index` is a
/// 32-bit word index; the returned bytes start at the 16-word-aligned
/// position containing that word. Light verification derives blocks
/// from the cache on the fly, full mode reads them out of a resident
/// dataset; the kernel cannot tell the difference.
pub trait Lookup {
	fn lookup(&self, index: u32) -> Vec<u8>;
}

impl<F> Lookup for F
where
	F: Fn(u32) -> Vec<u8>,
{
	fn lookup(&self, index: u32) -> Vec<u8> {
		self(index)
	}
}
