//! ProgPoW: a programmatic proof-of-work designed to stress the full
//! capability set of commodity GPUs. Given a header hash, a nonce and a
//! block number, the kernel mixes 64 rounds of DAG reads, cached reads
//! and random math through a 16-lane register file, then reduces the
//! lanes into a 256-bit mix hash and a 256-bit final hash.
//!
//! The DAG itself is never built here. Callers hand the kernel a
//! [`Lookup`] capability serving 64-byte blocks plus the 16 KiB cached
//! head of the dataset; `progpow_light` and `progpow_full` wrap the two
//! usual ways of providing them.

#[macro_use]
extern crate crunchy;
#[macro_use]
extern crate log;

pub mod keccak;
pub mod kiss99;
pub mod progpow;
pub mod shared;
pub mod types;

pub use crate::progpow::{extract_cdag, progpow, progpow_full, progpow_light};
pub use crate::types::{CDag, Lookup, ProgPowError, H256};
