//! Test support for the rsv crates: an in-memory [`MemStore`] with fault
//! injection, record builders, and Lincoln export fixtures.

mod fixtures;
mod mem_store;

pub use fixtures::{
    cancel_of, lincoln_csv, new_booking, write_lincoln_csv, LINCOLN_HEADER,
};
pub use mem_store::{Faults, MemStore, MemTx, Plan, StoredError};
