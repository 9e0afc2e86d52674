//! Learning drivers: one [`crate::cache::CandidateSource`] implementation per algorithm family,
//! each wrapping a [`crate::ci::CiOracle`] with the family's own candidate-neighborhood
//! computation. [`crate::cache::NeighborhoodCache`] supplies the memoization and symmetry
//! correction common to all of them.
//!
//! Each driver's `candidate_pc`/`candidate_mb` is self-contained (it only calls back into its
//! own `CiOracle`, never into a shared cache), so the same `NeighborhoodCache` machinery can
//! wrap any of them uniformly. Where a family derives PC from MB (or vice versa), the driver
//! recomputes the other side fresh rather than consulting a cache, avoiding a self-referential
//! borrow between a driver and the cache that owns it. At the scale this crate targets the
//! redundant recomputation is cheap.

pub mod blanket;
pub mod global;
pub mod local;

pub use blanket::{BlanketAlgo, BlanketDriver};
pub use global::GlobalDriver;
pub use local::{LocalAlgo, LocalDriver};
