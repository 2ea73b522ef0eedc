//! Bitcoin Module
//!
//! Watch-only receiving address derivation. Funds are only received and
//! observed here; no Bitcoin transaction is ever built or signed.

pub mod derivation;

pub use derivation::{derive_address, AddressDeriver, DerivationError};
