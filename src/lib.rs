//! Benchmark harness for multi-scalar multiplication backends.
//!
//! Builds test vectors (synthetic or precomputed), encodes them once into every
//! representation a backend may consume, times each backend and checks its result
//! against an oracle taken from a trusted reference or the precomputed case.

mod errors;
pub use errors::*;

mod params;
pub use params::*;

mod structs;
pub use structs::*;

mod field;
pub use field::*;

mod codec;
pub use codec::*;

mod timing;
pub use timing::*;

mod source;
pub use source::*;

mod cases;
pub use cases::*;

mod runner;
pub use runner::*;

mod ledger;
pub use ledger::*;

mod config;
pub use config::*;

mod backends;
pub use backends::*;

mod harness;
pub use harness::*;
