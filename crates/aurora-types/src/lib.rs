//! Core types for the Aurora REST gateway.
//!
//! Job keys, the tagged command model, the normalized `(job_key, payload, errors)`
//! result and the `CommandDelegate` trait every backend implements.

mod command;
mod job_key;
mod result;
mod traits;

pub use command::*;
pub use job_key::*;
pub use result::*;
pub use traits::*;
