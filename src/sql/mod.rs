//! Safe SQL builder and executor: identifiers from mappings only, values as parameters.

mod builder;
pub mod executor;
pub mod params;
pub use builder::*;
pub use executor::SqlExecutor;
pub use params::*;
