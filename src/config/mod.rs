pub mod introspector;
pub mod loader;
pub mod resolved;
pub mod types;
pub mod validator;

pub use introspector::*;
pub use loader::*;
pub use resolved::*;
pub use types::*;
pub use validator::*;
