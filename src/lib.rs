pub mod config;
pub mod error;
pub mod instance;
pub mod zone;

pub use config::*;
pub use error::*;
pub use instance::*;
pub use zone::*;
