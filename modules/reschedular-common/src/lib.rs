pub mod clock;
pub mod config;
pub mod error;
pub mod file_config;
pub mod ids;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::ConfigError;
pub use file_config::FileConfig;
pub use ids::{IdGenerator, SequentialIds, UuidGenerator};
pub use types::*;
