mod layout;
mod logger_config;
mod session_config;

pub use layout::{Game, HandleWidth, Layout, StringIndexWidth};
pub use logger_config::{init_logging, LoggerConfig};
pub use session_config::{SessionConfig, SessionConfigBuilder};
