pub mod data;
pub mod defaults;
pub mod io;
pub mod printing;

pub use data::{path_display, Config, Preferences, RetryPolicy};
pub use defaults::GatewayConfig;
pub use io::ConfigError;
