pub mod config;
pub mod forget;
pub mod memory;
pub mod stats;

pub use config::ConfigCommand;
pub use forget::ForgetCommand;
pub use memory::MemoryCommand;
pub use stats::StatsCommand;
