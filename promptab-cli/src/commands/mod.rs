pub mod compare;
pub mod config;
pub mod replay;

pub use compare::cmd_compare;
pub use config::cmd_config;
pub use replay::cmd_replay;
