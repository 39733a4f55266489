pub mod apps;
pub mod connection;
pub mod placement;
pub mod plugin;
pub mod report;
pub mod stats;
pub mod table;
pub mod types;

pub use connection::{CfCliConnection, CliConnection};
pub use plugin::{DiegoBlame, PluginError};
pub use types::{AppGuid, BlankAppGuid, InstanceState, InstanceStatRecord};
