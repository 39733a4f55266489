use crate::{
    apps::{self, EnumerationError},
    connection::CliConnection,
    placement, report, stats, table,
    types::InstanceStatRecord,
};
use diego_blame_config::Config;
use std::io::{self, Write};
use tracing::{debug, info, instrument};

pub const USAGE: &str = "Usage: diego-blame <HOST>";

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Expected a command name and a target host, got {0} argument(s)")]
    Usage(usize),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error("Failed to write the report")]
    Io(#[from] io::Error),
}

/// Reports the application instances running on one host, most memory-hungry
/// first
#[derive(Clone, Debug, Default)]
pub struct DiegoBlame {
    config: Config,
}

impl DiegoBlame {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Entry point as invoked by the host: `args` is the command name followed
    /// by the target host.
    ///
    /// Nothing is written to `out` unless the whole report was gathered.
    pub async fn run<C: CliConnection, W: Write>(
        &self,
        conn: &C,
        args: &[String],
        out: W,
    ) -> Result<(), PluginError> {
        let [_command, host, ..] = args else {
            return Err(PluginError::Usage(args.len()));
        };

        let records = self.report(conn, host).await?;
        table::render(&records, out)?;
        Ok(())
    }

    /// Gather the instances on `host`, sorted by memory ratio descending
    #[instrument(skip(self, conn))]
    pub async fn report<C: CliConnection>(
        &self,
        conn: &C,
        host: &str,
    ) -> Result<Vec<InstanceStatRecord>, EnumerationError> {
        let max_concurrent = self.config.max_concurrent_requests;

        let guids = apps::app_guids(conn, &self.config.apps_endpoint).await?;
        debug!(apps = guids.len(), "enumerated applications");

        let instances = stats::collect_instances(conn, &guids, max_concurrent).await;
        let on_host = report::on_host(&instances, host);
        info!(
            instances = instances.len(),
            on_host = on_host.len(),
            "collected instance stats"
        );

        let on_host = if self.config.resolve_placement && !on_host.is_empty() {
            placement::with_placements(conn, on_host, max_concurrent).await
        } else {
            on_host
        };

        Ok(report::by_mem_ratio_desc(&on_host))
    }
}
