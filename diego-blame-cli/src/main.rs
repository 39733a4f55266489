mod opts;

use anyhow::Result;
use diego_blame::{plugin::USAGE, CfCliConnection, DiegoBlame, PluginError};
use std::io;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = opts::parse_args();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = args.resolve_config()?;
    let conn = CfCliConnection::new(&config.cf_binary);
    let plugin = DiegoBlame::new(config);

    match plugin.run(&conn, &args.invocation(), io::stdout()).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e @ PluginError::Usage(_)) => {
            eprintln!("{e}\n{USAGE}");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
