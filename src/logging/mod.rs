use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use env_logger::{Builder, Env, Target, WriteStyle};

/// Install the global logger.
///
/// The dashboard owns the terminal, so records only go to `log_file`. Without
/// one the default filter is `off`; `RUST_LOG` still overrides it.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_filter = if log_file.is_some() { "info" } else { "off" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_filter));
    builder.format_timestamp_millis();
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}",path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
        builder.write_style(WriteStyle::Never);
    }
    builder.try_init().context("install logger")?;
    Ok(())
}
