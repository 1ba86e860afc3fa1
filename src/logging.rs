use std::path::Path;

use anyhow::Context;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::config;

/// Start the global logger.
///
/// Level comes from `spec`, else `RUST_LOG`, else info. Logs go to stderr; with a
/// `log_dir` they go to a rotating file instead and warnings are duplicated to stderr.
/// Keep the returned handle alive for the life of the process.
pub fn init_logging(spec: Option<&str>, log_dir: Option<&Path>) -> anyhow::Result<LoggerHandle> {
    let logger = match spec {
        Some(spec) => Logger::try_with_str(spec),
        None => Logger::try_with_env_or_str(config::logging::DEFAULT_LOG_SPEC),
    }
    .context("invalid log specification")?;

    let logger = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed creating log dir {}", dir.display()))?;
            logger
                .log_to_file(FileSpec::default().directory(dir).basename(config::logging::LOG_FILE_NAME))
                .rotate(
                    Criterion::Size(config::logging::LOG_ROTATE_SIZE_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(config::logging::LOG_ROTATE_KEEP_FILES),
                )
                .duplicate_to_stderr(Duplicate::Warn)
        }
        None => logger.log_to_stderr(),
    };

    let handle = logger
        .format(flexi_logger::detailed_format)
        .start()
        .context("failed to start logger")?;

    log::info!("{}", "=".repeat(60));
    log::info!("csv_embedder starting");
    log::info!("Version: {}", config::APP_VERSION);
    log::info!("Platform: {}", std::env::consts::OS);
    log::info!("{}", "=".repeat(60));

    Ok(handle)
}
