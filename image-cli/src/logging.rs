// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "IMAGE_TOOL_LOG_FILE";
const DEFAULT_LOG_PREFIX: &str = "image-tool.log";

/// Map `-v` occurrences to a filter directive: 0 = warn, 1 = info, 2+ = debug
pub(crate) fn directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

pub(crate) fn init(verbose: u8) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(verbose)));

    // stdout carries command output, logs go to stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let Some(location) = std::env::var_os(LOG_FILE_ENV) else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return;
    };

    match file_writer(&PathBuf::from(location)) {
        Ok((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();

            // Keep the background logging worker alive for the duration of the process.
            let _ = LOG_GUARD.set(guard);
        }
        Err(e) => {
            eprintln!("image-tool: failed to initialize file logging: {e:#}");
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
        }
    }
}

fn file_writer(
    path: &Path,
) -> anyhow::Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let (dir, prefix) = split_log_location(path);

    if let Err(e) = fs::create_dir_all(&dir) {
        return Err(anyhow::anyhow!(
            "create log directory failed: {} ({})",
            dir.display(),
            e
        ));
    }

    let appender = tracing_appender::rolling::never(&dir, &prefix);
    Ok(tracing_appender::non_blocking(appender))
}

fn split_log_location(path: &Path) -> (PathBuf, OsString) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from(DEFAULT_LOG_PREFIX));
    (dir, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_directive() {
        assert_eq!(directive(0), "warn");
        assert_eq!(directive(1), "info");
        assert_eq!(directive(2), "debug");
        assert_eq!(directive(7), "debug");
    }

    #[test]
    fn splits_log_location() {
        let (dir, prefix) = split_log_location(Path::new("/var/log/image-tool/build.log"));
        assert_eq!(dir, PathBuf::from("/var/log/image-tool"));
        assert_eq!(prefix, OsString::from("build.log"));

        let (dir, prefix) = split_log_location(Path::new("build.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, OsString::from("build.log"));

        let (_, prefix) = split_log_location(Path::new("/"));
        assert_eq!(prefix, OsString::from(DEFAULT_LOG_PREFIX));
    }
}
