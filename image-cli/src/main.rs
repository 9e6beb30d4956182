// SPDX-License-Identifier: GPL-3.0-only

//! image-tool - mount and result handling for image builds

mod logging;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use image_result::bundle::{self, BundleRequest};
use image_result::{RESULT_FILE_NAME, ResultStore, RuntimeConfig};
use image_sys::MountManager;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "image-tool")]
#[command(about = "Mount lifecycle and build result commands for image builds")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Mount a device, printing the mountpoint used
    Mount {
        device: String,
        /// Mountpoint directory, a temporary one is created if omitted
        #[arg(long)]
        mountpoint: Option<PathBuf>,
        /// Bind mount a directory instead of mounting a device
        #[arg(long, conflicts_with = "options")]
        bind: bool,
        /// Mount option, may be repeated
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
    /// Unmount a mountpoint
    Umount {
        mountpoint: PathBuf,
        /// Detach immediately and let the kernel finish later
        #[arg(long)]
        lazy: bool,
        /// Remove the mountpoint directory and its contents afterwards
        #[arg(long)]
        delete_mountpoint: bool,
    },
    /// Print whether a path is a mountpoint
    IsMounted { mountpoint: PathBuf },
    Result {
        #[command(subcommand)]
        command: ResultCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ResultCommand {
    /// List the results recorded in a target directory
    List { target_dir: PathBuf },
    /// Check a file against the configured build constraints and record it
    Add {
        target_dir: PathBuf,
        key: String,
        filename: String,
        #[arg(long)]
        compress: bool,
        #[arg(long)]
        no_shasum: bool,
        #[arg(long)]
        no_bundle: bool,
    },
    /// Copy bundle-able results into a bundle directory
    Bundle {
        #[arg(long)]
        target_dir: PathBuf,
        #[arg(long)]
        bundle_dir: PathBuf,
        #[arg(long)]
        id: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Mount {
            device,
            mountpoint,
            bind,
            options,
        } => {
            let owns_mountpoint = mountpoint
                .as_ref()
                .is_none_or(|path| path.as_os_str().is_empty());
            let manager = MountManager::new(device, mountpoint)?;
            mount_or_clean_up(&manager, owns_mountpoint, |manager| {
                if bind {
                    manager.bind_mount()
                } else {
                    manager.mount(&options)
                }
            })?;
            println!("{}", manager.mountpoint().display());
            Ok(true)
        }
        Command::Umount {
            mountpoint,
            lazy,
            delete_mountpoint,
        } => {
            let manager = MountManager::new("none", Some(mountpoint))?;
            if lazy {
                manager.umount_lazy(delete_mountpoint)?;
                return Ok(true);
            }
            let umounted = manager.umount(delete_mountpoint)?;
            if !umounted {
                eprintln!("{} is still busy", manager.mountpoint().display());
            }
            Ok(umounted)
        }
        Command::IsMounted { mountpoint } => {
            let manager = MountManager::new("none", Some(mountpoint))?;
            let mounted = manager.is_mounted();
            println!("{}", mounted);
            Ok(mounted)
        }
        Command::Result { command } => run_result(command),
    }
}

/// Run `mount`, removing the mountpoint again when it was created for this
/// call and mounting failed
fn mount_or_clean_up(
    manager: &MountManager,
    owns_mountpoint: bool,
    mount: impl FnOnce(&MountManager) -> image_sys::Result<()>,
) -> anyhow::Result<()> {
    let Err(e) = mount(manager) else {
        return Ok(());
    };

    if owns_mountpoint {
        // non-recursive, a populated directory is left alone
        if let Err(cleanup) = fs::remove_dir(manager.mountpoint()) {
            warn!(
                "Failed to remove mountpoint {:?}: {}",
                manager.mountpoint(),
                cleanup
            );
        }
    }
    Err(e.into())
}

fn run_result(command: ResultCommand) -> anyhow::Result<bool> {
    match command {
        ResultCommand::List { target_dir } => {
            let store = ResultStore::load(&target_dir.join(RESULT_FILE_NAME))?;
            for line in store.render_results() {
                println!("{}", line);
            }
            Ok(true)
        }
        ResultCommand::Add {
            target_dir,
            key,
            filename,
            compress,
            no_shasum,
            no_bundle,
        } => {
            let path = target_dir.join(RESULT_FILE_NAME);
            let config = RuntimeConfig::load().context("loading runtime config")?;
            let mut store = if path.exists() {
                ResultStore::load(&path)?.with_config(Arc::new(config))
            } else {
                ResultStore::new(Arc::new(config))
            };

            store.add(
                &key,
                &filename,
                image_types::ResultFileOptions {
                    use_for_bundle: !no_bundle,
                    compress,
                    shasum: !no_shasum,
                },
            )?;
            store.dump(&path)?;
            store.print_results();
            Ok(true)
        }
        ResultCommand::Bundle {
            target_dir,
            bundle_dir,
            id,
        } => {
            let bundled = bundle::bundle(&BundleRequest {
                target_dir,
                bundle_dir,
                build_id: id,
            })?;
            for file in &bundled {
                println!("{}", file.path.display());
            }
            info!("Bundled {} result files", bundled.len());
            Ok(true)
        }
    }
}
