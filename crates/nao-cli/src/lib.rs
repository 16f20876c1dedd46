//! `nao-cli` – process bootstrap for the `nao-controller` and `nao-video`
//! binaries.
//!
//! Both binaries follow the same path: parse flags, install logging, resolve
//! the layered config, build the module, hook Ctrl-C to its interrupt handle,
//! and run it to completion on a single-threaded Tokio runtime.

pub mod args;
pub mod config;

use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use nao_hal::facade::Connector;
use nao_hal::{BridgeConnector, SimConnector};
use nao_runtime::{ControllerModule, Endpoint, Module, ModuleConfig, VideoModule, run_module};
use nao_types::NaoError;
use tracing::{error, info, warn};

pub use args::Args;
pub use config::Config;

/// Which module a binary hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    Controller,
    Video,
}

impl ModuleKind {
    pub fn binary_name(self) -> &'static str {
        match self {
            ModuleKind::Controller => "nao-controller",
            ModuleKind::Video => "nao-video",
        }
    }
}

/// Build the module described by `cfg`.
pub fn build_module(kind: ModuleKind, cfg: &Config) -> Box<dyn Module> {
    let connector: Arc<dyn Connector> = if cfg.simulate {
        Arc::new(SimConnector::new())
    } else {
        Arc::new(BridgeConnector)
    };
    let rpc = match kind {
        ModuleKind::Controller => cfg.rpc_addr,
        ModuleKind::Video => cfg.video_rpc_addr,
    };
    let module_config = ModuleConfig {
        prefix: cfg.name_prefix.clone(),
        robot: cfg.robot(),
        rpc: Endpoint::Network(rpc),
        image: Endpoint::Network(cfg.image_addr),
        ..ModuleConfig::default()
    };
    match kind {
        ModuleKind::Controller => Box::new(ControllerModule::new(module_config, connector)),
        ModuleKind::Video => Box::new(VideoModule::new(module_config, connector)),
    }
}

/// Run one module until Ctrl-C.  Any fatal error maps to a failing exit
/// code.
pub fn launch(kind: ModuleKind, args: &Args) -> ExitCode {
    match try_launch(kind, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "{} stopped", kind.binary_name());
            eprintln!("{}: {e}", format!("{} failed", kind.binary_name()).red().bold());
            ExitCode::FAILURE
        }
    }
}

fn try_launch(kind: ModuleKind, args: &Args) -> Result<(), NaoError> {
    let cfg = config::resolve(args)?;
    info!(
        robot = %cfg.robot(),
        prefix = %cfg.name_prefix,
        simulate = cfg.simulate,
        "starting {}",
        kind.binary_name()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| NaoError::Config(format!("could not start the async runtime: {e}")))?;

    let mut module = build_module(kind, &cfg);
    let stop = module.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!();
        eprintln!("{}", "Ctrl-C received, shutting down".yellow().bold());
        stop.interrupt();
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; stop the process with a signal instead");
    }

    runtime.block_on(run_module(module.as_mut()))
}
