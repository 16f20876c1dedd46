//! `nao-controller` – serves `point`, `look`, `hand` and `stiffness` on
//! `/<prefix?>/NaoController/rpc`.

use std::process::ExitCode;

use clap::Parser;
use nao_cli::{Args, ModuleKind, launch};

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = nao_runtime::telemetry::init_tracing(ModuleKind::Controller.binary_name());
    launch(ModuleKind::Controller, &args)
}
