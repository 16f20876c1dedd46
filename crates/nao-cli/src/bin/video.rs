//! `nao-video` – streams the robot's camera to `/<prefix?>/NaoVideo/img:o`.

use std::process::ExitCode;

use clap::Parser;
use nao_cli::{Args, ModuleKind, launch};

fn main() -> ExitCode {
    let args = Args::parse();
    let _guard = nao_runtime::telemetry::init_tracing(ModuleKind::Video.binary_name());
    launch(ModuleKind::Video, &args)
}
