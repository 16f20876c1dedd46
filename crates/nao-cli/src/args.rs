//! Command-line flags shared by both binaries.
//!
//! Every setting is optional here so that an absent flag falls through to the
//! environment, the config file, and finally the built-in default.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(version, about = "NAO humanoid control module")]
pub struct Args {
    /// Robot IP address [default: 127.0.0.1]
    #[arg(short, long)]
    pub ip: Option<String>,

    /// Robot port [default: 9559]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Prefix for the module's registered name [default: none]
    #[arg(short, long)]
    pub name: Option<String>,

    /// Listen address of the command port [default: 127.0.0.1:10000]
    #[arg(long)]
    pub rpc_addr: Option<SocketAddr>,

    /// Listen address of the image port [default: 127.0.0.1:10001]
    #[arg(long)]
    pub image_addr: Option<SocketAddr>,

    /// Listen address of the video module's command port [default: 127.0.0.1:10002]
    #[arg(long)]
    pub video_rpc_addr: Option<SocketAddr>,

    /// Drive a simulated robot instead of connecting to one
    #[arg(long)]
    pub sim: bool,

    /// Config file [default: ~/.nao/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
