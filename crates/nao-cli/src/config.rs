//! Configuration vault – reads `~/.nao/config.toml`.
//!
//! Settings are layered: built-in defaults, then the file, then `NAO_*`
//! environment variables, then command-line flags.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use nao_hal::facade::{DEFAULT_PORT, RobotAddress};
use nao_types::NaoError;
use serde::{Deserialize, Serialize};

use crate::args::Args;

/// Persisted settings stored in `~/.nao/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address of the robot's endpoint broker.
    #[serde(default = "default_robot_ip")]
    pub robot_ip: String,

    #[serde(default = "default_robot_port")]
    pub robot_port: u16,

    /// Prepended to the module's registered name, e.g. `robot1`.
    #[serde(default)]
    pub name_prefix: String,

    /// Where the controller's command port listens.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: SocketAddr,

    /// Where the video module's image port listens.
    #[serde(default = "default_image_addr")]
    pub image_addr: SocketAddr,

    /// Where the video module's command port listens.
    #[serde(default = "default_video_rpc_addr")]
    pub video_rpc_addr: SocketAddr,

    /// Use the simulated robot.
    #[serde(default)]
    pub simulate: bool,
}

fn default_robot_ip() -> String {
    "127.0.0.1".to_string()
}
fn default_robot_port() -> u16 {
    DEFAULT_PORT
}
fn default_rpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 10000))
}
fn default_image_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 10001))
}
fn default_video_rpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 10002))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robot_ip: default_robot_ip(),
            robot_port: default_robot_port(),
            name_prefix: String::new(),
            rpc_addr: default_rpc_addr(),
            image_addr: default_image_addr(),
            video_rpc_addr: default_video_rpc_addr(),
            simulate: false,
        }
    }
}

impl Config {
    pub fn robot(&self) -> RobotAddress {
        RobotAddress::new(self.robot_ip.clone(), self.robot_port)
    }

    /// Overwrite every field for which a flag was given.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ip) = &args.ip {
            self.robot_ip = ip.clone();
        }
        if let Some(port) = args.port {
            self.robot_port = port;
        }
        if let Some(name) = &args.name {
            self.name_prefix = name.clone();
        }
        if let Some(addr) = args.rpc_addr {
            self.rpc_addr = addr;
        }
        if let Some(addr) = args.image_addr {
            self.image_addr = addr;
        }
        if let Some(addr) = args.video_rpc_addr {
            self.video_rpc_addr = addr;
        }
        if args.sim {
            self.simulate = true;
        }
    }
}

/// Return the path to `~/.nao/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".nao").join("config.toml")
}

/// Defaults < file < environment < flags.
///
/// A missing file is fine; an unreadable or malformed one is a
/// [`NaoError::Config`].
pub fn resolve(args: &Args) -> Result<Config, NaoError> {
    let path = args.config.clone().unwrap_or_else(config_path);
    let mut cfg = load_from(&path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.apply_args(args);
    Ok(cfg)
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, NaoError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| NaoError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| NaoError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply `NAO_*` environment variable overrides to `cfg`.  Values that do
/// not parse are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `NAO_ROBOT_IP` | `robot_ip` |
/// | `NAO_ROBOT_PORT` | `robot_port` |
/// | `NAO_NAME` | `name_prefix` |
/// | `NAO_RPC_ADDR` | `rpc_addr` |
/// | `NAO_IMAGE_ADDR` | `image_addr` |
/// | `NAO_VIDEO_RPC_ADDR` | `video_rpc_addr` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("NAO_ROBOT_IP") {
        cfg.robot_ip = v;
    }
    if let Ok(v) = std::env::var("NAO_ROBOT_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.robot_port = port;
    }
    if let Ok(v) = std::env::var("NAO_NAME") {
        cfg.name_prefix = v;
    }
    if let Ok(v) = std::env::var("NAO_RPC_ADDR")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.rpc_addr = addr;
    }
    if let Ok(v) = std::env::var("NAO_IMAGE_ADDR")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.image_addr = addr;
    }
    if let Ok(v) = std::env::var("NAO_VIDEO_RPC_ADDR")
        && let Ok(addr) = v.parse::<SocketAddr>()
    {
        cfg.video_rpc_addr = addr;
    }
}

/// Serialises tests that read or write `NAO_*` variables; `resolve` reads
/// them too.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, PoisonError};
    static ENV: Mutex<()> = Mutex::new(());
    ENV.lock().unwrap_or_else(PoisonError::into_inner)
}
