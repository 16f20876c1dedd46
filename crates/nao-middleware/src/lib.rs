//! `nao-middleware` – named ports between the controller and its clients.
//!
//! Moves messages without caring what they mean.  Commands and image frames
//! are addressed by a port name of the form `/<module>/<suffix>`.
//!
//! # Modules
//!
//! - [`rpc`] – request/reply command port.  One JSON token array in, one
//!   out, served over WebSocket or in-process.
//! - [`image_port`] – fixed-shape RGB output port that fans frames out to
//!   every subscriber over a Tokio broadcast channel.

pub mod image_port;
pub mod rpc;

pub use image_port::ImagePort;
pub use rpc::{InterruptHandle, RpcClient, RpcRequest, RpcServer};

/// `/<module>/<suffix>`.  `module` may already carry a leading slash or a
/// prefix path such as `robot1/NaoController`.
pub fn port_name(module: &str, suffix: &str) -> String {
    format!("/{}/{}", module.trim_start_matches('/'), suffix)
}

#[cfg(test)]
mod tests {
    use super::port_name;

    #[test]
    fn port_names() {
        assert_eq!(port_name("NaoController", "rpc"), "/NaoController/rpc");
        assert_eq!(port_name("/NaoVideo", "img:o"), "/NaoVideo/img:o");
        assert_eq!(
            port_name("robot1/NaoController", "rpc"),
            "/robot1/NaoController/rpc"
        );
    }
}
