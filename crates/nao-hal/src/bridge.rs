//! WebSocket bridge driver for a physical robot.
//!
//! The robot-side bridge exposes the endpoint broker at `ws://<host>:<port>`
//! and speaks one JSON object per text frame:
//!
//! ```text
//! → {"id": 7, "service": "ALMotion", "method": "openHand", "args": ["LHand"]}
//! ← {"id": 7, "result": null}
//! ← {"id": 7, "error": "hand not found"}
//! ```
//!
//! Each endpoint handle owns its own connection, mirroring one broker proxy
//! per service.  Calls on a handle are serialised by a lock around the
//! socket; replies with a foreign `id` are discarded.
//!
//! Opening a connection is bounded by [`CONNECT_TIMEOUT`] and each call by
//! [`CALL_TIMEOUT`], so a robot that stops answering surfaces as an error
//! instead of a hang.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use nao_types::{Frame, ImageFrame, MotionTarget, NaoError};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::actuator::{MotionProxy, PostureProxy};
use crate::camera::{ColorSpace, Resolution, VideoProxy, VisionSubscription};
use crate::facade::{Connector, RobotAddress};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the TCP connect plus WebSocket handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on one request/reply exchange.  Blocking robot calls such as
/// posture transitions finish well inside it.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply envelope from the bridge.
#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// One connection bound to one service.
struct BridgeClient {
    service: &'static str,
    socket: Mutex<Socket>,
    next_id: AtomicU64,
}

impl BridgeClient {
    async fn open(service: &'static str, address: &RobotAddress) -> Result<Self, NaoError> {
        let url = format!("ws://{address}");
        let unreachable = |details: String| NaoError::ActuatorUnreachable {
            endpoint: service.to_string(),
            address: address.to_string(),
            details,
        };
        let (socket, _response) = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(&url))
            .await
            .map_err(|_| unreachable(format!("no answer within {CONNECT_TIMEOUT:?}")))?
            .map_err(|e| unreachable(e.to_string()))?;
        Ok(Self {
            service,
            socket: Mutex::new(socket),
            next_id: AtomicU64::new(1),
        })
    }

    fn fault(&self, details: impl Into<String>) -> NaoError {
        NaoError::ActuatorFault {
            endpoint: self.service.to_string(),
            details: details.into(),
        }
    }

    /// Send one request and wait for the reply carrying the same id.
    async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, NaoError> {
        tokio::time::timeout(CALL_TIMEOUT, self.exchange(method, args))
            .await
            .map_err(|_| self.fault(format!("{method}: no reply within {CALL_TIMEOUT:?}")))?
    }

    async fn exchange(&self, method: &str, args: Vec<Value>) -> Result<Value, NaoError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "id": id,
            "service": self.service,
            "method": method,
            "args": args,
        });

        let mut socket = self.socket.lock().await;
        socket
            .send(Message::Text(request.to_string().into()))
            .await
            .map_err(|e| self.fault(format!("{method}: send failed: {e}")))?;
        debug!(service = self.service, method, id, "bridge request sent");

        loop {
            let frame = socket
                .next()
                .await
                .ok_or_else(|| self.fault(format!("{method}: connection closed")))?
                .map_err(|e| self.fault(format!("{method}: {e}")))?;
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => {
                    return Err(self.fault(format!("{method}: connection closed by robot")));
                }
                _ => continue,
            };
            let reply: Reply = match serde_json::from_str(text.as_str()) {
                Ok(r) => r,
                Err(e) => {
                    warn!(service = self.service, error = %e, "malformed bridge reply ignored");
                    continue;
                }
            };
            if reply.id != id {
                warn!(service = self.service, expected = id, got = reply.id, "stale bridge reply ignored");
                continue;
            }
            return match reply.error {
                Some(err) => Err(self.fault(format!("{method}: {err}"))),
                None => Ok(reply.result),
            };
        }
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, method: &str, value: Value) -> Result<T, NaoError> {
        serde_json::from_value(value).map_err(|e| self.fault(format!("{method}: bad result: {e}")))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Connector
// ────────────────────────────────────────────────────────────────────────────

/// Connector that reaches a physical robot through its WebSocket bridge.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConnector;

#[async_trait]
impl Connector for BridgeConnector {
    async fn motion(&self, address: &RobotAddress) -> Result<Box<dyn MotionProxy>, NaoError> {
        let client = BridgeClient::open("ALMotion", address).await?;
        Ok(Box::new(BridgeMotion(Arc::new(client))))
    }

    async fn posture(&self, address: &RobotAddress) -> Result<Box<dyn PostureProxy>, NaoError> {
        let client = BridgeClient::open("ALRobotPosture", address).await?;
        Ok(Box::new(BridgePosture(Arc::new(client))))
    }

    async fn video(&self, address: &RobotAddress) -> Result<Box<dyn VideoProxy>, NaoError> {
        let client = BridgeClient::open("ALVideoDevice", address).await?;
        Ok(Box::new(BridgeVideo(Arc::new(client))))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Endpoint handles
// ────────────────────────────────────────────────────────────────────────────

struct BridgeMotion(Arc<BridgeClient>);

#[async_trait]
impl MotionProxy for BridgeMotion {
    async fn stiffness_interpolation(
        &self,
        names: &str,
        stiffness: f64,
        duration_s: f64,
    ) -> Result<(), NaoError> {
        self.0
            .call("stiffnessInterpolation", vec![json!(names), json!(stiffness), json!(duration_s)])
            .await
            .map(drop)
    }

    async fn set_angles(
        &self,
        names: &[&str],
        angles: &[f64],
        speed_fraction: f64,
    ) -> Result<(), NaoError> {
        self.0
            .call("setAngles", vec![json!(names), json!(angles), json!(speed_fraction)])
            .await
            .map(drop)
    }

    async fn set_position(
        &self,
        chain: &str,
        frame: Frame,
        target: &MotionTarget,
        speed_fraction: f64,
        axis_mask: u8,
    ) -> Result<(), NaoError> {
        self.0
            .call(
                "setPosition",
                vec![
                    json!(chain),
                    json!(frame as u8),
                    json!(target.as_slice()),
                    json!(speed_fraction),
                    json!(axis_mask),
                ],
            )
            .await
            .map(drop)
    }

    async fn open_hand(&self, hand: &str) -> Result<(), NaoError> {
        self.0.call("openHand", vec![json!(hand)]).await.map(drop)
    }

    async fn close_hand(&self, hand: &str) -> Result<(), NaoError> {
        self.0.call("closeHand", vec![json!(hand)]).await.map(drop)
    }

    async fn get_position(
        &self,
        name: &str,
        frame: Frame,
        use_sensor_values: bool,
    ) -> Result<[f64; 6], NaoError> {
        let value = self
            .0
            .call(
                "getPosition",
                vec![json!(name), json!(frame as u8), json!(use_sensor_values)],
            )
            .await?;
        self.0.decode("getPosition", value)
    }
}

struct BridgePosture(Arc<BridgeClient>);

#[async_trait]
impl PostureProxy for BridgePosture {
    async fn go_to_posture(&self, posture: &str, speed_fraction: f64) -> Result<bool, NaoError> {
        let value = self
            .0
            .call("goToPosture", vec![json!(posture), json!(speed_fraction)])
            .await?;
        self.0.decode("goToPosture", value)
    }
}

struct BridgeVideo(Arc<BridgeClient>);

/// `getImageRemote` result: width, height, layers, colorspace, seconds,
/// microseconds, pixel bytes.
type RemoteImage = (u32, u32, u32, u32, i64, i64, Vec<u8>);

#[async_trait]
impl VideoProxy for BridgeVideo {
    async fn set_active_camera(&self, camera_id: u8) -> Result<(), NaoError> {
        self.0
            .call("setActiveCamera", vec![json!(camera_id)])
            .await
            .map(drop)
    }

    async fn subscribe(
        &self,
        client_name: &str,
        resolution: Resolution,
        color_space: ColorSpace,
        fps: u32,
    ) -> Result<VisionSubscription, NaoError> {
        let value = self
            .0
            .call(
                "subscribe",
                vec![
                    json!(client_name),
                    json!(resolution as u8),
                    json!(color_space as u8),
                    json!(fps),
                ],
            )
            .await?;
        self.0.decode("subscribe", value).map(VisionSubscription)
    }

    async fn unsubscribe(&self, subscription: &VisionSubscription) -> Result<(), NaoError> {
        self.0
            .call("unsubscribe", vec![json!(subscription.as_str())])
            .await
            .map(drop)
    }

    async fn get_image_remote(
        &self,
        subscription: &VisionSubscription,
    ) -> Result<ImageFrame, NaoError> {
        let value = self
            .0
            .call("getImageRemote", vec![json!(subscription.as_str())])
            .await?;
        let (width, height, channels, _color_space, secs, micros, data): RemoteImage =
            self.0.decode("getImageRemote", value)?;
        let captured_at = DateTime::<Utc>::from_timestamp(secs, (micros.clamp(0, 999_999) * 1_000) as u32)
            .unwrap_or_else(Utc::now);
        Ok(ImageFrame {
            width,
            height,
            channels,
            captured_at,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    /// Minimal robot-side bridge: answers every request with `result`, or
    /// with an error for the method named in `failing`.
    async fn spawn_fake_robot(failing: Option<&'static str>, result: Value) -> RobotAddress {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let result = result.clone();
                tokio::spawn(async move {
                    let mut ws = accept_async(stream).await.unwrap();
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        let req: Value = serde_json::from_str(text.as_str()).unwrap();
                        let id = req["id"].clone();
                        let reply = if Some(req["method"].as_str().unwrap()) == failing {
                            json!({ "id": id, "error": "refused" })
                        } else {
                            json!({ "id": id, "result": result })
                        };
                        ws.send(Message::Text(reply.to_string().into())).await.unwrap();
                    }
                });
            }
        });
        RobotAddress::new("127.0.0.1", port)
    }

    #[tokio::test]
    async fn motion_call_roundtrip() {
        let addr = spawn_fake_robot(None, Value::Null).await;
        let motion = BridgeConnector.motion(&addr).await.unwrap();
        motion.open_hand("LHand").await.unwrap();
        motion
            .set_angles(&["HeadPitch", "HeadYaw"], &[0.1, 0.2], 0.1)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bridge_error_becomes_actuator_fault() {
        let addr = spawn_fake_robot(Some("closeHand"), Value::Null).await;
        let motion = BridgeConnector.motion(&addr).await.unwrap();
        let err = motion.close_hand("RHand").await.unwrap_err();
        match err {
            NaoError::ActuatorFault { endpoint, details } => {
                assert_eq!(endpoint, "ALMotion");
                assert!(details.contains("refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn posture_result_is_decoded() {
        let addr = spawn_fake_robot(None, json!(true)).await;
        let posture = BridgeConnector.posture(&addr).await.unwrap();
        assert!(posture.go_to_posture("StandInit", 0.2).await.unwrap());
    }

    #[tokio::test]
    async fn unreachable_robot_is_reported() {
        // Bind and drop to obtain a port nobody listens on.
        let port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let addr = RobotAddress::new("127.0.0.1", port);
        let err = BridgeConnector.motion(&addr).await.err().unwrap();
        assert!(matches!(err, NaoError::ActuatorUnreachable { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_robot_times_out_during_handshake() {
        // The listener takes the TCP connection but never answers the
        // WebSocket upgrade.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = RobotAddress::new("127.0.0.1", listener.local_addr().unwrap().port());
        let err = BridgeConnector.posture(&addr).await.err().unwrap();
        match err {
            NaoError::ActuatorUnreachable { endpoint, details, .. } => {
                assert_eq!(endpoint, "ALRobotPosture");
                assert!(details.contains("no answer"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        drop(listener);
    }
}
