//! End-to-end: WebSocket client → controller module → simulated robot.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nao_hal::sim::{ActuatorCall, SimConnector};
use nao_runtime::{ControllerModule, Endpoint, Module, ModuleConfig, ModuleState, run_module};
use nao_types::{Limb, ReplyMessage};
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn send(
    ws: &mut tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    json: &str,
) -> ReplyMessage {
    ws.send(Message::Text(json.to_string().into())).await.unwrap();
    match ws.next().await {
        Some(Ok(Message::Text(text))) => serde_json::from_str(text.as_str()).unwrap(),
        other => panic!("expected a text reply, got {other:?}"),
    }
}

#[tokio::test]
async fn commands_over_websocket_drive_the_robot() {
    let sim = SimConnector::new();
    let config = ModuleConfig {
        rpc: Endpoint::Network("127.0.0.1:0".parse().unwrap()),
        profile: nao_runtime::MotionProfile {
            point_hold: Duration::ZERO,
            look_hold: Duration::ZERO,
            ..Default::default()
        },
        ..ModuleConfig::default()
    };
    let mut module = ControllerModule::new(config, Arc::new(sim.clone()));
    module.configure().await.unwrap();
    let addr = module.rpc_addr().unwrap();
    sim.clear_calls();
    let stop = module.interrupt_handle();

    let client = tokio::spawn(async move {
        let (mut ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
        let replies = vec![
            send(&mut ws, r#"["point", "left", 0.2, 0.0, 0.1]"#).await,
            send(&mut ws, r#"["point", "up", 0, 0, 0]"#).await,
            send(&mut ws, r#"["frobnicate"]"#).await,
            send(&mut ws, r#"["look", 1, 0, 0.126]"#).await,
            send(&mut ws, r#"["hand", "right", "close"]"#).await,
            send(&mut ws, r#"["stiffness", -3]"#).await,
            send(&mut ws, r#"not json"#).await,
        ];
        stop.interrupt();
        replies
    });

    module.run().await.unwrap();
    let replies = client.await.unwrap();

    assert!(replies[0].is_ack());
    assert!(replies[1].is_nack());
    assert!(
        replies[1].tokens()[1]
            .as_str()
            .unwrap()
            .starts_with("message format for point")
    );
    assert_eq!(replies[2], ReplyMessage::nack());
    assert!(replies[3].is_ack());
    assert!(replies[4].is_ack());
    assert!(replies[5].is_ack());
    assert!(replies[6].is_nack());

    let calls = sim.calls();
    let positions = calls
        .iter()
        .filter(|c| matches!(c, ActuatorCall::SetPosition { chain, .. } if chain == Limb::LeftArm.chain()))
        .count();
    assert_eq!(positions, 1, "point left issued exactly once");
    assert!(calls.contains(&ActuatorCall::CloseHand("RHand".into())));
    assert!(calls.contains(&ActuatorCall::StiffnessInterpolation {
        names: "Body".into(),
        stiffness: 0.0,
        duration_s: 1.0,
    }));
    assert_eq!(module.session().unwrap().compliance(), 0.0);

    module.interrupt_module().unwrap();
    module.close().await.unwrap();
    assert_eq!(module.lifecycle().state(), ModuleState::Closed);
}

#[tokio::test]
async fn actuator_failure_is_nacked_and_module_keeps_serving() {
    let sim = SimConnector::new();
    let config = ModuleConfig {
        profile: nao_runtime::MotionProfile {
            point_hold: Duration::ZERO,
            look_hold: Duration::ZERO,
            ..Default::default()
        },
        ..ModuleConfig::default()
    };
    let mut module = ControllerModule::new(config, Arc::new(sim.clone()));
    module.configure().await.unwrap();
    let client = module.rpc_client().unwrap();
    let stop = module.interrupt_handle();
    let failing = sim.clone();

    let caller = tokio::spawn(async move {
        failing.fail_on("openHand");
        let first = client
            .call(serde_json::from_str(r#"["point", "right", 0.2, -0.1, 0.1]"#).unwrap())
            .await
            .unwrap();
        failing.recover("openHand");
        let second = client
            .call(serde_json::from_str(r#"["point", "right", 0.2, -0.1, 0.1]"#).unwrap())
            .await
            .unwrap();
        stop.interrupt();
        (first, second)
    });

    module.run().await.unwrap();
    let (first, second) = caller.await.unwrap();
    assert_eq!(first, ReplyMessage::nack());
    assert!(second.is_ack());
    assert_eq!(module.lifecycle().state(), ModuleState::Running);
}

#[tokio::test]
async fn unreachable_robot_fails_startup() {
    let mut module =
        ControllerModule::new(ModuleConfig::default(), Arc::new(SimConnector::unreachable()));
    let err = run_module(&mut module).await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(module.lifecycle().history(), &[ModuleState::Unconfigured]);
}

#[tokio::test]
async fn port_already_bound_fails_startup() {
    let squatter = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = squatter.local_addr().unwrap();
    let config = ModuleConfig {
        rpc: Endpoint::Network(taken),
        ..ModuleConfig::default()
    };
    let mut module = ControllerModule::new(config, Arc::new(SimConnector::new()));
    let err = module.configure().await.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(module.lifecycle().state(), ModuleState::Unconfigured);
}
