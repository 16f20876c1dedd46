//! Long-running service modules.
//!
//! A [`Module`] owns one [`RobotSession`] and its transport ports, and moves
//! through the [`Lifecycle`] states.  [`run_module`] drives a module from
//! `configure` to `close`; a signal handler stops it through the module's
//! [`InterruptHandle`].
//!
//! - [`ControllerModule`] serves the command grammar on `/<name>/rpc`,
//!   waking on each request and on a fixed tick.
//! - [`VideoModule`] pushes camera frames to `/<name>/img:o` as fast as the
//!   robot supplies them.  It also opens `/<name>/rpc`, which has no
//!   commands of its own and answers every request with `nack`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nao_hal::facade::{ActuatorFacade, Connector, RobotAddress};
use nao_kinematics::BodyModel;
use nao_middleware::{ImagePort, InterruptHandle, RpcClient, RpcRequest, RpcServer, port_name};
use nao_types::{IMAGE_HEIGHT, IMAGE_WIDTH, NaoError, ReplyMessage};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::dispatcher::CommandDispatcher;
use crate::lifecycle::{Lifecycle, ModuleState};
use crate::session::{MotionProfile, RobotSession};

/// Tick period when a module does not choose its own.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

pub const CONTROLLER_CLASS: &str = "NaoController";
pub const VIDEO_CLASS: &str = "NaoVideo";

/// Where one of a module's ports lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// WebSocket listener on this address.
    Network(SocketAddr),
    /// No listener; in-process clients only.
    InProcess,
}

/// Everything a module needs to configure itself.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Optional name prefix, e.g. `robot1`.
    pub prefix: String,
    pub robot: RobotAddress,
    /// The `/<name>/rpc` command port.
    pub rpc: Endpoint,
    /// The `/<name>/img:o` port; only the video module opens it.
    pub image: Endpoint,
    pub body: BodyModel,
    pub profile: MotionProfile,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            robot: RobotAddress::default(),
            rpc: Endpoint::InProcess,
            image: Endpoint::InProcess,
            body: BodyModel::NAO,
            profile: MotionProfile::default(),
        }
    }
}

/// `class` with the optional prefix in front.
pub fn registered_name(prefix: &str, class: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        class.to_string()
    } else {
        format!("{prefix}/{class}")
    }
}

#[async_trait]
pub trait Module: Send {
    /// Registered name (prefix + class).
    fn name(&self) -> &str;

    fn lifecycle(&self) -> &Lifecycle;

    /// Stops [`run`][Self::run] from any thread.
    fn interrupt_handle(&self) -> InterruptHandle;

    fn period(&self) -> Duration {
        DEFAULT_PERIOD
    }

    /// Connect to the robot and open the module's ports.
    ///
    /// # Errors
    ///
    /// Fatal: the robot is unreachable or a port cannot be bound.
    async fn configure(&mut self) -> Result<(), NaoError>;

    /// One unit of periodic work.  Returns `false` to end the run loop.
    async fn update_module(&mut self) -> Result<bool, NaoError>;

    /// Run until interrupted.
    async fn run(&mut self) -> Result<(), NaoError>;

    /// Unblock the run loop and move to `Interrupted`.
    fn interrupt_module(&mut self) -> Result<(), NaoError>;

    /// Release the module's ports and move to `Closed`.
    async fn close(&mut self) -> Result<(), NaoError>;
}

/// Configure, run, interrupt and close `module`.
///
/// A configure failure is returned without closing, since nothing was
/// opened.  An interrupt that arrives while `configure` is still waiting on
/// the robot abandons it and returns `Ok`; the module stays `Unconfigured`.
/// A run failure still interrupts and closes the module before it is
/// returned.
pub async fn run_module<M: Module + ?Sized>(module: &mut M) -> Result<(), NaoError> {
    let stop = module.interrupt_handle();
    let name = module.name().to_string();
    tokio::select! {
        biased;
        _ = stop.interrupted() => {
            info!(module = %name, "interrupted before configure finished");
            return Ok(());
        }
        configured = module.configure() => configured?,
    }
    let outcome = module.run().await;
    if let Err(e) = &outcome {
        error!(module = %module.name(), error = %e, "module stopped on error");
    }
    if module.lifecycle().state() != ModuleState::Interrupted {
        module.interrupt_module()?;
    }
    module.close().await?;
    outcome
}

async fn connect_session(
    connector: Arc<dyn Connector>,
    config: &ModuleConfig,
) -> Result<RobotSession, NaoError> {
    let facade = ActuatorFacade::connect(connector, config.robot.clone()).await?;
    RobotSession::new(facade, config.body, config.profile.clone()).await
}

/// Open the command port `/<name>/rpc`.  The client is only returned for an
/// in-process endpoint.
async fn open_rpc(
    module: &str,
    endpoint: Endpoint,
) -> Result<(RpcServer, Option<RpcClient>), NaoError> {
    let port = port_name(module, "rpc");
    match endpoint {
        Endpoint::Network(addr) => Ok((RpcServer::open(port, addr).await?, None)),
        Endpoint::InProcess => {
            let (server, client) = RpcServer::in_process(port);
            Ok((server, Some(client)))
        }
    }
}

fn not_configured(lifecycle: &Lifecycle) -> NaoError {
    NaoError::InvalidTransition {
        from: lifecycle.state().to_string(),
        to: ModuleState::Running.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

/// Serves `point`, `look`, `hand` and `stiffness` on `/<name>/rpc`.
pub struct ControllerModule {
    name: String,
    config: ModuleConfig,
    connector: Arc<dyn Connector>,
    lifecycle: Lifecycle,
    shutdown: InterruptHandle,
    dispatcher: Option<CommandDispatcher<RobotSession>>,
    rpc: Option<RpcServer>,
    client: Option<RpcClient>,
}

impl ControllerModule {
    pub fn new(config: ModuleConfig, connector: Arc<dyn Connector>) -> Self {
        let name = registered_name(&config.prefix, CONTROLLER_CLASS);
        Self {
            lifecycle: Lifecycle::new(name.clone()),
            name,
            config,
            connector,
            shutdown: InterruptHandle::new(),
            dispatcher: None,
            rpc: None,
            client: None,
        }
    }

    /// In-process client for a module configured with
    /// [`Endpoint::InProcess`].
    pub fn rpc_client(&self) -> Option<RpcClient> {
        self.client.clone()
    }

    /// Bound address of the command port, once configured on the network.
    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc.as_ref().and_then(RpcServer::local_addr)
    }

    pub fn session(&self) -> Option<&RobotSession> {
        self.dispatcher.as_ref().map(CommandDispatcher::actions)
    }

    async fn handle(&mut self, request: RpcRequest) {
        let mut reply = ReplyMessage::default();
        match self.dispatcher.as_mut() {
            Some(dispatcher) => {
                dispatcher.respond(&request.command, &mut reply).await;
            }
            None => reply = ReplyMessage::nack(),
        }
        request.respond(reply);
    }
}

#[async_trait]
impl Module for ControllerModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn interrupt_handle(&self) -> InterruptHandle {
        self.shutdown.clone()
    }

    async fn configure(&mut self) -> Result<(), NaoError> {
        if self.lifecycle.state() != ModuleState::Unconfigured {
            return self.lifecycle.configure();
        }
        let session = connect_session(Arc::clone(&self.connector), &self.config).await?;
        let (rpc, client) = open_rpc(&self.name, self.config.rpc).await?;
        self.client = client;
        info!(module = %self.name, port = %rpc.name(), robot = %self.config.robot, "controller configured");
        self.dispatcher = Some(CommandDispatcher::new(session));
        self.rpc = Some(rpc);
        self.lifecycle.configure()
    }

    async fn update_module(&mut self) -> Result<bool, NaoError> {
        self.lifecycle.tick()?;
        tokio::task::yield_now().await;
        Ok(true)
    }

    async fn run(&mut self) -> Result<(), NaoError> {
        let mut rpc = self.rpc.take().ok_or_else(|| not_configured(&self.lifecycle))?;
        let shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(self.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.interrupted() => break Ok(()),
                request = rpc.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break Ok(()),
                },
                _ = ticker.tick() => match self.update_module().await {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                },
            }
        };
        self.rpc = Some(rpc);
        outcome
    }

    fn interrupt_module(&mut self) -> Result<(), NaoError> {
        self.lifecycle.interrupt()?;
        self.shutdown.interrupt();
        if let Some(rpc) = &self.rpc {
            rpc.interrupt();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NaoError> {
        self.lifecycle.close()?;
        if let Some(mut rpc) = self.rpc.take() {
            rpc.close();
        }
        self.client = None;
        info!(module = %self.name, "controller closed");
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Video
// ────────────────────────────────────────────────────────────────────────────

/// Streams the camera to `/<name>/img:o`.
pub struct VideoModule {
    name: String,
    config: ModuleConfig,
    connector: Arc<dyn Connector>,
    lifecycle: Lifecycle,
    shutdown: InterruptHandle,
    session: Option<RobotSession>,
    rpc: Option<RpcServer>,
    client: Option<RpcClient>,
    port: Option<ImagePort>,
    frames_sent: u64,
}

impl VideoModule {
    pub fn new(config: ModuleConfig, connector: Arc<dyn Connector>) -> Self {
        let name = registered_name(&config.prefix, VIDEO_CLASS);
        Self {
            lifecycle: Lifecycle::new(name.clone()),
            name,
            config,
            connector,
            shutdown: InterruptHandle::new(),
            session: None,
            rpc: None,
            client: None,
            port: None,
            frames_sent: 0,
        }
    }

    /// In-process client for the command port of a module configured with
    /// [`Endpoint::InProcess`].
    pub fn rpc_client(&self) -> Option<RpcClient> {
        self.client.clone()
    }

    pub fn rpc_addr(&self) -> Option<SocketAddr> {
        self.rpc.as_ref().and_then(RpcServer::local_addr)
    }

    pub fn image_port(&self) -> Option<&ImagePort> {
        self.port.as_ref()
    }

    pub fn session(&self) -> Option<&RobotSession> {
        self.session.as_ref()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

#[async_trait]
impl Module for VideoModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn interrupt_handle(&self) -> InterruptHandle {
        self.shutdown.clone()
    }

    async fn configure(&mut self) -> Result<(), NaoError> {
        if self.lifecycle.state() != ModuleState::Unconfigured {
            return self.lifecycle.configure();
        }
        let mut session = connect_session(Arc::clone(&self.connector), &self.config).await?;
        let (mut rpc, client) = open_rpc(&self.name, self.config.rpc).await?;
        if let Err(e) = session.start_vision().await {
            rpc.close();
            return Err(e);
        }

        let name = port_name(&self.name, "img:o");
        let port = match self.config.image {
            Endpoint::Network(addr) => ImagePort::open(name, addr, IMAGE_WIDTH, IMAGE_HEIGHT).await,
            Endpoint::InProcess => Ok(ImagePort::detached(name, IMAGE_WIDTH, IMAGE_HEIGHT)),
        };
        let port = match port {
            Ok(port) => port,
            Err(e) => {
                if let Err(stop) = session.stop_vision().await {
                    warn!(error = %stop, "could not release vision stream");
                }
                rpc.close();
                return Err(e);
            }
        };
        info!(
            module = %self.name,
            rpc = %rpc.name(),
            port = %port.name(),
            robot = %self.config.robot,
            "video configured"
        );
        self.session = Some(session);
        self.rpc = Some(rpc);
        self.client = client;
        self.port = Some(port);
        self.lifecycle.configure()
    }

    /// Fetch one frame and publish it.
    async fn update_module(&mut self) -> Result<bool, NaoError> {
        self.lifecycle.tick()?;
        let (Some(session), Some(port)) = (self.session.as_mut(), self.port.as_ref()) else {
            return Ok(false);
        };
        let frame = session.get_image().await?;
        port.write(frame)?;
        self.frames_sent += 1;
        tokio::task::yield_now().await;
        Ok(true)
    }

    /// Produce frames until interrupted.  A frame fetch that is still
    /// waiting on the robot is abandoned when the stop flag is raised.
    async fn run(&mut self) -> Result<(), NaoError> {
        if self.session.is_none() {
            return Err(not_configured(&self.lifecycle));
        }
        let mut rpc = self.rpc.take().ok_or_else(|| not_configured(&self.lifecycle))?;
        let shutdown = self.shutdown.clone();

        let outcome = loop {
            tokio::select! {
                biased;
                _ = shutdown.interrupted() => break Ok(()),
                request = rpc.recv() => match request {
                    Some(request) => {
                        debug!(module = %self.name, command = %request.command, "video module has no commands");
                        request.respond(ReplyMessage::nack());
                    }
                    None => break Ok(()),
                },
                step = self.update_module() => match step {
                    Ok(true) => {}
                    Ok(false) => break Ok(()),
                    Err(e) => break Err(e),
                },
            }
        };
        self.rpc = Some(rpc);
        info!(module = %self.name, frames = self.frames_sent, "video loop stopped");
        outcome
    }

    fn interrupt_module(&mut self) -> Result<(), NaoError> {
        self.lifecycle.interrupt()?;
        self.shutdown.interrupt();
        if let Some(port) = &self.port {
            port.interrupt();
        }
        if let Some(rpc) = &self.rpc {
            rpc.interrupt();
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), NaoError> {
        self.lifecycle.close()?;
        if let Some(mut port) = self.port.take() {
            port.close();
        }
        if let Some(mut rpc) = self.rpc.take() {
            rpc.close();
        }
        self.client = None;
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.stop_vision().await {
                warn!(error = %e, "could not release vision stream");
            }
        }
        info!(module = %self.name, "video closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nao_hal::actuator::{MotionProxy, PostureProxy};
    use nao_hal::camera::{ColorSpace, Resolution, VideoProxy, VisionSubscription};
    use nao_hal::sim::{ActuatorCall, SimConnector};
    use nao_types::{CommandMessage, ImageFrame, Token};

    fn sim_arc(sim: &SimConnector) -> Arc<dyn Connector> {
        Arc::new(sim.clone())
    }

    /// A robot that accepts connections and then never answers.
    struct SilentRobot;

    #[async_trait]
    impl Connector for SilentRobot {
        async fn motion(&self, _: &RobotAddress) -> Result<Box<dyn MotionProxy>, NaoError> {
            std::future::pending().await
        }

        async fn posture(&self, _: &RobotAddress) -> Result<Box<dyn PostureProxy>, NaoError> {
            std::future::pending().await
        }

        async fn video(&self, _: &RobotAddress) -> Result<Box<dyn VideoProxy>, NaoError> {
            std::future::pending().await
        }
    }

    /// The simulated robot, except that frame fetches never complete.
    struct FrozenCamera(SimConnector);

    #[async_trait]
    impl Connector for FrozenCamera {
        async fn motion(&self, address: &RobotAddress) -> Result<Box<dyn MotionProxy>, NaoError> {
            self.0.motion(address).await
        }

        async fn posture(&self, address: &RobotAddress) -> Result<Box<dyn PostureProxy>, NaoError> {
            self.0.posture(address).await
        }

        async fn video(&self, address: &RobotAddress) -> Result<Box<dyn VideoProxy>, NaoError> {
            Ok(Box::new(FrozenVideo(self.0.video(address).await?)))
        }
    }

    struct FrozenVideo(Box<dyn VideoProxy>);

    #[async_trait]
    impl VideoProxy for FrozenVideo {
        async fn set_active_camera(&self, camera_id: u8) -> Result<(), NaoError> {
            self.0.set_active_camera(camera_id).await
        }

        async fn subscribe(
            &self,
            client_name: &str,
            resolution: Resolution,
            color_space: ColorSpace,
            fps: u32,
        ) -> Result<VisionSubscription, NaoError> {
            self.0.subscribe(client_name, resolution, color_space, fps).await
        }

        async fn unsubscribe(&self, subscription: &VisionSubscription) -> Result<(), NaoError> {
            self.0.unsubscribe(subscription).await
        }

        async fn get_image_remote(&self, _: &VisionSubscription) -> Result<ImageFrame, NaoError> {
            std::future::pending().await
        }
    }

    fn interrupt_after(stop: InterruptHandle, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            stop.interrupt();
        });
    }

    #[test]
    fn names_carry_the_prefix() {
        assert_eq!(registered_name("", CONTROLLER_CLASS), "NaoController");
        assert_eq!(registered_name("robot1", VIDEO_CLASS), "robot1/NaoVideo");
        assert_eq!(registered_name("/robot1/", VIDEO_CLASS), "robot1/NaoVideo");
    }

    #[tokio::test(start_paused = true)]
    async fn configure_fails_when_robot_unreachable() {
        let mut module =
            ControllerModule::new(ModuleConfig::default(), Arc::new(SimConnector::unreachable()));
        let err = module.configure().await.unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(module.lifecycle().state(), ModuleState::Unconfigured);
        assert!(module.rpc_client().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn configure_interrupt_close_without_running() {
        let sim = SimConnector::new();
        let mut module = ControllerModule::new(ModuleConfig::default(), sim_arc(&sim));
        module.configure().await.unwrap();
        module.interrupt_module().unwrap();
        module.close().await.unwrap();
        assert_eq!(
            module.lifecycle().history(),
            &[
                ModuleState::Unconfigured,
                ModuleState::Configured,
                ModuleState::Interrupted,
                ModuleState::Closed,
            ]
        );
        assert!(module.configure().await.is_err());
        assert!(module.run().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn controller_serves_commands_until_interrupted() {
        let sim = SimConnector::new();
        let config = ModuleConfig {
            prefix: "robot1".into(),
            ..ModuleConfig::default()
        };
        let mut module = ControllerModule::new(config, sim_arc(&sim));
        assert_eq!(module.name(), "robot1/NaoController");
        module.configure().await.unwrap();
        sim.clear_calls();
        let client = module.rpc_client().unwrap();
        let stop = module.interrupt_handle();

        let caller = tokio::spawn(async move {
            let look = client
                .call(CommandMessage::new(vec![
                    Token::from("look"),
                    1.0.into(),
                    0.0.into(),
                    0.126.into(),
                ]))
                .await
                .unwrap();
            let bogus = client
                .call(CommandMessage::new(vec![Token::from("frobnicate")]))
                .await
                .unwrap();
            stop.interrupt();
            (look, bogus)
        });

        module.run().await.unwrap();
        let (look, bogus) = caller.await.unwrap();
        assert!(look.is_ack());
        assert_eq!(bogus, ReplyMessage::nack());
        assert_eq!(sim.calls().len(), 2);

        module.interrupt_module().unwrap();
        module.close().await.unwrap();
        assert_eq!(module.lifecycle().state(), ModuleState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn run_module_full_cycle() {
        let sim = SimConnector::new();
        let mut module = ControllerModule::new(ModuleConfig::default(), sim_arc(&sim));
        let stop = module.interrupt_handle();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            stop.interrupt();
        });
        run_module(&mut module).await.unwrap();
        assert_eq!(
            module.lifecycle().history(),
            &[
                ModuleState::Unconfigured,
                ModuleState::Configured,
                ModuleState::Running,
                ModuleState::Interrupted,
                ModuleState::Closed,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_while_connecting_abandons_startup() {
        let mut module = ControllerModule::new(ModuleConfig::default(), Arc::new(SilentRobot));
        interrupt_after(module.interrupt_handle(), Duration::from_millis(50));

        let outcome = tokio::time::timeout(Duration::from_secs(3), run_module(&mut module))
            .await
            .expect("run_module must return once interrupted");
        assert!(outcome.is_ok());
        assert_eq!(module.lifecycle().history(), &[ModuleState::Unconfigured]);
        assert!(module.session().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_unblocks_a_stuck_frame_fetch() {
        let sim = SimConnector::new();
        let mut module = VideoModule::new(ModuleConfig::default(), Arc::new(FrozenCamera(sim.clone())));
        interrupt_after(module.interrupt_handle(), Duration::from_millis(50));

        let outcome = tokio::time::timeout(Duration::from_secs(3), run_module(&mut module))
            .await
            .expect("run_module must return once interrupted");
        assert!(outcome.is_ok());
        assert_eq!(module.frames_sent(), 0);
        assert_eq!(module.lifecycle().state(), ModuleState::Closed);
        assert!(matches!(sim.calls().last(), Some(ActuatorCall::Unsubscribe(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn video_command_port_answers_nack() {
        let sim = SimConnector::new();
        let config = ModuleConfig {
            prefix: "robot1".into(),
            ..ModuleConfig::default()
        };
        let mut module = VideoModule::new(config, sim_arc(&sim));
        module.configure().await.unwrap();
        let client = module.rpc_client().unwrap();
        let stop = module.interrupt_handle();

        let caller = tokio::spawn(async move {
            let reply = client
                .call(CommandMessage::new(vec![Token::from("look"), 1.0.into(), 0.0.into(), 0.0.into()]))
                .await
                .unwrap();
            stop.interrupt();
            reply
        });

        module.run().await.unwrap();
        assert_eq!(caller.await.unwrap(), ReplyMessage::nack());
        assert!(!sim.calls().iter().any(|c| matches!(c, ActuatorCall::SetAngles { .. })));

        module.interrupt_module().unwrap();
        module.close().await.unwrap();
        assert!(module.rpc_client().is_none());
        assert!(module.image_port().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn video_startup_failure_releases_the_command_port() {
        let sim = SimConnector::new();
        sim.fail_on("subscribe");
        let mut module = VideoModule::new(ModuleConfig::default(), sim_arc(&sim));
        assert!(module.configure().await.is_err());
        assert_eq!(module.lifecycle().state(), ModuleState::Unconfigured);
        assert!(module.rpc_client().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn video_streams_until_interrupted_then_releases_camera() {
        let sim = SimConnector::new();
        let mut module = VideoModule::new(ModuleConfig::default(), sim_arc(&sim));
        module.configure().await.unwrap();
        let mut frames = module.image_port().unwrap().subscribe();
        let stop = module.interrupt_handle();
        let watcher = tokio::spawn(async move {
            let mut seen = 0;
            while seen < 3 {
                match frames.recv().await {
                    Ok(frame) => {
                        assert_eq!(frame.data.len(), 320 * 240 * 3);
                        seen += 1;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(e) => panic!("image port closed early: {e}"),
                }
            }
            stop.interrupt();
        });

        module.run().await.unwrap();
        watcher.await.unwrap();
        assert!(module.frames_sent() >= 3);

        module.interrupt_module().unwrap();
        module.close().await.unwrap();
        assert!(module.image_port().is_none());
        assert!(!module.session().unwrap().facade().is_vision_active());
        let calls = sim.calls();
        assert!(calls.contains(&ActuatorCall::SetActiveCamera(1)));
        assert!(matches!(calls.last(), Some(ActuatorCall::Unsubscribe(_))));
    }
}
