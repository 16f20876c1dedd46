//! [`CommandDispatcher`] – turns one inbound message into one robot action and
//! one reply.
//!
//! Every per-command failure stops here: usage errors get a `nack` with the
//! usage hint, action failures are logged and get a plain `nack`.  Nothing a
//! client sends can take the module down.

use nao_types::{CommandMessage, ReplyMessage};
use tracing::{debug, error, info, warn};

use crate::command::Command;
use crate::session::RobotActions;

pub struct CommandDispatcher<A> {
    actions: A,
}

impl<A: RobotActions> CommandDispatcher<A> {
    pub fn new(actions: A) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut A {
        &mut self.actions
    }

    pub fn into_inner(self) -> A {
        self.actions
    }

    /// Handle `command` and write the outcome into `reply`.
    ///
    /// Always returns `true`: the message counts as handled whatever the
    /// outcome, which is carried by the reply's first token.
    pub async fn respond(&mut self, command: &CommandMessage, reply: &mut ReplyMessage) -> bool {
        *reply = match Command::parse(command) {
            Err(usage) => {
                warn!(command = %command, error = %usage, "malformed command");
                ReplyMessage::nack_with(usage.to_string())
            }
            Ok(Command::Unknown) => {
                debug!(command = %command, "unrecognised command");
                ReplyMessage::nack()
            }
            Ok(parsed) => {
                let name = parsed.name().unwrap_or_default();
                match self.execute(parsed).await {
                    Ok(()) => {
                        info!(command = name, "command done");
                        ReplyMessage::ack()
                    }
                    Err(e) => {
                        error!(command = name, error = %e, "command failed");
                        ReplyMessage::nack()
                    }
                }
            }
        };
        true
    }

    async fn execute(&mut self, command: Command) -> Result<(), nao_types::NaoError> {
        match command {
            Command::Point { limb, target } => self.actions.point(limb, target).await,
            Command::Look { target } => self.actions.look(target).await,
            Command::Hand { limb, open: true } => self.actions.open_hand(limb).await,
            Command::Hand { limb, open: false } => self.actions.close_hand(limb).await,
            Command::Stiffness(value) => {
                let stored = self.actions.set_compliance(value).await?;
                debug!(requested = value, stored, "stiffness command");
                Ok(())
            }
            Command::Unknown => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nao_types::{Limb, NaoError, Token, Vector3};

    #[derive(Debug, Clone, PartialEq)]
    enum Action {
        Point(Limb, Vector3),
        Look(Vector3),
        OpenHand(Limb),
        CloseHand(Limb),
        Compliance(f64),
    }

    #[derive(Default)]
    struct Recorder {
        actions: Vec<Action>,
        fail: bool,
    }

    impl Recorder {
        fn result(&self) -> Result<(), NaoError> {
            if self.fail {
                Err(NaoError::ActuatorFault {
                    endpoint: "ALMotion".into(),
                    details: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl RobotActions for Recorder {
        async fn point(&mut self, limb: Limb, target: Vector3) -> Result<(), NaoError> {
            self.actions.push(Action::Point(limb, target));
            self.result()
        }

        async fn look(&mut self, target: Vector3) -> Result<(), NaoError> {
            self.actions.push(Action::Look(target));
            self.result()
        }

        async fn open_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
            self.actions.push(Action::OpenHand(limb));
            self.result()
        }

        async fn close_hand(&mut self, limb: Limb) -> Result<(), NaoError> {
            self.actions.push(Action::CloseHand(limb));
            self.result()
        }

        async fn set_compliance(&mut self, value: f64) -> Result<f64, NaoError> {
            let clamped = value.clamp(0.0, 1.0);
            self.actions.push(Action::Compliance(clamped));
            self.result().map(|()| clamped)
        }
    }

    async fn dispatch(
        dispatcher: &mut CommandDispatcher<Recorder>,
        tokens: Vec<Token>,
    ) -> ReplyMessage {
        let mut reply = ReplyMessage::default();
        assert!(dispatcher.respond(&CommandMessage::new(tokens), &mut reply).await);
        reply
    }

    #[tokio::test]
    async fn point_left_is_dispatched_once() {
        let mut d = CommandDispatcher::new(Recorder::default());
        let reply = dispatch(
            &mut d,
            vec!["point".into(), "left".into(), 0.2.into(), 0.0.into(), 0.1.into()],
        )
        .await;
        assert!(reply.is_ack());
        assert_eq!(
            d.actions().actions,
            vec![Action::Point(Limb::LeftArm, Vector3::new(0.2, 0.0, 0.1))]
        );
    }

    #[tokio::test]
    async fn bad_limb_is_nacked_with_hint() {
        let mut d = CommandDispatcher::new(Recorder::default());
        let reply = dispatch(
            &mut d,
            vec!["point".into(), "up".into(), 0i64.into(), 0i64.into(), 0i64.into()],
        )
        .await;
        assert!(reply.is_nack());
        let hint = reply.tokens()[1].as_str().unwrap();
        assert!(hint.contains("point"));
        assert!(d.actions().actions.is_empty());
    }

    #[tokio::test]
    async fn unknown_command_gets_plain_nack() {
        let mut d = CommandDispatcher::new(Recorder::default());
        let reply = dispatch(&mut d, vec!["frobnicate".into()]).await;
        assert_eq!(reply, ReplyMessage::nack());
        assert!(d.actions().actions.is_empty());
    }

    #[tokio::test]
    async fn action_failure_becomes_nack() {
        let mut d = CommandDispatcher::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let reply = dispatch(&mut d, vec!["look".into(), 1.0.into(), 0.0.into(), 0.0.into()]).await;
        assert_eq!(reply, ReplyMessage::nack());
        assert_eq!(d.actions().actions.len(), 1);

        // The dispatcher keeps serving after a failure.
        d.actions_mut().fail = false;
        let reply = dispatch(&mut d, vec!["look".into(), 1.0.into(), 0.0.into(), 0.0.into()]).await;
        assert!(reply.is_ack());
    }

    #[tokio::test]
    async fn previous_reply_contents_are_replaced() {
        let mut d = CommandDispatcher::new(Recorder::default());
        let mut reply = ReplyMessage::nack_with("stale");
        d.respond(
            &CommandMessage::new(vec!["hand".into(), "left".into(), "open".into()]),
            &mut reply,
        )
        .await;
        assert_eq!(reply, ReplyMessage::ack());
    }

    #[tokio::test]
    async fn hand_and_stiffness_commands() {
        let mut d = CommandDispatcher::new(Recorder::default());
        assert!(
            dispatch(&mut d, vec!["hand".into(), "right".into(), "close".into()])
                .await
                .is_ack()
        );
        assert!(
            dispatch(&mut d, vec!["stiffness".into(), 1.5.into()])
                .await
                .is_ack()
        );
        assert_eq!(
            d.into_inner().actions,
            vec![Action::CloseHand(Limb::RightArm), Action::Compliance(1.0)]
        );
    }
}
