//! Module lifecycle state machine.
//!
//! ```text
//! Unconfigured ──configure──▶ Configured ──tick──▶ Running ◀─┐
//!                                  │                  │ tick ─┘
//!                                  └───interrupt──────┴──▶ Interrupted ──close──▶ Closed
//! ```
//!
//! Every other transition, and anything at all after `Closed`, is rejected
//! with [`NaoError::InvalidTransition`] and leaves the state unchanged.

use std::fmt;

use nao_types::NaoError;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleState {
    Unconfigured,
    Configured,
    Running,
    Interrupted,
    Closed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Unconfigured => "unconfigured",
            ModuleState::Configured => "configured",
            ModuleState::Running => "running",
            ModuleState::Interrupted => "interrupted",
            ModuleState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Current state plus every state visited, in order.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    module: String,
    history: Vec<ModuleState>,
}

impl Lifecycle {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            history: vec![ModuleState::Unconfigured],
        }
    }

    pub fn state(&self) -> ModuleState {
        // `history` always holds at least the initial state.
        self.history
            .last()
            .copied()
            .unwrap_or(ModuleState::Unconfigured)
    }

    /// Every state visited, starting with `Unconfigured`.  Repeated ticks
    /// while running are recorded once.
    pub fn history(&self) -> &[ModuleState] {
        &self.history
    }

    pub fn configure(&mut self) -> Result<(), NaoError> {
        self.transition(ModuleState::Configured)
    }

    /// One periodic update.
    pub fn tick(&mut self) -> Result<(), NaoError> {
        self.transition(ModuleState::Running)
    }

    pub fn interrupt(&mut self) -> Result<(), NaoError> {
        self.transition(ModuleState::Interrupted)
    }

    pub fn close(&mut self) -> Result<(), NaoError> {
        self.transition(ModuleState::Closed)
    }

    fn transition(&mut self, to: ModuleState) -> Result<(), NaoError> {
        use ModuleState::*;
        let from = self.state();
        let allowed = matches!(
            (from, to),
            (Unconfigured, Configured)
                | (Configured | Running, Running)
                | (Configured | Running, Interrupted)
                | (Interrupted, Closed)
        );
        if !allowed {
            return Err(NaoError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if from == to {
            return Ok(());
        }
        if to == Running {
            debug!(module = %self.module, %from, %to, "module state");
        } else {
            info!(module = %self.module, %from, %to, "module state");
        }
        self.history.push(to);
        Ok(())
    }
}
