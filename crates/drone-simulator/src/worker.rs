//! Dedicated-thread host for a [`SimulationEngine`].
//!
//! The worker moves the engine onto its own OS thread, which runs a
//! single-threaded tokio runtime for the tick loop. Commands from the owning
//! thread are queued to the engine and applied between ticks.

use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;

use crate::engine::{EngineCommand, SimulationEngine};
use crate::error::{Result, SimError};
use crate::events::EventSink;
use crate::policy::MotionPolicy;

struct OwnedSimulator {
    drone_id: String,
    commands: mpsc::UnboundedSender<EngineCommand>,
    thread: JoinHandle<Option<SimulationEngine>>,
}

/// Owns at most one running simulator and the thread it ticks on.
///
/// Dropping the worker stops and joins the thread.
pub struct EngineWorker {
    events: EventSink,
    owned: Option<OwnedSimulator>,
}

impl EngineWorker {
    pub fn new(events: EventSink) -> Self {
        Self { events, owned: None }
    }

    /// Whether a simulator is currently owned.
    pub fn is_running(&self) -> bool {
        self.owned.is_some()
    }

    /// Take ownership of `engine` and start ticking it on a new thread.
    ///
    /// Returns `Ok(false)` without touching `engine` if a simulator is
    /// already owned. Blocks until the thread confirms the engine started.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread or its runtime cannot be created.
    pub fn start_simulator(&mut self, engine: SimulationEngine) -> Result<bool> {
        if let Some(owned) = &self.owned {
            tracing::warn!(
                drone_id = %owned.drone_id,
                "Simulator already owned, ignoring start"
            );
            return Ok(false);
        }

        let drone_id = engine.id().to_string();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (started_tx, started_rx) = std_mpsc::sync_channel(1);
        let (boot_tx, boot_rx) = std_mpsc::sync_channel::<std::io::Error>(1);

        let thread = thread::Builder::new()
            .name(format!("sim-{drone_id}"))
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        let _ = boot_tx.send(e);
                        return None;
                    }
                };
                Some(runtime.block_on(engine.run(cmd_rx, started_tx)))
            })
            .map_err(SimError::ThreadSpawn)?;

        if started_rx.recv().is_err() {
            let _ = thread.join();
            return Err(match boot_rx.try_recv() {
                Ok(e) => SimError::Runtime(e),
                Err(_) => SimError::WorkerStartup,
            });
        }

        tracing::info!(drone_id = %drone_id, "Simulation thread started");
        self.events.notice("worker: thread started");

        self.owned = Some(OwnedSimulator {
            drone_id,
            commands: cmd_tx,
            thread,
        });
        Ok(true)
    }

    /// Queue a policy swap. Returns `false` if no simulator is owned.
    pub fn set_policy(&self, policy: Option<MotionPolicy>) -> bool {
        self.send(EngineCommand::SetPolicy(policy))
    }

    /// Queue a failure-mode toggle. Returns `false` if no simulator is owned.
    pub fn set_failure_mode(&self, enabled: bool) -> bool {
        self.send(EngineCommand::SetFailureMode(enabled))
    }

    fn send(&self, command: EngineCommand) -> bool {
        match &self.owned {
            Some(owned) => owned.commands.send(command).is_ok(),
            None => false,
        }
    }

    /// Stop the owned simulator, wait for its thread to exit and release it.
    ///
    /// Blocks until the engine acknowledges it is idle and the thread has been
    /// joined. Returns the stopped engine, or `None` if nothing was owned or
    /// the thread panicked. Calling this again is a no-op.
    pub fn stop_simulator(&mut self) -> Option<SimulationEngine> {
        let owned = self.owned.take()?;

        let (ack_tx, ack_rx) = std_mpsc::channel();
        if owned.commands.send(EngineCommand::Stop { ack: ack_tx }).is_ok() {
            // Err here means the loop already exited; the join below still waits.
            let _ = ack_rx.recv();
        }
        drop(owned.commands);

        let engine = match owned.thread.join() {
            Ok(engine) => engine,
            Err(_) => {
                tracing::error!(drone_id = %owned.drone_id, "Simulation thread panicked");
                None
            }
        };

        tracing::info!(drone_id = %owned.drone_id, "Simulation thread stopped");
        self.events.notice("worker: thread stopped");
        engine
    }
}

impl Drop for EngineWorker {
    fn drop(&mut self) {
        self.stop_simulator();
    }
}
