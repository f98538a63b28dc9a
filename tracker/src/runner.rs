//! Owns one [`Simulator`] on a single task.
//!
//! Control calls, clock ticks and the in-flight route fetch are all handled
//! by one `select!` loop, so the simulator never needs a lock. Control calls
//! win over ticks: once `stop` returns, no further tick is applied.

use std::{future::Future, pin::Pin, sync::Arc};

use rand::{Rng, SeedableRng};
use rand_xorshift::XorShiftRng;
use tokio::sync::{mpsc, oneshot, watch};

use crate::clock::Clock;
use crate::config::GeneratorConfig;
use crate::models::{GeneratedRoute, GeoPoint};
use crate::osrm::RoadRouter;
use crate::routing::generate_route;
use crate::simulator::{RunTicket, SimulationError, Simulator, Snapshot, StartError};

const COMMAND_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A run was already Starting or Running; nothing changed.
    AlreadyActive,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RunnerError {
    #[error(transparent)]
    Start(#[from] StartError),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("simulation task has shut down")]
    Closed,
}

type StartReply = oneshot::Sender<Result<StartOutcome, StartError>>;

enum Command {
    Start(StartReply),
    Stop(oneshot::Sender<bool>),
    Reset(GeoPoint, oneshot::Sender<()>),
    SetSpeed(f64, oneshot::Sender<Result<(), SimulationError>>),
    SetTarget(f64, oneshot::Sender<Result<(), SimulationError>>),
    SetDestination(Option<GeoPoint>, oneshot::Sender<Result<(), SimulationError>>),
}

struct PendingStart {
    ticket: RunTicket,
    reply: StartReply,
    fetch: Pin<Box<dyn Future<Output = GeneratedRoute> + Send>>,
}

/// Cheap, cloneable control surface of a running simulation task.
#[derive(Clone)]
pub struct SimulationHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SimulationHandle {
    /// Spawn the simulation task on the current tokio runtime.
    pub fn spawn<C: Clock + 'static>(
        sim: Simulator,
        clock: C,
        router: Arc<dyn RoadRouter>,
        generator: GeneratorConfig,
        seed: u64,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshots_tx, snapshots_rx) = watch::channel(sim.snapshot());

        let runner = Runner {
            sim,
            clock,
            router,
            generator,
            rng: XorShiftRng::seed_from_u64(seed),
            commands: commands_rx,
            snapshots: snapshots_tx,
            pending: None,
        };
        tokio::spawn(runner.run());

        Self {
            commands: commands_tx,
            snapshots: snapshots_rx,
        }
    }

    /// Generate a route and begin ticking.
    ///
    /// Resolves once the route is committed, or with the reason it was not.
    /// Calling it while a run is active is a no-op.
    pub async fn start(&self) -> Result<StartOutcome, RunnerError> {
        Ok(self.request(Command::Start).await??)
    }

    /// Returns whether a run was actually halted.
    pub async fn stop(&self) -> Result<bool, RunnerError> {
        self.request(Command::Stop).await
    }

    pub async fn reset(&self, origin: GeoPoint) -> Result<(), RunnerError> {
        self.request(|reply| Command::Reset(origin, reply)).await
    }

    pub async fn set_speed(&self, speed_mps: f64) -> Result<(), RunnerError> {
        Ok(self.request(|reply| Command::SetSpeed(speed_mps, reply)).await??)
    }

    pub async fn set_target(&self, target_m: f64) -> Result<(), RunnerError> {
        Ok(self.request(|reply| Command::SetTarget(target_m, reply)).await??)
    }

    pub async fn set_destination(&self, destination: Option<GeoPoint>) -> Result<(), RunnerError> {
        Ok(self
            .request(|reply| Command::SetDestination(destination, reply))
            .await??)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RunnerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| RunnerError::Closed)?;
        response.await.map_err(|_| RunnerError::Closed)
    }
}

struct Runner<C> {
    sim: Simulator,
    clock: C,
    router: Arc<dyn RoadRouter>,
    generator: GeneratorConfig,
    rng: XorShiftRng,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    pending: Option<PendingStart>,
}

impl<C: Clock> Runner<C> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                generated = wait_for_route(&mut self.pending) => self.finish_start(generated),
                dt = self.clock.tick(), if self.sim.is_running() => self.on_tick(dt),
            }
        }
        tracing::debug!("simulation task finished");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Start(reply) => self.begin_start(reply),
            Command::Stop(reply) => {
                let stopped = self.sim.stop();
                self.cancel_pending();
                self.publish();
                let _ = reply.send(stopped);
            }
            Command::Reset(origin, reply) => {
                self.sim.reset(origin);
                self.cancel_pending();
                self.publish();
                let _ = reply.send(());
            }
            Command::SetSpeed(speed, reply) => {
                let result = self.sim.set_speed(speed);
                self.publish();
                let _ = reply.send(result);
            }
            Command::SetTarget(target, reply) => {
                let result = self.sim.set_target(target);
                self.publish();
                let _ = reply.send(result);
            }
            Command::SetDestination(destination, reply) => {
                let result = self.sim.set_destination(destination);
                self.publish();
                let _ = reply.send(result);
            }
        }
    }

    fn begin_start(&mut self, reply: StartReply) {
        let Some(ticket) = self.sim.begin_start() else {
            let _ = reply.send(Ok(StartOutcome::AlreadyActive));
            return;
        };

        let router = Arc::clone(&self.router);
        let config = self.generator;
        let mut rng = XorShiftRng::seed_from_u64(self.rng.gen());
        let (origin, target_m, destination) = (ticket.origin, ticket.target_m, ticket.destination);
        let fetch = Box::pin(async move {
            generate_route(router.as_ref(), &mut rng, origin, target_m, destination, &config).await
        });

        self.pending = Some(PendingStart {
            ticket,
            reply,
            fetch,
        });
        self.publish();
    }

    fn finish_start(&mut self, generated: GeneratedRoute) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        let result = self.sim.commit_start(&pending.ticket, generated);
        match &result {
            Ok(()) => self.clock.restart(),
            Err(err) => tracing::warn!("unable to start movement: {err}"),
        }
        self.publish();
        let _ = pending.reply.send(result.map(|()| StartOutcome::Started));
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            tracing::debug!("dropping in-flight route generation");
            let _ = pending.reply.send(Err(StartError::Cancelled));
        }
    }

    fn on_tick(&mut self, dt: f64) {
        if self.sim.tick(dt).is_some() {
            self.publish();
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.sim.snapshot());
    }
}

async fn wait_for_route(pending: &mut Option<PendingStart>) -> GeneratedRoute {
    match pending {
        Some(pending) => (&mut pending.fetch).await,
        None => std::future::pending().await,
    }
}
