//! Load generation engine

use std::sync::Arc;
use std::time::Duration;

use tokio::task::{JoinError, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info};

use crate::client::{ReqwestSessionFactory, SessionFactory};
use crate::environment::Environment;
use crate::error::{Result, StormError};
use crate::metrics::{Metrics, Snapshot};
use crate::report::{report_metrics, SnapshotSink, TableSink};
use crate::user::User;

/// Drives one load test run.
///
/// Ramp-up and reporting run side by side until the deadline. The first
/// fault in either of them (or in any spawned user) cancels everything
/// else and is returned from [`Runner::start`].
pub struct Runner {
    environment: Arc<Environment>,
    metrics: Arc<Metrics>,
    factory: Arc<dyn SessionFactory>,
    sink: Arc<dyn SnapshotSink>,
}

impl Runner {
    /// Runner issuing real HTTP requests and printing tables to stdout
    pub fn new(environment: Environment) -> Result<Self> {
        let factory = ReqwestSessionFactory::new(environment.request_timeout);
        Self::with_parts(environment, Arc::new(factory), Arc::new(TableSink::stdout()))
    }

    pub fn with_parts(
        environment: Environment,
        factory: Arc<dyn SessionFactory>,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<Self> {
        environment.validate()?;

        Ok(Self {
            environment: Arc::new(environment),
            metrics: Arc::new(Metrics::new()),
            factory,
            sink,
        })
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    /// Run until the configured duration has elapsed and return the final snapshot.
    ///
    /// Every configured user is spawned even when the ramp-up takes longer
    /// than `duration`; users spawned after the deadline exit immediately,
    /// so the run then returns once the last spawn has happened.
    pub async fn start(&self) -> Result<Snapshot> {
        let end_time = Instant::now() + self.environment.duration;

        info!(
            "Starting load test against {}: {} users at {} users/s for {:.1}s",
            self.environment.host,
            self.environment.user_count,
            self.environment.spawn_rate,
            self.environment.duration.as_secs_f64()
        );

        let outcome = tokio::try_join!(
            self.spawn_users(end_time),
            report_metrics(
                &self.metrics,
                self.sink.as_ref(),
                end_time,
                self.environment.report_interval,
            ),
        );
        if let Err(e) = outcome {
            error!("Load test aborted: {}", e);
            return Err(e);
        }

        let snapshot = self.metrics.snapshot();
        self.sink.render(&snapshot)?;

        info!(
            "Load test complete: {} requests, {} failures",
            snapshot.total.requests, snapshot.total.failures
        );
        Ok(snapshot)
    }

    /// Spawn `user_count` users, one every `1 / spawn_rate` seconds, and
    /// wait for all of them to reach the deadline
    async fn spawn_users(&self, end_time: Instant) -> Result<()> {
        let mut users = JoinSet::new();
        let interval = self.environment.spawn_interval();

        for index in 0..self.environment.user_count {
            if index > 0 {
                Self::pause(&mut users, interval).await?;
            }

            let user = User::new(index, self.environment.clone(), self.factory.clone());
            users.spawn(user.run(end_time, self.metrics.clone()));
            debug!(user = index, "Spawned virtual user");
        }

        info!("All {} users spawned", self.environment.user_count);

        while let Some(result) = users.join_next().await {
            Self::check(result)?;
        }
        Ok(())
    }

    /// Sleep between two spawns while still watching running users for faults
    async fn pause(users: &mut JoinSet<Result<()>>, delay: Duration) -> Result<()> {
        let wake = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(wake) => return Ok(()),
                Some(result) = users.join_next() => Self::check(result)?,
            }
        }
    }

    fn check(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
        match result {
            Ok(outcome) => outcome,
            Err(e) => Err(StormError::UserAborted(e.to_string())),
        }
    }
}
