//! Virtual users

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tokio::time::Instant;
use tracing::debug;

use crate::client::SessionFactory;
use crate::environment::Environment;
use crate::error::{Result, StormError};
use crate::metrics::Metrics;

/// One simulated client issuing requests back to back until the deadline
pub struct User {
    index: usize,
    environment: Arc<Environment>,
    factory: Arc<dyn SessionFactory>,
}

impl User {
    pub fn new(
        index: usize,
        environment: Arc<Environment>,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            index,
            environment,
            factory,
        }
    }

    /// Issue randomly chosen requests until `end_time`.
    ///
    /// The deadline is only checked between requests; a request in flight
    /// when it passes is allowed to finish. Request failures are counted and
    /// never end the loop. Only a session that cannot be opened is an error.
    pub async fn run(self, end_time: Instant, metrics: Arc<Metrics>) -> Result<()> {
        let session = self.factory.open()?;
        let mut rng = StdRng::from_entropy();
        let mut iterations = 0u64;

        while Instant::now() < end_time {
            let task = self
                .environment
                .tasks
                .choose(&mut rng)
                .ok_or(StormError::EmptyTaskList)?;
            let url = task.url(&self.environment.host);

            let start = Instant::now();
            match session.send(task, &url).await {
                Ok(()) => {
                    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                    metrics.log_request(task.method(), task.path(), latency_ms);
                }
                Err(e) => {
                    debug!(user = self.index, url = %url, "Request failed: {}", e);
                    metrics.log_error(task.method(), task.path());
                }
            }
            iterations += 1;
        }

        debug!(user = self.index, iterations, "Virtual user finished");
        Ok(())
    }
}
