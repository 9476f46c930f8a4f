//! # Stormlight
//!
//! Virtual-user HTTP load generation with live per-endpoint statistics.
//!
//! ## Features
//!
//! - **Linear Ramp-Up**: users spawned at a fixed rate until the target population
//! - **Random Request Mix**: each user picks request templates uniformly at random
//! - **Live Metrics**: RPS, median, average, min/max and failures per endpoint
//! - **Structured Concurrency**: any fault outside a single request aborts the run
//!
//! ## Usage
//!
//! ```bash
//! stormlight --host http://127.0.0.1:8000 --users 10 --spawn-rate 5 --duration 30
//! ```
//!
//! ```no_run
//! use std::time::Duration;
//! use stormlight::{Environment, Runner, Task};
//!
//! # async fn run() -> stormlight::Result<()> {
//! let environment = Environment::new("http://127.0.0.1:8000", vec![Task::new("get", "/hello")])
//!     .with_users(10)
//!     .with_spawn_rate(5.0)
//!     .with_duration(Duration::from_secs(30));
//!
//! let snapshot = Runner::new(environment)?.start().await?;
//! println!("{} requests", snapshot.total.requests);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod environment;
pub mod error;
pub mod metrics;
pub mod report;
pub mod runner;
pub mod script;
pub mod task;
pub mod user;

pub use client::{HttpSession, ReqwestSessionFactory, SessionFactory};
pub use environment::Environment;
pub use error::{RequestError, Result, StormError};
pub use metrics::{Metrics, MetricsEntry, Snapshot, SnapshotRow};
pub use report::{render_table, report_metrics, SnapshotSink, TableSink};
pub use runner::Runner;
pub use script::load_tasks;
pub use task::Task;
pub use user::User;
