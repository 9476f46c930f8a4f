//! HTTP sessions used by virtual users

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RequestError, Result, StormError};
use crate::task::Task;

/// One user's connection to the target host.
///
/// A session is opened when a virtual user starts and dropped when it
/// exits; sessions are never shared between users.
#[async_trait]
pub trait HttpSession: Send + Sync {
    /// Issue the call described by `task` against `url` and wait until the
    /// response body has been fully received
    async fn send(&self, task: &Task, url: &str) -> std::result::Result<(), RequestError>;
}

/// Opens a fresh [`HttpSession`] per virtual user
pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn HttpSession>>;
}

/// Sessions backed by a dedicated `reqwest::Client` each
#[derive(Debug, Clone)]
pub struct ReqwestSessionFactory {
    timeout: Duration,
}

impl ReqwestSessionFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SessionFactory for ReqwestSessionFactory {
    fn open(&self) -> Result<Box<dyn HttpSession>> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| StormError::Session(e.to_string()))?;

        Ok(Box::new(ReqwestSession { client }))
    }
}

/// Session holding its own connection pool
pub struct ReqwestSession {
    client: reqwest::Client,
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn send(&self, task: &Task, url: &str) -> std::result::Result<(), RequestError> {
        let method = reqwest::Method::from_bytes(task.method().as_bytes())
            .map_err(|e| RequestError::Method(e.to_string()))?;

        let mut request = self.client.request(method, url);
        for (name, value) in task.headers() {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = task.body() {
            request = request.json(body);
        }

        // Status codes are not inspected; any complete response counts
        let response = request.send().await?;
        response.bytes().await?;

        Ok(())
    }
}
