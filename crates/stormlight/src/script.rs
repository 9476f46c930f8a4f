//! Endpoint definition files
//!
//! ```toml
//! [[endpoints]]
//! method = "GET"
//! path = "/hello"
//! headers = { "Content-Type" = "application/json" }
//!
//! [[endpoints]]
//! method = "post"
//! path = "/api/upload"
//! body = { name = "test", price = 10 }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, StormError};
use crate::task::Task;

#[derive(Deserialize)]
struct EndpointFile {
    endpoints: Option<Vec<Task>>,
}

/// Read the request templates defined in `path`
pub fn load_tasks(path: impl AsRef<Path>) -> Result<Vec<Task>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(StormError::ScriptNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    parse_tasks(&content, &path.display().to_string())
}

/// Parse endpoint definitions; `origin` names the source in error messages
pub fn parse_tasks(content: &str, origin: &str) -> Result<Vec<Task>> {
    let file: EndpointFile = toml::from_str(content).map_err(|e| StormError::ScriptParse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;

    let tasks = file.endpoints.ok_or_else(|| StormError::ScriptParse {
        path: origin.to_string(),
        reason: "the file must define an 'endpoints' array".to_string(),
    })?;

    if tasks.is_empty() {
        return Err(StormError::EmptyTaskList);
    }
    Ok(tasks)
}
