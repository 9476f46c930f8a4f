//! Request templates

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One HTTP call a virtual user may issue.
///
/// The method is upper-cased on construction so `get` and `GET` land in the
/// same metrics row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskDef")]
pub struct Task {
    method: String,
    path: String,
    body: Option<serde_json::Value>,
    headers: BTreeMap<String, String>,
}

/// Wire shape of a task in the endpoint file
#[derive(Deserialize)]
struct TaskDef {
    method: String,
    path: String,
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl From<TaskDef> for Task {
    fn from(def: TaskDef) -> Self {
        Task::new(def.method, def.path)
            .with_headers(def.headers)
            .with_optional_body(def.body)
    }
}

impl Task {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            path: path.into(),
            body: None,
            headers: BTreeMap::new(),
        }
    }

    /// Attach a JSON body
    pub fn with_body(self, body: serde_json::Value) -> Self {
        self.with_optional_body(Some(body))
    }

    fn with_optional_body(mut self, body: Option<serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Full request URL against `host`
    pub fn url(&self, host: &str) -> String {
        let host = host.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{}{}", host, self.path)
        } else {
            format!("{}/{}", host, self.path)
        }
    }
}
