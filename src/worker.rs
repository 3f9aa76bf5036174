//! The worker side of the subprocess sandbox.
//!
//! A worker process reads one JSON [`WorkerRequest`] from stdin, evaluates the
//! named property in-process, and writes one JSON [`WorkerReply`] to stdout.
//! Anything that kills the worker before the reply is written is observed by
//! the parent as a crash.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::outcome::TestOutcome;
use crate::property::Property;
use crate::sandbox::run_guarded;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub property: String,
    pub input: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerReply {
    pub outcome: TestOutcome,
}

type Handler = Box<dyn Fn(serde_json::Value) -> Result<TestOutcome, WorkerError>>;

/// Properties a worker can evaluate, by name.
#[derive(Default)]
pub struct WorkerRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `property` under its own name. A later registration with the
    /// same name replaces the earlier one.
    pub fn register<T>(&mut self, property: Property<T>) -> &mut Self
    where
        T: DeserializeOwned + 'static,
    {
        let name = property.name().to_string();
        let handler: Handler = Box::new(move |input| {
            let input: T = serde_json::from_value(input)?;
            Ok(run_guarded(&property, &input))
        });
        self.handlers.insert(name, handler);
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn handle(&self, request: WorkerRequest) -> Result<WorkerReply, WorkerError> {
        let handler = self
            .handlers
            .get(&request.property)
            .ok_or_else(|| WorkerError::UnknownProperty(request.property.clone()))?;
        log::debug!("WORKER: evaluating `{}`", request.property);
        let outcome = handler(request.input)?;
        Ok(WorkerReply { outcome })
    }

    /// Serve a single request.
    pub fn serve<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> Result<(), WorkerError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let request: WorkerRequest = serde_json::from_slice(&raw)?;
        let reply = self.handle(request)?;
        serde_json::to_writer(&mut writer, &reply)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
