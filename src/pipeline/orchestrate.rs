// src/pipeline/orchestrate.rs

//! Multi-environment orchestration.
//!
//! Environments run one after another, each with its own fetcher. A run that
//! fails to start or panics becomes a crashed [`RunResult`] and the remaining
//! environments still run.

use std::any::Any;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{Config, Environment, RunResult, Summary};
use crate::pipeline::observer::RunObserver;
use crate::pipeline::paginate::{Clock, PaginationController};
use crate::services::FetcherFactory;

/// Results of every environment plus their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub results: Vec<RunResult>,
    pub summary: Summary,
}

/// Runs the probe once per environment.
pub struct RunOrchestrator {
    config: Arc<Config>,
    factory: Arc<dyn FetcherFactory>,
    observer: Arc<dyn RunObserver>,
    clock: Clock,
}

impl RunOrchestrator {
    pub fn new(
        config: Arc<Config>,
        factory: Arc<dyn FetcherFactory>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            config,
            factory,
            observer,
            clock: Utc::now,
        }
    }

    /// Replace the clock handed to every controller.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run every environment in order and summarize.
    pub async fn run_all(&self, environments: &[Environment]) -> ProbeOutcome {
        let mut results = Vec::with_capacity(environments.len());
        for environment in environments {
            results.push(self.run_one(environment).await);
        }

        let summary = Summary::from_results(&results);
        ProbeOutcome { results, summary }
    }

    /// Run a single environment. Never fails; crashes become results.
    pub async fn run_one(&self, environment: &Environment) -> RunResult {
        let started_at = Utc::now();

        let fetcher = match self.factory.create(environment) {
            Ok(fetcher) => fetcher,
            Err(error) => {
                let result = RunResult::crashed(
                    environment.id.clone(),
                    format!("could not start environment: {error}"),
                    started_at,
                );
                self.observer.run_finished(&result);
                return result;
            }
        };

        let controller = PaginationController::new(
            fetcher,
            Arc::clone(&self.config),
            environment.id.clone(),
            Arc::clone(&self.observer),
        )
        .with_clock(self.clock);

        match tokio::spawn(controller.run()).await {
            Ok(result) => result,
            Err(error) => {
                let message = if error.is_panic() {
                    format!("run panicked: {}", panic_message(error.into_panic()))
                } else {
                    format!("run was cancelled: {error}")
                };
                let result = RunResult::crashed(environment.id.clone(), message, started_at);
                self.observer.run_finished(&result);
                result
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
