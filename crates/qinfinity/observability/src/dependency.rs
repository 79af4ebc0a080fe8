//! Dependency health registry. Checkers are polled in the background by
//! the core's lifecycle task; each run races against its timeout.

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::DependencyOptions;
use crate::error::{ObservabilityError, ObservabilityResult};

pub type DependencyChecker =
    Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyStatus {
    pub name: String,
    pub healthy: bool,
    pub critical: bool,
    pub latency_ms: u64,
    pub last_checked_ms: u64,
    pub error: Option<String>,
}

pub(crate) struct RegisteredDependency {
    pub checker: DependencyChecker,
    pub options: DependencyOptions,
    pub last_run_ms: u64,
}

pub struct DependencyRegistry {
    pub(crate) registered: DashMap<String, RegisteredDependency>,
    statuses: DashMap<String, DependencyStatus>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self {
            registered: DashMap::new(),
            statuses: DashMap::new(),
        }
    }

    pub fn register(
        &self,
        name: &str,
        checker: DependencyChecker,
        options: DependencyOptions,
    ) -> ObservabilityResult<()> {
        if self.registered.contains_key(name) {
            return Err(ObservabilityError::DuplicateDependency(name.to_string()));
        }
        self.registered.insert(
            name.to_string(),
            RegisteredDependency {
                checker,
                options,
                last_run_ms: 0,
            },
        );
        Ok(())
    }

    pub fn status(&self, name: &str) -> Option<DependencyStatus> {
        self.statuses.get(name).map(|s| s.clone())
    }

    pub fn statuses(&self) -> Vec<DependencyStatus> {
        self.statuses.iter().map(|s| s.clone()).collect()
    }

    /// Any critical dependency currently unhealthy?
    pub fn critical_down(&self) -> bool {
        self.statuses
            .iter()
            .any(|s| s.critical && !s.healthy)
    }

    /// Run every checker whose interval has elapsed; returns the names that
    /// were polled. `default_interval`/`default_timeout` fill unset options.
    pub async fn poll_due(
        &self,
        now_ms: u64,
        default_interval: Duration,
        default_timeout: Duration,
    ) -> Vec<String> {
        let mut due: Vec<(String, DependencyChecker, Duration, bool)> = Vec::new();
        for mut entry in self.registered.iter_mut() {
            let interval = entry.options.interval.unwrap_or(default_interval);
            if now_ms.saturating_sub(entry.last_run_ms) >= interval.as_millis() as u64 {
                entry.last_run_ms = now_ms;
                due.push((
                    entry.key().clone(),
                    entry.checker.clone(),
                    entry.options.timeout.unwrap_or(default_timeout),
                    entry.options.critical,
                ));
            }
        }

        let mut polled = Vec::with_capacity(due.len());
        let checks = due.into_iter().map(|(name, checker, timeout, critical)| {
            let started = std::time::Instant::now();
            async move {
                let outcome = tokio::time::timeout(timeout, checker()).await;
                let latency_ms = started.elapsed().as_millis() as u64;
                let (healthy, error) = match outcome {
                    Ok(Ok(())) => (true, None),
                    Ok(Err(reason)) => (false, Some(reason)),
                    Err(_) => (
                        false,
                        Some(format!("timed out after {}ms", timeout.as_millis())),
                    ),
                };
                (name, healthy, critical, latency_ms, error)
            }
        });

        for (name, healthy, critical, latency_ms, error) in
            futures::future::join_all(checks).await
        {
            if healthy {
                debug!(dependency = %name, latency_ms, "dependency healthy");
            } else {
                warn!(dependency = %name, latency_ms, error = ?error, "dependency unhealthy");
            }
            self.statuses.insert(
                name.clone(),
                DependencyStatus {
                    name: name.clone(),
                    healthy,
                    critical,
                    latency_ms,
                    last_checked_ms: now_ms,
                    error,
                },
            );
            polled.push(name);
        }
        polled
    }
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
