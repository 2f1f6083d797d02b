//! Article-existence status resolver
//!
//! Partitions canonical names into "has external article" and "missing
//! external article" by querying an injected existence-check collaborator.
//! Lookups run concurrently under a bounded worker pool with a per-name
//! timeout; a failed or timed-out lookup classifies the name as missing
//! and records the failure, never aborting the batch.

use crate::config::ExistenceConfig;
use anyhow::{bail, Context};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Capability to check whether an external article exists for a canonical
/// name.
#[async_trait]
pub trait ArticleExistence: Send + Sync {
    async fn exists(&self, canonical_name: &str) -> anyhow::Result<bool>;
}

/// Result of one status-resolution pass.
///
/// `existing` and `missing` are disjoint and their union is the input name
/// set; names whose lookup failed appear in `missing` with the failure
/// reason in `failures`.
#[derive(Debug, Clone, Default)]
pub struct StatusPartition {
    pub existing: BTreeSet<String>,
    pub missing: BTreeSet<String>,
    pub failures: BTreeMap<String, String>,
}

pub struct StatusResolver {
    checker: Arc<dyn ArticleExistence>,
    concurrency: usize,
    lookup_timeout: Duration,
}

impl StatusResolver {
    pub fn new(
        checker: Arc<dyn ArticleExistence>,
        concurrency: usize,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            checker,
            concurrency: concurrency.max(1),
            lookup_timeout,
        }
    }

    /// Resolve the article status of every name.
    ///
    /// Each lookup runs as its own task so one slow name cannot block the
    /// others beyond pool capacity.
    pub async fn resolve(&self, names: &[String]) -> StatusPartition {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(names.len());

        for name in names {
            let name = name.clone();
            let checker = Arc::clone(&self.checker);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.lookup_timeout;
            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (name, Err(format!("worker pool closed: {}", e))),
                };
                match tokio::time::timeout(timeout, checker.exists(&name)).await {
                    Ok(Ok(exists)) => (name, Ok(exists)),
                    Ok(Err(e)) => (name, Err(e.to_string())),
                    Err(_) => (name, Err(format!("lookup timed out after {:?}", timeout))),
                }
            }));
        }

        let mut partition = StatusPartition::default();
        for (name, handle) in names.iter().zip(handles) {
            match handle.await {
                Ok((name, Ok(true))) => {
                    partition.existing.insert(name);
                }
                Ok((name, Ok(false))) => {
                    partition.missing.insert(name);
                }
                Ok((name, Err(reason))) => {
                    warn!("Existence lookup failed for '{}': {}", name, reason);
                    partition.failures.insert(name.clone(), reason);
                    partition.missing.insert(name);
                }
                // a panicked lookup task is a per-name failure like any
                // other: the name still classifies as missing
                Err(e) => {
                    let reason = format!("lookup task failed: {}", e);
                    warn!("Existence lookup failed for '{}': {}", name, reason);
                    partition.failures.insert(name.clone(), reason);
                    partition.missing.insert(name.clone());
                }
            }
        }

        info!(
            "Status resolution: {} existing, {} missing ({} lookup failures)",
            partition.existing.len(),
            partition.missing.len(),
            partition.failures.len()
        );
        partition
    }
}

/// Existence check against a wiki REST page-summary endpoint.
///
/// HTTP 200 means the article exists, 404 means it is missing, anything
/// else is a transient failure for the resolver to downgrade.
pub struct WikipediaChecker {
    client: reqwest::Client,
    language: String,
}

impl WikipediaChecker {
    pub fn new(config: &ExistenceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.lookup_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to create HTTP client for existence checks")?;
        Ok(Self {
            client,
            language: config.language.clone(),
        })
    }
}

#[async_trait]
impl ArticleExistence for WikipediaChecker {
    async fn exists(&self, canonical_name: &str) -> anyhow::Result<bool> {
        let title = canonical_name.replace(' ', "_");
        let url = format!(
            "https://{}.wikipedia.org/api/rest_v1/page/summary/{}",
            self.language, title
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request failed for '{}'", canonical_name))?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            status => bail!("unexpected status {} for '{}'", status, canonical_name),
        }
    }
}
