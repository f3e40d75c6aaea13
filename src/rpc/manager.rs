// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! RPC manager.
//!
//! Owns the ranked endpoint pool and hands out the connection of the best
//! endpoint. Every other subsystem asks the manager for a handle right before
//! using it, so that a failover is picked up transparently.
//!
//! Locking: a single reader/writer lock protects the pool and the best
//! endpoint selection.
//! - `get_best_connection` takes the read lock.
//! - `refresh_all` probes without the lock and takes the write lock only to
//!   store the results and re-rank.
//! - `switch_to_next_best` keeps the write lock across its network probes,
//!   lookups stall until the failover attempt is over.

use super::{
    client::RpcClient,
    connector::Connector,
    endpoint::{self, Endpoint, EndpointStatus},
};
use crate::{
    config::{self, ManagerConfig},
    Error, ErrorKind, Result,
};
use async_std::{sync::RwLock, task};
use futures::future::join_all;
use std::{sync::Arc, time::Duration};

/// Endpoints and best selection, always updated together.
struct Pool {
    /// Ranking order after every refresh.
    endpoints: Vec<Endpoint>,
    /// Index of the best endpoint. When set, that endpoint holds a connection.
    best: Option<usize>,
}

impl Pool {
    fn best(&self) -> Option<&Endpoint> {
        self.best.and_then(|idx| self.endpoints.get(idx))
    }

    fn position(&self, url: &str) -> Option<usize> {
        self.endpoints.iter().position(|e| e.url() == url)
    }

    /// Sort by rank and select the first connected endpoint.
    fn rank(&mut self, target: &str) {
        self.endpoints.sort_by(Endpoint::rank);
        self.best = match self.endpoints.iter().position(|e| e.connection().is_some()) {
            Some(0) => Some(0),
            Some(idx) => {
                warn!(
                    target: target,
                    "[rpc] top ranked endpoint {} has no connection, selecting {}",
                    self.endpoints[0].url(),
                    self.endpoints[idx].url()
                );
                Some(idx)
            }
            None => {
                warn!(target: target, "[rpc] no endpoint holds a connection");
                None
            }
        };
    }
}

/// Ranked pool of RPC endpoints with failover.
pub struct RpcManager {
    pool: RwLock<Pool>,
    connector: Arc<dyn Connector>,
    probe_timeout: Duration,
    target: String,
}

impl RpcManager {
    /// Build the pool from `endpoints.json` (plus the configured provider)
    /// and run the first probe cycle.
    pub async fn init(config: &ManagerConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let path = config::endpoints_path(config.home.as_deref());
        let urls = config::load_endpoints(&path)?;
        Self::from_urls(urls, config, connector).await
    }

    /// Build the pool from an explicit list (plus the configured provider)
    /// and run the first probe cycle.
    ///
    /// Fails if the list is empty or if no endpoint answers.
    pub async fn from_urls(
        urls: Vec<String>,
        config: &ManagerConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let mut urls = config::normalize(urls);
        if config::merge_provider(&mut urls, config.provider.as_deref()) {
            debug!(
                target: config.log_target.as_str(),
                "[rpc] added runtime provider to the endpoints list"
            );
        }
        if urls.is_empty() {
            return Err(Error::new_ext(
                ErrorKind::BadConfiguration,
                "empty endpoints list",
            ));
        }

        let manager = RpcManager {
            pool: RwLock::new(Pool {
                endpoints: urls.into_iter().map(Endpoint::new).collect(),
                best: None,
            }),
            connector,
            probe_timeout: config.probe_timeout,
            target: config.log_target.clone(),
        };

        let live = manager.refresh_all().await;
        if live == 0 {
            return Err(Error::new_ext(
                ErrorKind::NoUsableEndpoint,
                "no endpoint answered the initial probe",
            ));
        }
        Ok(manager)
    }

    /// Connection of the current best endpoint.
    pub async fn get_best_connection(&self) -> Result<RpcClient> {
        self.pool
            .read()
            .await
            .best()
            .and_then(|e| e.connection().cloned())
            .ok_or_else(|| {
                Error::new_ext(ErrorKind::ResourceNotFound, "no best connection available")
            })
    }

    pub async fn best_url(&self) -> Option<String> {
        self.pool.read().await.best().map(|e| e.url().to_owned())
    }

    /// Endpoints snapshot, in ranking order.
    pub async fn endpoints(&self) -> Vec<EndpointStatus> {
        self.pool
            .read()
            .await
            .endpoints
            .iter()
            .map(Endpoint::status)
            .collect()
    }

    /// Probe every endpoint concurrently, then re-rank the pool.
    /// Returns the number of endpoints that answered.
    ///
    /// Failed probes are logged and leave the endpoint metrics untouched.
    pub async fn refresh_all(&self) -> usize {
        let target = self.target.as_str();
        let urls: Vec<String> = self
            .pool
            .read()
            .await
            .endpoints
            .iter()
            .map(|e| e.url().to_owned())
            .collect();

        let handles = urls.into_iter().map(|url| {
            let connector = self.connector.clone();
            let timeout = self.probe_timeout;
            task::spawn(async move {
                let res = endpoint::probe(connector.as_ref(), &url, timeout).await;
                (url, res)
            })
        });
        let results = join_all(handles).await;

        let mut pool = self.pool.write().await;
        let mut live = 0;
        for (url, res) in results {
            match res {
                Ok(probe) => {
                    debug!(
                        target: target,
                        "[rpc] {}: height {}, latency {:.3}s",
                        url,
                        probe.block_number,
                        probe.latency
                    );
                    if let Some(idx) = pool.position(&url) {
                        pool.endpoints[idx].apply(probe);
                        live += 1;
                    }
                }
                Err(err) => {
                    error!(
                        target: target,
                        "[rpc] probe of {} failed: {}",
                        url,
                        err.to_string_full()
                    );
                }
            }
        }
        pool.rank(target);
        if let Some(best) = pool.best() {
            debug!(
                target: target,
                "[rpc] best endpoint: {} (height {})",
                best.url(),
                best.block_number()
            );
        }
        live
    }

    /// Fail over to the next endpoint that answers a fresh probe.
    ///
    /// Candidates are tried once each, in round-robin order starting right
    /// after the current best. Returns `Ok(false)` when there is nothing to
    /// switch to; the current best is kept in that case.
    pub async fn switch_to_next_best(&self) -> Result<bool> {
        let target = self.target.as_str();
        let mut pool = self.pool.write().await;

        let count = pool.endpoints.len();
        if count < 2 {
            debug!(target: target, "[rpc] single endpoint, nothing to switch to");
            return Ok(false);
        }
        let current = pool.best.filter(|idx| *idx < count).ok_or_else(|| {
            Error::new_ext(
                ErrorKind::ResourceNotFound,
                "current best endpoint not found in the pool",
            )
        })?;
        let current_url = pool.endpoints[current].url().to_owned();

        for offset in 1..count {
            let idx = (current + offset) % count;
            let url = pool.endpoints[idx].url().to_owned();
            match endpoint::probe(self.connector.as_ref(), &url, self.probe_timeout).await {
                Ok(probe) => {
                    info!(
                        target: target,
                        "[rpc] switched from {} to {} (height {})",
                        current_url,
                        url,
                        probe.block_number
                    );
                    pool.endpoints[idx].apply(probe);
                    pool.best = Some(idx);
                    return Ok(true);
                }
                Err(err) => {
                    warn!(
                        target: target,
                        "[rpc] failover candidate {} unavailable: {}",
                        url,
                        err.to_string_full()
                    );
                }
            }
        }

        warn!(
            target: target,
            "[rpc] no alternative endpoint available, keeping {}", current_url
        );
        Ok(false)
    }
}
