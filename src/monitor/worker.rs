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

use crate::{
    channel::StopReceiver,
    config::MonitorConfig,
    rpc::{BlockHeader, RpcClient, RpcManager},
    Result,
};
use async_std::task;
use futures::future::{self, Either};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// What a single poll observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Header fetch failed, nothing else was checked.
    FetchFailed,
    /// No condition triggered.
    Healthy,
    /// Height went backwards, a switch was attempted.
    Regressed { switched: bool },
    /// Latest block older than the threshold, a switch was attempted.
    Stale { switched: bool },
}

/// Block monitor.
pub struct BlockMonitor {
    manager: Arc<RpcManager>,
    /// Handle polled by the monitor, refreshed from the manager after a switch.
    connection: Mutex<RpcClient>,
    /// Last accepted header.
    latest_header: Mutex<Option<BlockHeader>>,
    check_interval: Duration,
    /// Zero disables the staleness check.
    stale_threshold: Duration,
    target: String,
}

impl BlockMonitor {
    /// Create a monitor polling the current best connection of `manager`.
    pub async fn new(manager: Arc<RpcManager>, config: &MonitorConfig) -> Result<Self> {
        let connection = manager.get_best_connection().await?;
        Ok(BlockMonitor {
            manager,
            connection: Mutex::new(connection),
            latest_header: Mutex::new(None),
            check_interval: config.check_interval,
            stale_threshold: config.stale_threshold,
            target: config.log_target.clone(),
        })
    }

    pub fn latest_header(&self) -> Option<BlockHeader> {
        *self.latest_header.lock()
    }

    pub fn connection(&self) -> RpcClient {
        self.connection.lock().clone()
    }

    pub fn manager(&self) -> &Arc<RpcManager> {
        &self.manager
    }

    /// Log target of this instance.
    pub fn log_target(&self) -> &str {
        &self.target
    }

    /// Run one poll: fetch, regression check, update, staleness check.
    pub async fn tick(&self) -> TickOutcome {
        let target = self.target.as_str();
        let connection = self.connection();

        let header = match connection.latest_header().await {
            Ok(header) => header,
            Err(err) => {
                error!(
                    target: target,
                    "[monitor] cannot fetch latest block from {}: {}",
                    connection.url(),
                    err.to_string_full()
                );
                return TickOutcome::FetchFailed;
            }
        };

        let previous = self.latest_header();
        if let Some(previous) = previous {
            if header.number < previous.number {
                warn!(
                    target: target,
                    "[monitor] block {} from {} is behind recorded block {}, switching endpoint",
                    header.number,
                    connection.url(),
                    previous.number
                );
                let switched = self.switch().await;
                return TickOutcome::Regressed { switched };
            }
        }
        if previous.map(|h| h.number) != Some(header.number) {
            *self.latest_header.lock() = Some(header);
        }

        if let Some(age) = self.stale_age(SystemTime::now()) {
            warn!(
                target: target,
                "[monitor] latest block from {} is {}s old, switching endpoint",
                connection.url(),
                age.as_secs()
            );
            let switched = self.switch().await;
            return TickOutcome::Stale { switched };
        }
        TickOutcome::Healthy
    }

    /// Age of the latest block when it reaches the threshold.
    /// Timestamps that cannot be represented count as age zero.
    fn stale_age(&self, now: SystemTime) -> Option<Duration> {
        if self.stale_threshold.is_zero() {
            return None;
        }
        let header = self.latest_header()?;
        let produced = UNIX_EPOCH.checked_add(Duration::from_secs(header.timestamp))?;
        let age = now.duration_since(produced).unwrap_or_default();
        (age >= self.stale_threshold).then(|| age)
    }

    /// Ask the manager for a failover and pick up the new connection.
    async fn switch(&self) -> bool {
        let target = self.target.as_str();
        match self.manager.switch_to_next_best().await {
            Ok(true) => match self.manager.get_best_connection().await {
                Ok(connection) => {
                    info!(
                        target: target,
                        "[monitor] now polling {}",
                        connection.url()
                    );
                    *self.connection.lock() = connection;
                    true
                }
                Err(err) => {
                    error!(
                        target: target,
                        "[monitor] cannot refresh connection: {}",
                        err.to_string_full()
                    );
                    false
                }
            },
            Ok(false) => {
                warn!(target: target, "[monitor] endpoint switch did not happen");
                false
            }
            Err(err) => {
                warn!(
                    target: target,
                    "[monitor] endpoint switch failed: {}",
                    err.to_string_full()
                );
                false
            }
        }
    }

    /// Poll every `check_interval` until `stop` fires.
    pub async fn run(&self, stop: StopReceiver) {
        let target = self.target.as_str();
        info!(
            target: target,
            "[monitor] started, polling every {:?}", self.check_interval
        );
        loop {
            if stop.is_stopped() {
                break;
            }
            self.tick().await;

            let sleep = Box::pin(task::sleep(self.check_interval));
            let stopped = Box::pin(stop.wait());
            if let Either::Right(_) = future::select(sleep, stopped).await {
                break;
            }
        }
        info!(target: target, "[monitor] stopped");
    }
}
