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

use super::worker::BlockMonitor;
use crate::channel::{stop_channel, StopSender};
use async_std::task;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Block monitor service data.
pub struct MonitorService {
    /// Monitor shared with the worker thread.
    monitor: Arc<BlockMonitor>,
    /// Worker thread handler.
    handler: Option<JoinHandle<()>>,
    /// To stop the worker loop.
    stop_chan: Option<StopSender>,
    /// To check if the worker thread is still alive.
    canary: Arc<()>,
}

impl MonitorService {
    pub fn new(monitor: BlockMonitor) -> Self {
        MonitorService {
            monitor: Arc::new(monitor),
            handler: None,
            stop_chan: None,
            canary: Arc::new(()),
        }
    }

    /// Start the polling loop on its own thread.
    pub fn start(&mut self) {
        let target = self.monitor.log_target();
        debug!(target: target, "Starting block monitor service");
        if self.handler.is_some() {
            warn!(target: target, "service was already running");
            return;
        }

        let (stop_tx, stop_rx) = stop_channel();
        let monitor = self.monitor.clone();
        let canary = Arc::clone(&self.canary);
        let handle = thread::spawn(move || {
            // Released on exit, even on panic.
            let _canary = canary;
            task::block_on(monitor.run(stop_rx));
        });
        self.handler = Some(handle);
        self.stop_chan = Some(stop_tx);
    }

    /// Stop the polling loop and wait for the thread to exit.
    pub fn stop(&mut self) {
        let target = self.monitor.log_target();
        debug!(target: target, "Stopping block monitor service");
        match self.handler.take() {
            Some(handle) => {
                if let Some(stop_chan) = self.stop_chan.take() {
                    if let Err(err) = stop_chan.stop_sync() {
                        debug!(target: target, "monitor loop already gone: {}", err);
                    }
                }
                if handle.join().is_err() {
                    error!(target: target, "block monitor thread panicked");
                }
            }
            None => {
                debug!(target: target, "service was not running");
            }
        }
    }

    /// Check if service is running.
    pub fn is_running(&self) -> bool {
        // Hack to intercept crashed subthreads.
        Arc::strong_count(&self.canary) == 2
    }

    /// Shared reference to the monitor.
    pub fn monitor(&self) -> Arc<BlockMonitor> {
        self.monitor.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ManagerConfig, MonitorConfig},
        rpc::{testing::FakeConnector, RpcManager},
    };
    use std::time::Duration;

    fn create_monitor_service(connector: &FakeConnector) -> MonitorService {
        let manager = task::block_on(RpcManager::from_urls(
            vec!["http://a.test".to_owned()],
            &ManagerConfig::default(),
            Arc::new(connector.clone()),
        ))
        .unwrap();
        let config = MonitorConfig {
            check_interval: Duration::from_millis(20),
            ..Default::default()
        };
        let monitor = task::block_on(BlockMonitor::new(Arc::new(manager), &config)).unwrap();
        MonitorService::new(monitor)
    }

    #[test]
    fn start_stop() {
        let connector = FakeConnector::new();
        connector.add_node("http://a.test", 100, 0);
        let mut svc = create_monitor_service(&connector);

        svc.start();
        assert!(svc.is_running());
        std::thread::sleep(Duration::from_millis(100));

        svc.stop();
        assert!(!svc.is_running());
        assert_eq!(svc.monitor().latest_header().unwrap().number, 100);
    }

    #[test]
    fn restart() {
        let connector = FakeConnector::new();
        connector.add_node("http://a.test", 100, 0);
        let mut svc = create_monitor_service(&connector);

        svc.start();
        svc.stop();
        svc.start();
        assert!(svc.is_running());

        svc.stop();
        assert!(!svc.is_running());
    }

    #[test]
    fn logs_with_monitor_target() {
        let connector = FakeConnector::new();
        connector.add_node("http://a.test", 100, 0);
        let manager = task::block_on(RpcManager::from_urls(
            vec!["http://a.test".to_owned()],
            &ManagerConfig::default(),
            Arc::new(connector.clone()),
        ))
        .unwrap();
        let config = MonitorConfig {
            log_target: "chain-7-monitor".to_owned(),
            ..Default::default()
        };
        let monitor = task::block_on(BlockMonitor::new(Arc::new(manager), &config)).unwrap();

        let svc = MonitorService::new(monitor);

        assert_eq!(svc.monitor().log_target(), "chain-7-monitor");
    }

    #[test]
    fn stop_not_running() {
        let connector = FakeConnector::new();
        connector.add_node("http://a.test", 100, 0);
        let mut svc = create_monitor_service(&connector);

        svc.stop();

        assert!(!svc.is_running());
    }
}
