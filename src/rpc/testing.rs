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

//! In-memory chain nodes for manager and monitor tests.

use super::{client::RpcClient, connector::Connector, transport::Transport};
use crate::{Error, ErrorKind, Result};
use async_std::task;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

struct FakeNode {
    height: AtomicU64,
    timestamp: AtomicU64,
    alive: AtomicBool,
    delay: Duration,
}

struct FakeTransport {
    node: Arc<FakeNode>,
}

impl Transport for FakeTransport {
    fn request(&self, method: &str, _params: Value) -> BoxFuture<'static, Result<Value>> {
        let node = self.node.clone();
        let method = method.to_owned();
        Box::pin(async move {
            if !node.delay.is_zero() {
                task::sleep(node.delay).await;
            }
            if !node.alive.load(Ordering::SeqCst) {
                return Err(Error::new_ext(ErrorKind::BadNetwork, "connection reset"));
            }
            let height = node.height.load(Ordering::SeqCst);
            match method.as_str() {
                "eth_blockNumber" => Ok(json!(format!("{:#x}", height))),
                "eth_getBlockByNumber" => Ok(json!({
                    "number": format!("{:#x}", height),
                    "timestamp": format!("{:#x}", node.timestamp.load(Ordering::SeqCst)),
                })),
                _ => Err(Error::new_ext(ErrorKind::RpcFault, "method not found")),
            }
        })
    }
}

/// Connector over a set of scripted nodes.
/// Every connection attempt is recorded, in order.
#[derive(Clone, Default)]
pub(crate) struct FakeConnector {
    nodes: Arc<Mutex<HashMap<String, Arc<FakeNode>>>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live node, latest block timestamped now.
    pub fn add_node(&self, url: &str, height: u64, delay_ms: u64) {
        let node = FakeNode {
            height: AtomicU64::new(height),
            timestamp: AtomicU64::new(unix_now()),
            alive: AtomicBool::new(true),
            delay: Duration::from_millis(delay_ms),
        };
        self.nodes.lock().insert(url.to_owned(), Arc::new(node));
    }

    fn node(&self, url: &str) -> Arc<FakeNode> {
        self.nodes.lock().get(url).cloned().expect("unknown fake node")
    }

    pub fn set_alive(&self, url: &str, alive: bool) {
        self.node(url).alive.store(alive, Ordering::SeqCst);
    }

    pub fn set_height(&self, url: &str, height: u64) {
        self.node(url).height.store(height, Ordering::SeqCst);
    }

    pub fn set_timestamp(&self, url: &str, timestamp: u64) {
        self.node(url).timestamp.store(timestamp, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().clone()
    }

    pub fn clear_attempts(&self) {
        self.attempts.lock().clear();
    }
}

impl Connector for FakeConnector {
    fn connect(&self, url: &str, _timeout: Duration) -> BoxFuture<'static, Result<RpcClient>> {
        self.attempts.lock().push(url.to_owned());
        let node = self.nodes.lock().get(url).cloned();
        let url = url.to_owned();
        Box::pin(async move {
            match node {
                Some(node) if node.alive.load(Ordering::SeqCst) => {
                    Ok(RpcClient::new(&url, Arc::new(FakeTransport { node })))
                }
                _ => Err(Error::new_ext(
                    ErrorKind::BadNetwork,
                    format!("connection refused: {}", url),
                )),
            }
        })
    }
}
