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

//! Endpoint record and prober.
//!
//! A probe opens a fresh connection and asks for the chain height, the whole
//! exchange bounded by a single timeout. Probe results are values: they are
//! applied to the endpoint record by the manager, under its lock.

use super::{client::RpcClient, connector::Connector};
use crate::{Error, ErrorKind, Result};
use async_std::future;
use std::{
    cmp::Ordering,
    time::{Duration, Instant},
};

/// Candidate endpoint and its last measured health.
#[derive(Debug)]
pub struct Endpoint {
    url: String,
    block_number: u64,
    /// Seconds.
    latency: f64,
    connection: Option<RpcClient>,
    last_success: Option<Instant>,
}

/// Outcome of a successful probe.
#[derive(Debug)]
pub struct Probe {
    pub block_number: u64,
    /// Seconds, connection setup included.
    pub latency: f64,
    pub client: RpcClient,
}

/// Read only view of an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointStatus {
    pub url: String,
    pub block_number: u64,
    pub latency: f64,
    pub connected: bool,
    pub last_success: Option<Instant>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Endpoint {
            url: url.into(),
            block_number: 0,
            latency: 0.0,
            connection: None,
            last_success: None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn block_number(&self) -> u64 {
        self.block_number
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn connection(&self) -> Option<&RpcClient> {
        self.connection.as_ref()
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    /// Store a probe result. The previous connection, if any, is dropped.
    pub(crate) fn apply(&mut self, probe: Probe) {
        self.block_number = probe.block_number;
        self.latency = probe.latency;
        self.connection = Some(probe.client);
        self.last_success = Some(Instant::now());
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus {
            url: self.url.clone(),
            block_number: self.block_number,
            latency: self.latency,
            connected: self.connection.is_some(),
            last_success: self.last_success,
        }
    }

    /// Ranking order: highest block first, lowest latency among equals.
    pub fn rank(a: &Endpoint, b: &Endpoint) -> Ordering {
        b.block_number
            .cmp(&a.block_number)
            .then_with(|| a.latency.total_cmp(&b.latency))
    }

    #[cfg(test)]
    pub(crate) fn with_metrics(url: &str, block_number: u64, latency: f64) -> Self {
        Endpoint {
            url: url.to_owned(),
            block_number,
            latency,
            connection: None,
            last_success: None,
        }
    }
}

/// Connect to `url` and measure its height and round trip time.
///
/// On failure nothing is returned to apply, the endpoint keeps its previous
/// metrics.
pub async fn probe(connector: &dyn Connector, url: &str, timeout: Duration) -> Result<Probe> {
    let start = Instant::now();
    let exchange = async {
        let client = connector.connect(url, timeout).await?;
        let block_number = client.block_number().await?;
        Ok::<_, Error>((client, block_number))
    };

    let (client, block_number) = future::timeout(timeout, exchange).await.map_err(|_| {
        Error::new_ext(
            ErrorKind::Timeout,
            format!("probe of {} exceeded {:?}", url, timeout),
        )
    })??;

    Ok(Probe {
        block_number,
        latency: start.elapsed().as_secs_f64(),
        client,
    })
}
