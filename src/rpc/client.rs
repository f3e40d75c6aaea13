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

//! Connection handle shared with every subsystem talking to the chain.

use super::transport::Transport;
use crate::{Error, ErrorKind, Result};
use serde_json::{json, Value};
use std::{fmt, sync::Arc};

/// Minimal block header view: what the monitor needs to judge freshness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Block height.
    pub number: u64,
    /// Block timestamp, seconds since the unix epoch.
    pub timestamp: u64,
}

#[derive(Deserialize)]
struct RawHeader {
    number: String,
    timestamp: String,
}

/// Opaque client bound to one endpoint.
///
/// Cloning is cheap and clones share the underlying connection. Callers are
/// expected to fetch a fresh handle from the manager for every operation
/// since the best endpoint may change after a failover.
#[derive(Clone)]
pub struct RpcClient {
    url: Arc<str>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient").field("url", &self.url).finish()
    }
}

impl RpcClient {
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        RpcClient {
            url: url.into(),
            transport,
        }
    }

    /// Endpoint this handle talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Raw JSON-RPC call.
    pub async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.transport.request(method, params).await
    }

    /// Current chain height.
    pub async fn block_number(&self) -> Result<u64> {
        let value = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(&value)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&value)
    }

    /// Header of the latest block.
    pub async fn latest_header(&self) -> Result<BlockHeader> {
        let value = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        if value.is_null() {
            return Err(Error::new_ext(
                ErrorKind::MalformedData,
                "latest block not available",
            ));
        }
        let raw: RawHeader = serde_json::from_value(value)
            .map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))?;
        Ok(BlockHeader {
            number: parse_hex(&raw.number)?,
            timestamp: parse_hex(&raw.timestamp)?,
        })
    }
}

/// Decode a `0x` prefixed hex quantity.
pub fn parse_quantity(value: &Value) -> Result<u64> {
    match value.as_str() {
        Some(s) => parse_hex(s),
        None => Err(Error::new_ext(
            ErrorKind::MalformedData,
            format!("expected hex quantity, got {}", value),
        )),
    }
}

fn parse_hex(s: &str) -> Result<u64> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .filter(|digits| !digits.is_empty())
        .ok_or_else(|| {
            Error::new_ext(ErrorKind::MalformedData, format!("bad quantity: {}", s))
        })?;
    u64::from_str_radix(digits, 16)
        .map_err(|err| Error::new_ext(ErrorKind::MalformedData, format!("{}: {}", s, err)))
}
