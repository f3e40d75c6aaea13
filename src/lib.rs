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

//! Oracle node RPC connection core.
//!
//! Keeps a pool of candidate chain endpoints ranked by freshness and
//! latency, hands out the connection of the best one and fails over when the
//! block monitor detects that the active endpoint is stale or going
//! backwards.
//!
//! Every subsystem submitting transactions or reading chain state obtains its
//! handle through [RpcManager::get_best_connection] right before using it.

// External crates macros.
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// Public modules.
pub mod channel;
pub mod config;
pub mod error;
pub mod monitor;
pub mod rpc;

pub use config::{ManagerConfig, MonitorConfig};
pub use error::{Error, ErrorKind, Result};
pub use monitor::{BlockMonitor, MonitorService, TickOutcome};
pub use rpc::{BlockHeader, Connector, RpcClient, RpcManager, UrlConnector};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
