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

//! Multi-endpoint RPC connection management.
//!
//! - transport: JSON-RPC over HTTP or WebSocket.
//! - client: connection handle handed out to the rest of the node.
//! - endpoint: endpoint record and prober.
//! - manager: ranked pool with failover.

pub mod client;
pub mod connector;
pub mod endpoint;
pub mod manager;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{BlockHeader, RpcClient};
pub use connector::{Connector, UrlConnector};
pub use endpoint::{Endpoint, EndpointStatus};
pub use manager::RpcManager;
pub use transport::Transport;
