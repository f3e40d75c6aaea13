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

//! Stale block monitor.
//!
//! Polls the best connection for the latest block header and asks the RPC
//! manager to fail over when the endpoint goes backwards (regression) or
//! stops producing fresh blocks (staleness).
//!
//! - worker: the monitor itself and its polling loop.
//! - service: runs the loop on a dedicated thread, with start and stop.

pub mod service;
pub mod worker;

pub use service::MonitorService;
pub use worker::{BlockMonitor, TickOutcome};
