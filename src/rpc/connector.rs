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

use super::{client::RpcClient, transport};
use crate::Result;
use futures::future::BoxFuture;
use std::time::Duration;

/// Opens client handles. The manager never dials endpoints by itself.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &str, timeout: Duration) -> BoxFuture<'static, Result<RpcClient>>;
}

/// Default connector, picks the transport from the URL scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlConnector;

impl Connector for UrlConnector {
    fn connect(&self, url: &str, timeout: Duration) -> BoxFuture<'static, Result<RpcClient>> {
        let url = url.to_owned();
        Box::pin(async move {
            let transport = transport::open(&url, timeout).await?;
            Ok(RpcClient::new(&url, transport))
        })
    }
}
