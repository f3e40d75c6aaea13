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

//! JSON-RPC 2.0 transports.
//!
//! The transport is selected by the endpoint URL scheme:
//! - `http`/`https`: one POST per request (isahc).
//! - `ws`/`wss`: a persistent socket, requests are serialized over it
//!   (async-tungstenite, `ws` feature).

use crate::{Error, ErrorKind, Result};
use futures::future::BoxFuture;
use isahc::{config::Configurable, AsyncReadResponseExt, HttpClient, Request};
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

#[cfg(test)]
use mockall::automock;

/// Raw JSON-RPC exchange with a remote node.
#[cfg_attr(test, automock)]
pub trait Transport: Send + Sync + 'static {
    /// Submit `method` with `params` and resolve to the `result` member of
    /// the response.
    fn request(&self, method: &str, params: Value) -> BoxFuture<'static, Result<Value>>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize, Debug)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl JsonRpcResponse {
    fn id(&self) -> Option<u64> {
        self.id.as_ref().and_then(Value::as_u64)
    }

    fn into_result(self) -> Result<Value> {
        match self.error {
            Some(err) => Err(Error::new_ext(
                ErrorKind::RpcFault,
                format!("code {}: {}", err.code, err.message),
            )),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

fn encode_request(id: u64, method: &str, params: &Value) -> Result<String> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0",
        id,
        method,
        params,
    };
    serde_json::to_string(&request).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
}

fn decode_response(buf: &str) -> Result<JsonRpcResponse> {
    serde_json::from_str(buf).map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))
}

/// Open the transport matching the URL scheme.
pub async fn open(url: &str, timeout: Duration) -> Result<Arc<dyn Transport>> {
    let scheme = url
        .split_once("://")
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();
    match scheme.as_str() {
        "http" | "https" => Ok(Arc::new(HttpTransport::new(url, timeout)?)),
        #[cfg(feature = "ws")]
        "ws" | "wss" => Ok(Arc::new(ws::WsTransport::connect(url, timeout).await?)),
        _ => Err(Error::new_ext(
            ErrorKind::BadConfiguration,
            format!("unsupported endpoint scheme: {}", url),
        )),
    }
}

/// JSON-RPC over HTTP POST.
pub struct HttpTransport {
    url: String,
    client: HttpClient,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| Error::new_ext(ErrorKind::BadConfiguration, err))?;
        Ok(HttpTransport {
            url: url.to_owned(),
            client,
            next_id: AtomicU64::new(1),
        })
    }
}

fn http_error(err: isahc::Error) -> Error {
    if err.is_timeout() {
        Error::new_ext(ErrorKind::Timeout, err)
    } else {
        Error::new_ext(ErrorKind::BadNetwork, err)
    }
}

impl Transport for HttpTransport {
    fn request(&self, method: &str, params: Value) -> BoxFuture<'static, Result<Value>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = encode_request(id, method, &params);
        let client = self.client.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let request = Request::post(url.as_str())
                .header("content-type", "application/json")
                .body(body?)
                .map_err(|err| Error::new_ext(ErrorKind::BadConfiguration, err))?;

            let mut response = client.send_async(request).await.map_err(http_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::new_ext(
                    ErrorKind::BadNetwork,
                    format!("http status {}", status),
                ));
            }
            let buf = response
                .text()
                .await
                .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))?;
            decode_response(&buf)?.into_result()
        })
    }
}

#[cfg(feature = "ws")]
mod ws {
    use super::*;
    use async_std::{future, sync::Mutex};
    use async_tungstenite::{
        async_std::{connect_async, ConnectStream},
        tungstenite::Message as WsMessage,
        WebSocketStream,
    };
    use futures::{SinkExt, StreamExt};

    type Socket = WebSocketStream<ConnectStream>;

    /// JSON-RPC over a persistent WebSocket.
    pub struct WsTransport {
        socket: Arc<Mutex<Socket>>,
        next_id: AtomicU64,
        timeout: Duration,
    }

    fn ws_error(err: async_tungstenite::tungstenite::Error) -> Error {
        Error::new_ext(ErrorKind::BadNetwork, err)
    }

    fn timeout_error(what: &str, timeout: Duration) -> Error {
        Error::new_ext(
            ErrorKind::Timeout,
            format!("{} exceeded {:?}", what, timeout),
        )
    }

    impl WsTransport {
        pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
            let (socket, _) = future::timeout(timeout, connect_async(url))
                .await
                .map_err(|_| timeout_error("websocket handshake", timeout))?
                .map_err(ws_error)?;
            Ok(WsTransport {
                socket: Arc::new(Mutex::new(socket)),
                next_id: AtomicU64::new(1),
                timeout,
            })
        }
    }

    /// Read frames until the response to `id` shows up.
    /// Notifications and stale responses are skipped.
    async fn exchange(socket: &Mutex<Socket>, id: u64, body: String) -> Result<Value> {
        let mut socket = socket.lock().await;
        socket.send(WsMessage::Text(body)).await.map_err(ws_error)?;

        while let Some(frame) = socket.next().await {
            let buf = match frame.map_err(ws_error)? {
                WsMessage::Text(buf) => buf,
                WsMessage::Binary(buf) => String::from_utf8(buf)
                    .map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))?,
                WsMessage::Close(_) => {
                    return Err(Error::new_ext(ErrorKind::BadNetwork, "socket closed by peer"))
                }
                _ => continue,
            };
            let response = decode_response(&buf)?;
            if response.id() == Some(id) {
                return response.into_result();
            }
        }
        Err(Error::new_ext(ErrorKind::BadNetwork, "socket closed"))
    }

    impl Transport for WsTransport {
        fn request(&self, method: &str, params: Value) -> BoxFuture<'static, Result<Value>> {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let body = encode_request(id, method, &params);
            let socket = self.socket.clone();
            let timeout = self.timeout;

            Box::pin(async move {
                let body = body?;
                future::timeout(timeout, exchange(&socket, id, body))
                    .await
                    .map_err(|_| timeout_error("websocket request", timeout))?
            })
        }
    }
}

#[cfg(feature = "ws")]
pub use ws::WsTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use serde_json::json;

    #[test]
    fn request_encoding() {
        let buf = encode_request(7, "eth_blockNumber", &json!([])).unwrap();

        let value: Value = serde_json::from_str(&buf).unwrap();
        assert_eq!(
            value,
            json!({"jsonrpc": "2.0", "id": 7, "method": "eth_blockNumber", "params": []})
        );
    }

    #[test]
    fn response_result() {
        let res = decode_response(r#"{"jsonrpc":"2.0","id":3,"result":"0x10"}"#).unwrap();

        assert_eq!(res.id(), Some(3));
        assert_eq!(res.into_result().unwrap(), json!("0x10"));
    }

    #[test]
    fn response_null_result() {
        let res = decode_response(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();

        assert_eq!(res.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn response_error_object() {
        let res = decode_response(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"method not found"}}"#,
        )
        .unwrap();

        let err = res.into_result().unwrap_err();

        assert_eq!(err.kind, ErrorKind::RpcFault);
        assert_eq!(err.to_string_full(), "rpc fault: code -32601: method not found");
    }

    #[test]
    fn response_garbage() {
        let err = decode_response("<html>bad gateway</html>").err().unwrap();

        assert_eq!(err.kind, ErrorKind::MalformedData);
    }

    #[test]
    fn unsupported_scheme() {
        let err = task::block_on(open("ftp://node.example", Duration::from_secs(1)))
            .err()
            .unwrap();

        assert_eq!(err.kind, ErrorKind::BadConfiguration);
    }

    #[test]
    fn http_scheme_opens_lazily() {
        let transport = task::block_on(open("HTTP://127.0.0.1:1", Duration::from_secs(1)));

        assert!(transport.is_ok());
    }
}
