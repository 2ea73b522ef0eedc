//! Ethereum JSON-RPC Client
//!
//! Sends JSON-RPC 2.0 requests over HTTP POST. Three failure kinds are kept
//! apart for callers: transport, undecodable response, and node error.
//! A node `error` object always wins over any `result` in the same response.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use super::abi::ContractAbi;
use super::error::{GatewayError, RpcError};

/// Infura endpoint bases; the project token is appended
pub const INFURA_MAINNET: &str = "https://mainnet.infura.io/v3/";
pub const INFURA_SEPOLIA: &str = "https://sepolia.infura.io/v3/";

/// Raw JSON-RPC access to a node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EthereumRpc: Send + Sync {
    /// Call `method` with positional `params` and return the `result` value
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}

/// HTTP JSON-RPC client
#[derive(Debug)]
pub struct RpcClient {
    client: Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// JSON-RPC 2.0 request object
pub fn request_payload(id: u64, method: &str, params: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

/// `{to, data}` call object shared by `eth_call` and `eth_estimateGas`
pub fn call_object(to: Address, data: &[u8]) -> Value {
    json!({
        "to": to.to_string(),
        "data": format!("0x{}", hex::encode(data)),
    })
}

#[async_trait]
impl EthereumRpc for RpcClient {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = request_payload(id, method, params);

        debug!(method, id, "Sending JSON-RPC request");

        let resp = self.client.post(&self.endpoint).json(&payload).send().await?;
        let body = resp.bytes().await?;

        let response: RpcResponse =
            serde_json::from_slice(&body).map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = response.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }

        response
            .result
            .ok_or_else(|| RpcError::Decode("response has neither result nor error".to_string()))
    }
}

fn result_str(value: &Value) -> Result<&str, RpcError> {
    value
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("expected hex string, got {}", value)))
}

/// Decode a `0x`-prefixed hex data result
pub fn decode_hex_result(value: &Value) -> Result<Vec<u8>, RpcError> {
    let raw = result_str(value)?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);

    let padded;
    let digits = if digits.len() % 2 == 1 {
        padded = format!("0{}", digits);
        padded.as_str()
    } else {
        digits
    };

    hex::decode(digits).map_err(|e| RpcError::Decode(format!("invalid hex result: {}", e)))
}

/// Interpret hex data as an address: the low 20 bytes, left-padded if shorter
pub fn hex_to_address(data: &[u8]) -> Address {
    let mut bytes = [0u8; 20];
    if data.len() >= 20 {
        bytes.copy_from_slice(&data[data.len() - 20..]);
    } else {
        bytes[20 - data.len()..].copy_from_slice(data);
    }
    Address::from(bytes)
}

/// Parse a hex quantity such as `"0x4a817c800"`
pub fn parse_quantity(value: &Value) -> Result<U256, RpcError> {
    let raw = result_str(value)?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    U256::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("invalid quantity {}: {}", raw, e)))
}

/// Parse a hex quantity that must fit a u64 (nonce, gas)
pub fn parse_quantity_u64(value: &Value) -> Result<u64, RpcError> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity).map_err(|_| RpcError::Decode(format!("quantity {} exceeds u64", quantity)))
}

/// `eth_call` against `to` at the latest block
pub async fn eth_call(rpc: &dyn EthereumRpc, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
    let result = rpc
        .call("eth_call", vec![call_object(to, data), json!("latest")])
        .await?;
    decode_hex_result(&result)
}

/// Read a zero-argument contract function and expose the result word as an
/// address-shaped value; callers reinterpret it as an integer or boolean.
pub async fn retrieve_parameter(
    rpc: &dyn EthereumRpc,
    name: &str,
    abi: &ContractAbi,
    contract: Address,
) -> Result<Address, GatewayError> {
    let data = abi.pack(name, &[])?;
    let result = eth_call(rpc, contract, &data).await?;
    Ok(hex_to_address(&result))
}

/// Reinterpret an address-shaped word as an unsigned integer
pub fn address_to_u256(value: Address) -> U256 {
    U256::from_be_slice(value.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::abi::crowdsale_abi;
    use axum::{routing::post, Json, Router};
    use std::net::SocketAddr;

    async fn serve(body: &'static str) -> String {
        let router = Router::new().route("/", post(move |Json(_req): Json<Value>| async move { body }));
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_request_payload_shape() {
        let payload = request_payload(7, "eth_gasPrice", vec![]);
        assert_eq!(payload["jsonrpc"], "2.0");
        assert_eq!(payload["id"], 7);
        assert_eq!(payload["method"], "eth_gasPrice");
        assert_eq!(payload["params"], json!([]));
    }

    #[test]
    fn test_call_object_encoding() {
        let obj = call_object(Address::repeat_byte(0xab), &[0xde, 0xad]);
        assert_eq!(obj["data"], "0xdead");
        assert_eq!(
            obj["to"].as_str().unwrap().to_lowercase(),
            format!("0x{}", "ab".repeat(20))
        );
    }

    #[test]
    fn test_hex_to_address_takes_low_bytes() {
        let mut word = [0u8; 32];
        word[31] = 1;
        assert_eq!(address_to_u256(hex_to_address(&word)), U256::from(1u8));

        assert_eq!(hex_to_address(&[]), Address::ZERO);
        assert_eq!(address_to_u256(hex_to_address(&[0x01, 0x00])), U256::from(256u16));
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(&json!("0x4a817c800")).unwrap(), U256::from(20_000_000_000u64));
        assert_eq!(parse_quantity_u64(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity_u64(&json!("0x")).unwrap(), 0);
        assert!(matches!(parse_quantity(&json!(5)), Err(RpcError::Decode(_))));
        assert!(matches!(parse_quantity(&json!("0xzz")), Err(RpcError::Decode(_))));
    }

    #[tokio::test]
    async fn test_result_returned() {
        let client = RpcClient::new(&serve(r#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#).await);
        let value = client.call("eth_blockNumber", vec![]).await.unwrap();
        assert_eq!(parse_quantity_u64(&value).unwrap(), 42);
    }

    #[tokio::test]
    async fn test_node_error_short_circuits() {
        let client = RpcClient::new(
            &serve(r#"{"jsonrpc":"2.0","id":1,"result":"not hex","error":{"code":-32000,"message":"execution reverted"}}"#)
                .await,
        );

        match client.call("eth_call", vec![]).await {
            Err(RpcError::Node { code, message }) => {
                assert_eq!(code, -32000);
                assert_eq!(message, "execution reverted");
            }
            other => panic!("expected node error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let client = RpcClient::new(&serve("<html>bad gateway</html>").await);
        assert!(matches!(
            client.call("eth_gasPrice", vec![]).await,
            Err(RpcError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_node_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RpcClient::new(&format!("http://{}/", addr));
        assert!(matches!(
            client.call("eth_gasPrice", vec![]).await,
            Err(RpcError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_retrieve_parameter() {
        let client = RpcClient::new(
            &serve(r#"{"jsonrpc":"2.0","id":1,"result":"0x0000000000000000000000000000000000000000000000000000000000000005"}"#)
                .await,
        );
        let abi = crowdsale_abi();

        let value = retrieve_parameter(&client, "TOKEN_RATE_PRE_ICO", &abi, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(address_to_u256(value), U256::from(5u8));

        let err = retrieve_parameter(&client, "notAFunction", &abi, Address::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Abi(_)));
    }
}
