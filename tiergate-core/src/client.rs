//! # Tier Client
//!
//! A dynamic unary gRPC client that announces a caller tier.
//!
//! Requests are described with JSON bodies and resolved against a local `DescriptorPool`,
//! so the client can call any method of a tier-guarded server without generated code.
//! The body is checked against the method's input message before anything is sent.
//!
//! ```rust,no_run
//! use tiergate_core::client::{CallRequest, TierClient};
//! use tiergate_core::prost_reflect::DescriptorPool;
//!
//! # async fn run(descriptor_set: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
//! let pool = DescriptorPool::decode(descriptor_set)?;
//! let mut client = TierClient::connect("http://localhost:50051", pool).await?;
//!
//! let response = client
//!     .call(CallRequest {
//!         service: "showcase.v1.ShowcaseService".to_string(),
//!         method: "GetPremiumInsights".to_string(),
//!         body: serde_json::json!({ "topic": "latency" }),
//!         tier: Some(2),
//!         headers: vec![],
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
use crate::{BoxError, policy::DEFAULT_METADATA_KEY, policy::http_path};
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MessageDescriptor, MethodDescriptor};
use std::str::FromStr;
use tonic::{
    Status,
    client::GrpcService,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
    metadata::{Ascii, MetadataKey, MetadataValue},
    transport::{Channel, Endpoint},
};

/// Errors that can occur when connecting to a gRPC server.
#[derive(Debug, thiserror::Error)]
pub enum ClientConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
}

/// Errors that prevent a call from being sent.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
    #[error("Method '{0}' not found")]
    MethodNotFound(String),
    #[error("Method '{0}' is streaming, only unary methods are supported")]
    StreamingNotSupported(String),
    #[error("JSON body does not match the input of '{path}': {source}")]
    InvalidBody {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("'{0}' cannot carry the caller tier, it is not a valid metadata key")]
    InvalidTierKey(String),
    #[error("Header '{key}: {value}' cannot be sent as gRPC metadata")]
    InvalidHeader { key: String, value: String },
    #[error("The connection to the server is unusable: '{0}'")]
    Unavailable(#[source] BoxError),
}

/// A unary call to perform.
#[derive(Debug, Clone)]
pub struct CallRequest {
    /// The fully qualified name of the service (e.g., `showcase.v1.ShowcaseService`).
    pub service: String,
    /// The name of the method to call (e.g., `GetPremiumInsights`).
    pub method: String,
    /// The JSON body of the request message.
    pub body: serde_json::Value,
    /// The caller tier, sent as metadata when set.
    pub tier: Option<u32>,
    /// Additional gRPC metadata (headers) to attach to the request.
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct TierClient<S = Channel> {
    grpc: tonic::client::Grpc<S>,
    pool: DescriptorPool,
    tier_key: MetadataKey<Ascii>,
}

impl TierClient<Channel> {
    /// Connects to `addr` (e.g., `http://localhost:50051`).
    pub async fn connect(addr: &str, pool: DescriptorPool) -> Result<Self, ClientConnectError> {
        let endpoint = Endpoint::new(addr.to_string())
            .map_err(|e| ClientConnectError::InvalidUrl(addr.to_string(), e))?;

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| ClientConnectError::ConnectionFailed(addr.to_string(), e))?;

        Ok(Self::from_service(channel, pool))
    }
}

impl<S> TierClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    pub fn from_service(service: S, pool: DescriptorPool) -> Self {
        Self {
            grpc: tonic::client::Grpc::new(service),
            pool,
            tier_key: MetadataKey::from_static(DEFAULT_METADATA_KEY),
        }
    }

    /// Sends the tier under `key` instead of the default `tier` entry.
    pub fn with_metadata_key(mut self, key: &str) -> Result<Self, CallError> {
        self.tier_key =
            MetadataKey::from_str(key).map_err(|_| CallError::InvalidTierKey(key.to_string()))?;
        Ok(self)
    }

    /// Performs a unary call.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but the server (or the tier check) returned an error.
    /// * `Err(CallError)` - The request could not be built or sent.
    pub async fn call(
        &mut self,
        request: CallRequest,
    ) -> Result<Result<serde_json::Value, Status>, CallError> {
        let method = self.find_method(&request.service, &request.method)?;
        let path = http_path(&method);

        let message = DynamicMessage::deserialize(method.input(), request.body)
            .map_err(|source| CallError::InvalidBody {
                path: path.clone(),
                source,
            })?;

        let grpc_request = self.build_request(message, request.headers, request.tier)?;

        let codec = MethodCodec {
            output: method.output(),
        };
        let path = http::uri::PathAndQuery::from_str(&path)
            .map_err(|_| CallError::MethodNotFound(method.full_name().to_string()))?;

        self.grpc
            .ready()
            .await
            .map_err(|e| CallError::Unavailable(e.into()))?;

        tracing::debug!(path = %path, tier = ?request.tier, "Sending request");

        match self.grpc.unary(grpc_request, path, codec).await {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    fn find_method(&self, service: &str, method: &str) -> Result<MethodDescriptor, CallError> {
        let method = self
            .pool
            .get_service_by_name(service)
            .ok_or_else(|| CallError::ServiceNotFound(service.to_string()))?
            .methods()
            .find(|m| m.name() == method)
            .ok_or_else(|| CallError::MethodNotFound(method.to_string()))?;

        if method.is_client_streaming() || method.is_server_streaming() {
            return Err(CallError::StreamingNotSupported(
                method.full_name().to_string(),
            ));
        }

        Ok(method)
    }

    /// Attaches the extra headers, then the tier, which always wins over a header
    /// using the same key.
    fn build_request(
        &self,
        message: DynamicMessage,
        headers: Vec<(String, String)>,
        tier: Option<u32>,
    ) -> Result<tonic::Request<DynamicMessage>, CallError> {
        let mut request = tonic::Request::new(message);
        let metadata = request.metadata_mut();

        for (key, value) in headers {
            match (
                MetadataKey::<Ascii>::from_str(&key),
                MetadataValue::<Ascii>::from_str(&value),
            ) {
                (Ok(k), Ok(v)) => {
                    metadata.insert(k, v);
                }
                _ => return Err(CallError::InvalidHeader { key, value }),
            }
        }

        if let Some(tier) = tier {
            metadata.insert(self.tier_key.clone(), MetadataValue::from(tier));
        }

        Ok(request)
    }
}

/// Sends an already validated `DynamicMessage` and renders the reply of the method
/// as JSON.
struct MethodCodec {
    output: MessageDescriptor,
}

impl Codec for MethodCodec {
    type Encode = DynamicMessage;
    type Decode = serde_json::Value;

    type Encoder = MessageEncoder;
    type Decoder = JsonDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        MessageEncoder
    }

    fn decoder(&mut self) -> Self::Decoder {
        JsonDecoder(self.output.clone())
    }
}

struct MessageEncoder;

impl Encoder for MessageEncoder {
    type Item = DynamicMessage;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        item.encode_raw(dst);
        Ok(())
    }
}

struct JsonDecoder(MessageDescriptor);

impl Decoder for JsonDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src).map_err(|e| {
            Status::internal(format!("Invalid '{}' in response: {}", self.0.full_name(), e))
        })?;

        serde_json::to_value(&msg).map(Some).map_err(|e| {
            Status::internal(format!("Cannot render '{}' as JSON: {}", self.0.full_name(), e))
        })
    }
}
