pub mod error;
pub mod frames;
pub mod handshake;
pub mod methods;

pub use error::ProtocolError;
pub use frames::{ErrorShape, EventFrame, InboundFrame, ReqFrame, ResFrame, StateVersion};
pub use handshake::{
    AuthPayload, ClientInfo, ClientPolicy, ConnectChallenge, ConnectParams, HelloOk,
    RateLimitPolicy, ServerFeatures, ServerInfo,
};

/// Wire protocol version sent in every `hello-ok` payload.
pub const PROTOCOL_VERSION: u32 = 1;
