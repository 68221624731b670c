//! The `google.rpc.Status` envelope gRPC servers attach to failed
//! calls. The gateway packs per-peer [`ErrorDetail`] messages into the
//! `details` list; decoding them lets the client surface the chaincode
//! error string instead of the outer transport message.
//!
//! [`ErrorDetail`]: crate::gateway::ErrorDetail

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub details: ::prost::alloc::vec::Vec<Any>,
}
