//! Membership service provider messages.

/// Identity of a transaction creator: the MSP that issued it and the
/// PEM certificate material, exactly as the peer deserializes it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SerializedIdentity {
    /// MSP identifier, e.g. `Org1MSP`.
    #[prost(string, tag = "1")]
    pub mspid: ::prost::alloc::string::String,
    /// UTF-8 bytes of the PEM-encoded X.509 certificate.
    #[prost(bytes = "vec", tag = "2")]
    pub id_bytes: ::prost::alloc::vec::Vec<u8>,
}
