// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// One worker's packed outputs.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WrapperSetMessage {
    #[prost(uint64, optional, tag = "1")]
    pub worker: ::core::option::Option<u64>,
    #[prost(message, repeated, tag = "2")]
    pub wrappers: ::prost::alloc::vec::Vec<WrapperMessage>,
    #[prost(string, repeated, tag = "3")]
    pub extra_files: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(message, optional, tag = "4")]
    pub counters: ::core::option::Option<CountersMessage>,
}

/// A single output slot, inline or by file reference.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct WrapperMessage {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    /// `object`, `collection` or `tree`.
    #[prost(string, tag = "2")]
    pub kind: ::prost::alloc::string::String,
    #[prost(oneof = "wrapper_message::Content", tags = "3, 4")]
    pub content: ::core::option::Option<wrapper_message::Content>,
}

/// Nested message and enum types in `WrapperMessage`.
pub mod wrapper_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Content {
        /// JSON-encoded payload.
        #[prost(bytes, tag = "3")]
        Inline(::prost::alloc::vec::Vec<u8>),
        #[prost(message, tag = "4")]
        File(super::FileRefMessage),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FileRefMessage {
    #[prost(string, tag = "1")]
    pub path: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub folder: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CountersMessage {
    #[prost(uint64, tag = "1")]
    pub consumed: u64,
    #[prost(uint64, tag = "2")]
    pub processed: u64,
    #[prost(uint64, tag = "3")]
    pub failed: u64,
    #[prost(uint64, tag = "4")]
    pub accepted: u64,
}
