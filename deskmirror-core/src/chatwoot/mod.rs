//! Chatwoot REST integration
//!
//! [`ChatwootClient`] is the async client; [`BlockingChatwootClient`] wraps it
//! for the synchronous sync pipelines through the [`HelpdeskApi`] trait.

mod client;

pub use client::{
    payload_list, BlockingChatwootClient, ChatwootClient, ConnectionStatus, HelpdeskApi,
};
