//! Purpose: Define the stable public Rust API boundary for brokeradm.
//! Exports: The dynamic JSON value and codec, typed broker models, and the HTTP client.
//! Role: Public, additive-only surface used by the CLI and by library callers.
//! Invariants: This module is the only public path to the management client.

mod client;
mod model;

pub use crate::core::codec::{self, CodecOptions, DEFAULT_MAX_DEPTH};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::node::{JsonNode, Node, Number};
pub use crate::core::sink::{JsonSink, JsonWriter, ValueBuilder};
pub use crate::core::value::{DynamicMap, DynamicValue, ValueKind};
pub use client::{DEFAULT_TIMEOUT, ManagementClient};
pub use model::{
    Binding, Context, Exchange, ExchangeDeclare, ExchangeTypeSpec, Listener, MessageStats,
    ObjectTotals, Overview, Policy, PolicyDefinition, Queue, QueueDeclare, QueueTotals, Vhost,
};
