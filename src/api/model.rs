//! Purpose: Typed models for the broker management resources this client binds.
//! Exports: `Overview` and its parts, `Queue`, `Exchange`, `Binding`, `Policy`, `Vhost`,
//! and the request bodies `QueueDeclare`, `ExchangeDeclare`, `PolicyDefinition`.
//! Role: Fixed-schema payloads use plain serde; opaque tables go through the dynamic bridge.
//! Invariants: Unknown response fields are ignored so newer brokers stay readable.
//! Invariants: Argument/definition maps keep the broker's key order and integer types.

use crate::core::timestamp::{format_timestamp, parse_timestamp};
use crate::core::value::{DynamicMap, deserialize_map};
use serde::de::{self, Deserializer, Unexpected};
use serde::ser::{Error as _, Serializer};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Overview {
    pub management_version: String,
    #[serde(default)]
    pub exchange_types: Vec<ExchangeTypeSpec>,
    pub rabbitmq_version: String,
    pub erlang_version: String,
    #[serde(default)]
    pub message_stats: MessageStats,
    #[serde(default)]
    pub queue_totals: QueueTotals,
    #[serde(default)]
    pub object_totals: ObjectTotals,
    pub node: String,
    #[serde(default)]
    pub listeners: Vec<Listener>,
    #[serde(default)]
    pub contexts: Vec<Context>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeTypeSpec {
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliver_get: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeliver: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_unroutable: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTotals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_ready: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_unacknowledged: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectTotals {
    #[serde(default)]
    pub consumers: u64,
    #[serde(default)]
    pub queues: u64,
    #[serde(default)]
    pub exchanges: u64,
    #[serde(default)]
    pub connections: u64,
    #[serde(default)]
    pub channels: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub node: String,
    pub protocol: String,
    pub ip_address: String,
    pub port: u16,
    #[serde(
        default,
        deserialize_with = "deserialize_map",
        skip_serializing_if = "DynamicMap::is_empty"
    )]
    pub socket_opts: DynamicMap,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Context {
    pub node: String,
    pub description: String,
    pub path: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    pub vhost: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default, deserialize_with = "deserialize_map")]
    pub arguments: DynamicMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_ready: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages_unacknowledged: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumers: Option<u64>,
    #[serde(
        default,
        deserialize_with = "deserialize_timestamp",
        serialize_with = "serialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub idle_since: Option<OffsetDateTime>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    pub vhost: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default, deserialize_with = "deserialize_map")]
    pub arguments: DynamicMap,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    pub source: String,
    pub vhost: String,
    pub destination: String,
    pub destination_type: String,
    pub routing_key: String,
    #[serde(default, deserialize_with = "deserialize_map")]
    pub arguments: DynamicMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    pub vhost: String,
    pub name: String,
    pub pattern: String,
    #[serde(rename = "apply-to")]
    pub apply_to: String,
    #[serde(default, deserialize_with = "deserialize_map")]
    pub definition: DynamicMap,
    #[serde(default)]
    pub priority: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vhost {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tracing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<u64>,
}

/// Body of `PUT /api/queues/{vhost}/{name}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueueDeclare {
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: DynamicMap,
}

/// Body of `PUT /api/exchanges/{vhost}/{name}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExchangeDeclare {
    #[serde(rename = "type")]
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub arguments: DynamicMap,
}

impl ExchangeDeclare {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            durable: true,
            auto_delete: false,
            internal: false,
            arguments: DynamicMap::new(),
        }
    }
}

/// Body of `PUT /api/policies/{vhost}/{name}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyDefinition {
    pub pattern: String,
    pub definition: DynamicMap,
    pub priority: i64,
    #[serde(rename = "apply-to")]
    pub apply_to: String,
}

impl PolicyDefinition {
    pub fn new(pattern: impl Into<String>, definition: DynamicMap) -> Self {
        Self {
            pattern: pattern.into(),
            definition,
            priority: 0,
            apply_to: "all".to_string(),
        }
    }
}

// The management plugin reports context ports as strings and listener ports as numbers.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::invalid_value(Unexpected::Str(&text), &"a port number")),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&text)
        .map(Some)
        .ok_or_else(|| de::Error::invalid_value(Unexpected::Str(&text), &"a date-time"))
}

fn serialize_timestamp<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(timestamp) => {
            let text = format_timestamp(timestamp).map_err(S::Error::custom)?;
            serializer.serialize_str(&text)
        }
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::{Context, Listener, PolicyDefinition, Queue};
    use crate::core::value::{DynamicMap, DynamicValue};
    use time::macros::datetime;

    #[test]
    fn context_port_accepts_string_and_number() {
        let from_text: Context = serde_json::from_str(
            r#"{"node":"rabbit@localhost","description":"RabbitMQ Management","path":"/","port":"15672"}"#,
        )
        .expect("string port");
        let from_number: Context = serde_json::from_str(
            r#"{"node":"rabbit@localhost","description":"RabbitMQ Management","path":"/","port":15672}"#,
        )
        .expect("number port");
        assert_eq!(from_text.port, 15672);
        assert_eq!(from_text, from_number);
    }

    #[test]
    fn listener_socket_opts_go_through_dynamic_bridge() {
        let listener: Listener = serde_json::from_str(
            r#"{"node":"n","protocol":"amqp","ip_address":"::","port":5672,
                "socket_opts":{"backlog":128,"nodelay":true,"linger":[true,0]}}"#,
        )
        .expect("listener");
        assert_eq!(
            listener.socket_opts.get("backlog"),
            Some(&DynamicValue::Integer(128))
        );
        assert_eq!(
            listener.socket_opts.get("linger"),
            Some(&DynamicValue::Array(vec![
                DynamicValue::Bool(true),
                DynamicValue::Integer(0)
            ]))
        );
    }

    #[test]
    fn queue_idle_since_accepts_legacy_format() {
        let queue: Queue = serde_json::from_str(
            r#"{"name":"q","vhost":"/","arguments":[],"idle_since":"2013-08-05 11:09:48"}"#,
        )
        .expect("queue");
        assert!(queue.arguments.is_empty());
        assert_eq!(queue.idle_since, Some(datetime!(2013-08-05 11:09:48 UTC)));
    }

    #[test]
    fn policy_definition_serializes_apply_to_with_dash() {
        let mut definition = DynamicMap::new();
        definition.insert("max-length".to_string(), DynamicValue::Integer(10));
        let body = PolicyDefinition::new("^amq\\.", definition);
        let text = serde_json::to_string(&body).expect("encode");
        assert_eq!(
            text,
            r#"{"pattern":"^amq\\.","definition":{"max-length":10},"priority":0,"apply-to":"all"}"#
        );
    }
}
