use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lambda_runtime::tracing;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A JSON field that can be missing, explicitly `null`, or set.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Missing,
    Null,
    Set(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Missing
    }
}

impl<T: Clone + Default> Field<T> {
    /// A missing field takes the type's default; `null` has no value at all.
    pub fn value_or_default(&self) -> Option<T> {
        match self {
            Field::Missing => Some(T::default()),
            Field::Null => None,
            Field::Set(value) => Some(value.clone()),
        }
    }
}

impl<T> Field<T> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Missing)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Field::Set(value),
            None => Field::Null,
        })
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Set(value) => value.serialize(serializer),
            _ => serializer.serialize_none(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Field<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Missing => Ok(()),
            Field::Null => f.write_str("null"),
            Field::Set(value) => fmt::Display::fmt(value, f),
        }
    }
}

/// Broker numbers occasionally arrive as strings (`"expiration": "60000"`).
fn lenient_number<'de, D>(deserializer: D) -> Result<Field<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(Field::Null),
        Some(Raw::Number(n)) => Ok(Field::Set(n)),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Field::Set)
            .map_err(|_| D::Error::custom(format!("expected a number, found {:?}", text))),
    }
}

/// Batch of messages delivered by the ActiveMQ event source mapping.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerEvent {
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub event_source: Field<String>,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub event_source_arn: Field<String>,
    pub messages: Vec<BrokerMessage>,
}

impl BrokerEvent {
    /// Only a JSON object is a batch; serde would otherwise accept an array
    /// and fill the fields by position.
    pub fn from_value(value: &serde_json::Value) -> Result<BrokerEvent> {
        if !value.is_object() {
            bail!("event is not a JSON object");
        }
        BrokerEvent::deserialize(value).context("event is not an ActiveMQ message batch")
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerMessage {
    #[serde(rename = "messageID", skip_serializing_if = "Field::is_missing")]
    pub message_id: Field<String>,
    #[serde(rename = "correlationID", skip_serializing_if = "Field::is_missing")]
    pub correlation_id: Field<String>,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub message_type: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub broker_in_time: Field<i64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub broker_out_time: Field<i64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub delivery_mode: Field<i64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub expiration: Field<i64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub priority: Field<i64>,
    #[serde(deserialize_with = "lenient_number", skip_serializing_if = "Field::is_missing")]
    pub timestamp: Field<i64>,
    pub destination: Destination,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub redelivered: Field<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Destination {
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub physical_name: Field<String>,
}

impl BrokerMessage {
    /// Decodes the base64 `data` field as UTF-8. A message without data has an
    /// empty body.
    pub fn decode_body(&self) -> Result<String> {
        match self.data.as_deref() {
            None | Some("") => Ok(String::new()),
            Some(data) => {
                let bytes = STANDARD
                    .decode(data)
                    .with_context(|| format!("message {} data is not base64", self.message_id))?;
                String::from_utf8(bytes)
                    .with_context(|| format!("message {} data is not UTF-8", self.message_id))
            }
        }
    }
}

pub fn log_details(event: &BrokerEvent, message: &BrokerMessage) {
    tracing::info!("EventSource = {}", event.event_source);
    tracing::info!("EventSourceARN = {}", event.event_source_arn);
    tracing::info!("CorrelationID = {}", message.correlation_id);
    tracing::info!("MessageID = {}", message.message_id);
    tracing::info!("MessageType = {}", message.message_type);
    tracing::info!("ReplyTo = {}", message.reply_to.as_deref().unwrap_or_default());
    tracing::info!("Type = {}", message.kind.as_deref().unwrap_or_default());
    tracing::info!("BrokerInTime = {}", message.broker_in_time);
    tracing::info!("BrokerOutTime = {}", message.broker_out_time);
    tracing::info!("DeliveryMode = {}", message.delivery_mode);
    tracing::info!("Expiration = {}", message.expiration);
    tracing::info!("Priority = {}", message.priority);
    tracing::info!("TimeStamp = {}", message.timestamp);
    tracing::info!("Queue = {}", message.destination.physical_name);
    tracing::info!("WhetherRedelivered = {}", message.redelivered);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message_with_data(data: &str) -> BrokerMessage {
        BrokerMessage {
            message_id: Field::Set("ID:b-1".into()),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    #[test]
    fn deserializes_broker_event() {
        let event = BrokerEvent::from_value(&json!({
            "eventSource": "aws:mq",
            "eventSourceArn": "arn:aws:mq:us-east-1:111122223333:broker:test:b-1",
            "messages": [{
                "messageID": "ID:b-1-1",
                "messageType": "jms/text-message",
                "correlationID": "seed-1",
                "type": "TextMessage",
                "timestamp": 1598827811958i64,
                "deliveryMode": 1,
                "priority": 4,
                "expiration": 0,
                "brokerInTime": 1598827811958i64,
                "brokerOutTime": 1598827811959i64,
                "redelivered": true,
                "destination": { "physicalName": "testQueue" },
                "data": "QUJDOkFBQUE=",
                "properties": { "index": "1" }
            }]
        }))
        .unwrap();

        assert_eq!(event.event_source, Field::Set("aws:mq".into()));
        let message = &event.messages[0];
        assert_eq!(message.message_id, Field::Set("ID:b-1-1".into()));
        assert_eq!(message.correlation_id, Field::Set("seed-1".into()));
        assert_eq!(message.kind.as_deref(), Some("TextMessage"));
        assert_eq!(message.reply_to, None);
        assert_eq!(message.broker_out_time, Field::Set(1598827811959));
        assert_eq!(message.destination.physical_name, Field::Set("testQueue".into()));
        assert_eq!(message.redelivered, Field::Set(true));
        assert_eq!(message.decode_body().unwrap(), "ABC:AAAA");
    }

    #[test]
    fn accepts_numbers_sent_as_strings() {
        let event = BrokerEvent::from_value(&json!({
            "messages": [{ "messageID": "m1", "expiration": "60000", "priority": " 4 ", "data": "e30=" }]
        }))
        .unwrap();

        let message = &event.messages[0];
        assert_eq!(message.expiration, Field::Set(60000));
        assert_eq!(message.priority, Field::Set(4));
    }

    #[test]
    fn rejects_non_numeric_strings() {
        let result = BrokerEvent::from_value(&json!({
            "messages": [{ "messageID": "m1", "expiration": "soon" }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn distinguishes_missing_from_null() {
        let event = BrokerEvent::from_value(&json!({
            "eventSourceArn": null,
            "messages": [{ "messageID": "ID:b-1-2", "brokerInTime": null, "destination": {} }]
        }))
        .unwrap();

        assert_eq!(event.event_source, Field::Missing);
        assert_eq!(event.event_source_arn, Field::Null);
        let message = &event.messages[0];
        assert_eq!(message.correlation_id, Field::Missing);
        assert_eq!(message.broker_in_time, Field::Null);
        assert_eq!(message.broker_in_time.value_or_default(), None);
        assert_eq!(message.priority.value_or_default(), Some(0));
        assert_eq!(message.destination.physical_name, Field::Missing);
        assert!(message.properties.is_none());
    }

    #[test]
    fn empty_event_has_no_messages() {
        let event = BrokerEvent::from_value(&json!({})).unwrap();
        assert!(event.messages.is_empty());
    }

    #[test]
    fn rejects_events_that_are_not_batches() {
        assert!(BrokerEvent::from_value(&json!([])).is_err());
        assert!(BrokerEvent::from_value(&json!([1, 2])).is_err());
        assert!(BrokerEvent::from_value(&json!({ "messages": null })).is_err());
    }

    #[test]
    fn raw_message_log_keeps_nulls_and_drops_missing() {
        let event = BrokerEvent::from_value(&json!({
            "messages": [{ "messageID": "m1", "correlationID": null }]
        }))
        .unwrap();

        let logged = serde_json::to_value(&event.messages[0]).unwrap();
        assert_eq!(logged["messageID"], "m1");
        assert!(logged["correlationID"].is_null());
        assert!(logged.get("priority").is_none());
    }

    #[test]
    fn base64_round_trip() {
        for body in ["", "a", "ab", "abc", r#"{"firstname":"Jo","lastname":"Do"}"#, "naïve ✓"] {
            let encoded = STANDARD.encode(body);
            let decoded = message_with_data(&encoded).decode_body().unwrap();
            assert_eq!(decoded, body);
            assert_eq!(STANDARD.encode(decoded), encoded);
        }
    }

    #[test]
    fn missing_data_is_empty_body() {
        let message = BrokerMessage::default();
        assert_eq!(message.decode_body().unwrap(), "");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(message_with_data("not base64!").decode_body().is_err());
    }

    #[test]
    fn rejects_non_utf8_body() {
        let encoded = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(message_with_data(&encoded).decode_body().is_err());
    }
}
