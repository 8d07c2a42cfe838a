use crate::event::{BrokerEvent, BrokerMessage, Field};
use crate::person::Person;
use std::collections::BTreeMap;

pub const KEY: &str = "MessageID";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    S(String),
    N(i64),
    Bool(bool),
}

/// Flat row written to the destination table, one per broker message.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    attributes: BTreeMap<&'static str, Value>,
}

/// Missing fields take their default; fields sent as `null` are left out.
fn text(field: &Field<String>) -> Option<Value> {
    field.value_or_default().map(Value::S)
}

fn number(field: &Field<i64>) -> Option<Value> {
    field.value_or_default().map(Value::N)
}

impl StorageRecord {
    pub fn new(
        event: &BrokerEvent,
        message: &BrokerMessage,
        person: &Person,
        receive_time: i64,
    ) -> StorageRecord {
        let attributes = [
            (KEY, text(&message.message_id)),
            ("EventSource", text(&event.event_source)),
            ("EventSourceARN", text(&event.event_source_arn)),
            ("Firstname", text(&person.firstname)),
            ("Lastname", text(&person.lastname)),
            ("Company", text(&person.company)),
            ("Street", text(&person.street)),
            ("City", text(&person.city)),
            ("County", text(&person.county)),
            ("State", text(&person.state)),
            ("Zip", text(&person.zip)),
            ("Cellphone", text(&person.cell_phone)),
            ("Homephone", text(&person.home_phone)),
            ("Email", text(&person.email)),
            ("Website", text(&person.website)),
            ("CorrelationID", text(&message.correlation_id)),
            ("MessageType", text(&message.message_type)),
            ("ReplyTo", message.reply_to.clone().map(Value::S)),
            ("Type", message.kind.clone().map(Value::S)),
            ("BrokerInTime", number(&message.broker_in_time)),
            ("BrokerOutTime", number(&message.broker_out_time)),
            ("DeliveryMode", number(&message.delivery_mode)),
            ("Expiration", number(&message.expiration)),
            ("Priority", number(&message.priority)),
            ("TimeStamp", number(&message.timestamp)),
            ("Queue", text(&message.destination.physical_name)),
            ("WhetherRedelivered", message.redelivered.value_or_default().map(Value::Bool)),
            ("ReceiveTime", Some(Value::N(receive_time))),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|value| (name, value)))
        .collect();

        StorageRecord { attributes }
    }

    pub fn key(&self) -> &str {
        match self.attributes.get(KEY) {
            Some(Value::S(key)) => key.as_str(),
            _ => "",
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.attributes.iter().map(|(name, value)| (*name, value))
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
