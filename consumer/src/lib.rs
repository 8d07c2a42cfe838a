use anyhow::Result;
use lambda_runtime::tracing;

pub mod config;
pub mod event;
pub mod person;
pub mod record;
pub mod store;

pub use config::Config;
pub use event::{BrokerEvent, BrokerMessage};
pub use person::Person;
pub use record::StorageRecord;
pub use store::{DynamoStore, RecordStore};

pub const SUCCESS: &str = "200";
pub const FAILURE: &str = "500";

pub struct Process<S> {
    store: Option<S>,
}

impl<S: RecordStore> Process<S> {
    /// Without a store, messages are decoded and logged but nothing is written.
    pub fn new(store: Option<S>) -> Process<S> {
        Process { store }
    }

    /// Runs the whole batch and reports it as a single status. An event that
    /// does not parse, or the first failing message, fails the batch.
    pub async fn handle(&self, payload: &serde_json::Value) -> &'static str {
        tracing::info!("Event: {}", payload);

        match self.handle_payload(payload).await {
            Ok(written) => {
                tracing::info!("Number of records written: {}", written);
                SUCCESS
            }
            Err(err) => {
                tracing::error!("An exception happened - {:#}", err);
                FAILURE
            }
        }
    }

    async fn handle_payload(&self, payload: &serde_json::Value) -> Result<usize> {
        let event = BrokerEvent::from_value(payload)?;
        tracing::info!("Number of messages received: {}", event.messages.len());
        self.run(&event).await
    }

    pub async fn run(&self, event: &BrokerEvent) -> Result<usize> {
        let mut written = 0;
        for message in &event.messages {
            if self.process_message(event, message).await? {
                written += 1;
            }
        }

        Ok(written)
    }

    async fn process_message(&self, event: &BrokerEvent, message: &BrokerMessage) -> Result<bool> {
        let receive_time = chrono::Utc::now().timestamp_millis();

        tracing::info!("Message: {}", serde_json::to_string(message)?);

        let body = message.decode_body()?;
        tracing::info!("Message body: {}", body);

        event::log_details(event, message);

        let person = Person::parse(&body)?;
        tracing::info!("This person = {}", serde_json::to_string(&person)?);

        let Some(store) = &self.store else {
            return Ok(false);
        };

        let record = StorageRecord::new(event, message, &person, receive_time);
        tracing::info!("Now inserting a row for messageID = {}", record.key());
        store.put(&record).await.inspect_err(|err| {
            tracing::error!("Error inserting messageID = {}: {:#}", record.key(), err)
        })?;
        tracing::info!("Now done inserting a row for messageID = {}", record.key());

        Ok(true)
    }
}
