use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};

pub mod endpoint;
pub mod person;
pub mod stomp;

pub use endpoint::Endpoint;
pub use person::{Person, read_people};

#[derive(Debug, Clone)]
pub struct Message {
    /// Used as the STOMP receipt so each send can be confirmed.
    pub id: String,
    pub destination: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Message {
    pub fn new(queue: &str, key: &str, number: usize, person: &Person) -> Result<Message> {
        Ok(Message {
            id: Self::id(),
            destination: format!("/queue/{}", queue),
            headers: vec![
                ("correlation-id".into(), format!("{}-{}", key, number)),
                ("type".into(), "TextMessage".into()),
                ("MessageBatchIdentifier".into(), key.to_owned()),
                ("MessageNumberInBatch".into(), number.to_string()),
                ("persistent".into(), "true".into()),
                ("content-type".into(), "application/json".into()),
            ],
            body: person.to_json()?,
        })
    }

    fn id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, message: &Message) -> Result<()>;
}

/// Batch-tracking key: the seeder key suffixed with the run's start time.
pub fn batch_key<Tz: TimeZone>(seeder_key: &str, now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-{}", seeder_key, now.format("%m-%d-%Y-%H-%M-%S"))
}

pub struct Process<P> {
    publisher: P,
    queue: String,
    key: String,
}

impl<P: Publisher> Process<P> {
    pub fn new(publisher: P, queue: String, key: String) -> Process<P> {
        Process {
            publisher,
            queue,
            key,
        }
    }

    /// Publishes one message per person, up to `requested`, stopping at the
    /// first failed send.
    pub async fn run(&mut self, people: &[Person], requested: usize) -> Result<usize> {
        let count = requested.min(people.len());
        tracing::info!(
            "Sending {} messages ({} requested, {} available)",
            count,
            requested,
            people.len()
        );

        for (i, person) in people.iter().take(count).enumerate() {
            let number = i + 1;
            let message = Message::new(&self.queue, &self.key, number, person)?;

            self.publisher
                .publish(&message)
                .await
                .with_context(|| format!("failed sending message number {}", number))?;

            tracing::info!(
                "Sent out one message - Number {} at time = {}",
                number,
                chrono::Utc::now().timestamp_millis()
            );
        }

        Ok(count)
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use chrono::Utc;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: Vec<Message>,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&mut self, message: &Message) -> Result<()> {
            if self.fail_at == Some(self.sent.len() + 1) {
                bail!("connection reset");
            }
            self.sent.push(message.clone());
            Ok(())
        }
    }

    fn people(n: usize) -> Vec<Person> {
        (0..n)
            .map(|i| Person {
                firstname: format!("first{}", i),
                ..Default::default()
            })
            .collect()
    }

    fn process(publisher: RecordingPublisher) -> Process<RecordingPublisher> {
        Process::new(publisher, "people".into(), "seed-10-19-2026-09-30-00".into())
    }

    #[tokio::test]
    async fn caps_at_available_rows() {
        let mut process = process(RecordingPublisher::default());
        let sent = process.run(&people(4), 10).await.unwrap();

        assert_eq!(sent, 4);
        assert_eq!(process.into_publisher().sent.len(), 4);
    }

    #[tokio::test]
    async fn sends_requested_count() {
        let mut process = process(RecordingPublisher::default());
        let sent = process.run(&people(4), 2).await.unwrap();

        assert_eq!(sent, 2);
        let sent = process.into_publisher().sent;
        assert_eq!(sent.len(), 2);
        assert!(sent[1].body.contains(r#""firstname":"first1""#));
    }

    #[tokio::test]
    async fn zero_requested_sends_nothing() {
        let mut process = process(RecordingPublisher::default());
        assert_eq!(process.run(&people(3), 0).await.unwrap(), 0);
        assert!(process.into_publisher().sent.is_empty());
    }

    #[tokio::test]
    async fn message_headers_track_the_batch() {
        let mut process = process(RecordingPublisher::default());
        process.run(&people(3), 3).await.unwrap();
        let sent = process.into_publisher().sent;

        let third = &sent[2];
        assert_eq!(third.destination, "/queue/people");
        assert_eq!(third.header("correlation-id"), Some("seed-10-19-2026-09-30-00-3"));
        assert_eq!(third.header("MessageBatchIdentifier"), Some("seed-10-19-2026-09-30-00"));
        assert_eq!(third.header("MessageNumberInBatch"), Some("3"));
        assert_eq!(third.header("persistent"), Some("true"));
        assert_eq!(third.header("type"), Some("TextMessage"));
        assert_ne!(sent[0].id, sent[1].id);
    }

    #[tokio::test]
    async fn publish_failure_aborts_remaining_sends() {
        let mut process = process(RecordingPublisher {
            fail_at: Some(2),
            ..Default::default()
        });

        let err = process.run(&people(5), 5).await.unwrap_err();
        assert!(format!("{:#}", err).contains("message number 2"));
        assert_eq!(process.into_publisher().sent.len(), 1);
    }

    #[tokio::test]
    async fn csv_rows_drive_message_count() {
        let csv = "h1,h2\na,1\nb,2\nc,3\n";
        let rows = read_people_from_str(csv);

        let mut capped = process(RecordingPublisher::default());
        assert_eq!(capped.run(&rows, 100).await.unwrap(), 3);
        let mut partial = process(RecordingPublisher::default());
        assert_eq!(partial.run(&rows, 2).await.unwrap(), 2);
    }

    fn read_people_from_str(csv: &str) -> Vec<Person> {
        person::read_people_from(csv.as_bytes()).unwrap()
    }

    #[test]
    fn batch_key_appends_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 8, 5, 9).unwrap();
        assert_eq!(batch_key("seed", now), "seed-10-19-2026-08-05-09");
    }
}
