use crate::event::Field;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Contact record carried as JSON in the message body.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Person {
    pub firstname: Field<String>,
    pub lastname: Field<String>,
    pub company: Field<String>,
    pub street: Field<String>,
    pub city: Field<String>,
    pub county: Field<String>,
    pub state: Field<String>,
    pub zip: Field<String>,
    pub home_phone: Field<String>,
    pub cell_phone: Field<String>,
    pub email: Field<String>,
    pub website: Field<String>,
}

impl Person {
    /// The body must be a JSON object; arrays and scalars are rejected.
    pub fn parse(body: &str) -> Result<Person> {
        let value: serde_json::Value =
            serde_json::from_str(body).context("message body is not JSON")?;
        if !value.is_object() {
            bail!("message body is not a JSON object");
        }
        Person::deserialize(value).context("message body is not a person record")
    }
}
