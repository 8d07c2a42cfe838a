use anyhow::{Context, Result};
use serde::Serialize;
use std::io;
use std::path::Path;

const COLUMNS: usize = 12;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub firstname: String,
    pub lastname: String,
    pub company: String,
    pub street: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub zip: String,
    pub home_phone: String,
    pub cell_phone: String,
    pub email: String,
    pub website: String,
}

impl Person {
    /// Rows with fewer than twelve columns become an empty person.
    pub fn from_record(record: &csv::StringRecord) -> Person {
        if record.len() < COLUMNS {
            return Person::default();
        }

        let field = |i: usize| record[i].to_owned();
        Person {
            firstname: field(0),
            lastname: field(1),
            company: field(2),
            street: field(3),
            city: field(4),
            county: field(5),
            state: field(6),
            zip: field(7),
            home_phone: field(8),
            cell_phone: field(9),
            email: field(10),
            website: field(11),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn read_people(path: impl AsRef<Path>) -> Result<Vec<Person>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("{} file not found", path.display()))?;

    read_people_from(file).with_context(|| format!("failed reading {}", path.display()))
}

/// Reads every data row; the header row is skipped.
pub fn read_people_from<R: io::Read>(reader: R) -> Result<Vec<Person>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    rdr.records()
        .map(|result| {
            result
                .map(|record| Person::from_record(&record))
                .map_err(anyhow::Error::from)
        })
        .collect()
}
