use aws_config::{BehaviorVersion, SdkConfig, retry::RetryConfig};

pub const TABLE_VAR: &str = "DYNAMO_DB_TABLE";
pub const LOCAL_VAR: &str = "AWS_SAM_LOCAL";

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub table: Option<String>,
    /// Set when running under `sam local`; suppresses table writes.
    pub local: bool,
}

impl Config {
    pub fn from_env() -> Config {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Config {
        Config {
            table: lookup(TABLE_VAR).filter(|table| !table.is_empty()),
            local: lookup(LOCAL_VAR).is_some_and(|value| !value.is_empty()),
        }
    }

    pub fn write_table(&self) -> Option<&str> {
        if self.local {
            None
        } else {
            self.table.as_deref()
        }
    }
}

pub async fn get_aws_config() -> SdkConfig {
    let version = BehaviorVersion::v2025_01_17();
    let retry_config = RetryConfig::disabled();

    aws_config::defaults(version)
        .retry_config(retry_config)
        .load()
        .await
}
