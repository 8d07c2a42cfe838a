use anyhow::{Context, Result, bail};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_PORT: u16 = 61617;

/// Broker address in the form `ssl://host:port`. The scheme is optional and
/// implies TLS when omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

fn tls_scheme(scheme: &str) -> Result<bool> {
    match scheme.to_ascii_lowercase().as_str() {
        "ssl" | "stomp+ssl" | "tls" => Ok(true),
        "tcp" | "stomp" => Ok(false),
        other => bail!("unsupported endpoint scheme: {}", other),
    }
}

impl FromStr for Endpoint {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Endpoint> {
        let (tls, address) = match s.trim().split_once("://") {
            Some((scheme, address)) => (tls_scheme(scheme)?, address),
            None => (true, s.trim()),
        };
        let address = address.trim_end_matches('/');

        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .with_context(|| format!("invalid port in endpoint: {}", s))?;
                (host, port)
            }
            None => (address, DEFAULT_PORT),
        };

        if host.is_empty() {
            bail!("endpoint has no host: {}", s);
        }

        Ok(Endpoint {
            host: host.to_owned(),
            port,
            tls,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.tls { "ssl" } else { "tcp" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}
