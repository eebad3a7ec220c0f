use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::{net::SocketAddr, str::FromStr};

/// Process-level configuration, assembled once at startup from CLI flags
/// and held immutably for the life of the process. Deliberately minimal per
/// the external interface contract: no per-request configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the HTTP ingestion endpoint binds to.
    pub listen_address: SocketAddr,
    /// Port the Prometheus scrape endpoint binds to, on all interfaces.
    pub metrics_port: u16,
    /// `postgres://...` connection string for the order/catalog/idempotency
    /// stores.
    pub database_url: String,
    /// Shared secret used to verify `Authorization: Bearer` JWTs.
    pub jwt_verification_key: String,
    /// Business timezone used to compute "today" for delivery-date
    /// validation. Configuration, not baked into the data model.
    pub business_timezone: Tz,
    /// A hint used to size the chunking of very large uploads; the
    /// orchestrator does not otherwise bound batch size.
    pub batch_size_hint: usize,
}

impl AppConfig {
    pub fn from_matches(matches: &clap::ArgMatches) -> Result<AppConfig> {
        let listen_address = matches
            .value_of("listen-address")
            .ok_or_else(|| anyhow!("listen-address is required"))?
            .parse()
            .context("parsing listen-address")?;

        let metrics_port = matches
            .value_of("metrics-port")
            .ok_or_else(|| anyhow!("metrics-port is required"))?
            .parse()
            .context("parsing metrics-port")?;

        let database_url = matches
            .value_of("database-url")
            .ok_or_else(|| anyhow!("database-url is required"))?
            .to_owned();

        let jwt_verification_key = matches
            .value_of("jwt-verification-key")
            .ok_or_else(|| anyhow!("jwt-verification-key is required"))?
            .to_owned();

        let business_timezone = matches
            .value_of("business-timezone")
            .unwrap_or("America/Lima")
            .parse::<Tz>()
            .map_err(|e| anyhow!("parsing business-timezone: {e}"))?;

        let batch_size_hint = matches
            .value_of("batch-size-hint")
            .unwrap_or("5000")
            .parse()
            .context("parsing batch-size-hint")?;

        Ok(AppConfig {
            listen_address,
            metrics_port,
            database_url,
            jwt_verification_key,
            business_timezone,
            batch_size_hint,
        })
    }
}

/// Newtype wrapper so a parse failure on the timezone flag gets a message
/// that names the flag, rather than chrono-tz's bare "unknown timezone".
#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a recognized IANA timezone name")]
pub struct TimezoneParseError(String);

pub fn parse_timezone(s: &str) -> std::result::Result<Tz, TimezoneParseError> {
    Tz::from_str(s).map_err(|_| TimezoneParseError(s.to_owned()))
}
