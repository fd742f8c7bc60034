use crate::error::LandShapeError;
use crate::naming::MODEL_MARKER;
use std::env;
use std::time::Duration;

const DEFAULT_PREFIX: &str = "videos";
const DEFAULT_POLL_BUDGET_SECS: u64 = 300;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_URL_EXPIRY_SECS: u64 = 3600;
const DEFAULT_PART_SIZE_BYTES: u64 = 8 * 1024 * 1024;
/// S3 rejects multipart parts below this size, except the last one.
const MIN_PART_SIZE_BYTES: u64 = 5 * 1024 * 1024;

/// How the poller looks for an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LookupStrategy {
    /// List every object under the prefix and search the names.
    #[default]
    Scan,
    /// Check for the exact keys `{base}{marker}.usdz` and `{base}{marker}.mp4`.
    Direct,
}

/// Timing and matching parameters of a poll session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Length of the display countdown, counted down in whole seconds.
    pub budget: Duration,
    /// Time between two automatic lookups.
    pub check_interval: Duration,
    /// Substring every artifact name contains.
    pub marker: String,
    pub lookup: LookupStrategy,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            budget: Duration::from_secs(DEFAULT_POLL_BUDGET_SECS),
            check_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            marker: MODEL_MARKER.to_string(),
            lookup: LookupStrategy::Scan,
        }
    }
}

impl PollConfig {
    /// Number of one-second countdown ticks in the budget.
    pub fn budget_ticks(&self) -> u64 {
        self.budget.as_secs()
    }
}

/// Static access keys, used instead of the AWS default credential chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Settings for connecting to the bucket and running uploads and poll sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandShapeConfig {
    pub bucket: String,
    /// Region override; the AWS default chain is used when unset.
    pub region: Option<String>,
    /// Endpoint of an S3-compatible service. Enables path-style addressing.
    pub endpoint_url: Option<String>,
    pub credentials: Option<StaticCredentials>,
    /// Key prefix videos and artifacts share.
    pub prefix: String,
    /// Lifetime of presigned download URLs.
    pub url_expiry: Duration,
    /// Files larger than this are sent as a multipart upload in parts of this size.
    /// `from_env` requires at least 5 MiB.
    pub part_size: u64,
    pub poll: PollConfig,
}

impl LandShapeConfig {
    /// Creates a configuration for `bucket` with every other setting at its default.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint_url: None,
            credentials: None,
            prefix: DEFAULT_PREFIX.to_string(),
            url_expiry: Duration::from_secs(DEFAULT_URL_EXPIRY_SECS),
            part_size: DEFAULT_PART_SIZE_BYTES,
            poll: PollConfig::default(),
        }
    }

    /// Reads the configuration from `LANDSHAPE_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    ///
    /// # Errors
    ///
    /// - `LandShapeError::MissingBucket` if `LANDSHAPE_BUCKET` is not set.
    /// - `LandShapeError::InvalidConfig` if a numeric or enumerated variable cannot be parsed.
    pub fn from_env() -> Result<Self, LandShapeError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LandShapeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let Some(bucket) = non_empty("LANDSHAPE_BUCKET") else {
            return Err(LandShapeError::MissingBucket);
        };
        let mut config = Self::new(bucket);

        config.region = non_empty("LANDSHAPE_REGION");
        config.endpoint_url = non_empty("LANDSHAPE_ENDPOINT_URL");

        if let (Some(access_key_id), Some(secret_access_key)) = (
            non_empty("LANDSHAPE_ACCESS_KEY_ID"),
            non_empty("LANDSHAPE_SECRET_ACCESS_KEY"),
        ) {
            config.credentials = Some(StaticCredentials {
                access_key_id,
                secret_access_key,
            });
        }

        if let Some(prefix) = non_empty("LANDSHAPE_PREFIX") {
            config.prefix = prefix.trim_matches('/').to_string();
        }
        if let Some(value) = non_empty("LANDSHAPE_POLL_BUDGET_SECS") {
            config.poll.budget = Duration::from_secs(parse_u64("LANDSHAPE_POLL_BUDGET_SECS", &value)?);
        }
        if let Some(value) = non_empty("LANDSHAPE_POLL_INTERVAL_SECS") {
            let secs = parse_u64("LANDSHAPE_POLL_INTERVAL_SECS", &value)?;
            if secs == 0 {
                return Err(invalid("LANDSHAPE_POLL_INTERVAL_SECS", &value));
            }
            config.poll.check_interval = Duration::from_secs(secs);
        }
        if let Some(value) = non_empty("LANDSHAPE_URL_EXPIRY_SECS") {
            config.url_expiry = Duration::from_secs(parse_u64("LANDSHAPE_URL_EXPIRY_SECS", &value)?);
        }
        if let Some(value) = non_empty("LANDSHAPE_PART_SIZE_BYTES") {
            let bytes = parse_u64("LANDSHAPE_PART_SIZE_BYTES", &value)?;
            if bytes < MIN_PART_SIZE_BYTES {
                return Err(invalid("LANDSHAPE_PART_SIZE_BYTES", &value));
            }
            config.part_size = bytes;
        }
        if let Some(value) = non_empty("LANDSHAPE_LOOKUP") {
            config.poll.lookup = match value.trim().to_ascii_lowercase().as_str() {
                "scan" => LookupStrategy::Scan,
                "direct" => LookupStrategy::Direct,
                _ => return Err(invalid("LANDSHAPE_LOOKUP", &value)),
            };
        }

        Ok(config)
    }
}

fn parse_u64(name: &'static str, value: &str) -> Result<u64, LandShapeError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

fn invalid(name: &'static str, value: &str) -> LandShapeError {
    LandShapeError::InvalidConfig {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_bucket_is_set() {
        let config = LandShapeConfig::from_lookup(lookup(&[("LANDSHAPE_BUCKET", "media")])).unwrap();
        assert_eq!(config.bucket, "media");
        assert_eq!(config.prefix, "videos");
        assert_eq!(config.poll.budget, Duration::from_secs(300));
        assert_eq!(config.poll.check_interval, Duration::from_secs(60));
        assert_eq!(config.poll.budget_ticks(), 300);
        assert_eq!(config.poll.lookup, LookupStrategy::Scan);
        assert!(config.credentials.is_none());
    }

    #[test]
    fn missing_bucket_is_an_error() {
        let err = LandShapeConfig::from_lookup(lookup(&[("LANDSHAPE_BUCKET", "  ")])).unwrap_err();
        assert!(matches!(err, LandShapeError::MissingBucket));
    }

    #[test]
    fn reads_overrides() {
        let config = LandShapeConfig::from_lookup(lookup(&[
            ("LANDSHAPE_BUCKET", "media"),
            ("LANDSHAPE_PREFIX", "/uploads/"),
            ("LANDSHAPE_POLL_BUDGET_SECS", "120"),
            ("LANDSHAPE_POLL_INTERVAL_SECS", "15"),
            ("LANDSHAPE_LOOKUP", "Direct"),
            ("LANDSHAPE_ACCESS_KEY_ID", "key"),
            ("LANDSHAPE_SECRET_ACCESS_KEY", "secret"),
            ("LANDSHAPE_ENDPOINT_URL", "http://localhost:9000"),
        ]))
        .unwrap();
        assert_eq!(config.prefix, "uploads");
        assert_eq!(config.poll.budget, Duration::from_secs(120));
        assert_eq!(config.poll.check_interval, Duration::from_secs(15));
        assert_eq!(config.poll.lookup, LookupStrategy::Direct);
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(
            config.credentials,
            Some(StaticCredentials {
                access_key_id: "key".to_string(),
                secret_access_key: "secret".to_string(),
            })
        );
    }

    #[test]
    fn rejects_unparseable_numbers() {
        let err = LandShapeConfig::from_lookup(lookup(&[
            ("LANDSHAPE_BUCKET", "media"),
            ("LANDSHAPE_POLL_BUDGET_SECS", "five minutes"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            LandShapeError::InvalidConfig { name: "LANDSHAPE_POLL_BUDGET_SECS", .. }
        ));
    }

    #[test]
    fn rejects_part_size_below_s3_minimum() {
        let err = LandShapeConfig::from_lookup(lookup(&[
            ("LANDSHAPE_BUCKET", "media"),
            ("LANDSHAPE_PART_SIZE_BYTES", "1048576"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            LandShapeError::InvalidConfig { name: "LANDSHAPE_PART_SIZE_BYTES", .. }
        ));

        let config = LandShapeConfig::from_lookup(lookup(&[
            ("LANDSHAPE_BUCKET", "media"),
            ("LANDSHAPE_PART_SIZE_BYTES", "5242880"),
        ]))
        .unwrap();
        assert_eq!(config.part_size, 5 * 1024 * 1024);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = LandShapeConfig::from_lookup(lookup(&[
            ("LANDSHAPE_BUCKET", "media"),
            ("LANDSHAPE_POLL_INTERVAL_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, LandShapeError::InvalidConfig { .. }));
    }
}
