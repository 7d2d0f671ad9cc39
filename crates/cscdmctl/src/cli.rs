use clap::{Args, Parser, Subcommand, ValueEnum};
use cscdm_core::config::{ApiConfig, ClientConfig, CscdmConfig, DEFAULT_API_URL};
use cscdm_core::{RecordAction, RecordType, Zone};
use tracing::Level;

macro_rules! env_prefix {
    () => {
        "CSCDM_"
    };
}

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Domain Manager API key
    #[arg(long, env = concat!(env_prefix!(), "API_KEY"), hide_env_values = true)]
    pub api_key: String,

    /// Domain Manager bearer token
    #[arg(long, env = concat!(env_prefix!(), "API_TOKEN"), hide_env_values = true)]
    pub api_token: String,

    /// Base URL of the Domain Manager API
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_API_URL,
        env = concat!(env_prefix!(), "API_URL")
    )]
    pub api_url: String,

    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        default_value_t = Loglevel::Info,
        value_name = "LEVEL",
        env = concat!(env_prefix!(), "LOG_LEVEL")
    )]
    pub log_level: Loglevel,

    /// Idle window before queued edits are flushed, in milliseconds
    #[arg(long, default_value_t = 5_000, env = concat!(env_prefix!(), "FLUSH_IDLE_MS"))]
    pub flush_idle_ms: u64,

    /// Interval between zone edit status polls, in milliseconds
    #[arg(long, default_value_t = 5_000, env = concat!(env_prefix!(), "POLL_INTERVAL_MS"))]
    pub poll_interval_ms: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// List every zone visible to the account
    Zones,

    /// Show one zone, or a filtered part of it
    Zone(ZoneArgs),

    /// Add a record
    Add {
        zone: String,
        #[arg(value_parser = parse_record_type)]
        record_type: RecordType,
        key: String,
        value: String,
        ttl: Option<i64>,
        priority: Option<i64>,
    },

    /// Change the value of an existing record
    Edit(EditArgs),

    /// Delete a record
    Purge {
        zone: String,
        #[arg(value_parser = parse_record_type)]
        record_type: RecordType,
        key: String,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ZoneArgs {
    pub name: String,

    /// Only show records of this type
    #[arg(long = "type", value_parser = parse_record_type)]
    pub record_type: Option<RecordType>,

    /// Only show records with this key (repeatable)
    #[arg(long = "key", requires = "record_type")]
    pub keys: Vec<String>,
}

impl ZoneArgs {
    /// The part of `zone` selected by the filters
    pub fn view(&self, zone: &Zone) -> serde_json::Result<serde_json::Value> {
        match self.record_type {
            None => serde_json::to_value(zone),
            Some(record_type) if self.keys.is_empty() => serde_json::to_value(zone.records(record_type)),
            Some(record_type) => {
                let keys: Vec<&str> = self.keys.iter().map(String::as_str).collect();
                serde_json::to_value(zone.records_by_keys(record_type, &keys))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct EditArgs {
    pub zone: String,
    #[arg(value_parser = parse_record_type)]
    pub record_type: RecordType,
    pub key: String,
    pub value: String,
    pub new_value: String,
    /// Defaults to the record's current TTL
    pub ttl: Option<i64>,
    /// Defaults to the record's current priority
    pub priority: Option<i64>,
}

impl EditArgs {
    /// EDIT action identifying the existing record by its state in `zone`
    pub fn to_action(&self, zone: &Zone) -> RecordAction {
        let (current_ttl, current_priority) = zone
            .record_by_identity(self.record_type, &self.key, &self.value)
            .map(|record| (record.ttl, record.priority))
            .unwrap_or_default();

        RecordAction::edit(
            self.zone.clone(),
            self.record_type,
            (self.key.clone(), self.value.clone()),
            (self.key.clone(), self.new_value.clone()),
        )
        .with_current_ttl_priority(current_ttl, current_priority)
        .with_ttl(self.ttl.unwrap_or(current_ttl))
        .with_priority(self.priority.unwrap_or(current_priority))
    }
}

fn parse_record_type(s: &str) -> Result<RecordType, String> {
    s.parse().map_err(|e: cscdm_core::Error| e.to_string())
}

impl Cli {
    /// Full client configuration from the parsed arguments
    pub fn config(&self) -> CscdmConfig {
        CscdmConfig {
            api: ApiConfig::new(self.api_key.clone(), self.api_token.clone())
                .with_base_url(self.api_url.clone()),
            client: ClientConfig {
                flush_idle_ms: self.flush_idle_ms,
                poll_interval_ms: self.poll_interval_ms,
                max_flush_delay_ms: ClientConfig::default()
                    .max_flush_delay_ms
                    .max(self.flush_idle_ms),
                max_batch_size: None,
            },
        }
    }
}

/// Used to set the applications loglevel
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Loglevel> for Level {
    fn from(ll: Loglevel) -> Self {
        match ll {
            Loglevel::Error => Level::ERROR,
            Loglevel::Warn => Level::WARN,
            Loglevel::Info => Level::INFO,
            Loglevel::Debug => Level::DEBUG,
            Loglevel::Trace => Level::TRACE,
        }
    }
}
