//! Configuration types.
//!
//! Settings come from environment variables, with an optional JSON file
//! (`TRACKER_CONFIG_PATH`) for the larger tables: sector labels, stock
//! phrases and opening hours. Environment values win over the file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Offset, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::working_time::WeeklySchedule;

/// Default business offset: UTC-03:00 (Brasília).
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = -180;

/// Suffix the messaging network appends to customer addresses.
pub const DEFAULT_ADDRESS_SUFFIX: &str = "@c.us";

// ── Sector table ────────────────────────────────────────────────────

/// Menu option → sector label.
///
/// Keys are the literal option text the customer types ("1" … "10").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectorTable(BTreeMap<String, String>);

impl SectorTable {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Label for an option, if the table has one.
    pub fn label(&self, option: &str) -> Option<&str> {
        self.0.get(option).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SectorTable {
    fn default() -> Self {
        Self::from_pairs([
            ("1", "Comercial"),
            ("2", "Contas a Receber (Clientes)"),
            ("3", "Contas a Pagar (Fornecedores)"),
            ("4", "Faturamento / Heishop"),
            ("5", "Entrega"),
            ("6", "Chopp Delivery"),
            ("7", "Recursos Humanos"),
            ("8", "Elogios ou Reclamações"),
            ("9", "Alterar Cadastro"),
            ("10", "Cancelar"),
        ])
    }
}

// ── Phrasebook ──────────────────────────────────────────────────────

/// Fixed agent-side phrases the classifier looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phrasebook {
    /// Marker placed in mass campaigns; such messages are never replies.
    pub bulk_marker: String,
    /// Sent by the menu bot when the customer must pick a sector.
    pub menu_prompt: String,
    /// Holding reply: the bot is forwarding the customer to an attendant.
    pub forwarding: String,
    /// Holding reply: outside opening hours.
    pub closed: String,
    /// Holding reply: attendants are at lunch.
    pub lunch_break: String,
    /// Announces a transfer to another sector.
    pub redirect: String,
}

impl Default for Phrasebook {
    fn default() -> Self {
        Self {
            bulk_marker: "!!!!! Colocar a mensagem aqui !!!!!!".into(),
            menu_prompt: "Por favor digite o número da opção que você deseja".into(),
            forwarding: "estou encaminhando para atendimento".into(),
            closed: "Estamos fechados no momento".into(),
            lunch_break: "Nossos atendentes estão em horário de almoço".into(),
            redirect: "Você está sendo redirecionado(a) para o setor".into(),
        }
    }
}

// ── File config ─────────────────────────────────────────────────────

/// Optional JSON file. Every field falls back to its default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub sectors: Option<SectorTable>,
    pub phrases: Option<Phrasebook>,
    pub schedule: Option<WeeklySchedule>,
    pub utc_offset_minutes: Option<i32>,
    pub address_suffix: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::ParseError(format!("{}: {e}", path.display())))
    }
}

// ── Tracker config ──────────────────────────────────────────────────

/// HTTP webhook source settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub port: u16,
    /// Expected `Authorization: Bearer` token. `None` accepts every caller.
    pub token: Option<SecretString>,
}

/// Full runtime configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub utc_offset: FixedOffset,
    pub address_suffix: String,
    pub sectors: SectorTable,
    pub phrases: Phrasebook,
    pub schedule: WeeklySchedule,
    pub stdin_enabled: bool,
    pub webhook: Option<WebhookConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/handoff-tracker.db"),
            log_dir: PathBuf::from("./logs"),
            utc_offset: default_offset(),
            address_suffix: DEFAULT_ADDRESS_SUFFIX.to_string(),
            sectors: SectorTable::default(),
            phrases: Phrasebook::default(),
            schedule: WeeklySchedule::default(),
            stdin_enabled: true,
            webhook: None,
        }
    }
}

impl TrackerConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match var("TRACKER_CONFIG_PATH") {
            Some(path) => FileConfig::load(Path::new(&path))?,
            None => FileConfig::default(),
        };

        let defaults = Self::default();

        let offset_minutes = match var("TRACKER_UTC_OFFSET_MINUTES") {
            Some(raw) => Some(parse_var::<i32>("TRACKER_UTC_OFFSET_MINUTES", &raw)?),
            None => file.utc_offset_minutes,
        };
        let utc_offset = match offset_minutes {
            Some(minutes) => offset_from_minutes(minutes)?,
            None => defaults.utc_offset,
        };

        let stdin_enabled = match var("TRACKER_STDIN") {
            Some(raw) => parse_var::<bool>("TRACKER_STDIN", &raw)?,
            None => defaults.stdin_enabled,
        };

        let webhook = match var("TRACKER_WEBHOOK_PORT") {
            Some(raw) => Some(WebhookConfig {
                port: parse_var::<u16>("TRACKER_WEBHOOK_PORT", &raw)?,
                token: var("TRACKER_WEBHOOK_TOKEN")
                    .filter(|t| !t.trim().is_empty())
                    .map(SecretString::from),
            }),
            None => None,
        };

        Ok(Self {
            db_path: var("TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            log_dir: var("TRACKER_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            utc_offset,
            address_suffix: file.address_suffix.unwrap_or(defaults.address_suffix),
            sectors: file.sectors.unwrap_or(defaults.sectors),
            phrases: file.phrases.unwrap_or(defaults.phrases),
            schedule: file.schedule.unwrap_or(defaults.schedule),
            stdin_enabled,
            webhook,
        })
    }
}

fn default_offset() -> FixedOffset {
    offset_from_minutes(DEFAULT_UTC_OFFSET_MINUTES).unwrap_or_else(|_| Utc.fix())
}

/// Turn a signed minute count into a fixed offset.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, ConfigError> {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: "utc_offset_minutes".into(),
            message: format!("{minutes} is outside ±24h"),
        })
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
