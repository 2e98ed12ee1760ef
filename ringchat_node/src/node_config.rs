use std::collections::HashMap;
use std::net::SocketAddr;
use std::num::ParseIntError;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Error};
use clap::{Arg, ArgMatches, builder::PossibleValue, Command, ValueEnum, value_parser};
use config::{Config, File as CfgFile, FileFormat as CfgFileFormat};
use serde::{de, Deserialize, Deserializer};
use serde_yaml::Value;

/// Default port nodes listen on.
pub const DEFAULT_PORT: u16 = 8000;

/// Config for threading.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum Threads {
    /// Detect number of threads automatically by the number of CPU cores.
    Auto,
    /// Exact number of threads.
    N(u16)
}

impl FromStr for Threads {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "auto" {
            Ok(Threads::Auto)
        } else {
            u16::from_str(s).map(Threads::N)
        }
    }
}

/// Specifies where to write logs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize)]
pub enum LogType {
    Stderr,
    Stdout,
    #[cfg(unix)]
    Syslog,
    None,
}

#[cfg(unix)]
const LOG_TYPES: &[LogType] = &[LogType::Stderr, LogType::Stdout, LogType::Syslog, LogType::None];
#[cfg(not(unix))]
const LOG_TYPES: &[LogType] = &[LogType::Stderr, LogType::Stdout, LogType::None];

impl ValueEnum for LogType {
    fn value_variants<'a>() -> &'a [Self] {
        LOG_TYPES
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        use self::LogType::*;
        Some(match self {
            Stderr => PossibleValue::new("Stderr"),
            Stdout => PossibleValue::new("Stdout"),
            #[cfg(unix)]
            Syslog => PossibleValue::new("Syslog"),
            None => PossibleValue::new("None")
        })
    }
}

fn de_threads<'de, D>(deserializer: D) -> Result<Threads, D::Error> where D: Deserializer<'de> {
    let s = String::deserialize(deserializer)?;

    Threads::from_str(&s)
        .map_err(|e| de::Error::custom(format!("threads: {:?}", e)))
}

/// Config parsed from command line arguments or a config file.
#[derive(Clone, Debug, Deserialize)]
pub struct NodeConfig {
    /// TCP address to listen on.
    pub address: SocketAddr,
    /// Host other nodes reach this node at. Taken from `address` when not
    /// set.
    #[serde(default)]
    pub host: Option<String>,
    /// Name this node is found by.
    pub pseudonym: String,
    /// `host:port` of a ring member to join through. A new ring is started
    /// when not set.
    #[serde(default)]
    pub bootstrap: Option<String>,
    /// Directory for the ring table, identity and chat partner files.
    #[serde(rename = "state-dir")]
    pub state_dir: String,
    /// Path to the file where the long-term keys are stored.
    #[serde(rename = "keys-file")]
    pub keys_file: String,
    /// Number of threads for execution.
    #[serde(deserialize_with = "de_threads")]
    pub threads: Threads,
    /// Specifies where to write logs.
    #[serde(rename = "log-type")]
    pub log_type: LogType,
    /// Seconds to wait for circuit hops to acknowledge their keys.
    #[serde(rename = "key-exchange-timeout")]
    pub key_exchange_timeout: u64,
    /// Unused fields while parsing config file
    #[serde(flatten)]
    pub unused: HashMap<String, Value>,
}

impl NodeConfig {
    /// Host put into the identity of this node.
    pub fn advertised_host(&self) -> String {
        match self.host {
            Some(ref host) => host.clone(),
            None if self.address.ip().is_unspecified() => "127.0.0.1".to_owned(),
            None => self.address.ip().to_string(),
        }
    }

    /// Key exchange timeout as `Duration`.
    pub fn key_exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.key_exchange_timeout)
    }
}

/// What the node binary was asked to do.
#[derive(Debug)]
pub enum Cli {
    /// Run a node.
    Run(NodeConfig),
    /// Print the node id of a pseudonym.
    DeriveId(String),
}

fn create_pseudonym_arg() -> Arg {
    Arg::new("pseudonym")
        .short('p')
        .long("pseudonym")
        .help("Name this node is found by")
        .num_args(1)
        .required(true)
}

fn app() -> Command {
    Command::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args_conflicts_with_subcommands(true)
        .subcommand_negates_reqs(true)
        .subcommand(Command::new("config")
            .arg(Arg::new("cfg-file")
                .index(1)
                .help("Load settings from saved config file. \
                    Config file format is YAML")
                .num_args(1)
                .required(true)))
        .subcommand(Command::new("derive-id")
            .about("Print the node id of a pseudonym")
            .arg(Arg::new("pseudonym")
                .index(1)
                .num_args(1)
                .required(true)))
        // here go args without subcommands
        .arg(create_pseudonym_arg())
        .arg(Arg::new("address")
            .short('a')
            .long("address")
            .help("TCP address to listen on")
            .num_args(1)
            .value_parser(value_parser!(SocketAddr))
            .default_value("0.0.0.0:8000"))
        .arg(Arg::new("host")
            .long("host")
            .help("Host other nodes reach this node at. Defaults to the IP \
                   of --address, or 127.0.0.1 when it's unspecified")
            .num_args(1))
        .arg(Arg::new("bootstrap")
            .short('b')
            .long("bootstrap")
            .help("Address of a ring member to join through, in the \
                   host:port form. Starts a new ring when not set")
            .num_args(1))
        .arg(Arg::new("state-dir")
            .short('d')
            .long("state-dir")
            .help("Directory for the ring table, identity and chat partner \
                   files")
            .num_args(1)
            .default_value("."))
        .arg(Arg::new("keys-file")
            .short('k')
            .long("keys-file")
            .help("Path to the file where long-term keys are stored")
            .num_args(1)
            .default_value("./keys"))
        .arg(Arg::new("threads")
            .short('j')
            .long("threads")
            .help("Number of threads to use. The value 'auto' means that the \
                   number of threads will be determined automatically by the \
                   number of CPU cores")
            .num_args(1)
            .value_parser(value_parser!(Threads))
            .default_value("1"))
        .arg(Arg::new("log-type")
            .short('l')
            .long("log-type")
            .help("Where to write logs")
            .num_args(1)
            .value_parser(value_parser!(LogType))
            .default_value("Stderr"))
        .arg(Arg::new("key-exchange-timeout")
            .long("key-exchange-timeout")
            .help("Seconds to wait for circuit hops to acknowledge their keys")
            .num_args(1)
            .value_parser(value_parser!(u64))
            .default_value("5"))
}

/// Parse command line arguments.
pub fn cli_parse() -> Result<Cli, Error> {
    let matches = app().get_matches();

    match matches.subcommand() {
        Some(("derive-id", m)) => Ok(run_derive_id(m)),
        Some(("config", m)) => run_config(m).map(Cli::Run),
        _ => run_args(&matches).map(Cli::Run),
    }
}

/// Parse settings from a saved file.
fn parse_config(config_path: &str) -> Result<NodeConfig, Error> {
    let config_file = Config::builder()
        .set_default("address", format!("0.0.0.0:{}", DEFAULT_PORT))?
        .set_default("state-dir", ".")?
        .set_default("keys-file", "./keys")?
        .set_default("log-type", "Stderr")?
        .set_default("threads", "1")?
        .set_default("key-exchange-timeout", 5)?
        .add_source(CfgFile::new(config_path, CfgFileFormat::Yaml))
        .build()
        .with_context(|| format!("Can't build config file {}", config_path))?;

    let config: NodeConfig = config_file.try_deserialize()
        .context("Can't deserialize config")?;

    if config.pseudonym.is_empty() {
        bail!("Can't deserialize config: 'pseudonym' is empty");
    }

    Ok(config)
}

fn run_derive_id(matches: &ArgMatches) -> Cli {
    let pseudonym = matches.get_one::<String>("pseudonym").cloned().unwrap_or_default();
    Cli::DeriveId(pseudonym)
}

fn run_config(matches: &ArgMatches) -> Result<NodeConfig, Error> {
    let config_path = matches.get_one::<String>("cfg-file")
        .context("Config file is not set")?;

    parse_config(config_path)
}

fn run_args(matches: &ArgMatches) -> Result<NodeConfig, Error> {
    let address = *matches.get_one::<SocketAddr>("address")
        .context("Listen address is not set")?;

    let host = matches.get_one::<String>("host").cloned();

    let pseudonym = matches.get_one::<String>("pseudonym").cloned()
        .context("Pseudonym is not set")?;

    let bootstrap = matches.get_one::<String>("bootstrap").cloned();

    let state_dir = matches.get_one::<String>("state-dir").cloned().unwrap_or_else(|| ".".to_owned());

    let keys_file = matches.get_one::<String>("keys-file").cloned().unwrap_or_else(|| "./keys".to_owned());

    let threads = matches.get_one("threads").copied().unwrap_or(Threads::N(1));

    let log_type = matches.get_one("log-type").copied().unwrap_or(LogType::Stderr);

    let key_exchange_timeout = matches.get_one("key-exchange-timeout").copied().unwrap_or(5);

    Ok(NodeConfig {
        address,
        host,
        pseudonym,
        bootstrap,
        state_dir,
        keys_file,
        threads,
        log_type,
        key_exchange_timeout,
        unused: HashMap::new(),
    })
}
