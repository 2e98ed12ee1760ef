#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

mod node_config;
mod repl;

use std::convert::TryInto;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Error};
use futures::{channel::mpsc, Future, FutureExt, TryFutureExt};
use rand::thread_rng;
use ringchat::core::net::OUTBOUND_CHANNEL_SIZE;
use ringchat::core::node::Node;
use ringchat::core::node_ext::node_run;
use ringchat::core::state::FileStore;
use ringchat::crypto::*;
use ringchat::packet::identity::{NodeId, NodeIdentity};
use tokio::net::TcpListener;
use tokio::runtime;
#[cfg(unix)]
use syslog::Facility;

use crate::node_config::*;
use crate::repl::run_console;

/// Save long-term keys to a binary file.
fn save_keys(keys_file: &str, pk: &PublicKey, sk: &SecretKey) -> Result<(), Error> {
    #[cfg(unix)]
    use std::os::unix::fs::OpenOptionsExt;

    #[cfg(not(unix))]
    let mut file = File::create(keys_file)
        .context("Failed to create the keys file")?;

    #[cfg(unix)]
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .mode(0o600)
        .open(keys_file)
        .context("Failed to create the keys file")?;

    file.write_all(pk.as_bytes()).context("Failed to save public key to the keys file")?;
    file.write_all(sk.as_bytes()).context("Failed to save secret key to the keys file")?;
    Ok(())
}

/// Load long-term keys from a binary file.
fn load_keys(mut file: File) -> Result<(PublicKey, SecretKey), Error> {
    let mut buf = [0; KEY_SIZE * 2];
    file.read_exact(&mut buf).context("Failed to read keys from the keys file")?;
    let pk_bytes: [u8; KEY_SIZE] = buf[..KEY_SIZE].try_into().context("Failed to read public key from the keys file")?;
    let sk_bytes: [u8; KEY_SIZE] = buf[KEY_SIZE..].try_into().context("Failed to read secret key from the keys file")?;
    let pk = PublicKey::from(pk_bytes);
    let sk = SecretKey::from(sk_bytes);
    if pk != sk.public_key() {
        bail!("The loaded public key does not correspond to the loaded secret key");
    }
    Ok((pk, sk))
}

/// Load long-term keys from a binary file or generate and save them if file
/// does not exist.
fn load_or_gen_keys(keys_file: &str) -> Result<(PublicKey, SecretKey), Error> {
    match File::open(keys_file) {
        Ok(file) => load_keys(file),
        Err(ref e) if e.kind() == ErrorKind::NotFound => {
            info!("Generating new keys and storing them to '{}'", keys_file);
            let sk = SecretKey::generate(&mut thread_rng());
            let pk = sk.public_key();
            save_keys(keys_file, &pk, &sk)?;
            Ok((pk, sk))
        },
        Err(e) => Err(Error::new(e).context("Failed to read the keys file")),
    }
}

/// Run a future with the runtime specified by config.
fn run<F>(future: F, threads: Threads) -> Result<(), Error>
    where F: Future<Output = Result<(), Error>>
{
    let runtime = if threads == Threads::N(1) {
        runtime::Builder::new_current_thread()
            .enable_all()
            .build()
    } else {
        let mut builder = runtime::Builder::new_multi_thread();
        match threads {
            Threads::N(n) => { builder.worker_threads(n as usize); },
            Threads::Auto => { }, // builder will detect number of cores automatically
        }
        builder
            .enable_all()
            .build()
    };
    let runtime = runtime.context("Failed to create runtime")?;
    runtime.block_on(future)
}

fn init_logger(log_type: LogType) -> Result<(), Error> {
    match log_type {
        LogType::Stderr => {
            let env = env_logger::Env::default()
                .filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env)
                .init();
        },
        LogType::Stdout => {
            let env = env_logger::Env::default()
                .filter_or("RUST_LOG", "info");
            env_logger::Builder::from_env(env)
                .target(env_logger::fmt::Target::Stdout)
                .init();
        },
        #[cfg(unix)]
        LogType::Syslog => {
            syslog::init(Facility::LOG_USER, log::LevelFilter::Info, None)
                .map_err(|e| Error::msg(e.to_string()))
                .context("Failed to initialize syslog backend")?;
        },
        LogType::None => { },
    }
    Ok(())
}

async fn run_node(config: NodeConfig, pk: PublicKey, sk: SecretKey) -> Result<(), Error> {
    let listener = TcpListener::bind(config.address).await
        .with_context(|| format!("Failed to bind TCP listener on {}", config.address))?;
    let port = listener.local_addr()?.port();

    let identity = NodeIdentity::new(config.advertised_host(), port, config.pseudonym.clone(), pk);
    let store = FileStore::new(&config.state_dir)?;

    // Create a channel for the node to send frames to the network
    let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_SIZE);

    let mut node = Node::start(tx, identity.clone(), sk, Arc::new(store), config.key_exchange_timeout())?;
    let (message_tx, message_rx) = mpsc::unbounded();
    let (partner_tx, partner_rx) = mpsc::unbounded();
    node.set_message_sink(message_tx);
    node.set_partner_sink(partner_tx);

    info!("Node {} with id {}", identity, identity.node_id.as_str());

    if !node.ring.table().await.is_alone() {
        info!("Rejoining the ring with the saved neighbors");
    } else if let Some(ref bootstrap) = config.bootstrap {
        node.join(bootstrap).await?;
    } else {
        info!("Starting a new ring");
    }

    let node_future = node_run(&node, listener, rx).map_err(Error::from);
    let console_future = run_console(&node, message_rx, partner_rx);

    futures::select! {
        res = node_future.fuse() => res,
        res = console_future.fuse() => res,
    }
}

fn main() -> Result<(), Error> {
    let config = match cli_parse()? {
        Cli::DeriveId(pseudonym) => {
            println!("{}", NodeId::from_pseudonym(&pseudonym).as_str());
            return Ok(());
        },
        Cli::Run(config) => config,
    };

    init_logger(config.log_type)?;

    for key in config.unused.keys() {
        warn!("Unused configuration key: {:?}", key);
    }

    let (pk, sk) = load_or_gen_keys(&config.keys_file)?;

    info!("Public key: {}", hex::encode(pk.as_bytes()).to_uppercase());

    let threads = config.threads;
    run(run_node(config, pk, sk), threads)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");
        let path = path.to_str().unwrap();

        let (pk, sk) = load_or_gen_keys(path).unwrap();
        assert_eq!(std::fs::metadata(path).unwrap().len(), (KEY_SIZE * 2) as u64);

        let (loaded_pk, loaded_sk) = load_or_gen_keys(path).unwrap();
        assert_eq!(loaded_pk, pk);
        assert_eq!(loaded_sk.as_bytes(), sk.as_bytes());
    }

    #[cfg(unix)]
    #[test]
    fn keys_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");
        load_or_gen_keys(path.to_str().unwrap()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn keys_file_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");
        let pk = SecretKey::generate(&mut thread_rng()).public_key();
        let sk = SecretKey::generate(&mut thread_rng());
        save_keys(path.to_str().unwrap(), &pk, &sk).unwrap();

        assert!(load_or_gen_keys(path.to_str().unwrap()).is_err());
    }

    #[test]
    fn keys_file_too_short() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys");
        std::fs::write(&path, [0; KEY_SIZE]).unwrap();

        assert!(load_or_gen_keys(path.to_str().unwrap()).is_err());
    }
}
