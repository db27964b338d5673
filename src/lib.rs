pub mod authn;
pub mod config;
pub mod credentials;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod keystore;
pub mod session;
pub mod uv;

pub use error::{Error, Result};
pub use session::{FallbackPolicy, KeySource, Session};
pub use uv::UserVerified;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use authn::SoftAuthenticator;
use authn::options::RelyingParty;
use config::{Command, Config};
use keystore::{FileStorage, KeyStore, SystemClock};
use uv::PinentryVerifier;

type LocalSession = Session<SoftAuthenticator<PinentryVerifier>>;

pub async fn run(cfg: Config) -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    let level = match cfg.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = cfg.resolve_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    tracing::debug!(data_dir = %data_dir.display(), command = ?cfg.command, "Starting biokey");

    let session = open_session(&cfg, &data_dir)?;

    match cfg.command.clone() {
        Command::Unlock => {
            diagnostics::check(&cfg, &data_dir)?;
            let lock_path = lock_path(&data_dir);
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            let mut lock = fd_lock::RwLock::new(lock_file);
            let _guard = lock.try_write().map_err(|_| {
                anyhow::anyhow!("another biokey prompt is in progress (lock: {})", lock_path.display())
            })?;

            eprintln!("Scanning...");
            match session.obtain_key().await {
                Ok(unlocked) => {
                    let remaining = session.status()?.remaining;
                    println!("Success! {}", unlocked.record.address());
                    println!(
                        "Key source: {:?}, expires in {}",
                        unlocked.source,
                        keystore::format_countdown(remaining)
                    );
                }
                Err(e) => {
                    eprintln!("Error: {}", e.user_message());
                    return Err(e.into());
                }
            }
        }
        Command::Status => println!("{}", session.status()?),
        Command::Key => {
            let record = session
                .current()?
                .ok_or_else(|| anyhow::anyhow!("no active key; run `biokey unlock` first"))?;
            println!("{}", serde_json::to_string_pretty(&record.handoff())?);
        }
        Command::Lock => {
            session.lock()?;
            println!("Ready");
        }
        Command::Forget { purge_credential } => {
            let previous = session.forget()?;
            match previous {
                Some(id) if purge_credential => {
                    let removed = session.authenticator().remove_credential(&id)?;
                    println!("Forgot this device (credential {id} removed: {removed})");
                }
                _ => println!("Forgot this device"),
            }
        }
        Command::Watch => watch_countdown(&session).await,
    }
    Ok(())
}

fn open_session(cfg: &Config, data_dir: &Path) -> anyhow::Result<LocalSession> {
    let store = KeyStore::load(
        Box::new(FileStorage::new(data_dir.to_path_buf())),
        Arc::new(SystemClock),
    )?;

    let creds_dir = data_dir.join("credentials");
    std::fs::create_dir_all(&creds_dir)?;
    let key = credentials::device_key::load_or_create(&data_dir.join("device.key"))?;
    let creds = credentials::CredentialStore::load(key, creds_dir)?;
    tracing::info!(count = creds.credential_count(), "Credential store loaded");

    let authenticator = SoftAuthenticator::new(
        RelyingParty::new(cfg.rp_id.clone(), config::RP_NAME),
        Arc::new(Mutex::new(creds)),
        PinentryVerifier::new(cfg.pinentry.clone()),
    );
    let policy = if cfg.strict_fallback {
        FallbackPolicy::OnlyWhenAbsent
    } else {
        FallbackPolicy::Always
    };
    Ok(Session::new(authenticator, store, cfg.label.clone()).with_policy(policy))
}

fn lock_path(data_dir: &Path) -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| data_dir.to_path_buf())
        .join("biokey.lock")
}

async fn watch_countdown(session: &LocalSession) {
    let watch = keystore::spawn_expiry_watch(session.store(), Duration::from_millis(config::TICK_MILLIS));
    let mut remaining = watch.remaining();
    if remaining.borrow().is_none() {
        println!("No active key");
        watch.stop().await;
        return;
    }
    loop {
        let current = *remaining.borrow_and_update();
        match current {
            Some(left) if !left.is_zero() => println!("{}", keystore::format_countdown(current)),
            _ => {
                println!("Session expired. Please scan again.");
                break;
            }
        }
        if remaining.changed().await.is_err() {
            break;
        }
    }
    watch.stop().await;
}
