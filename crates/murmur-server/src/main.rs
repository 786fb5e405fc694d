mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::TimeDelta;
use tracing::{info, warn};

use murmur_api::{AppState, Chat, ChatConfig, cleanup, routes};
use murmur_crypto::{CipherGateway, EVENT_KEY_ID, KeystreamCipher};
use murmur_gateway::{Formatter, GatewayError, ProcessGateway};
use murmur_store::Store;

use crate::config::Config;

const CIPHER_CHECK_TEXT: &[u8] = b"murmur cipher self-check";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur=debug,murmur_api=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let cipher = CipherGateway::new(Arc::new(KeystreamCipher), EVENT_KEY_ID, config.cipher_timeout);
    check_cipher(&cipher);

    let formatter = match &config.formatter {
        Some(program) => {
            info!("Formatter: {}", program.display());
            Formatter::new(Arc::new(ProcessGateway::new(program, config.format_timeout)))
        }
        None => {
            info!("Formatter: disabled, messages are stored as sent");
            Formatter::disabled()
        }
    };
    check_formatter(&formatter).await;

    let store = Store::new(config.max_events, config.max_sessions, cipher);
    let chat_config = ChatConfig {
        greeting: config.greeting.clone(),
        session_timeout: TimeDelta::from_std(config.session_timeout)?,
    };
    let state: AppState = Arc::new(Chat::new(store, formatter, chat_config));

    // Idle session sweeper
    tokio::spawn(cleanup::run_sweep_loop(state.clone(), config.sweep_interval));

    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Murmur listening on {}", addr);
    info!(
        "Session timeout {}s, sweep every {}s",
        config.session_timeout.as_secs(),
        config.sweep_interval.as_secs()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn check_cipher(cipher: &CipherGateway) {
    let round_trip = cipher
        .encrypt(CIPHER_CHECK_TEXT)
        .and_then(|ciphertext| cipher.decrypt(&ciphertext));
    match round_trip {
        Some(plain) if plain == CIPHER_CHECK_TEXT => {
            info!("Cipher '{}' ok (key=0x{:X})", cipher.name(), cipher.key_id())
        }
        Some(_) => warn!("Cipher '{}' does not round-trip, integrity checks will fail", cipher.name()),
        None => warn!("Cipher '{}' unavailable, events will be stored without ciphertext", cipher.name()),
    }
}

async fn check_formatter(formatter: &Formatter) {
    match formatter.welcome().await {
        Ok(greeting) => info!("Formatter ok: {}", greeting),
        Err(GatewayError::Disabled) => {}
        Err(e) => warn!("Formatter not answering ({}), using raw text", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
