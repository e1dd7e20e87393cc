//! SyncText participant process.
//!
//! Runs one synchronization session: registers the participant, binds
//! its socket, seeds the document if needed, then polls for local edits
//! and listens for peer updates until interrupted.
//!
//! Usage: `synctext-peer <participant-id>`

use log::{error, info};
use std::process::ExitCode;

use synctext_collab::{SessionConfig, SyncSession};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(participant) = args.next() else {
        eprintln!("Usage: synctext-peer <participant-id>");
        return ExitCode::FAILURE;
    };
    if args.next().is_some() {
        eprintln!("Usage: synctext-peer <participant-id>");
        return ExitCode::FAILURE;
    }

    let config = SessionConfig::new(&participant);
    info!(
        "Starting SyncText session for {participant}; document at {}",
        config.document_path().display()
    );

    let session = SyncSession::new(config);
    let shutdown = session.shutdown_handle();
    let mut task = tokio::spawn(session.run());

    let result = tokio::select! {
        res = &mut task => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupt received, shutting down");
            shutdown.shutdown();
            task.await
        }
    };

    match result {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("session failed: {e}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("session task panicked: {e}");
            ExitCode::FAILURE
        }
    }
}
