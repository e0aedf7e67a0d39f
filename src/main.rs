use std::sync::Arc;

use anyhow::Context;
use careers_intake::config::{IntakeConfig, ResponsePolicy, StagingPolicy};
use careers_intake::http::intake_routes;
use careers_intake::mail::SmtpMailer;
use careers_intake::submission::Processor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(IntakeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export EMAIL_USER=hr@example.com");
        eprintln!("  export EMAIL_PASS=app-password");
        std::process::exit(1);
    }));

    eprintln!("📨 Careers Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   SMTP: {}:{}", config.smtp_host, config.smtp_port);
    eprintln!("   Recipient: {}", config.recipient);
    eprintln!(
        "   Attachments: {} types, up to {} bytes",
        config.allowed_media_types.len(),
        config.max_attachment_bytes
    );
    eprintln!(
        "   Staging: {}",
        match &config.staging {
            StagingPolicy::Memory => "in-memory".to_string(),
            StagingPolicy::Disk { dir } => format!("disk ({})", dir.display()),
        }
    );
    eprintln!(
        "   Delivery: {}\n",
        match config.response_policy {
            ResponsePolicy::Synchronous => "synchronous",
            ResponsePolicy::Deferred => "deferred",
        }
    );

    let transport = Arc::new(SmtpMailer::from_config(&config).context("SMTP transport setup")?);
    let processor = Arc::new(Processor::new(Arc::clone(&config), transport));
    let tracker = processor.tracker().clone();

    let app = intake_routes(Arc::clone(&processor));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.listen_port))
        .await
        .context("Failed to bind listen port")?;
    tracing::info!(port = config.listen_port, "Intake server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Deferred dispatches must settle (cleanup + outcome log) before exit.
    tracing::info!(in_flight = tracker.in_flight(), "Draining in-flight deliveries");
    tracker.drain().await;

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for shutdown signal");
}
