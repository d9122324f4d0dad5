use anyhow::Result;
use pmoconfig::{Config, get_config};
use pmodisplay::{
    CommandPlayer, DisplayConfigExt, DisplayHandle, DisplayRuntime, HttpCatalogSource,
    info::DISPLAYED_INFO_LINES,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Installe le subscriber tracing selon `host.logger`
///
/// `RUST_LOG` remplace le niveau configuré lorsqu'il est défini.
fn init_logging(config: &Config) -> Result<()> {
    let level = config.get_log_min_level()?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console = config.get_log_enable_console()?.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_ansi(true)
    });

    Registry::default().with(filter).with(console).try_init()?;
    Ok(())
}

/// Commandes clavier : Entrée ou `n` passe au clip suivant, `f` bascule le
/// plein écran, `s` affiche l'état, `q` quitte.
async fn keyboard_loop(display: &DisplayHandle) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "" | "n" => display.skip().await?,
            "f" => display.toggle_fullscreen().await?,
            "s" => {
                let status = display.status().await?;
                info!(
                    current = ?status.current,
                    url = ?status.current_url,
                    queued = status.queued,
                    catalog = status.catalog_size,
                    timer = status.timer_armed,
                    "Status"
                );
                for line in display.info().recent(DISPLAYED_INFO_LINES) {
                    println!("{}", line);
                }
            }
            "q" => break,
            other => warn!("Unknown command: {:?}", other),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // ========== PHASE 1 : Configuration ==========
    let config = get_config();
    init_logging(&config)?;

    let settings = config.get_display_settings()?;
    info!(
        catalog = %settings.catalog_url,
        player = %settings.player.program,
        "📺 Starting PMODisplay"
    );

    // ========== PHASE 2 : Source et lecteur ==========
    let source = HttpCatalogSource::builder()
        .url(&settings.catalog_url)
        .timeout(settings.request_timeout)
        .build()?;
    let player = CommandPlayer::new(settings.player.clone());

    // ========== PHASE 3 : Boucle d'affichage ==========
    let display = DisplayRuntime::new(Arc::new(source), settings).start(Some(Arc::new(player)));

    info!("✅ PMODisplay is ready!");
    info!("Press Enter to skip, f for fullscreen, s for status, Ctrl+C to stop...");

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        result = keyboard_loop(&display) => {
            if let Err(e) = result {
                warn!("Keyboard input stopped: {}", e);
                tokio::signal::ctrl_c().await?;
            }
        }
    }

    info!("🛑 Stopping PMODisplay...");
    display.shutdown().await;
    Ok(())
}
