use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fleet_telemetry_sync::clients::TelematicsClient;
use fleet_telemetry_sync::config::EnvironmentConfig;
use fleet_telemetry_sync::database::DatabaseConnection;
use fleet_telemetry_sync::repositories::PgTelemetryStore;
use fleet_telemetry_sync::routes::create_router;
use fleet_telemetry_sync::services::{IntervalTicker, Scheduler};
use fleet_telemetry_sync::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚚 Fleet Telemetry Sync");
    info!("================================================");

    let config = EnvironmentConfig::from_env().context("Configuración inválida")?;

    // Inicializar base de datos
    let db_connection = match DatabaseConnection::new_default().await {
        Ok(conn) => conn,
        Err(e) => {
            error!("❌ Error conectando a la base de datos: {}", e);
            return Err(anyhow::anyhow!("Error de base de datos: {}", e));
        }
    };
    let store = Arc::new(PgTelemetryStore::new(db_connection.pool().clone()));

    let api = Arc::new(
        TelematicsClient::new(&config.provider.base_url, config.provider.request_timeout)
            .context("No se pudo crear el cliente HTTP del proveedor")?,
    );
    info!("🔗 Proveedor de telemetría: {}", config.provider.base_url);

    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("Dirección inválida: {}", config.server_url()))?;
    let sync_config = config.sync.clone();
    let state = AppState::new(config, api, store);

    // Scheduler de sincronización
    let shutdown = CancellationToken::new();
    let scheduler = if sync_config.enabled {
        info!("⏰ Sincronización cada {}s", sync_config.interval.as_secs());
        Some(Scheduler::spawn(
            state.sync.clone(),
            IntervalTicker::new(sync_config.interval),
            shutdown.clone(),
        ))
    } else {
        warn!("⚠️ Sincronización periódica deshabilitada (SYNC_ENABLED=false)");
        None
    };

    let app = create_router(state);

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("   GET  /metrics - Métricas Prometheus");
    info!("   GET  /vehicles - Estado de la flota");
    info!("   GET  /vehicles/:id - Estado de un vehículo");
    info!("   GET  /vehicles/:id/telemetry/latest - Última muestra");
    info!("   GET  /vehicles/:id/history - Historial de muestras");
    info!("   GET  /sync/status - Estado de la sincronización");
    info!("   POST /sync/run - Disparar un ciclo");
    info!("   POST /telemetry/bulk - Ingestión push");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.cancel();
        })
        .await
    {
        error!("❌ Servidor terminó con error: {}", e);
    }

    shutdown.cancel();
    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            error!("❌ El scheduler terminó con error: {}", e);
        }
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el handler de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal SIGTERM recibida, apagando servidor...");
        },
    }
}
