//! Disparo periódico del ciclo de sincronización
//!
//! El scheduler no espera a que termine un ciclo para volver a escuchar el
//! reloj: cada tick lanza `trigger()` en una tarea propia y es el guard del
//! servicio quien descarta los disparos solapados.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::sync_service::{SyncService, TriggerResult};

/// Fuente de ticks. Devuelve `false` cuando ya no habrá más.
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self) -> bool;
}

/// Reloj de intervalo fijo; el primer tick es inmediato
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) -> bool {
        self.interval.tick().await;
        true
    }
}

/// Ticks manuales, cada mensaje es un disparo
#[async_trait]
impl Ticker for mpsc::Receiver<()> {
    async fn tick(&mut self) -> bool {
        self.recv().await.is_some()
    }
}

pub struct Scheduler;

impl Scheduler {
    /// Lanzar el bucle del scheduler en background
    pub fn spawn<T>(service: Arc<SyncService>, ticker: T, shutdown: CancellationToken) -> tokio::task::JoinHandle<()>
    where
        T: Ticker + 'static,
    {
        tokio::spawn(Self::run(service, ticker, shutdown))
    }

    pub async fn run<T: Ticker>(service: Arc<SyncService>, mut ticker: T, shutdown: CancellationToken) {
        tracing::info!("⏰ Scheduler de sincronización iniciado");

        loop {
            let ticked = tokio::select! {
                _ = shutdown.cancelled() => break,
                ticked = ticker.tick() => ticked,
            };
            if !ticked {
                break;
            }

            let service = service.clone();
            tokio::spawn(async move {
                if let TriggerResult::Ran(report) = service.trigger().await {
                    tracing::debug!(cycle_id = %report.cycle_id, "Ciclo programado terminado");
                }
            });
        }

        tracing::info!("🛑 Scheduler de sincronización detenido");
    }
}
