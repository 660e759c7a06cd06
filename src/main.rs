//! Binario `sgc-server`: expone el motor de instancias como API REST.
//!
//! Backends disponibles (variable `SGC_BACKEND`):
//! - `diesel` (por defecto): catálogo e instancias sobre la base
//!   configurada en `SGC_DB_URL` / `DATABASE_URL`.
//! - `memoria`: repositorios en memoria, útiles para demos y pruebas
//!   manuales; todo se pierde al apagar el proceso.

use instancias::{
    CatalogoDocumentos, DespachoNotificaciones, EventoNotificacion, InstanciaRepository,
    MotorError, ServicioInstancias,
};
use sgc_api::{create_router, AppState};
use sgc_dominio::{CatalogoRepository, InMemoryCatalogo};
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Catálogo documental permisivo: acepta cualquier documento. Se usa
/// cuando no hay un catálogo externo configurado; la validación real
/// queda en manos de la integración que lo reemplace.
struct CatalogoDocumentosAbierto;

impl CatalogoDocumentos for CatalogoDocumentosAbierto {
    fn documento_existe(&self, _documento_id: &Uuid) -> Result<bool, MotorError> {
        Ok(true)
    }
}

/// Despacho de notificaciones que sólo deja traza. Punto de enganche
/// para un canal real (correo, webhook) sin tocar el núcleo.
struct NotificadorTracing;

impl DespachoNotificaciones for NotificadorTracing {
    fn enviar(&self, evento: EventoNotificacion) -> Result<(), MotorError> {
        tracing::info!(usuario = %evento.usuario_id, mensaje = %evento.mensaje, "notificación");
        Ok(())
    }
}

fn construir_router<R>(repo: Arc<R>, catalogo: Arc<dyn CatalogoRepository>) -> axum::Router
    where R: InstanciaRepository + 'static
{
    let servicio = Arc::new(ServicioInstancias::new(repo,
                                                    catalogo,
                                                    Arc::new(CatalogoDocumentosAbierto),
                                                    Arc::new(NotificadorTracing)));
    create_router(AppState::new(servicio))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let backend = std::env::var("SGC_BACKEND").unwrap_or_else(|_| "diesel".to_string());
    let app = match backend.as_str() {
        "memoria" => {
            tracing::warn!("backend en memoria: los datos no sobreviven al proceso");
            let repo = Arc::new(instancias::stubs::InMemoryInstanciaRepository::new());
            let catalogo = Arc::new(InMemoryCatalogo::new());
            construir_router(repo, catalogo)
        }
        "diesel" => {
            let catalogo = sgc_persistencia::new_catalogo_from_env()?;
            let repo = sgc_persistencia::new_instancias_from_env()?;
            construir_router(Arc::new(repo), Arc::new(catalogo))
        }
        otro => {
            return Err(format!("SGC_BACKEND desconocido: '{}' (esperado diesel|memoria)", otro).into())
        }
    };

    let addr = std::env::var("SGC_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("sgc-server escuchando en {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(senal_de_apagado())
        .await?;
    tracing::info!("sgc-server apagado");
    Ok(())
}

async fn senal_de_apagado() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("no se pudo instalar el handler de Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminar = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut senal) => {
                senal.recv().await;
            }
            Err(e) => tracing::error!("no se pudo instalar el handler de SIGTERM: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminar = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl+C recibido, apagando"),
        _ = terminar => tracing::info!("SIGTERM recibido, apagando"),
    }
}
