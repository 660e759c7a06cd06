//! Configuración del router HTTP.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use instancias::InstanciaRepository;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Construye el router completo del servicio, con trazas y CORS.
pub fn create_router<R: InstanciaRepository + 'static>(state: AppState<R>) -> Router {
    let api_routes = Router::new()
        // Instancias
        .route("/instancias", post(handlers::crear_instancia::<R>))
        .route("/instancias/:id", get(handlers::vista::<R>))
        .route("/instancias/:id/acciones", get(handlers::acciones::<R>))
        .route("/instancias/:id/avanzar", post(handlers::avanzar::<R>))
        .route("/instancias/:id/reabrir", post(handlers::reabrir::<R>))
        .route("/instancias/:id/bloquear", post(handlers::bloquear::<R>))
        .route(
            "/instancias/:id/desbloquear",
            post(handlers::desbloquear::<R>),
        )
        .route("/instancias/:id/datos", post(handlers::escribir_datos::<R>))
        // Formularios
        .route(
            "/instancias/:id/respuestas",
            post(handlers::registrar_respuesta::<R>),
        )
        // Participantes
        .route(
            "/instancias/:id/participantes",
            post(handlers::asignar_participante::<R>),
        )
        .route(
            "/instancias/:id/participantes/:usuario_id",
            delete(handlers::remover_participante::<R>),
        )
        // Tickets
        .route(
            "/instancias/:id/tickets",
            post(handlers::abrir_ticket::<R>),
        )
        .route("/tickets/:id/asignar", post(handlers::asignar_ticket::<R>))
        .route(
            "/tickets/:id/resolver",
            post(handlers::resolver_ticket::<R>),
        )
        // Documentos
        .route(
            "/instancias/:id/documentos",
            post(handlers::vincular_documento::<R>),
        )
        .route(
            "/instancias/:id/documentos/:documento_id",
            delete(handlers::desvincular_documento::<R>),
        );

    Router::new()
        .route("/salud", get(handlers::salud))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
