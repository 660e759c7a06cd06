//! Handlers HTTP sobre el servicio de instancias.
//!
//! Los handlers son adaptadores delgados: deserializan el payload,
//! delegan en `ServicioInstancias` y devuelven el resultado en JSON. La
//! autorización por participación y las notificaciones viven en el
//! servicio, no aquí.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use instancias::{
    Accion, DocumentoVinculado, Instancia, InstanciaRepository, Participante, RespuestaFormulario,
    Ticket, VistaInstancia,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CrearInstanciaRequest {
    pub proceso_id: Uuid,
    pub iniciado_por: String,
}

#[derive(Debug, Deserialize)]
pub struct AvanzarRequest {
    pub actor: String,
    #[serde(default)]
    pub comentario: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReabrirRequest {
    pub actor: String,
    pub etapa_id: Uuid,
    pub razon: String,
}

#[derive(Debug, Deserialize)]
pub struct BloquearRequest {
    pub actor: String,
    pub razon: String,
}

#[derive(Debug, Deserialize)]
pub struct DesbloquearRequest {
    pub actor: String,
}

#[derive(Debug, Deserialize)]
pub struct DatosRequest {
    pub actor: String,
    pub datos: JsonValue,
}

#[derive(Debug, Deserialize)]
pub struct RespuestaRequest {
    pub actor: String,
    pub clave: String,
    pub valor: String,
}

#[derive(Debug, Deserialize)]
pub struct ParticipanteRequest {
    pub usuario_id: String,
    pub rol: String,
}

#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    pub creado_por: String,
    pub descripcion: String,
}

#[derive(Debug, Deserialize)]
pub struct AsignarTicketRequest {
    pub usuario_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolverTicketRequest {
    pub solucion: String,
}

#[derive(Debug, Deserialize)]
pub struct DocumentoRequest {
    pub actor: String,
    pub documento_id: Uuid,
    #[serde(default)]
    pub nota: String,
}

/// Parámetro de actor para operaciones sin cuerpo (DELETE).
#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub actor: String,
}

#[derive(Debug, Serialize)]
pub struct SaludResponse {
    pub status: String,
}

pub async fn salud() -> Json<SaludResponse> {
    Json(SaludResponse {
        status: "ok".to_string(),
    })
}

pub async fn crear_instancia<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Json(req): Json<CrearInstanciaRequest>,
) -> ApiResult<(StatusCode, Json<Instancia>)> {
    let instancia = state
        .servicio
        .crear_instancia(req.proceso_id, &req.iniciado_por)?;
    Ok((StatusCode::CREATED, Json(instancia)))
}

pub async fn vista<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VistaInstancia>> {
    Ok(Json(state.servicio.vista(id)?))
}

pub async fn acciones<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Accion>>> {
    Ok(Json(state.servicio.acciones(id)?))
}

pub async fn avanzar<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AvanzarRequest>,
) -> ApiResult<Json<Instancia>> {
    Ok(Json(
        state.servicio.avanzar_etapa(id, &req.actor, req.comentario)?,
    ))
}

pub async fn reabrir<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReabrirRequest>,
) -> ApiResult<Json<Instancia>> {
    Ok(Json(state.servicio.reabrir_etapa(
        id,
        req.etapa_id,
        &req.actor,
        &req.razon,
    )?))
}

pub async fn bloquear<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<BloquearRequest>,
) -> ApiResult<Json<Instancia>> {
    if req.razon.trim().is_empty() {
        return Err(ApiError::PeticionInvalida(
            "el bloqueo requiere una razón".to_string(),
        ));
    }
    Ok(Json(state.servicio.bloquear(id, &req.actor, &req.razon)?))
}

pub async fn desbloquear<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DesbloquearRequest>,
) -> ApiResult<Json<Instancia>> {
    Ok(Json(state.servicio.desbloquear(id, &req.actor)?))
}

pub async fn escribir_datos<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DatosRequest>,
) -> ApiResult<Json<Instancia>> {
    Ok(Json(state.servicio.escribir_datos(id, &req.actor, req.datos)?))
}

pub async fn registrar_respuesta<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RespuestaRequest>,
) -> ApiResult<Json<RespuestaFormulario>> {
    Ok(Json(state.servicio.registrar_respuesta(
        id,
        &req.actor,
        &req.clave,
        &req.valor,
    )?))
}

pub async fn asignar_participante<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ParticipanteRequest>,
) -> ApiResult<(StatusCode, Json<Participante>)> {
    let participante = state
        .servicio
        .asignar_participante(id, &req.usuario_id, &req.rol)?;
    Ok((StatusCode::CREATED, Json(participante)))
}

pub async fn remover_participante<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((id, usuario_id)): Path<(Uuid, String)>,
) -> ApiResult<StatusCode> {
    state.servicio.remover_participante(id, &usuario_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn abrir_ticket<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<TicketRequest>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    let ticket = state
        .servicio
        .abrir_ticket(id, &req.creado_por, &req.descripcion)?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn asignar_ticket<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AsignarTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.servicio.asignar_ticket(id, &req.usuario_id)?))
}

pub async fn resolver_ticket<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolverTicketRequest>,
) -> ApiResult<Json<Ticket>> {
    Ok(Json(state.servicio.resolver_ticket(id, &req.solucion)?))
}

pub async fn vincular_documento<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path(id): Path<Uuid>,
    Json(req): Json<DocumentoRequest>,
) -> ApiResult<(StatusCode, Json<DocumentoVinculado>)> {
    let vinculo =
        state
            .servicio
            .vincular_documento(id, &req.actor, req.documento_id, &req.nota)?;
    Ok((StatusCode::CREATED, Json(vinculo)))
}

pub async fn desvincular_documento<R: InstanciaRepository + 'static>(
    State(state): State<AppState<R>>,
    Path((id, documento_id)): Path<(Uuid, Uuid)>,
    Query(q): Query<ActorQuery>,
) -> ApiResult<StatusCode> {
    state
        .servicio
        .desvincular_documento(id, &q.actor, documento_id)?;
    Ok(StatusCode::NO_CONTENT)
}
