//! Errores de la superficie HTTP y su mapeo a códigos de estado.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use instancias::MotorError;
use serde::Serialize;
use thiserror::Error;

/// Error de la API. Envuelve los errores del motor y agrega los propios
/// de la capa HTTP (payloads mal formados).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Motor(#[from] MotorError),

    #[error("Petición inválida: {0}")]
    PeticionInvalida(String),
}

/// Cuerpo de las respuestas de error.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Motor(MotorError::Validacion(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDACION"),
            ApiError::Motor(MotorError::Estado(_)) => (StatusCode::CONFLICT, "ESTADO_INVALIDO"),
            // Conflicto optimista: mismo 409 pero con código propio, para
            // que el cliente sepa que reintentar es seguro.
            ApiError::Motor(MotorError::Conflicto(_)) => (StatusCode::CONFLICT, "CONFLICTO_CONCURRENCIA"),
            ApiError::Motor(MotorError::NoAutorizado(_)) => (StatusCode::FORBIDDEN, "NO_AUTORIZADO"),
            ApiError::Motor(MotorError::NoEncontrado(_)) => (StatusCode::NOT_FOUND, "NO_ENCONTRADO"),
            ApiError::Motor(MotorError::Dependencia(_)) => (StatusCode::BAD_GATEWAY, "DEPENDENCIA"),
            ApiError::Motor(MotorError::Almacenamiento(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ALMACENAMIENTO")
            }
            ApiError::PeticionInvalida(_) => (StatusCode::BAD_REQUEST, "PETICION_INVALIDA"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Alias de resultado para los handlers.
pub type ApiResult<T> = Result<T, ApiError>;
