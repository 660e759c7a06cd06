// errors.rs
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum DominioError {
  #[error("Error de validación: {0}")]
  Validacion(String),
  #[error("Error externo: {0}")]
  Externo(String),
  #[error("Error de serialización: {0}")]
  Serializacion(String),
}

impl From<serde_json::Error> for DominioError {
  fn from(e: serde_json::Error) -> Self {
    Self::Serializacion(e.to_string())
  }
}
