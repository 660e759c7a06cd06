// Archivo: errors.rs
// Propósito: definir los errores del motor de instancias y el alias
// Result<T> usado por las APIs del crate. Cada variante corresponde a una
// clase de la taxonomía de errores del sistema.
use sgc_dominio::DominioError;
use thiserror::Error;

/// Errores del motor de instancias.
///
/// - `Validacion`: payload u operación inválida; siempre recuperable por el
///   caller, nunca se reintenta del lado servidor.
/// - `Estado`: la transición pedida no es legal en el estado actual
///   (instancia bloqueada, etapa no reabrible, ticket ya resuelto, ...).
/// - `Conflicto`: mutación concurrente sobre la misma instancia; seguro
///   reintentar con backoff.
/// - `NoAutorizado`: el actor no participa en la instancia.
/// - `NoEncontrado`: la entidad referida no existe.
/// - `Dependencia`: falla de un colaborador externo; se registra y no
///   aborta la transición que la originó.
/// - `Almacenamiento`: error al acceder al almacenamiento.
#[derive(Error, Debug)]
pub enum MotorError {
  /// Payload inválido, campo requerido ausente, configuración mal formada.
  #[error("Validación: {0}")]
  Validacion(String),
  /// Transición ilegal para el estado actual de la entidad.
  #[error("Estado inválido: {0}")]
  Estado(String),
  /// Conflicto optimista (version/expected mismatch).
  #[error("Conflicto: {0}")]
  Conflicto(String),
  /// El actor no está autorizado a operar sobre la instancia.
  #[error("No autorizado: {0}")]
  NoAutorizado(String),
  /// Entidad no encontrada (instancia, proceso, campo, ticket).
  #[error("No encontrado: {0}")]
  NoEncontrado(String),
  /// Falla de colaborador externo (catálogo documental, notificaciones).
  #[error("Dependencia externa: {0}")]
  Dependencia(String),
  /// Error genérico de almacenamiento (BD, mutex envenenado, etc.).
  #[error("Error de almacenamiento: {0}")]
  Almacenamiento(String),
}

impl MotorError {
  /// La instancia está bloqueada y no admite la operación.
  pub fn bloqueada(razon: Option<&str>) -> Self {
    match razon {
      Some(r) => MotorError::Estado(format!("instancia bloqueada: {}", r)),
      None => MotorError::Estado("instancia bloqueada".to_string()),
    }
  }

  /// La etapa destino no admite reapertura.
  pub fn no_reabrible(nombre: &str) -> Self {
    MotorError::Estado(format!("la etapa '{}' no es reabrible", nombre))
  }

  /// El ticket ya fue resuelto o cerrado.
  pub fn ticket_resuelto(id: &uuid::Uuid) -> Self {
    MotorError::Estado(format!("el ticket {} ya está resuelto", id))
  }

  /// El par (instancia, usuario) ya existe en el registro.
  pub fn participante_duplicado(usuario: &str) -> Self {
    MotorError::Estado(format!("el usuario '{}' ya participa en la instancia", usuario))
  }

  /// CAS fallido: otra mutación ganó la carrera sobre la instancia.
  pub fn conflicto_version(instancia: &uuid::Uuid) -> Self {
    MotorError::Conflicto(format!("modificación concurrente sobre la instancia {}", instancia))
  }
}

impl From<DominioError> for MotorError {
  fn from(e: DominioError) -> Self {
    match e {
      DominioError::Validacion(m) => MotorError::Validacion(m),
      DominioError::Externo(m) => MotorError::Almacenamiento(m),
      DominioError::Serializacion(m) => MotorError::Validacion(m),
    }
  }
}

impl From<serde_json::Error> for MotorError {
  fn from(e: serde_json::Error) -> Self {
    MotorError::Validacion(e.to_string())
  }
}

/// Alias de resultado usado por las APIs del crate.
pub type Result<T> = std::result::Result<T, MotorError>;
