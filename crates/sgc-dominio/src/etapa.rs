// etapa.rs
use crate::DominioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Una etapa dentro de la secuencia ordenada de un proceso.
///
/// El `orden` es un entero positivo, único dentro del proceso. Una vez que
/// existen instancias posicionadas en la etapa, el orden no debe cambiar;
/// por eso la estructura no expone mutadores sobre `orden`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Etapa {
  id: Uuid,
  proceso_id: Uuid,
  orden: i32,
  nombre: String,
  rol_responsable: String,
  horas_maximas: i64,
  reabrible: bool,
}

impl Etapa {
  pub fn new(proceso_id: Uuid,
             orden: i32,
             nombre: &str,
             rol_responsable: &str,
             horas_maximas: i64,
             reabrible: bool)
             -> Result<Self, DominioError> {
    if orden <= 0 {
      return Err(DominioError::Validacion("El orden de la etapa debe ser un entero positivo".to_string()));
    }
    if nombre.trim().is_empty() {
      return Err(DominioError::Validacion("El nombre de la etapa no puede estar vacío".to_string()));
    }
    if rol_responsable.trim().is_empty() {
      return Err(DominioError::Validacion("La etapa requiere un rol responsable".to_string()));
    }
    if horas_maximas <= 0 {
      return Err(DominioError::Validacion("Las horas máximas de la etapa deben ser mayores a cero".to_string()));
    }
    Ok(Self { id: Uuid::new_v4(),
              proceso_id,
              orden,
              nombre: nombre.trim().to_string(),
              rol_responsable: rol_responsable.trim().to_string(),
              horas_maximas,
              reabrible })
  }

  /// Reconstruye una etapa desde persistencia conservando su id original.
  pub fn from_parts(id: Uuid,
                    proceso_id: Uuid,
                    orden: i32,
                    nombre: &str,
                    rol_responsable: &str,
                    horas_maximas: i64,
                    reabrible: bool)
                    -> Result<Self, DominioError> {
    let mut etapa = Self::new(proceso_id, orden, nombre, rol_responsable, horas_maximas, reabrible)?;
    etapa.id = id;
    Ok(etapa)
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn proceso_id(&self) -> Uuid {
    self.proceso_id
  }

  pub fn orden(&self) -> i32 {
    self.orden
  }

  pub fn nombre(&self) -> &str {
    &self.nombre
  }

  pub fn rol_responsable(&self) -> &str {
    &self.rol_responsable
  }

  pub fn horas_maximas(&self) -> i64 {
    self.horas_maximas
  }

  pub fn reabrible(&self) -> bool {
    self.reabrible
  }
}

impl fmt::Display for Etapa {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Etapa({}: {}, rol: {}, max: {}h)", self.orden, self.nombre, self.rol_responsable, self.horas_maximas)
  }
}
