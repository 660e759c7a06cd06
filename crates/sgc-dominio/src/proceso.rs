// proceso.rs
use crate::{DominioError, Etapa};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Estado de ciclo de vida de una definición de proceso.
///
/// Sólo los procesos `Activo` admiten crear instancias nuevas. Un proceso
/// referenciado por instancias nunca se elimina físicamente: se marca
/// `Obsoleto` y se publica una nueva versión.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoProceso {
  Activo,
  Inactivo,
  Revision,
  Obsoleto,
}

impl fmt::Display for EstadoProceso {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      EstadoProceso::Activo => "activo",
      EstadoProceso::Inactivo => "inactivo",
      EstadoProceso::Revision => "revision",
      EstadoProceso::Obsoleto => "obsoleto",
    };
    write!(f, "{}", s)
  }
}

impl std::str::FromStr for EstadoProceso {
  type Err = DominioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "activo" => Ok(EstadoProceso::Activo),
      "inactivo" => Ok(EstadoProceso::Inactivo),
      "revision" => Ok(EstadoProceso::Revision),
      "obsoleto" => Ok(EstadoProceso::Obsoleto),
      other => Err(DominioError::Validacion(format!("Estado de proceso desconocido: {}", other))),
    }
  }
}

/// Definición nombrada y versionada de un proceso de calidad.
///
/// Posee la lista ordenada de etapas. Los órdenes son estrictamente
/// crecientes y únicos; un proceso recién creado nace en `Revision` y las
/// etapas sólo pueden agregarse mientras permanezca en ese estado, de modo
/// que la secuencia queda congelada al activarlo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proceso {
  id: Uuid,
  codigo: String,
  nombre: String,
  area: String,
  objetivo: String,
  alcance: String,
  estado: EstadoProceso,
  version: i32,
  etapas: Vec<Etapa>,
}

impl Proceso {
  pub fn new(codigo: &str, nombre: &str, area: &str, objetivo: &str, alcance: &str) -> Result<Self, DominioError> {
    if codigo.trim().is_empty() {
      return Err(DominioError::Validacion("El código del proceso no puede estar vacío".to_string()));
    }
    if nombre.trim().is_empty() {
      return Err(DominioError::Validacion("El nombre del proceso no puede estar vacío".to_string()));
    }
    Ok(Self { id: Uuid::new_v4(),
              codigo: codigo.trim().to_string(),
              nombre: nombre.trim().to_string(),
              area: area.trim().to_string(),
              objetivo: objetivo.to_string(),
              alcance: alcance.to_string(),
              estado: EstadoProceso::Revision,
              version: 1,
              etapas: Vec::new() })
  }

  /// Reconstruye un proceso desde persistencia conservando id, estado y
  /// versión. Las etapas deben venir ya validadas y se reordenan por
  /// `orden` de forma defensiva.
  pub fn from_parts(id: Uuid,
                    codigo: &str,
                    nombre: &str,
                    area: &str,
                    objetivo: &str,
                    alcance: &str,
                    estado: EstadoProceso,
                    version: i32,
                    mut etapas: Vec<Etapa>)
                    -> Result<Self, DominioError> {
    let mut proceso = Self::new(codigo, nombre, area, objetivo, alcance)?;
    proceso.id = id;
    proceso.estado = estado;
    proceso.version = version;
    etapas.sort_by_key(|e| e.orden());
    for par in etapas.windows(2) {
      if par[0].orden() == par[1].orden() {
        return Err(DominioError::Validacion(format!("Orden de etapa duplicado: {}", par[0].orden())));
      }
    }
    proceso.etapas = etapas;
    Ok(proceso)
  }

  /// Agrega una etapa al final de la secuencia. El orden debe ser mayor al
  /// de la última etapa existente y el proceso debe estar en `Revision`:
  /// una vez activado, la secuencia es inmutable.
  pub fn agregar_etapa(&mut self, etapa: Etapa) -> Result<(), DominioError> {
    if self.estado != EstadoProceso::Revision {
      return Err(DominioError::Validacion(format!(
        "No se pueden agregar etapas a un proceso en estado {}", self.estado)));
    }
    if etapa.proceso_id() != self.id {
      return Err(DominioError::Validacion("La etapa pertenece a otro proceso".to_string()));
    }
    if let Some(ultima) = self.etapas.last() {
      if etapa.orden() <= ultima.orden() {
        return Err(DominioError::Validacion(format!(
          "El orden {} no es mayor al de la última etapa ({})", etapa.orden(), ultima.orden())));
      }
    }
    self.etapas.push(etapa);
    Ok(())
  }

  /// Cambia el estado de ciclo de vida del proceso. Activar un proceso sin
  /// etapas es un error de validación.
  pub fn cambiar_estado(&mut self, nuevo: EstadoProceso) -> Result<(), DominioError> {
    if nuevo == EstadoProceso::Activo && self.etapas.is_empty() {
      return Err(DominioError::Validacion("No se puede activar un proceso sin etapas".to_string()));
    }
    self.estado = nuevo;
    Ok(())
  }

  /// Incrementa la versión y regresa el proceso a `Revision` para permitir
  /// editar la nueva secuencia.
  pub fn nueva_version(&mut self) {
    self.version += 1;
    self.estado = EstadoProceso::Revision;
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn codigo(&self) -> &str {
    &self.codigo
  }

  pub fn nombre(&self) -> &str {
    &self.nombre
  }

  pub fn area(&self) -> &str {
    &self.area
  }

  pub fn objetivo(&self) -> &str {
    &self.objetivo
  }

  pub fn alcance(&self) -> &str {
    &self.alcance
  }

  pub fn estado(&self) -> EstadoProceso {
    self.estado
  }

  pub fn version(&self) -> i32 {
    self.version
  }

  pub fn etapas(&self) -> &[Etapa] {
    &self.etapas
  }

  /// Primera etapa de la secuencia (menor orden), si existe.
  pub fn primera_etapa(&self) -> Option<&Etapa> {
    self.etapas.first()
  }

  /// Etapa por id, si pertenece a este proceso.
  pub fn etapa(&self, etapa_id: &Uuid) -> Option<&Etapa> {
    self.etapas.iter().find(|e| e.id() == *etapa_id)
  }

  /// Etapa inmediatamente posterior (siguiente orden) a la indicada.
  /// Retorna `None` si la etapa es la última o no pertenece al proceso.
  pub fn etapa_siguiente(&self, etapa_id: &Uuid) -> Option<&Etapa> {
    let pos = self.etapas.iter().position(|e| e.id() == *etapa_id)?;
    self.etapas.get(pos + 1)
  }

  /// Indica si la etapa dada es la última de la secuencia.
  pub fn es_ultima_etapa(&self, etapa_id: &Uuid) -> bool {
    self.etapas.last().map(|e| e.id() == *etapa_id).unwrap_or(false)
  }
}

impl fmt::Display for Proceso {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Proceso({} v{}, {}, {} etapas)", self.codigo, self.version, self.estado, self.etapas.len())
  }
}
