// catalogo.rs
use crate::{CampoFormulario, DominioError, Proceso};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Trait que define operaciones de persistencia para el catálogo de
/// configuración: definiciones de proceso y campos de formulario.
///
/// Las definiciones mutan rara vez (lado administrativo); el motor de
/// instancias sólo las lee. No existe borrado físico de procesos: el ciclo
/// de vida se maneja con `EstadoProceso`.
pub trait CatalogoRepository: Send + Sync {
  /// Guarda (o reemplaza) una definición de proceso completa, incluidas
  /// sus etapas. El código debe ser único entre procesos.
  fn guardar_proceso(&self, proceso: Proceso) -> Result<Uuid, DominioError>;

  /// Recupera un proceso por su `Uuid`.
  fn obtener_proceso(&self, id: &Uuid) -> Result<Option<Proceso>, DominioError>;

  /// Recupera un proceso por su código único.
  fn proceso_por_codigo(&self, codigo: &str) -> Result<Option<Proceso>, DominioError>;

  /// Lista todas las definiciones (útil para pruebas y administración).
  fn listar_procesos(&self) -> Result<Vec<Proceso>, DominioError>;

  /// Define un campo de formulario para un proceso. La clave debe ser
  /// única dentro del proceso.
  fn definir_campo(&self, campo: CampoFormulario) -> Result<Uuid, DominioError>;

  /// Campos de formulario de un proceso, ordenados por `orden`.
  fn campos_de_proceso(&self, proceso_id: &Uuid) -> Result<Vec<CampoFormulario>, DominioError>;

  /// Campo por id.
  fn obtener_campo(&self, campo_id: &Uuid) -> Result<Option<CampoFormulario>, DominioError>;
}

/// Implementación en memoria para tests y desarrollo.
pub struct InMemoryCatalogo {
  procesos: Arc<Mutex<HashMap<Uuid, Proceso>>>,
  campos: Arc<Mutex<HashMap<Uuid, CampoFormulario>>>,
}

impl InMemoryCatalogo {
  pub fn new() -> Self {
    Self { procesos: Arc::new(Mutex::new(HashMap::new())), campos: Arc::new(Mutex::new(HashMap::new())) }
  }

  // Helper to map poisoned mutex errors into DominioError
  fn lock_map<'a, T>(&'a self, m: &'a Mutex<T>, name: &str) -> Result<std::sync::MutexGuard<'a, T>, DominioError> {
    m.lock()
     .map_err(|e| DominioError::Externo(format!("Mutex '{}' poisoned: {}", name, e)))
  }
}

impl Default for InMemoryCatalogo {
  fn default() -> Self {
    Self::new()
  }
}

impl CatalogoRepository for InMemoryCatalogo {
  fn guardar_proceso(&self, proceso: Proceso) -> Result<Uuid, DominioError> {
    let id = proceso.id();
    let mut procesos = self.lock_map(&self.procesos, "procesos")?;
    if procesos.values().any(|p| p.codigo() == proceso.codigo() && p.id() != id) {
      return Err(DominioError::Validacion(format!("Ya existe un proceso con código '{}'", proceso.codigo())));
    }
    procesos.insert(id, proceso);
    Ok(id)
  }

  fn obtener_proceso(&self, id: &Uuid) -> Result<Option<Proceso>, DominioError> {
    let procesos = self.lock_map(&self.procesos, "procesos")?;
    Ok(procesos.get(id).cloned())
  }

  fn proceso_por_codigo(&self, codigo: &str) -> Result<Option<Proceso>, DominioError> {
    let procesos = self.lock_map(&self.procesos, "procesos")?;
    Ok(procesos.values().find(|p| p.codigo() == codigo).cloned())
  }

  fn listar_procesos(&self) -> Result<Vec<Proceso>, DominioError> {
    let procesos = self.lock_map(&self.procesos, "procesos")?;
    Ok(procesos.values().cloned().collect())
  }

  fn definir_campo(&self, campo: CampoFormulario) -> Result<Uuid, DominioError> {
    {
      let procesos = self.lock_map(&self.procesos, "procesos")?;
      if !procesos.contains_key(&campo.proceso_id()) {
        return Err(DominioError::Validacion(format!("Proceso {} no existe", campo.proceso_id())));
      }
    }
    let mut campos = self.lock_map(&self.campos, "campos")?;
    let duplicada = campos.values()
                          .any(|c| c.proceso_id() == campo.proceso_id() && c.clave() == campo.clave() && c.id() != campo.id());
    if duplicada {
      return Err(DominioError::Validacion(format!(
        "La clave '{}' ya está definida para el proceso {}", campo.clave(), campo.proceso_id())));
    }
    let id = campo.id();
    campos.insert(id, campo);
    Ok(id)
  }

  fn campos_de_proceso(&self, proceso_id: &Uuid) -> Result<Vec<CampoFormulario>, DominioError> {
    let campos = self.lock_map(&self.campos, "campos")?;
    let mut res: Vec<CampoFormulario> = campos.values().filter(|c| c.proceso_id() == *proceso_id).cloned().collect();
    res.sort_by_key(|c| c.orden());
    Ok(res)
  }

  fn obtener_campo(&self, campo_id: &Uuid) -> Result<Option<CampoFormulario>, DominioError> {
    let campos = self.lock_map(&self.campos, "campos")?;
    Ok(campos.get(campo_id).cloned())
  }
}
