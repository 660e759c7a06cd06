// campo.rs
use crate::DominioError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tipo de dato de un campo personalizado de formulario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TipoCampo {
  Texto,
  Numero,
  Fecha,
  Booleano,
  Seleccion,
}

impl fmt::Display for TipoCampo {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      TipoCampo::Texto => "texto",
      TipoCampo::Numero => "numero",
      TipoCampo::Fecha => "fecha",
      TipoCampo::Booleano => "booleano",
      TipoCampo::Seleccion => "seleccion",
    };
    write!(f, "{}", s)
  }
}

impl std::str::FromStr for TipoCampo {
  type Err = DominioError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "texto" => Ok(TipoCampo::Texto),
      "numero" => Ok(TipoCampo::Numero),
      "fecha" => Ok(TipoCampo::Fecha),
      "booleano" => Ok(TipoCampo::Booleano),
      "seleccion" => Ok(TipoCampo::Seleccion),
      other => Err(DominioError::Validacion(format!("Tipo de campo desconocido: {}", other))),
    }
  }
}

/// Campo personalizado del formulario dinámico de un proceso.
///
/// La `clave` identifica al campo dentro del proceso (única por proceso,
/// verificada por el catálogo) y es la llave bajo la cual las instancias
/// registran sus respuestas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampoFormulario {
  id: Uuid,
  proceso_id: Uuid,
  etiqueta: String,
  clave: String,
  tipo: TipoCampo,
  requerido: bool,
  orden: i32,
  opciones: Vec<String>,
}

impl CampoFormulario {
  pub fn new(proceso_id: Uuid,
             etiqueta: &str,
             clave: &str,
             tipo: TipoCampo,
             requerido: bool,
             orden: i32,
             opciones: Vec<String>)
             -> Result<Self, DominioError> {
    if etiqueta.trim().is_empty() {
      return Err(DominioError::Validacion("La etiqueta del campo no puede estar vacía".to_string()));
    }
    let clave_normalizada = clave.trim().to_lowercase();
    if clave_normalizada.is_empty() {
      return Err(DominioError::Validacion("La clave del campo no puede estar vacía".to_string()));
    }
    if !clave_normalizada.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
      return Err(DominioError::Validacion(format!(
        "Clave de campo inválida '{}': sólo se permiten alfanuméricos y '_'", clave_normalizada)));
    }
    if tipo == TipoCampo::Seleccion && opciones.is_empty() {
      return Err(DominioError::Validacion("Un campo de selección requiere al menos una opción".to_string()));
    }
    if tipo != TipoCampo::Seleccion && !opciones.is_empty() {
      return Err(DominioError::Validacion(format!("El tipo {} no admite opciones", tipo)));
    }
    Ok(Self { id: Uuid::new_v4(),
              proceso_id,
              etiqueta: etiqueta.trim().to_string(),
              clave: clave_normalizada,
              tipo,
              requerido,
              orden,
              opciones })
  }

  /// Reconstruye un campo desde persistencia conservando su id.
  pub fn from_parts(id: Uuid,
                    proceso_id: Uuid,
                    etiqueta: &str,
                    clave: &str,
                    tipo: TipoCampo,
                    requerido: bool,
                    orden: i32,
                    opciones: Vec<String>)
                    -> Result<Self, DominioError> {
    let mut campo = Self::new(proceso_id, etiqueta, clave, tipo, requerido, orden, opciones)?;
    campo.id = id;
    Ok(campo)
  }

  /// Valida un valor contra el tipo del campo. El valor llega como texto
  /// libre (así lo guarda el almacén de respuestas) y aquí se verifica que
  /// sea interpretable según el tipo declarado.
  pub fn validar_valor(&self, valor: &str) -> Result<(), DominioError> {
    match self.tipo {
      TipoCampo::Texto => Ok(()),
      TipoCampo::Numero => valor.trim()
                                .parse::<f64>()
                                .map(|_| ())
                                .map_err(|_| DominioError::Validacion(format!(
                                  "El campo '{}' espera un número, recibió '{}'", self.clave, valor))),
      TipoCampo::Fecha => chrono::NaiveDate::parse_from_str(valor.trim(), "%Y-%m-%d")
                            .map(|_| ())
                            .map_err(|_| DominioError::Validacion(format!(
                              "El campo '{}' espera una fecha YYYY-MM-DD, recibió '{}'", self.clave, valor))),
      TipoCampo::Booleano => match valor.trim() {
        "true" | "false" | "si" | "no" => Ok(()),
        otro => Err(DominioError::Validacion(format!(
          "El campo '{}' espera un booleano, recibió '{}'", self.clave, otro))),
      },
      TipoCampo::Seleccion => {
        if self.opciones.iter().any(|o| o == valor.trim()) {
          Ok(())
        } else {
          Err(DominioError::Validacion(format!(
            "El valor '{}' no es una opción válida del campo '{}'", valor, self.clave)))
        }
      }
    }
  }

  pub fn id(&self) -> Uuid {
    self.id
  }

  pub fn proceso_id(&self) -> Uuid {
    self.proceso_id
  }

  pub fn etiqueta(&self) -> &str {
    &self.etiqueta
  }

  pub fn clave(&self) -> &str {
    &self.clave
  }

  pub fn tipo(&self) -> TipoCampo {
    self.tipo
  }

  pub fn requerido(&self) -> bool {
    self.requerido
  }

  pub fn orden(&self) -> i32 {
    self.orden
  }

  pub fn opciones(&self) -> &[String] {
    &self.opciones
  }
}
