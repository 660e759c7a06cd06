// Archivo: formularios.rs
// Propósito: almacén de respuestas del formulario dinámico y la validación
// transversal que liga el esquema de campos con la transición terminal del
// motor (una instancia no se completa con campos requeridos sin respuesta).
use crate::domain::{Instancia, RespuestaFormulario};
use crate::errors::{MotorError, Result};
use crate::repository::InstanciaRepository;
use chrono::Utc;
use sgc_dominio::CatalogoRepository;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Almacén de respuestas por instancia, resuelto contra el esquema de
/// campos del proceso. Upsert: la última escritura gana mientras la
/// instancia siga editable.
pub struct RespuestasFormulario<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
    catalogo: Arc<dyn CatalogoRepository>,
}

impl<R> RespuestasFormulario<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>, catalogo: Arc<dyn CatalogoRepository>) -> Self {
        Self { repo, catalogo }
    }

    /// Registra (o reemplaza) la respuesta a un campo, identificado por su
    /// clave dentro del proceso de la instancia. El valor se valida contra
    /// el tipo declarado del campo.
    pub fn registrar_respuesta(&self, instancia_id: Uuid, clave: &str, valor: &str) -> Result<RespuestaFormulario> {
        let instancia = self.repo.obtener_instancia(&instancia_id)?;
        if instancia.bloqueada {
            return Err(MotorError::bloqueada(instancia.razon_bloqueo.as_deref()));
        }
        if instancia.estado.es_terminal() {
            return Err(MotorError::Estado(format!("la instancia está {} y no admite respuestas",
                                                  instancia.estado.as_str())));
        }
        let campos = self.catalogo.campos_de_proceso(&instancia.proceso_id)?;
        let campo = campos.iter()
                          .find(|c| c.clave() == clave)
                          .ok_or_else(|| MotorError::NoEncontrado(format!("campo '{}' en el proceso {}",
                                                                          clave,
                                                                          instancia.proceso_id)))?;
        campo.validar_valor(valor)?;
        let respuesta = RespuestaFormulario { instancia_id,
                                              campo_id: campo.id(),
                                              valor: valor.to_string(),
                                              actualizado_en: Utc::now() };
        self.repo.guardar_respuesta(&respuesta)?;
        Ok(respuesta)
    }

    /// Respuestas registradas para la instancia.
    pub fn de_instancia(&self, instancia_id: Uuid) -> Result<Vec<RespuestaFormulario>> {
        self.repo.respuestas_de(&instancia_id)
    }
}

/// Claves de campos requeridos del proceso que aún no tienen respuesta
/// (o cuya respuesta es texto vacío) en la instancia. El motor bloquea la
/// transición a `Completado` mientras esta lista no esté vacía.
pub fn claves_requeridas_sin_respuesta<R>(catalogo: &dyn CatalogoRepository,
                                          repo: &R,
                                          instancia: &Instancia)
                                          -> Result<Vec<String>>
    where R: InstanciaRepository + ?Sized
{
    let campos = catalogo.campos_de_proceso(&instancia.proceso_id)?;
    let respuestas = repo.respuestas_de(&instancia.id)?;
    let contestados: HashSet<Uuid> = respuestas.iter()
                                               .filter(|r| !r.valor.trim().is_empty())
                                               .map(|r| r.campo_id)
                                               .collect();
    Ok(campos.iter()
             .filter(|c| c.requerido() && !contestados.contains(&c.id()))
             .map(|c| c.clave().to_string())
             .collect())
}
