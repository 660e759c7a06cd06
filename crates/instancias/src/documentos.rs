// Archivo: documentos.rs
// Propósito: vínculos entre instancias y documentos del catálogo externo.
// La asociación es pura: no tiene efecto sobre el estado de la instancia y
// nunca toca el documento, que es propiedad del catálogo.
use crate::domain::DocumentoVinculado;
use crate::errors::{MotorError, Result};
use crate::repository::{CatalogoDocumentos, InstanciaRepository};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Vinculador de documentos de evidencia a instancias.
pub struct VinculadorDocumentos<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
    catalogo_docs: Arc<dyn CatalogoDocumentos>,
}

impl<R> VinculadorDocumentos<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>, catalogo_docs: Arc<dyn CatalogoDocumentos>) -> Self {
        Self { repo, catalogo_docs }
    }

    /// Vincula un documento del catálogo externo a la instancia con una
    /// nota. Si el catálogo responde que el documento no existe, la
    /// operación se rechaza; si el catálogo no responde, el vínculo
    /// procede igualmente con un warning (la falla del colaborador no
    /// aborta la escritura).
    pub fn vincular(&self, instancia_id: Uuid, documento_id: Uuid, nota: &str) -> Result<DocumentoVinculado> {
        self.repo.obtener_instancia(&instancia_id)?;
        match self.catalogo_docs.documento_existe(&documento_id) {
            Ok(true) => {}
            Ok(false) => {
                return Err(MotorError::Validacion(format!("el documento {} no existe en el catálogo", documento_id)))
            }
            Err(e) => {
                log::warn!("catálogo documental no disponible al vincular {}: {}; se vincula de todas formas",
                           documento_id,
                           e);
            }
        }
        let vinculo = DocumentoVinculado { instancia_id,
                                           documento_id,
                                           nota: nota.to_string(),
                                           vinculado_en: Utc::now() };
        self.repo.vincular_documento(&vinculo)?;
        Ok(vinculo)
    }

    /// Elimina el vínculo; el documento del catálogo queda intacto.
    pub fn desvincular(&self, instancia_id: Uuid, documento_id: Uuid) -> Result<()> {
        self.repo.desvincular_documento(&instancia_id, &documento_id)
    }

    /// Documentos vinculados a la instancia.
    pub fn de_instancia(&self, instancia_id: Uuid) -> Result<Vec<DocumentoVinculado>> {
        self.repo.documentos_de(&instancia_id)
    }
}
