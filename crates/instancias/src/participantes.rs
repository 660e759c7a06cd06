// Archivo: participantes.rs
// Propósito: registro de participantes de una instancia. El par
// (instancia, usuario) es único y su pertenencia funciona como guardia de
// autorización previa a las mutaciones del motor.
use crate::domain::Participante;
use crate::errors::{MotorError, Result};
use crate::repository::InstanciaRepository;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Registro de participantes: quién puede actuar sobre cada instancia y
/// con qué etiqueta de rol. La capa externa de permisos puede combinar
/// esta pertenencia con sus propios chequeos de rol.
pub struct RegistroParticipantes<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
}

impl<R> RegistroParticipantes<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Autoriza a un usuario a actuar sobre la instancia. Falla con error
    /// de estado si el par (instancia, usuario) ya existe.
    pub fn asignar(&self, instancia_id: Uuid, usuario_id: &str, rol: &str) -> Result<Participante> {
        if usuario_id.trim().is_empty() {
            return Err(MotorError::Validacion("usuario_id no puede estar vacío".to_string()));
        }
        // La instancia debe existir.
        self.repo.obtener_instancia(&instancia_id)?;
        let participante = Participante { instancia_id,
                                          usuario_id: usuario_id.trim().to_string(),
                                          rol: rol.trim().to_string(),
                                          asignado_en: Utc::now() };
        self.repo.agregar_participante(&participante)?;
        Ok(participante)
    }

    /// Revoca la participación del usuario en la instancia.
    pub fn remover(&self, instancia_id: Uuid, usuario_id: &str) -> Result<()> {
        self.repo.remover_participante(&instancia_id, usuario_id)
    }

    /// Chequeo de membresía usado como guardia antes de las mutaciones
    /// del motor.
    pub fn autorizado(&self, instancia_id: Uuid, usuario_id: &str) -> Result<bool> {
        let participantes = self.repo.participantes_de(&instancia_id)?;
        Ok(participantes.iter().any(|p| p.usuario_id == usuario_id))
    }

    /// Participantes de la instancia.
    pub fn de_instancia(&self, instancia_id: Uuid) -> Result<Vec<Participante>> {
        self.repo.participantes_de(&instancia_id)
    }
}
