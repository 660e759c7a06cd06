// Archivo: service.rs
// Propósito: implementar `ServicioInstancias`, la capa orquestadora que
// expone operaciones de alto nivel sobre instancias (crear, avanzar,
// bloquear, respuestas, tickets, documentos, vista). Esta capa debe ser
// invocada desde handlers HTTP.
//
// Responsabilidades que el motor no asume:
// - guardia de autorización por participación antes de cada mutación
//   (el actor llega ya autenticado; aquí sólo se verifica la membresía),
// - emisión fire-and-forget de notificaciones tras avances, bloqueos y
//   tickets nuevos: una falla del canal se registra con warning y nunca
//   se propaga como error de la transición.
use crate::documentos::VinculadorDocumentos;
use crate::domain::{DocumentoVinculado, EventoNotificacion, Instancia, Participante, RespuestaFormulario, Ticket,
                    VistaInstancia};
use crate::engine::MotorInstancias;
use crate::errors::{MotorError, Result};
use crate::formularios::RespuestasFormulario;
use crate::participantes::RegistroParticipantes;
use crate::repository::{CatalogoDocumentos, DespachoNotificaciones, InstanciaRepository};
use crate::tickets::Escalamiento;
use serde_json::Value as JsonValue;
use sgc_dominio::CatalogoRepository;
use std::sync::Arc;
use uuid::Uuid;

/// Rol con el que se registra automáticamente al creador de la instancia.
pub const ROL_INICIADOR: &str = "iniciador";

/// Servicio de alto nivel sobre el motor de instancias.
pub struct ServicioInstancias<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
    catalogo: Arc<dyn CatalogoRepository>,
    motor: MotorInstancias<R>,
    participantes: RegistroParticipantes<R>,
    formularios: RespuestasFormulario<R>,
    tickets: Escalamiento<R>,
    documentos: VinculadorDocumentos<R>,
    notificador: Arc<dyn DespachoNotificaciones>,
}

impl<R> ServicioInstancias<R> where R: InstanciaRepository + 'static
{
    /// Crea el servicio inyectando el repositorio, el catálogo de
    /// configuración y los colaboradores externos.
    pub fn new(repo: Arc<R>,
               catalogo: Arc<dyn CatalogoRepository>,
               catalogo_docs: Arc<dyn CatalogoDocumentos>,
               notificador: Arc<dyn DespachoNotificaciones>)
               -> Self {
        let motor = MotorInstancias::new(repo.clone(), catalogo.clone());
        let participantes = RegistroParticipantes::new(repo.clone());
        let formularios = RespuestasFormulario::new(repo.clone(), catalogo.clone());
        let tickets = Escalamiento::new(repo.clone());
        let documentos = VinculadorDocumentos::new(repo.clone(), catalogo_docs);
        Self { repo, catalogo, motor, participantes, formularios, tickets, documentos, notificador }
    }

    /// Crea una instancia y registra al iniciador como participante.
    pub fn crear_instancia(&self, proceso_id: Uuid, iniciado_por: &str) -> Result<Instancia> {
        let instancia = self.motor.crear_instancia(proceso_id, iniciado_por)?;
        self.participantes.asignar(instancia.id, iniciado_por, ROL_INICIADOR)?;
        Ok(instancia)
    }

    /// Avanza la instancia; notifica a los participantes del movimiento.
    pub fn avanzar_etapa(&self, instancia_id: Uuid, actor: &str, comentario: Option<String>) -> Result<Instancia> {
        self.exigir_autorizado(instancia_id, actor)?;
        let instancia = self.motor.avanzar_etapa(instancia_id, actor, comentario)?;
        self.notificar_participantes(instancia_id,
                                     &format!("La instancia {} avanzó de etapa", instancia_id),
                                     serde_json::json!({
                                         "instancia_id": instancia_id,
                                         "etapa_id": instancia.etapa_actual_id,
                                         "estado": instancia.estado,
                                     }));
        Ok(instancia)
    }

    /// Regresa la instancia a una etapa anterior reabrible.
    pub fn reabrir_etapa(&self, instancia_id: Uuid, etapa_id: Uuid, actor: &str, razon: &str) -> Result<Instancia> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.motor.reabrir_etapa(instancia_id, etapa_id, actor, razon)
    }

    /// Bloquea la instancia; notifica a los participantes.
    pub fn bloquear(&self, instancia_id: Uuid, actor: &str, razon: &str) -> Result<Instancia> {
        self.exigir_autorizado(instancia_id, actor)?;
        let instancia = self.motor.bloquear(instancia_id, actor, razon)?;
        self.notificar_participantes(instancia_id,
                                     &format!("La instancia {} fue bloqueada: {}", instancia_id, razon),
                                     serde_json::json!({
                                         "instancia_id": instancia_id,
                                         "razon": razon,
                                     }));
        Ok(instancia)
    }

    /// Desbloquea la instancia.
    pub fn desbloquear(&self, instancia_id: Uuid, actor: &str) -> Result<Instancia> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.motor.desbloquear(instancia_id, actor)
    }

    /// Mezcla datos dinámicos en la bolsa de la instancia.
    pub fn escribir_datos(&self, instancia_id: Uuid, actor: &str, datos: JsonValue) -> Result<Instancia> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.motor.escribir_datos(instancia_id, datos)
    }

    /// Registra la respuesta de un campo del formulario.
    pub fn registrar_respuesta(&self,
                               instancia_id: Uuid,
                               actor: &str,
                               clave: &str,
                               valor: &str)
                               -> Result<RespuestaFormulario> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.formularios.registrar_respuesta(instancia_id, clave, valor)
    }

    /// Abre un ticket de escalamiento. No requiere ser participante: el
    /// escalamiento es un canal abierto, también sobre instancias
    /// bloqueadas. Notifica a los participantes.
    pub fn abrir_ticket(&self, instancia_id: Uuid, creado_por: &str, descripcion: &str) -> Result<Ticket> {
        let ticket = self.tickets.abrir(instancia_id, creado_por, descripcion)?;
        self.notificar_participantes(instancia_id,
                                     &format!("Nuevo ticket sobre la instancia {}: {}", instancia_id, descripcion),
                                     serde_json::json!({
                                         "instancia_id": instancia_id,
                                         "ticket_id": ticket.id,
                                     }));
        Ok(ticket)
    }

    /// Asigna un ticket abierto.
    pub fn asignar_ticket(&self, ticket_id: Uuid, usuario_id: &str) -> Result<Ticket> {
        self.tickets.asignar(ticket_id, usuario_id)
    }

    /// Resuelve un ticket abierto.
    pub fn resolver_ticket(&self, ticket_id: Uuid, solucion: &str) -> Result<Ticket> {
        self.tickets.resolver(ticket_id, solucion)
    }

    /// Registra un participante en la instancia. Operación administrativa:
    /// la capa externa de permisos decide quién puede invocarla.
    pub fn asignar_participante(&self, instancia_id: Uuid, usuario_id: &str, rol: &str) -> Result<Participante> {
        self.participantes.asignar(instancia_id, usuario_id, rol)
    }

    /// Revoca la participación de un usuario.
    pub fn remover_participante(&self, instancia_id: Uuid, usuario_id: &str) -> Result<()> {
        self.participantes.remover(instancia_id, usuario_id)
    }

    /// Vincula un documento del catálogo externo a la instancia.
    pub fn vincular_documento(&self,
                              instancia_id: Uuid,
                              actor: &str,
                              documento_id: Uuid,
                              nota: &str)
                              -> Result<DocumentoVinculado> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.documentos.vincular(instancia_id, documento_id, nota)
    }

    /// Elimina el vínculo documental.
    pub fn desvincular_documento(&self, instancia_id: Uuid, actor: &str, documento_id: Uuid) -> Result<()> {
        self.exigir_autorizado(instancia_id, actor)?;
        self.documentos.desvincular(instancia_id, documento_id)
    }

    /// Proyección de lectura de la instancia: estado actual, etapa,
    /// participantes, tickets abiertos y flag de vencimiento calculado
    /// desde la bitácora.
    pub fn vista(&self, instancia_id: Uuid) -> Result<VistaInstancia> {
        let instancia = self.repo.obtener_instancia(&instancia_id)?;
        let proceso = self.catalogo
                          .obtener_proceso(&instancia.proceso_id)?
                          .ok_or_else(|| MotorError::NoEncontrado(format!("proceso {}", instancia.proceso_id)))?;
        let etapa_actual = proceso.etapa(&instancia.etapa_actual_id)
                                  .cloned()
                                  .ok_or_else(|| MotorError::Almacenamiento(format!(
                                      "la etapa actual {} no pertenece al proceso {}",
                                      instancia.etapa_actual_id,
                                      proceso.id())))?;
        let participantes = self.participantes.de_instancia(instancia_id)?;
        let tickets_abiertos = self.tickets.abiertos_de(instancia_id)?;
        let vencida = self.motor.libro().vencida(&instancia, &etapa_actual)?;
        Ok(VistaInstancia { instancia, etapa_actual, participantes, tickets_abiertos, vencida })
    }

    /// Bitácora de acciones de la instancia.
    pub fn acciones(&self, instancia_id: Uuid) -> Result<Vec<crate::domain::Accion>> {
        self.motor.libro().acciones(&instancia_id)
    }

    // Guardia de membresía: el actor debe participar en la instancia.
    fn exigir_autorizado(&self, instancia_id: Uuid, actor: &str) -> Result<()> {
        if self.participantes.autorizado(instancia_id, actor)? {
            Ok(())
        } else {
            Err(MotorError::NoAutorizado(format!("el usuario '{}' no participa en la instancia {}", actor, instancia_id)))
        }
    }

    // Entrega best-effort: una falla del canal se registra y se sigue con
    // el resto de los destinatarios.
    fn notificar_participantes(&self, instancia_id: Uuid, mensaje: &str, payload: JsonValue) {
        let participantes = match self.participantes.de_instancia(instancia_id) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("no se pudieron listar participantes de {} para notificar: {}", instancia_id, e);
                return;
            }
        };
        for p in participantes {
            let evento = EventoNotificacion { usuario_id: p.usuario_id.clone(),
                                              mensaje: mensaje.to_string(),
                                              payload: payload.clone() };
            if let Err(e) = self.notificador.enviar(evento) {
                log::warn!("falló la notificación a '{}' sobre {}: {}", p.usuario_id, instancia_id, e);
            }
        }
    }
}
