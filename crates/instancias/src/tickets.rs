// Archivo: tickets.rs
// Propósito: tickets de escalamiento contra instancias estancadas o
// bloqueadas. Los tickets son un canal informativo: nunca bloquean ni
// desbloquean una instancia por sí mismos; el desbloqueo sigue siendo una
// operación explícita del motor ejecutada por un actor autorizado.
use crate::domain::{EstadoTicket, Ticket};
use crate::errors::{MotorError, Result};
use crate::repository::InstanciaRepository;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Servicio de escalamiento por tickets.
pub struct Escalamiento<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
}

impl<R> Escalamiento<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Abre un ticket contra la instancia. Siempre permitido, incluso con
    /// la instancia bloqueada: el escalamiento es el camino hacia el
    /// desbloqueo.
    pub fn abrir(&self, instancia_id: Uuid, creado_por: &str, descripcion: &str) -> Result<Ticket> {
        if descripcion.trim().is_empty() {
            return Err(MotorError::Validacion("la descripción del ticket no puede estar vacía".to_string()));
        }
        // La instancia debe existir; su estado o bloqueo no importan.
        self.repo.obtener_instancia(&instancia_id)?;
        let ticket = Ticket::nuevo(instancia_id, creado_por, descripcion.trim());
        self.repo.crear_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Asigna el ticket a un usuario. Un ticket terminal no se reasigna.
    pub fn asignar(&self, ticket_id: Uuid, usuario_id: &str) -> Result<Ticket> {
        let mut ticket = self.repo.obtener_ticket(&ticket_id)?;
        if ticket.estado.es_terminal() {
            return Err(MotorError::ticket_resuelto(&ticket_id));
        }
        ticket.asignado_a = Some(usuario_id.to_string());
        self.repo.actualizar_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Resuelve el ticket: fija solución, `resuelto_en` y estado en una
    /// sola escritura. Idempotente ante reintentos: repetir la resolución
    /// con la misma solución devuelve el ticket sin cambios; con una
    /// solución distinta falla con error de estado.
    pub fn resolver(&self, ticket_id: Uuid, solucion: &str) -> Result<Ticket> {
        let mut ticket = self.repo.obtener_ticket(&ticket_id)?;
        if ticket.estado.es_terminal() {
            if ticket.solucion.as_deref() == Some(solucion) {
                return Ok(ticket);
            }
            return Err(MotorError::ticket_resuelto(&ticket_id));
        }
        ticket.estado = EstadoTicket::Resuelto;
        ticket.solucion = Some(solucion.to_string());
        ticket.resuelto_en = Some(Utc::now());
        self.repo.actualizar_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Cierra el ticket (desde abierto o resuelto).
    pub fn cerrar(&self, ticket_id: Uuid) -> Result<Ticket> {
        let mut ticket = self.repo.obtener_ticket(&ticket_id)?;
        if ticket.estado == EstadoTicket::Cerrado {
            return Err(MotorError::Estado(format!("el ticket {} ya está cerrado", ticket_id)));
        }
        ticket.estado = EstadoTicket::Cerrado;
        self.repo.actualizar_ticket(&ticket)?;
        Ok(ticket)
    }

    /// Tickets de la instancia.
    pub fn de_instancia(&self, instancia_id: Uuid) -> Result<Vec<Ticket>> {
        self.repo.tickets_de(&instancia_id)
    }

    /// Tickets aún abiertos de la instancia.
    pub fn abiertos_de(&self, instancia_id: Uuid) -> Result<Vec<Ticket>> {
        let tickets = self.repo.tickets_de(&instancia_id)?;
        Ok(tickets.into_iter().filter(|t| t.estado == EstadoTicket::Abierto).collect())
    }
}
