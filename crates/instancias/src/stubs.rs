// Archivo: stubs.rs
// Propósito: implementaciones en memoria para pruebas y wiring rápido.
//
// Incluye el repositorio en memoria (`InMemoryInstanciaRepository`) y stubs
// para los colaboradores externos (catálogo documental y despacho de
// notificaciones). Estas implementaciones no son durables y se usan para
// demos o pruebas locales.
use crate::domain::{Accion, DocumentoVinculado, EventoNotificacion, Instancia, Participante, RespuestaFormulario,
                    ResultadoPersistencia, Ticket};
use crate::errors::{MotorError, Result};
use crate::repository::{CatalogoDocumentos, DespachoNotificaciones, InstanciaRepository};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Repositorio en memoria del motor de instancias (no durable).
pub struct InMemoryInstanciaRepository {
    /// Instancias indexadas por id.
    instancias: Mutex<HashMap<Uuid, Instancia>>,
    /// Bitácora por instancia, en orden de inserción.
    acciones: Mutex<HashMap<Uuid, Vec<Accion>>>,
    /// Participantes por instancia.
    participantes: Mutex<HashMap<Uuid, Vec<Participante>>>,
    /// Respuestas por par (instancia, campo).
    respuestas: Mutex<HashMap<(Uuid, Uuid), RespuestaFormulario>>,
    /// Tickets por id.
    tickets: Mutex<HashMap<Uuid, Ticket>>,
    /// Vínculos documentales por instancia.
    documentos: Mutex<HashMap<Uuid, Vec<DocumentoVinculado>>>,
}

impl InMemoryInstanciaRepository {
    pub fn new() -> Self {
        Self { instancias: Mutex::new(HashMap::new()),
               acciones: Mutex::new(HashMap::new()),
               participantes: Mutex::new(HashMap::new()),
               respuestas: Mutex::new(HashMap::new()),
               tickets: Mutex::new(HashMap::new()),
               documentos: Mutex::new(HashMap::new()) }
    }

    /// Helper para mapear `Mutex::lock()` en un `Result` con
    /// `MotorError::Almacenamiento`.
    fn lock<'a, T>(&'a self, m: &'a Mutex<T>) -> std::result::Result<MutexGuard<'a, T>, MotorError> {
        m.lock().map_err(|e| MotorError::Almacenamiento(format!("mutex poisoned: {:?}", e)))
    }
}

impl Default for InMemoryInstanciaRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanciaRepository for InMemoryInstanciaRepository {
    fn crear_instancia(&self, instancia: &Instancia, accion_inicial: &Accion) -> Result<()> {
        // Orden de locks fijo (instancias, luego acciones) en todos los
        // métodos que toman ambos.
        let mut instancias = self.lock(&self.instancias)?;
        let mut acciones = self.lock(&self.acciones)?;
        if instancias.contains_key(&instancia.id) {
            return Err(MotorError::Estado(format!("la instancia {} ya existe", instancia.id)));
        }
        instancias.insert(instancia.id, instancia.clone());
        acciones.entry(instancia.id).or_default().push(accion_inicial.clone());
        Ok(())
    }

    fn obtener_instancia(&self, id: &Uuid) -> Result<Instancia> {
        let instancias = self.lock(&self.instancias)?;
        instancias.get(id)
                  .cloned()
                  .ok_or(MotorError::NoEncontrado(format!("instancia {}", id)))
    }

    /// Control optimista: la escritura sólo procede si la versión
    /// almacenada coincide con `expected_version`. Estado y acción se
    /// escriben con ambos locks tomados, por lo que dos escritores
    /// concurrentes no pueden pasar ambos el chequeo y la bitácora nunca
    /// diverge del estado.
    fn actualizar_instancia(&self,
                            instancia: &Instancia,
                            expected_version: i64,
                            accion: Option<&Accion>)
                            -> Result<ResultadoPersistencia> {
        let mut instancias = self.lock(&self.instancias)?;
        let mut acciones = self.lock(&self.acciones)?;
        let actual = instancias.get_mut(&instancia.id)
                               .ok_or(MotorError::NoEncontrado(format!("instancia {}", instancia.id)))?;
        if actual.version != expected_version {
            return Ok(ResultadoPersistencia::Conflicto);
        }
        let mut nueva = instancia.clone();
        nueva.version = expected_version.saturating_add(1);
        let nueva_version = nueva.version;
        *actual = nueva;
        if let Some(a) = accion {
            acciones.entry(instancia.id).or_default().push(a.clone());
        }
        Ok(ResultadoPersistencia::Ok { nueva_version })
    }

    fn registrar_accion(&self, accion: &Accion) -> Result<()> {
        // Append-only: sólo push, nunca se reemplaza ni se borra.
        let mut acciones = self.lock(&self.acciones)?;
        acciones.entry(accion.instancia_id).or_default().push(accion.clone());
        Ok(())
    }

    fn acciones_de(&self, instancia_id: &Uuid) -> Result<Vec<Accion>> {
        let acciones = self.lock(&self.acciones)?;
        Ok(acciones.get(instancia_id).cloned().unwrap_or_default())
    }

    fn agregar_participante(&self, participante: &Participante) -> Result<()> {
        let mut participantes = self.lock(&self.participantes)?;
        let lista = participantes.entry(participante.instancia_id).or_default();
        if lista.iter().any(|p| p.usuario_id == participante.usuario_id) {
            return Err(MotorError::participante_duplicado(&participante.usuario_id));
        }
        lista.push(participante.clone());
        Ok(())
    }

    fn remover_participante(&self, instancia_id: &Uuid, usuario_id: &str) -> Result<()> {
        let mut participantes = self.lock(&self.participantes)?;
        let lista = participantes.entry(*instancia_id).or_default();
        let antes = lista.len();
        lista.retain(|p| p.usuario_id != usuario_id);
        if lista.len() == antes {
            return Err(MotorError::NoEncontrado(format!("participante '{}' en instancia {}", usuario_id, instancia_id)));
        }
        Ok(())
    }

    fn participantes_de(&self, instancia_id: &Uuid) -> Result<Vec<Participante>> {
        let participantes = self.lock(&self.participantes)?;
        Ok(participantes.get(instancia_id).cloned().unwrap_or_default())
    }

    fn guardar_respuesta(&self, respuesta: &RespuestaFormulario) -> Result<()> {
        let mut respuestas = self.lock(&self.respuestas)?;
        respuestas.insert((respuesta.instancia_id, respuesta.campo_id), respuesta.clone());
        Ok(())
    }

    fn respuestas_de(&self, instancia_id: &Uuid) -> Result<Vec<RespuestaFormulario>> {
        let respuestas = self.lock(&self.respuestas)?;
        Ok(respuestas.values().filter(|r| r.instancia_id == *instancia_id).cloned().collect())
    }

    fn crear_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.lock(&self.tickets)?;
        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    fn obtener_ticket(&self, id: &Uuid) -> Result<Ticket> {
        let tickets = self.lock(&self.tickets)?;
        tickets.get(id)
               .cloned()
               .ok_or(MotorError::NoEncontrado(format!("ticket {}", id)))
    }

    fn actualizar_ticket(&self, ticket: &Ticket) -> Result<()> {
        let mut tickets = self.lock(&self.tickets)?;
        if !tickets.contains_key(&ticket.id) {
            return Err(MotorError::NoEncontrado(format!("ticket {}", ticket.id)));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    fn tickets_de(&self, instancia_id: &Uuid) -> Result<Vec<Ticket>> {
        let tickets = self.lock(&self.tickets)?;
        let mut lista: Vec<Ticket> = tickets.values().filter(|t| t.instancia_id == *instancia_id).cloned().collect();
        lista.sort_by_key(|t| t.creado_en);
        Ok(lista)
    }

    fn vincular_documento(&self, vinculo: &DocumentoVinculado) -> Result<()> {
        let mut documentos = self.lock(&self.documentos)?;
        let lista = documentos.entry(vinculo.instancia_id).or_default();
        // Upsert del par (instancia, documento): re-vincular actualiza nota.
        lista.retain(|d| d.documento_id != vinculo.documento_id);
        lista.push(vinculo.clone());
        Ok(())
    }

    fn desvincular_documento(&self, instancia_id: &Uuid, documento_id: &Uuid) -> Result<()> {
        let mut documentos = self.lock(&self.documentos)?;
        let lista = documentos.entry(*instancia_id).or_default();
        let antes = lista.len();
        lista.retain(|d| d.documento_id != *documento_id);
        if lista.len() == antes {
            return Err(MotorError::NoEncontrado(format!("documento {} en instancia {}", documento_id, instancia_id)));
        }
        Ok(())
    }

    fn documentos_de(&self, instancia_id: &Uuid) -> Result<Vec<DocumentoVinculado>> {
        let documentos = self.lock(&self.documentos)?;
        Ok(documentos.get(instancia_id).cloned().unwrap_or_default())
    }
}

/// Stub de catálogo documental: un conjunto de ids conocidos más un flag
/// para simular indisponibilidad del colaborador.
pub struct CatalogoDocumentosStub {
    existentes: Mutex<HashSet<Uuid>>,
    fallar: AtomicBool,
}

impl CatalogoDocumentosStub {
    pub fn new() -> Self {
        Self { existentes: Mutex::new(HashSet::new()), fallar: AtomicBool::new(false) }
    }

    /// Da de alta un documento en el catálogo simulado.
    pub fn registrar(&self, documento_id: Uuid) {
        self.existentes.lock().unwrap_or_else(|e| e.into_inner()).insert(documento_id);
    }

    /// Activa o desactiva el modo de falla (el catálogo deja de responder).
    pub fn simular_falla(&self, fallar: bool) {
        self.fallar.store(fallar, Ordering::SeqCst);
    }
}

impl Default for CatalogoDocumentosStub {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogoDocumentos for CatalogoDocumentosStub {
    fn documento_existe(&self, documento_id: &Uuid) -> Result<bool> {
        if self.fallar.load(Ordering::SeqCst) {
            return Err(MotorError::Dependencia("catálogo documental no disponible".to_string()));
        }
        Ok(self.existentes.lock().unwrap_or_else(|e| e.into_inner()).contains(documento_id))
    }
}

/// Despacho de notificaciones en memoria: captura los eventos emitidos
/// para que las pruebas puedan inspeccionarlos.
pub struct NotificadorMemoria {
    eventos: Mutex<Vec<EventoNotificacion>>,
    fallar: AtomicBool,
}

impl NotificadorMemoria {
    pub fn new() -> Self {
        Self { eventos: Mutex::new(Vec::new()), fallar: AtomicBool::new(false) }
    }

    /// Copia de los eventos capturados hasta el momento.
    pub fn eventos(&self) -> Vec<EventoNotificacion> {
        self.eventos.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Activa o desactiva el modo de falla del canal.
    pub fn simular_falla(&self, fallar: bool) {
        self.fallar.store(fallar, Ordering::SeqCst);
    }
}

impl Default for NotificadorMemoria {
    fn default() -> Self {
        Self::new()
    }
}

impl DespachoNotificaciones for NotificadorMemoria {
    fn enviar(&self, evento: EventoNotificacion) -> Result<()> {
        if self.fallar.load(Ordering::SeqCst) {
            return Err(MotorError::Dependencia("canal de notificaciones no disponible".to_string()));
        }
        self.eventos.lock().unwrap_or_else(|e| e.into_inner()).push(evento);
        Ok(())
    }
}
