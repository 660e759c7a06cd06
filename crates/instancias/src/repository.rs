// Archivo: repository.rs
// Propósito: definir el trait `InstanciaRepository` y los traits de
// colaboradores externos (`CatalogoDocumentos`, `DespachoNotificaciones`).
// Describe el contrato que deben implementar las persistencias (Diesel,
// in-memory, etc.).
use crate::domain::{Accion, DocumentoVinculado, EventoNotificacion, Instancia, Participante, RespuestaFormulario,
                    ResultadoPersistencia, Ticket};
use crate::errors::Result;
use uuid::Uuid;

/// Contrato de persistencia del motor de instancias.
///
/// Sobre la bitácora: `registrar_accion` es el único camino de escritura y
/// el trait no expone actualización ni borrado de acciones. La propiedad
/// append-only queda garantizada por el contrato, no por disciplina del
/// caller.
pub trait InstanciaRepository: Send + Sync {
    /// Inserta una instancia recién creada (version 0) junto con su acción
    /// inicial de bitácora. Ambas escrituras forman una unidad: o la
    /// instancia existe con su `inicio_etapa`, o no existe.
    fn crear_instancia(&self, instancia: &Instancia, accion_inicial: &Accion) -> Result<()>;

    /// Obtiene una instancia por id. `NoEncontrado` si no existe.
    fn obtener_instancia(&self, id: &Uuid) -> Result<Instancia>;

    /// Actualiza una instancia con control optimista: la escritura sólo
    /// procede si la versión almacenada coincide con `expected_version`;
    /// en ese caso el repositorio incrementa la versión y devuelve
    /// `Ok { nueva_version }`. Un desajuste devuelve `Conflicto` (no es
    /// un error: el caller decide reintentar).
    ///
    /// Si la transición lleva `accion`, la entrada de bitácora se escribe
    /// en la misma unidad que el estado: un CAS exitoso nunca queda sin su
    /// acción, y un CAS fallido no deja acción huérfana.
    fn actualizar_instancia(&self,
                            instancia: &Instancia,
                            expected_version: i64,
                            accion: Option<&Accion>)
                            -> Result<ResultadoPersistencia>;

    /// Agrega una entrada suelta a la bitácora (append-only). Camino para
    /// importaciones y backfill; las transiciones del motor escriben su
    /// acción junto con el estado vía `crear_instancia` /
    /// `actualizar_instancia`.
    fn registrar_accion(&self, accion: &Accion) -> Result<()>;

    /// Bitácora completa de la instancia, ordenada por fecha de ejecución.
    fn acciones_de(&self, instancia_id: &Uuid) -> Result<Vec<Accion>>;

    /// Registra un participante. El par (instancia, usuario) es único:
    /// un duplicado produce un error de estado.
    fn agregar_participante(&self, participante: &Participante) -> Result<()>;

    /// Elimina un participante. `NoEncontrado` si el par no existe.
    fn remover_participante(&self, instancia_id: &Uuid, usuario_id: &str) -> Result<()>;

    /// Participantes de una instancia.
    fn participantes_de(&self, instancia_id: &Uuid) -> Result<Vec<Participante>>;

    /// Upsert de una respuesta de formulario: última escritura gana sobre
    /// el par (instancia, campo).
    fn guardar_respuesta(&self, respuesta: &RespuestaFormulario) -> Result<()>;

    /// Respuestas registradas para una instancia.
    fn respuestas_de(&self, instancia_id: &Uuid) -> Result<Vec<RespuestaFormulario>>;

    /// Inserta un ticket nuevo.
    fn crear_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Ticket por id. `NoEncontrado` si no existe.
    fn obtener_ticket(&self, id: &Uuid) -> Result<Ticket>;

    /// Reemplaza el ticket (asignación/resolución/cierre).
    fn actualizar_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Tickets de una instancia, ordenados por creación.
    fn tickets_de(&self, instancia_id: &Uuid) -> Result<Vec<Ticket>>;

    /// Upsert del vínculo (instancia, documento); re-vincular actualiza la
    /// nota.
    fn vincular_documento(&self, vinculo: &DocumentoVinculado) -> Result<()>;

    /// Elimina el vínculo. No toca el documento del catálogo externo.
    fn desvincular_documento(&self, instancia_id: &Uuid, documento_id: &Uuid) -> Result<()>;

    /// Documentos vinculados a una instancia.
    fn documentos_de(&self, instancia_id: &Uuid) -> Result<Vec<DocumentoVinculado>>;
}

// Traits de colaboradores externos. El núcleo los consume con timeout
// acotado y trato best-effort: su falla nunca aborta una transición.

/// Catálogo documental externo (sólo lectura desde este crate).
pub trait CatalogoDocumentos: Send + Sync {
    /// Consulta si el documento existe en el catálogo.
    fn documento_existe(&self, documento_id: &Uuid) -> Result<bool>;
}

/// Canal externo de entrega de notificaciones (fire-and-forget).
pub trait DespachoNotificaciones: Send + Sync {
    /// Entrega el evento al canal. La implementación debe acotar su
    /// tiempo de espera; el caller registra la falla y continúa.
    fn enviar(&self, evento: EventoNotificacion) -> Result<()>;
}
