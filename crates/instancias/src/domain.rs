// Archivo: domain.rs
// Propósito: tipos de ejecución del motor de instancias. Estos registros
// son los que viajan entre el motor, el repositorio y la capa HTTP.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sgc_dominio::Etapa;
use uuid::Uuid;

/// Estado de una instancia en ejecución.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoInstancia {
    Borrador,
    EnProceso,
    Completado,
    Cancelado,
}

impl EstadoInstancia {
    /// Un estado terminal no admite más transiciones de etapa.
    pub fn es_terminal(&self) -> bool {
        matches!(self, EstadoInstancia::Completado | EstadoInstancia::Cancelado)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoInstancia::Borrador => "borrador",
            EstadoInstancia::EnProceso => "en_proceso",
            EstadoInstancia::Completado => "completado",
            EstadoInstancia::Cancelado => "cancelado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "borrador" => Some(EstadoInstancia::Borrador),
            "en_proceso" => Some(EstadoInstancia::EnProceso),
            "completado" => Some(EstadoInstancia::Completado),
            "cancelado" => Some(EstadoInstancia::Cancelado),
            _ => None,
        }
    }
}

/// Estado de un ticket de escalamiento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstadoTicket {
    Abierto,
    Resuelto,
    Cerrado,
}

impl EstadoTicket {
    pub fn es_terminal(&self) -> bool {
        matches!(self, EstadoTicket::Resuelto | EstadoTicket::Cerrado)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EstadoTicket::Abierto => "abierto",
            EstadoTicket::Resuelto => "resuelto",
            EstadoTicket::Cerrado => "cerrado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "abierto" => Some(EstadoTicket::Abierto),
            "resuelto" => Some(EstadoTicket::Resuelto),
            "cerrado" => Some(EstadoTicket::Cerrado),
            _ => None,
        }
    }
}

/// Tipos de acción conocidos de la bitácora. El campo `tipo` de `Accion`
/// es texto libre; estas constantes cubren los eventos que el motor emite.
pub mod tipos_accion {
    pub const INICIO_ETAPA: &str = "inicio_etapa";
    pub const AVANCE_ETAPA: &str = "avance_etapa";
    pub const REAPERTURA: &str = "reapertura";
    pub const BLOQUEO: &str = "bloqueo";
    pub const DESBLOQUEO: &str = "desbloqueo";
    pub const COMPLETADO: &str = "completado";

    /// Acciones que marcan la entrada de la instancia a su etapa actual.
    /// El cálculo de SLA y de tiempos de respuesta se ancla en la más
    /// reciente de éstas.
    pub fn es_entrada_etapa(tipo: &str) -> bool {
        matches!(tipo, INICIO_ETAPA | AVANCE_ETAPA | REAPERTURA)
    }
}

/// Una instancia en ejecución de un proceso: posicionada en una etapa,
/// con su bolsa de datos dinámicos y su contador de versión para el
/// control optimista de concurrencia.
///
/// Invariantes mantenidos por el motor:
/// - `etapa_actual_id` pertenece siempre al proceso `proceso_id`.
/// - `completado_en` se asigna una única vez, al pasar a `Completado`.
/// - una instancia bloqueada no acepta avances ni escritura de formularios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instancia {
    pub id: Uuid,
    pub proceso_id: Uuid,
    pub etapa_actual_id: Uuid,
    pub estado: EstadoInstancia,
    pub iniciado_por: String,
    pub iniciado_en: DateTime<Utc>,
    pub completado_en: Option<DateTime<Utc>>,
    /// Bolsa de datos clave→valor de la instancia (JSON objeto).
    pub datos_dinamicos: JsonValue,
    pub bloqueada: bool,
    pub razon_bloqueo: Option<String>,
    /// Versión para locking optimista; la incrementa el repositorio en
    /// cada actualización exitosa.
    pub version: i64,
}

impl Instancia {
    /// Construye una instancia recién iniciada sobre la etapa dada.
    pub fn nueva(proceso_id: Uuid, etapa_inicial_id: Uuid, iniciado_por: &str) -> Self {
        Self { id: Uuid::new_v4(),
               proceso_id,
               etapa_actual_id: etapa_inicial_id,
               estado: EstadoInstancia::EnProceso,
               iniciado_por: iniciado_por.to_string(),
               iniciado_en: Utc::now(),
               completado_en: None,
               datos_dinamicos: serde_json::json!({}),
               bloqueada: false,
               razon_bloqueo: None,
               version: 0 }
    }
}

/// Entrada inmutable de la bitácora de acciones. Una vez escrita nunca se
/// actualiza ni se borra: es la fuente de verdad para auditoría y SLA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accion {
    pub id: Uuid,
    pub instancia_id: Uuid,
    /// Etapa en la que estaba la instancia al ejecutarse la acción.
    pub etapa_id: Uuid,
    pub actor: String,
    pub tipo: String,
    pub comentario: Option<String>,
    pub ejecutado_en: DateTime<Utc>,
    /// Segundos transcurridos desde que la instancia entró a `etapa_id`.
    pub tiempo_respuesta_segundos: i64,
}

/// Vínculo (instancia, usuario): quién puede actuar sobre la instancia.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participante {
    pub instancia_id: Uuid,
    pub usuario_id: String,
    pub rol: String,
    pub asignado_en: DateTime<Utc>,
}

/// Respuesta a un campo del formulario dinámico. Semántica de upsert:
/// la última escritura gana mientras la instancia siga editable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RespuestaFormulario {
    pub instancia_id: Uuid,
    pub campo_id: Uuid,
    pub valor: String,
    pub actualizado_en: DateTime<Utc>,
}

/// Ticket de escalamiento levantado contra una instancia estancada o
/// bloqueada. Informativo: nunca bloquea ni desbloquea la instancia por
/// sí mismo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: Uuid,
    pub instancia_id: Uuid,
    pub creado_por: String,
    pub asignado_a: Option<String>,
    pub estado: EstadoTicket,
    pub descripcion: String,
    pub solucion: Option<String>,
    pub creado_en: DateTime<Utc>,
    pub resuelto_en: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn nuevo(instancia_id: Uuid, creado_por: &str, descripcion: &str) -> Self {
        Self { id: Uuid::new_v4(),
               instancia_id,
               creado_por: creado_por.to_string(),
               asignado_a: None,
               estado: EstadoTicket::Abierto,
               descripcion: descripcion.to_string(),
               solucion: None,
               creado_en: Utc::now(),
               resuelto_en: None }
    }
}

/// Asociación entre una instancia y un documento del catálogo externo.
/// El documento es propiedad del catálogo; aquí sólo se referencia por id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentoVinculado {
    pub instancia_id: Uuid,
    pub documento_id: Uuid,
    pub nota: String,
    pub vinculado_en: DateTime<Utc>,
}

/// Resultado de una actualización con control optimista de versiones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResultadoPersistencia {
    Ok { nueva_version: i64 },
    Conflicto,
}

/// Evento emitido hacia el canal externo de notificaciones. La entrega es
/// fire-and-forget: una falla se registra y no afecta la transición.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventoNotificacion {
    pub usuario_id: String,
    pub mensaje: String,
    pub payload: JsonValue,
}

/// Proyección de lectura de una instancia: lo que devuelve
/// `GET /instancias/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct VistaInstancia {
    pub instancia: Instancia,
    pub etapa_actual: Etapa,
    pub participantes: Vec<Participante>,
    pub tickets_abiertos: Vec<Ticket>,
    /// Calculada desde la bitácora al momento de la consulta; nunca se
    /// persiste.
    pub vencida: bool,
}
