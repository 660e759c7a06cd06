// Archivo: engine.rs
// Propósito: implementar `MotorInstancias`, la máquina de estados de las
// instancias en ejecución.
//
// Toda mutación sigue el mismo contrato: cargar instancia, validar la
// transición, preparar la acción de bitácora y escribir estado + acción
// con `expected_version` (CAS) en una sola unidad de persistencia. Un CAS
// fallido se clasifica como `MotorError::Conflicto` y el caller decide
// reintentar.
use crate::domain::{tipos_accion, Accion, EstadoInstancia, Instancia, ResultadoPersistencia};
use crate::errors::{MotorError, Result};
use crate::formularios::claves_requeridas_sin_respuesta;
use crate::ledger::LibroAcciones;
use crate::repository::InstanciaRepository;
use chrono::Utc;
use serde_json::Value as JsonValue;
use sgc_dominio::{CatalogoRepository, EstadoProceso, Proceso};
use std::sync::Arc;
use uuid::Uuid;

/// Motor de instancias: crea instancias desde definiciones de proceso y
/// las avanza, reabre, bloquea y desbloquea manteniendo los invariantes
/// del dominio. Los grafos de etapas son estrictamente lineales.
pub struct MotorInstancias<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
    catalogo: Arc<dyn CatalogoRepository>,
    libro: LibroAcciones<R>,
}

impl<R> MotorInstancias<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>, catalogo: Arc<dyn CatalogoRepository>) -> Self {
        let libro = LibroAcciones::new(repo.clone());
        Self { repo, catalogo, libro }
    }

    /// Acceso de lectura a la bitácora.
    pub fn libro(&self) -> &LibroAcciones<R> {
        &self.libro
    }

    /// Crea una instancia de un proceso `Activo` con al menos una etapa.
    /// La instancia nace `EnProceso` sobre la etapa de menor orden y la
    /// bitácora abre con `inicio_etapa` (tiempo de respuesta 0).
    pub fn crear_instancia(&self, proceso_id: Uuid, iniciado_por: &str) -> Result<Instancia> {
        if iniciado_por.trim().is_empty() {
            return Err(MotorError::Validacion("iniciado_por no puede estar vacío".to_string()));
        }
        let proceso = self.cargar_proceso(&proceso_id)?;
        if proceso.estado() != EstadoProceso::Activo {
            return Err(MotorError::Validacion(format!("el proceso '{}' no está activo (estado: {})",
                                                      proceso.codigo(),
                                                      proceso.estado())));
        }
        let primera = proceso.primera_etapa()
                             .ok_or_else(|| MotorError::Validacion(format!("el proceso '{}' no tiene etapas",
                                                                           proceso.codigo())))?;
        let instancia = Instancia::nueva(proceso_id, primera.id(), iniciado_por.trim());
        let inicial = self.libro.preparar(instancia.id, primera.id(), iniciado_por.trim(), tipos_accion::INICIO_ETAPA, None)?;
        self.repo.crear_instancia(&instancia, &inicial)?;
        Ok(instancia)
    }

    /// Avanza la instancia a la siguiente etapa. Si la etapa actual es la
    /// última, verifica que todos los campos requeridos tengan respuesta y
    /// completa la instancia (`completado_en` se asigna una única vez).
    pub fn avanzar_etapa(&self, instancia_id: Uuid, actor: &str, comentario: Option<String>) -> Result<Instancia> {
        let (mut instancia, proceso) = self.cargar(&instancia_id)?;
        self.validar_editable(&instancia)?;
        let actual = proceso.etapa(&instancia.etapa_actual_id)
                            .ok_or_else(|| MotorError::Almacenamiento(format!("la etapa actual {} no pertenece al proceso {}",
                                                                              instancia.etapa_actual_id,
                                                                              proceso.id())))?;
        let expected = instancia.version;
        match proceso.etapa_siguiente(&actual.id()) {
            Some(siguiente) => {
                let siguiente_id = siguiente.id();
                instancia.etapa_actual_id = siguiente_id;
                let accion = self.libro.preparar(instancia_id, siguiente_id, actor, tipos_accion::AVANCE_ETAPA, comentario)?;
                self.guardar_cas(&mut instancia, expected, Some(&accion))?;
            }
            None => {
                let faltantes = claves_requeridas_sin_respuesta(self.catalogo.as_ref(), self.repo.as_ref(), &instancia)?;
                if !faltantes.is_empty() {
                    return Err(MotorError::Validacion(format!("no se puede completar: faltan respuestas requeridas ({})",
                                                              faltantes.join(", "))));
                }
                instancia.estado = EstadoInstancia::Completado;
                instancia.completado_en = Some(Utc::now());
                let accion = self.libro.preparar(instancia_id, actual.id(), actor, tipos_accion::COMPLETADO, comentario)?;
                self.guardar_cas(&mut instancia, expected, Some(&accion))?;
            }
        }
        Ok(instancia)
    }

    /// Regresa la instancia a una etapa anterior. La etapa destino debe
    /// tener `reabrible == true` y un orden estrictamente menor al actual.
    pub fn reabrir_etapa(&self, instancia_id: Uuid, etapa_destino: Uuid, actor: &str, razon: &str) -> Result<Instancia> {
        let (mut instancia, proceso) = self.cargar(&instancia_id)?;
        self.validar_editable(&instancia)?;
        let destino = proceso.etapa(&etapa_destino)
                             .ok_or_else(|| MotorError::NoEncontrado(format!("etapa {} en el proceso {}",
                                                                             etapa_destino,
                                                                             proceso.id())))?;
        let actual = proceso.etapa(&instancia.etapa_actual_id)
                            .ok_or_else(|| MotorError::Almacenamiento(format!("la etapa actual {} no pertenece al proceso {}",
                                                                              instancia.etapa_actual_id,
                                                                              proceso.id())))?;
        if !destino.reabrible() {
            return Err(MotorError::no_reabrible(destino.nombre()));
        }
        if destino.orden() >= actual.orden() {
            return Err(MotorError::Validacion(format!("la reapertura sólo mueve hacia atrás: destino {} >= actual {}",
                                                      destino.orden(),
                                                      actual.orden())));
        }
        let expected = instancia.version;
        let destino_id = destino.id();
        instancia.etapa_actual_id = destino_id;
        let accion = self.libro.preparar(instancia_id, destino_id, actor, tipos_accion::REAPERTURA, Some(razon.to_string()))?;
        self.guardar_cas(&mut instancia, expected, Some(&accion))?;
        Ok(instancia)
    }

    /// Bloquea la instancia. Idempotente: bloquear una instancia ya
    /// bloqueada no cambia nada ni registra una nueva acción.
    pub fn bloquear(&self, instancia_id: Uuid, actor: &str, razon: &str) -> Result<Instancia> {
        let (mut instancia, _proceso) = self.cargar(&instancia_id)?;
        if instancia.bloqueada {
            return Ok(instancia);
        }
        let expected = instancia.version;
        instancia.bloqueada = true;
        instancia.razon_bloqueo = Some(razon.to_string());
        let accion = self.libro.preparar(instancia_id,
                                         instancia.etapa_actual_id,
                                         actor,
                                         tipos_accion::BLOQUEO,
                                         Some(razon.to_string()))?;
        self.guardar_cas(&mut instancia, expected, Some(&accion))?;
        Ok(instancia)
    }

    /// Desbloquea la instancia. Idempotente sobre instancias no bloqueadas.
    pub fn desbloquear(&self, instancia_id: Uuid, actor: &str) -> Result<Instancia> {
        let (mut instancia, _proceso) = self.cargar(&instancia_id)?;
        if !instancia.bloqueada {
            return Ok(instancia);
        }
        let expected = instancia.version;
        instancia.bloqueada = false;
        instancia.razon_bloqueo = None;
        let accion = self.libro.preparar(instancia_id, instancia.etapa_actual_id, actor, tipos_accion::DESBLOQUEO, None)?;
        self.guardar_cas(&mut instancia, expected, Some(&accion))?;
        Ok(instancia)
    }

    /// Mezcla (shallow) un objeto JSON en la bolsa de datos dinámicos.
    /// Rechazado sobre instancias bloqueadas o terminales.
    pub fn escribir_datos(&self, instancia_id: Uuid, datos: JsonValue) -> Result<Instancia> {
        let entradas = match datos {
            JsonValue::Object(m) => m,
            otro => {
                return Err(MotorError::Validacion(format!("datos_dinamicos espera un objeto JSON, recibió {}", otro)))
            }
        };
        let (mut instancia, _proceso) = self.cargar(&instancia_id)?;
        self.validar_editable(&instancia)?;
        let expected = instancia.version;
        if !instancia.datos_dinamicos.is_object() {
            instancia.datos_dinamicos = serde_json::json!({});
        }
        if let Some(bolsa) = instancia.datos_dinamicos.as_object_mut() {
            for (clave, valor) in entradas {
                bolsa.insert(clave, valor);
            }
        }
        self.guardar_cas(&mut instancia, expected, None)?;
        Ok(instancia)
    }

    /// ¿La etapa actual de la instancia excedió sus horas máximas?
    /// Cómputo puro de lectura sobre la bitácora.
    pub fn vencida(&self, instancia_id: Uuid) -> Result<bool> {
        let (instancia, proceso) = self.cargar(&instancia_id)?;
        let etapa = proceso.etapa(&instancia.etapa_actual_id)
                           .ok_or_else(|| MotorError::Almacenamiento(format!("la etapa actual {} no pertenece al proceso {}",
                                                                             instancia.etapa_actual_id,
                                                                             proceso.id())))?;
        self.libro.vencida(&instancia, etapa)
    }

    // Carga instancia + su definición de proceso.
    fn cargar(&self, instancia_id: &Uuid) -> Result<(Instancia, Proceso)> {
        let instancia = self.repo.obtener_instancia(instancia_id)?;
        let proceso = self.cargar_proceso(&instancia.proceso_id)?;
        Ok((instancia, proceso))
    }

    fn cargar_proceso(&self, proceso_id: &Uuid) -> Result<Proceso> {
        self.catalogo
            .obtener_proceso(proceso_id)?
            .ok_or_else(|| MotorError::NoEncontrado(format!("proceso {}", proceso_id)))
    }

    // Una instancia bloqueada o terminal no admite mutaciones de etapa ni
    // escritura de formularios/datos.
    fn validar_editable(&self, instancia: &Instancia) -> Result<()> {
        if instancia.bloqueada {
            return Err(MotorError::bloqueada(instancia.razon_bloqueo.as_deref()));
        }
        match instancia.estado {
            EstadoInstancia::Completado => Err(MotorError::Estado("la instancia ya está completada".to_string())),
            EstadoInstancia::Cancelado => Err(MotorError::Estado("la instancia está cancelada".to_string())),
            _ => Ok(()),
        }
    }

    // CAS: escribe la instancia (y su acción, si la transición lleva una)
    // como unidad, y traduce un conflicto de versión a error clasificado.
    // En éxito deja `instancia.version` en la nueva versión.
    fn guardar_cas(&self, instancia: &mut Instancia, expected_version: i64, accion: Option<&Accion>) -> Result<()> {
        match self.repo.actualizar_instancia(instancia, expected_version, accion)? {
            ResultadoPersistencia::Ok { nueva_version } => {
                instancia.version = nueva_version;
                Ok(())
            }
            ResultadoPersistencia::Conflicto => Err(MotorError::conflicto_version(&instancia.id)),
        }
    }
}
