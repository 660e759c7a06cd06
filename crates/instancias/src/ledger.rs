// Archivo: ledger.rs
// Propósito: implementar `LibroAcciones`, el camino por el que el motor
// construye las entradas de la bitácora, y los cálculos de lectura
// derivados de ella (tiempo de respuesta, SLA de etapa vencida).
use crate::domain::{tipos_accion, Accion, Instancia};
use crate::errors::Result;
use crate::repository::InstanciaRepository;
use chrono::Utc;
use sgc_dominio::Etapa;
use std::sync::Arc;
use uuid::Uuid;

/// Bitácora append-only de acciones sobre instancias.
///
/// Cada registro lleva `tiempo_respuesta_segundos`: los segundos
/// transcurridos desde la acción de entrada de etapa más reciente de la
/// instancia. La suma de esos tiempos a lo largo de un camino reconstruye
/// las duraciones de pared de cada etapa, lo que hace a la bitácora la
/// fuente de verdad tanto para auditoría como para el cómputo de SLA.
pub struct LibroAcciones<R>
    where R: InstanciaRepository
{
    repo: Arc<R>,
}

impl<R> LibroAcciones<R> where R: InstanciaRepository
{
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Construye la acción calculando su tiempo de respuesta contra la
    /// entrada de etapa más reciente ya persistida. Para la primera acción
    /// de una instancia (sin entrada previa) el tiempo es 0.
    ///
    /// No escribe: la acción preparada viaja junto con la escritura de
    /// estado (`crear_instancia` / `actualizar_instancia`) para que ambas
    /// se confirmen o fallen como una unidad.
    pub fn preparar(&self,
                    instancia_id: Uuid,
                    etapa_id: Uuid,
                    actor: &str,
                    tipo: &str,
                    comentario: Option<String>)
                    -> Result<Accion> {
        let ahora = Utc::now();
        let tiempo = match self.entrada_etapa_mas_reciente(&instancia_id)? {
            Some(entrada) => (ahora - entrada.ejecutado_en).num_seconds().max(0),
            None => 0,
        };
        Ok(Accion { id: Uuid::new_v4(),
                    instancia_id,
                    etapa_id,
                    actor: actor.to_string(),
                    tipo: tipo.to_string(),
                    comentario,
                    ejecutado_en: ahora,
                    tiempo_respuesta_segundos: tiempo })
    }

    /// Acción de entrada de etapa más reciente de la instancia
    /// (`inicio_etapa`, `avance_etapa` o `reapertura`), si existe.
    pub fn entrada_etapa_mas_reciente(&self, instancia_id: &Uuid) -> Result<Option<Accion>> {
        let acciones = self.repo.acciones_de(instancia_id)?;
        Ok(acciones.into_iter().rev().find(|a| tipos_accion::es_entrada_etapa(&a.tipo)))
    }

    /// Cómputo de SLA en tiempo de lectura: la etapa actual está vencida
    /// si transcurrió más de `horas_maximas` desde la entrada a la etapa.
    /// Nunca se persiste; las instancias terminales no vencen.
    pub fn vencida(&self, instancia: &Instancia, etapa: &Etapa) -> Result<bool> {
        if instancia.estado.es_terminal() {
            return Ok(false);
        }
        let entrada = match self.entrada_etapa_mas_reciente(&instancia.id)? {
            Some(a) => a,
            None => return Ok(false),
        };
        let transcurrido = (Utc::now() - entrada.ejecutado_en).num_seconds();
        Ok(transcurrido > etapa.horas_maximas() * 3600)
    }

    /// Bitácora completa de la instancia.
    pub fn acciones(&self, instancia_id: &Uuid) -> Result<Vec<Accion>> {
        self.repo.acciones_de(instancia_id)
    }
}
