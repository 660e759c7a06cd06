//! Persistencia Diesel para el catálogo de configuración y el motor de
//! instancias. Este archivo expone el módulo `schema` y reexporta los
//! repositorios que implementan `CatalogoRepository` e
//! `InstanciaRepository`; el detalle vive en `catalogo_persistence.rs` y
//! `instancia_persistence.rs`.

mod catalogo_persistence;
mod instancia_persistence;
pub mod schema;

pub use catalogo_persistence::{new_catalogo_from_env, DieselCatalogoRepository};
pub use instancia_persistence::{new_instancias_from_env, DieselInstanciaRepository};

use chrono::{DateTime, TimeZone, Utc};
use instancias::MotorError;

// Fechas como epoch en microsegundos: conserva el orden de la bitácora
// dentro del mismo segundo y es portable entre SQLite y Postgres.
pub(crate) fn a_ts(fecha: DateTime<Utc>) -> i64 {
  fecha.timestamp_micros()
}

// Un epoch fuera de rango es una fila corrupta, no una fecha que se pueda
// inventar: se reporta como error de almacenamiento.
pub(crate) fn de_ts(ts: i64) -> Result<DateTime<Utc>, MotorError> {
  Utc.timestamp_micros(ts)
     .single()
     .ok_or_else(|| MotorError::Almacenamiento(format!("epoch fuera de rango: {}", ts)))
}
