//! Crate `instancias` — motor de instancias de procesos de calidad
//!
//! Este crate define los tipos de ejecución (`Instancia`, `Accion`,
//! `Ticket`, etc.), el contrato de persistencia `InstanciaRepository` y una
//! implementación en memoria útil para pruebas
//! (`InMemoryInstanciaRepository`). Sobre ese contrato se construyen el
//! libro de acciones (`LibroAcciones`), la máquina de estados
//! (`MotorInstancias`) y los servicios de capacidad (participantes,
//! formularios, tickets, documentos) que el servicio orquestador
//! (`ServicioInstancias`) expone hacia los handlers HTTP.
//!
//! Diseño resumido:
//! - Bitácora append-only: cada `Accion` es autocontenida; el contrato de
//!   persistencia no expone actualización ni borrado de acciones, y el SLA
//!   (etapa vencida) se calcula leyendo la bitácora, nunca se almacena.
//! - Locking optimista por instancia: toda mutación de `Instancia` usa un
//!   `expected_version`; un desajuste produce
//!   `ResultadoPersistencia::Conflicto`, que el motor clasifica como
//!   `MotorError::Conflicto` (reintentable por el caller).
//! - Colaboradores externos (catálogo documental, despacho de
//!   notificaciones) entran por traits y sus fallas se degradan con un
//!   warning: nunca abortan la transición de estado que las originó.
//!
//! Ejemplo rápido:
//! ```rust
//! use instancias::stubs::InMemoryInstanciaRepository;
//! use sgc_dominio::InMemoryCatalogo;
//! use std::sync::Arc;
//! let repo = Arc::new(InMemoryInstanciaRepository::new());
//! let catalogo = Arc::new(InMemoryCatalogo::new());
//! let motor = instancias::MotorInstancias::new(repo, catalogo);
//! ```
pub mod documentos;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod formularios;
pub mod ledger;
pub mod participantes;
pub mod repository;
pub mod service;
pub mod stubs;
pub mod tickets;

pub use documentos::*;
pub use domain::*;
pub use engine::*;
pub use errors::*;
pub use formularios::*;
pub use ledger::*;
pub use participantes::*;
pub use repository::*;
pub use service::*;
pub use stubs::*;
pub use tickets::*;
