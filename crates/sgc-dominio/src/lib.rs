//! sgc-dominio: definiciones de procesos de calidad
//!
//! Este crate contiene el lado de configuración del sistema de gestión de
//! calidad: la definición de procesos (`Proceso`) con su secuencia ordenada
//! de etapas (`Etapa`), el esquema de formularios dinámicos
//! (`CampoFormulario`) y el contrato de catálogo (`CatalogoRepository`)
//! junto a una implementación en memoria para pruebas.
//!
//! Las instancias en ejecución y su máquina de estados viven en el crate
//! `instancias`; aquí sólo se valida y consulta la configuración.

mod campo;
mod catalogo;
mod errors;
mod etapa;
mod proceso;

pub use campo::{CampoFormulario, TipoCampo};
pub use catalogo::{CatalogoRepository, InMemoryCatalogo};
pub use errors::DominioError;
pub use etapa::Etapa;
pub use proceso::{EstadoProceso, Proceso};
