//! Crate `sgc-api` — superficie HTTP del motor de instancias.
//!
//! Expone `ServicioInstancias` como una API REST construida con axum. El
//! router es genérico sobre el repositorio de instancias, de modo que el
//! mismo árbol de rutas sirve tanto al backend en memoria (pruebas) como
//! al backend Diesel de producción.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use router::create_router;
pub use state::AppState;
