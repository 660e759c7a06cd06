//! Estado compartido de la aplicación HTTP.

use instancias::{InstanciaRepository, ServicioInstancias};
use std::sync::Arc;

/// Estado inyectado en cada handler: el servicio orquestador completo.
/// Genérico sobre el repositorio para poder servir tanto el backend en
/// memoria (demos, tests) como el de Diesel.
pub struct AppState<R>
where
    R: InstanciaRepository,
{
    pub servicio: Arc<ServicioInstancias<R>>,
}

impl<R> AppState<R>
where
    R: InstanciaRepository,
{
    pub fn new(servicio: Arc<ServicioInstancias<R>>) -> Self {
        Self { servicio }
    }
}

// Clone manual: derivar exigiría R: Clone aunque sólo se clona el Arc.
impl<R> Clone for AppState<R>
where
    R: InstanciaRepository,
{
    fn clone(&self) -> Self {
        Self {
            servicio: self.servicio.clone(),
        }
    }
}
