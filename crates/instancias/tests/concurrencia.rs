use chrono::Utc;
use instancias::stubs::InMemoryInstanciaRepository;
use instancias::{tipos_accion, Accion, DocumentoVinculado, Instancia, InstanciaRepository, MotorError, MotorInstancias,
                 Participante, RespuestaFormulario, ResultadoPersistencia, Ticket};
use sgc_dominio::{CatalogoRepository, EstadoProceso, Etapa, InMemoryCatalogo, Proceso};
use std::sync::{Arc, Barrier};
use std::thread;
use uuid::Uuid;

fn accion_de(inst: &Instancia, actor: &str, tipo: &str) -> Accion {
  Accion { id: Uuid::new_v4(),
           instancia_id: inst.id,
           etapa_id: inst.etapa_actual_id,
           actor: actor.to_string(),
           tipo: tipo.to_string(),
           comentario: None,
           ejecutado_en: Utc::now(),
           tiempo_respuesta_segundos: 0 }
}

fn proceso_de_tres(catalogo: &InMemoryCatalogo) -> Proceso {
  let mut p = Proceso::new("NCF-01", "No conformidades", "Calidad", "Tratar desvíos", "Producción").expect("proceso");
  for (orden, nombre) in [(1, "Registro"), (2, "Análisis"), (3, "Cierre")] {
    let e = Etapa::new(p.id(), orden, nombre, "analista", 48, false).expect("etapa");
    p.agregar_etapa(e).expect("agregar");
  }
  p.cambiar_estado(EstadoProceso::Activo).expect("activar");
  catalogo.guardar_proceso(p.clone()).expect("guardar");
  p
}

#[test]
fn la_segunda_escritura_con_version_vieja_recibe_conflicto() {
  let repo = InMemoryInstanciaRepository::new();
  let catalogo = InMemoryCatalogo::new();
  let proceso = proceso_de_tres(&catalogo);
  let etapa = proceso.primera_etapa().expect("etapa");
  let inst = Instancia::nueva(proceso.id(), etapa.id(), "ana");
  repo.crear_instancia(&inst, &accion_de(&inst, "ana", tipos_accion::INICIO_ETAPA)).expect("crear");

  // dos copias leídas en version 0
  let mut copia_a = repo.obtener_instancia(&inst.id).expect("leer");
  let mut copia_b = repo.obtener_instancia(&inst.id).expect("leer");

  copia_a.bloqueada = true;
  let accion_a = accion_de(&copia_a, "ana", tipos_accion::BLOQUEO);
  match repo.actualizar_instancia(&copia_a, 0, Some(&accion_a)).expect("cas a") {
    ResultadoPersistencia::Ok { nueva_version } => assert_eq!(nueva_version, 1),
    ResultadoPersistencia::Conflicto => panic!("la primera escritura no debe chocar"),
  }

  copia_b.razon_bloqueo = Some("copia desactualizada".to_string());
  let accion_b = accion_de(&copia_b, "beto", tipos_accion::BLOQUEO);
  match repo.actualizar_instancia(&copia_b, 0, Some(&accion_b)).expect("cas b") {
    ResultadoPersistencia::Conflicto => {}
    ResultadoPersistencia::Ok { .. } => panic!("la copia vieja no debe ganar"),
  }

  // el estado almacenado es el de la primera escritura
  let final_ = repo.obtener_instancia(&inst.id).expect("releer");
  assert!(final_.bloqueada);
  assert!(final_.razon_bloqueo.is_none());
  assert_eq!(final_.version, 1);

  // la bitácora sigue al estado: la acción del CAS ganador quedó escrita
  // y el CAS perdedor no dejó ninguna entrada huérfana
  let acciones = repo.acciones_de(&inst.id).expect("acciones");
  assert_eq!(acciones.len(), 2);
  assert_eq!(acciones[1].id, accion_a.id);
  assert!(acciones.iter().all(|a| a.id != accion_b.id));
}

/// Repositorio que sincroniza las lecturas de instancia sobre una barrera,
/// forzando a dos hilos a leer la misma versión antes de escribir.
struct RepoConBarrera {
  interno: InMemoryInstanciaRepository,
  barrera: Barrier,
}

impl InstanciaRepository for RepoConBarrera {
  fn crear_instancia(&self, instancia: &Instancia, accion_inicial: &Accion) -> instancias::Result<()> {
    self.interno.crear_instancia(instancia, accion_inicial)
  }

  fn obtener_instancia(&self, id: &Uuid) -> instancias::Result<Instancia> {
    let instancia = self.interno.obtener_instancia(id)?;
    self.barrera.wait();
    Ok(instancia)
  }

  fn actualizar_instancia(&self,
                          instancia: &Instancia,
                          expected_version: i64,
                          accion: Option<&Accion>)
                          -> instancias::Result<ResultadoPersistencia> {
    self.interno.actualizar_instancia(instancia, expected_version, accion)
  }

  fn registrar_accion(&self, accion: &Accion) -> instancias::Result<()> {
    self.interno.registrar_accion(accion)
  }

  fn acciones_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Accion>> {
    self.interno.acciones_de(instancia_id)
  }

  fn agregar_participante(&self, participante: &Participante) -> instancias::Result<()> {
    self.interno.agregar_participante(participante)
  }

  fn remover_participante(&self, instancia_id: &Uuid, usuario_id: &str) -> instancias::Result<()> {
    self.interno.remover_participante(instancia_id, usuario_id)
  }

  fn participantes_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Participante>> {
    self.interno.participantes_de(instancia_id)
  }

  fn guardar_respuesta(&self, respuesta: &RespuestaFormulario) -> instancias::Result<()> {
    self.interno.guardar_respuesta(respuesta)
  }

  fn respuestas_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<RespuestaFormulario>> {
    self.interno.respuestas_de(instancia_id)
  }

  fn crear_ticket(&self, ticket: &Ticket) -> instancias::Result<()> {
    self.interno.crear_ticket(ticket)
  }

  fn obtener_ticket(&self, id: &Uuid) -> instancias::Result<Ticket> {
    self.interno.obtener_ticket(id)
  }

  fn actualizar_ticket(&self, ticket: &Ticket) -> instancias::Result<()> {
    self.interno.actualizar_ticket(ticket)
  }

  fn tickets_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Ticket>> {
    self.interno.tickets_de(instancia_id)
  }

  fn vincular_documento(&self, vinculo: &DocumentoVinculado) -> instancias::Result<()> {
    self.interno.vincular_documento(vinculo)
  }

  fn desvincular_documento(&self, instancia_id: &Uuid, documento_id: &Uuid) -> instancias::Result<()> {
    self.interno.desvincular_documento(instancia_id, documento_id)
  }

  fn documentos_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<DocumentoVinculado>> {
    self.interno.documentos_de(instancia_id)
  }
}

#[test]
fn dos_avances_simultaneos_solo_uno_gana() {
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_de_tres(&catalogo);

  let repo = Arc::new(RepoConBarrera { interno: InMemoryInstanciaRepository::new(),
                                       barrera: Barrier::new(2) });
  // la creación no pasa por `obtener_instancia`, así que la barrera sólo
  // sincroniza los dos avances
  let motor = Arc::new(MotorInstancias::new(repo.clone(), catalogo));
  let etapa = proceso.primera_etapa().expect("etapa");
  let inst = Instancia::nueva(proceso.id(), etapa.id(), "ana");
  repo.crear_instancia(&inst, &accion_de(&inst, "ana", tipos_accion::INICIO_ETAPA)).expect("crear");

  let mut manos = Vec::new();
  for actor in ["ana", "beto"] {
    let motor = motor.clone();
    let id = inst.id;
    manos.push(thread::spawn(move || motor.avanzar_etapa(id, actor, None)));
  }
  let resultados: Vec<_> = manos.into_iter().map(|h| h.join().expect("join")).collect();

  let exitos = resultados.iter().filter(|r| r.is_ok()).count();
  let conflictos = resultados.iter()
                             .filter(|r| matches!(r, Err(MotorError::Conflicto(_))))
                             .count();
  assert_eq!(exitos, 1);
  assert_eq!(conflictos, 1);

  // el estado final refleja exactamente un avance (se lee el repositorio
  // interno para no volver a esperar la barrera)
  let final_ = repo.interno.obtener_instancia(&inst.id).expect("releer");
  assert_eq!(final_.version, 1);
  assert_eq!(final_.etapa_actual_id, proceso.etapas()[1].id());
  // la bitácora registra la entrada inicial y el único avance que ganó
  let acciones = repo.acciones_de(&inst.id).expect("acciones");
  assert_eq!(acciones.len(), 2);
  assert_eq!(acciones[1].tipo, tipos_accion::AVANCE_ETAPA);
}
