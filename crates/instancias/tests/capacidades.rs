use instancias::stubs::{CatalogoDocumentosStub, InMemoryInstanciaRepository};
use instancias::{Escalamiento, EstadoTicket, MotorError, MotorInstancias, RegistroParticipantes, RespuestasFormulario,
                 VinculadorDocumentos};
use sgc_dominio::{CampoFormulario, CatalogoRepository, EstadoProceso, Etapa, InMemoryCatalogo, Proceso, TipoCampo};
use std::sync::Arc;
use uuid::Uuid;

struct Entorno {
  repo: Arc<InMemoryInstanciaRepository>,
  catalogo: Arc<InMemoryCatalogo>,
  proceso: Proceso,
  instancia_id: Uuid,
}

/// Proceso de dos etapas con una instancia ya iniciada por "ana".
fn entorno() -> Entorno {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let mut p = Proceso::new("CAP-01", "Capacitación", "RRHH", "Formar personal", "Toda la planta").expect("proceso");
  let a = Etapa::new(p.id(), 1, "Solicitud", "jefe", 24, true).expect("etapa");
  let b = Etapa::new(p.id(), 2, "Dictado", "instructor", 72, false).expect("etapa");
  p.agregar_etapa(a).expect("agregar");
  p.agregar_etapa(b).expect("agregar");
  p.cambiar_estado(EstadoProceso::Activo).expect("activar");
  catalogo.guardar_proceso(p.clone()).expect("guardar");

  let motor = MotorInstancias::new(repo.clone(), catalogo.clone());
  let inst = motor.crear_instancia(p.id(), "ana").expect("crear");
  Entorno { repo, catalogo, proceso: p, instancia_id: inst.id }
}

#[test]
fn participantes_sin_duplicados_por_usuario() {
  let env = entorno();
  let registro = RegistroParticipantes::new(env.repo.clone());

  registro.asignar(env.instancia_id, "beto", "instructor").expect("asignar");
  assert!(registro.autorizado(env.instancia_id, "beto").expect("autorizado"));
  assert!(!registro.autorizado(env.instancia_id, "carla").expect("autorizado"));

  // mismo usuario otra vez, aunque cambie el rol, es un duplicado
  match registro.asignar(env.instancia_id, "beto", "auditor") {
    Err(MotorError::Estado(_)) => {}
    otro => panic!("se esperaba Estado, se obtuvo {:?}", otro.map(|p| p.usuario_id)),
  }

  registro.remover(env.instancia_id, "beto").expect("remover");
  assert!(!registro.autorizado(env.instancia_id, "beto").expect("autorizado"));
  assert!(matches!(registro.remover(env.instancia_id, "beto"), Err(MotorError::NoEncontrado(_))));
}

#[test]
fn respuestas_validan_tipo_y_la_ultima_gana() {
  let env = entorno();
  let campo = CampoFormulario::new(env.proceso.id(), "Horas dictadas", "horas_dictadas", TipoCampo::Numero, true, 1,
                                   vec![]).expect("campo");
  env.catalogo.definir_campo(campo).expect("definir");
  let formularios = RespuestasFormulario::new(env.repo.clone(), env.catalogo.clone());

  // clave desconocida
  assert!(matches!(formularios.registrar_respuesta(env.instancia_id, "no_existe", "1"),
                   Err(MotorError::NoEncontrado(_))));
  // valor que no es número
  assert!(matches!(formularios.registrar_respuesta(env.instancia_id, "horas_dictadas", "ocho"),
                   Err(MotorError::Validacion(_))));

  formularios.registrar_respuesta(env.instancia_id, "horas_dictadas", "8").expect("registrar");
  formularios.registrar_respuesta(env.instancia_id, "horas_dictadas", "12").expect("sobrescribir");
  let respuestas = formularios.de_instancia(env.instancia_id).expect("listar");
  assert_eq!(respuestas.len(), 1);
  assert_eq!(respuestas[0].valor, "12");
}

#[test]
fn el_campo_requerido_bloquea_la_completitud() {
  let env = entorno();
  let campo = CampoFormulario::new(env.proceso.id(), "Evaluación final", "evaluacion_final", TipoCampo::Numero, true,
                                   1, vec![]).expect("campo");
  env.catalogo.definir_campo(campo).expect("definir");
  let motor = MotorInstancias::new(env.repo.clone(), env.catalogo.clone());
  let formularios = RespuestasFormulario::new(env.repo.clone(), env.catalogo.clone());

  motor.avanzar_etapa(env.instancia_id, "ana", None).expect("a dictado");
  // último avance sin el campo requerido
  match motor.avanzar_etapa(env.instancia_id, "ana", None) {
    Err(MotorError::Validacion(msj)) => assert!(msj.contains("evaluacion_final")),
    otro => panic!("se esperaba Validacion, se obtuvo {:?}", otro.map(|i| i.estado)),
  }

  // una respuesta en blanco no cuenta
  formularios.registrar_respuesta(env.instancia_id, "evaluacion_final", "  ").expect_err("blanco inválido");

  formularios.registrar_respuesta(env.instancia_id, "evaluacion_final", "9").expect("responder");
  let inst = motor.avanzar_etapa(env.instancia_id, "ana", None).expect("completar");
  assert!(inst.estado.es_terminal());
}

#[test]
fn tickets_resuelven_una_sola_vez() {
  let env = entorno();
  let motor = MotorInstancias::new(env.repo.clone(), env.catalogo.clone());
  let escalamiento = Escalamiento::new(env.repo.clone());

  // un ticket puede abrirse aun con la instancia bloqueada
  motor.bloquear(env.instancia_id, "ana", "sala no disponible").expect("bloquear");
  let ticket = escalamiento.abrir(env.instancia_id, "ana", "no hay sala para el dictado").expect("abrir");
  assert_eq!(ticket.estado, EstadoTicket::Abierto);
  assert_eq!(escalamiento.abiertos_de(env.instancia_id).expect("abiertos").len(), 1);

  let ticket = escalamiento.asignar(ticket.id, "beto").expect("asignar");
  assert_eq!(ticket.asignado_a.as_deref(), Some("beto"));

  let ticket = escalamiento.resolver(ticket.id, "se reservó la sala B").expect("resolver");
  assert_eq!(ticket.estado, EstadoTicket::Resuelto);
  assert!(ticket.resuelto_en.is_some());
  assert!(escalamiento.abiertos_de(env.instancia_id).expect("abiertos").is_empty());

  // el reintento con la misma solución es idempotente
  escalamiento.resolver(ticket.id, "se reservó la sala B").expect("reintento");
  // con otra solución, o asignando, es un error de estado
  assert!(matches!(escalamiento.resolver(ticket.id, "otra cosa"), Err(MotorError::Estado(_))));
  assert!(matches!(escalamiento.asignar(ticket.id, "carla"), Err(MotorError::Estado(_))));

  let ticket = escalamiento.cerrar(ticket.id).expect("cerrar");
  assert_eq!(ticket.estado, EstadoTicket::Cerrado);
  assert!(matches!(escalamiento.cerrar(ticket.id), Err(MotorError::Estado(_))));
}

#[test]
fn ticket_exige_descripcion_e_instancia_existente() {
  let env = entorno();
  let escalamiento = Escalamiento::new(env.repo.clone());
  assert!(matches!(escalamiento.abrir(env.instancia_id, "ana", "   "), Err(MotorError::Validacion(_))));
  assert!(matches!(escalamiento.abrir(Uuid::new_v4(), "ana", "algo"), Err(MotorError::NoEncontrado(_))));
}

#[test]
fn documentos_se_validan_contra_el_catalogo_externo() {
  let env = entorno();
  let catalogo_docs = Arc::new(CatalogoDocumentosStub::new());
  let vinculador = VinculadorDocumentos::new(env.repo.clone(), catalogo_docs.clone());

  let doc = Uuid::new_v4();
  // el catálogo responde que el documento no existe
  assert!(matches!(vinculador.vincular(env.instancia_id, doc, "procedimiento"), Err(MotorError::Validacion(_))));

  catalogo_docs.registrar(doc);
  vinculador.vincular(env.instancia_id, doc, "procedimiento de dictado").expect("vincular");
  // re-vincular sólo actualiza la nota
  vinculador.vincular(env.instancia_id, doc, "versión 2").expect("revincular");
  let docs = vinculador.de_instancia(env.instancia_id).expect("listar");
  assert_eq!(docs.len(), 1);
  assert_eq!(docs[0].nota, "versión 2");

  vinculador.desvincular(env.instancia_id, doc).expect("desvincular");
  assert!(vinculador.de_instancia(env.instancia_id).expect("listar").is_empty());
}

#[test]
fn la_caida_del_catalogo_documental_no_bloquea_el_vinculo() {
  let env = entorno();
  let catalogo_docs = Arc::new(CatalogoDocumentosStub::new());
  catalogo_docs.simular_falla(true);
  let vinculador = VinculadorDocumentos::new(env.repo.clone(), catalogo_docs);

  // con el catálogo caído el vínculo procede igual (modo degradado)
  let doc = Uuid::new_v4();
  vinculador.vincular(env.instancia_id, doc, "manual").expect("vincular degradado");
  assert_eq!(vinculador.de_instancia(env.instancia_id).expect("listar").len(), 1);
}
