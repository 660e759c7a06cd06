use chrono::{Duration, Utc};
use instancias::stubs::InMemoryInstanciaRepository;
use instancias::{tipos_accion, Accion, InstanciaRepository, MotorInstancias};
use sgc_dominio::{CatalogoRepository, EstadoProceso, Etapa, InMemoryCatalogo, Proceso};
use std::sync::Arc;
use uuid::Uuid;

fn proceso_corto(catalogo: &InMemoryCatalogo, horas: i64) -> Proceso {
  let mut p = Proceso::new("REC-01", "Reclamos", "Servicio", "Atender reclamos", "Post-venta").expect("proceso");
  let a = Etapa::new(p.id(), 1, "Recepción", "recepcionista", horas, true).expect("etapa");
  let b = Etapa::new(p.id(), 2, "Análisis", "analista", horas, false).expect("etapa");
  p.agregar_etapa(a).expect("agregar");
  p.agregar_etapa(b).expect("agregar");
  p.cambiar_estado(EstadoProceso::Activo).expect("activar");
  catalogo.guardar_proceso(p.clone()).expect("guardar");
  p
}

#[test]
fn la_bitacora_crece_y_nunca_se_reescribe() {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_corto(&catalogo, 48);
  let motor = MotorInstancias::new(repo.clone(), catalogo);

  let inst = motor.crear_instancia(proceso.id(), "ana").expect("crear");
  let primeras = repo.acciones_de(&inst.id).expect("acciones");

  motor.bloquear(inst.id, "ana", "espera de insumo").expect("bloquear");
  motor.desbloquear(inst.id, "ana").expect("desbloquear");
  motor.avanzar_etapa(inst.id, "ana", None).expect("avanzar");

  let todas = repo.acciones_de(&inst.id).expect("acciones");
  assert_eq!(todas.len(), 4);
  // los registros previos permanecen intactos, en el mismo orden
  assert_eq!(todas[0].id, primeras[0].id);
  assert_eq!(todas[0].tipo, tipos_accion::INICIO_ETAPA);
  assert_eq!(todas[1].tipo, tipos_accion::BLOQUEO);
  assert_eq!(todas[2].tipo, tipos_accion::DESBLOQUEO);
  assert_eq!(todas[3].tipo, tipos_accion::AVANCE_ETAPA);
}

#[test]
fn tiempo_de_respuesta_se_mide_contra_la_entrada_de_etapa() {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_corto(&catalogo, 48);
  let motor = MotorInstancias::new(repo.clone(), catalogo);
  let inst = motor.crear_instancia(proceso.id(), "ana").expect("crear");

  // se inyecta una entrada de etapa con fecha vieja para simular el paso
  // del tiempo sin depender del reloj del test
  let hace_tres_horas = Accion { id: Uuid::new_v4(),
                                 instancia_id: inst.id,
                                 etapa_id: inst.etapa_actual_id,
                                 actor: "ana".to_string(),
                                 tipo: tipos_accion::REAPERTURA.to_string(),
                                 comentario: None,
                                 ejecutado_en: Utc::now() - Duration::hours(3),
                                 tiempo_respuesta_segundos: 0 };
  repo.registrar_accion(&hace_tres_horas).expect("inyectar");

  motor.avanzar_etapa(inst.id, "ana", None).expect("avanzar");
  let acciones = repo.acciones_de(&inst.id).expect("acciones");
  let avance = acciones.last().expect("avance");
  assert_eq!(avance.tipo, tipos_accion::AVANCE_ETAPA);
  // ~3 horas = 10800 segundos, con margen por la ejecución del test
  assert!(avance.tiempo_respuesta_segundos >= 10_800);
  assert!(avance.tiempo_respuesta_segundos < 10_810);
}

#[test]
fn vencida_es_falsa_para_instancias_recientes() {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_corto(&catalogo, 48);
  let motor = MotorInstancias::new(repo, catalogo);
  let inst = motor.crear_instancia(proceso.id(), "ana").expect("crear");
  assert!(!motor.vencida(inst.id).expect("vencida"));
}

#[test]
fn vencida_cuando_la_entrada_supera_las_horas_maximas() {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_corto(&catalogo, 2);
  let motor = MotorInstancias::new(repo.clone(), catalogo);
  let inst = motor.crear_instancia(proceso.id(), "ana").expect("crear");
  assert!(!motor.vencida(inst.id).expect("vencida"));

  // entrada de etapa con más antigüedad que el límite de 2 horas
  let vieja = Accion { id: Uuid::new_v4(),
                       instancia_id: inst.id,
                       etapa_id: inst.etapa_actual_id,
                       actor: "ana".to_string(),
                       tipo: tipos_accion::REAPERTURA.to_string(),
                       comentario: None,
                       ejecutado_en: Utc::now() - Duration::hours(5),
                       tiempo_respuesta_segundos: 0 };
  repo.registrar_accion(&vieja).expect("inyectar");
  assert!(motor.vencida(inst.id).expect("vencida"));
}

#[test]
fn las_instancias_terminales_no_vencen() {
  let repo = Arc::new(InMemoryInstanciaRepository::new());
  let catalogo = Arc::new(InMemoryCatalogo::new());
  let proceso = proceso_corto(&catalogo, 1);
  let motor = MotorInstancias::new(repo.clone(), catalogo);
  let inst = motor.crear_instancia(proceso.id(), "ana").expect("crear");
  motor.avanzar_etapa(inst.id, "ana", None).expect("a análisis");
  motor.avanzar_etapa(inst.id, "ana", None).expect("completar");

  let vieja = Accion { id: Uuid::new_v4(),
                       instancia_id: inst.id,
                       etapa_id: inst.etapa_actual_id,
                       actor: "ana".to_string(),
                       tipo: tipos_accion::REAPERTURA.to_string(),
                       comentario: None,
                       ejecutado_en: Utc::now() - Duration::hours(50),
                       tiempo_respuesta_segundos: 0 };
  repo.registrar_accion(&vieja).expect("inyectar");
  assert!(!motor.vencida(inst.id).expect("vencida"));
}
