//! Pruebas de integración del router sobre el backend en memoria.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use instancias::stubs::{CatalogoDocumentosStub, InMemoryInstanciaRepository, NotificadorMemoria};
use instancias::ServicioInstancias;
use serde_json::{json, Value};
use sgc_api::{create_router, AppState};
use sgc_dominio::{CatalogoRepository, EstadoProceso, Etapa, InMemoryCatalogo, Proceso};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

struct Contexto {
    router: Router,
    proceso: Proceso,
    catalogo_docs: Arc<CatalogoDocumentosStub>,
}

fn contexto() -> Contexto {
    let repo = Arc::new(InMemoryInstanciaRepository::new());
    let catalogo = Arc::new(InMemoryCatalogo::new());
    let catalogo_docs = Arc::new(CatalogoDocumentosStub::new());
    let notificador = Arc::new(NotificadorMemoria::new());

    let mut p = Proceso::new(
        "AUD-01",
        "Auditoría interna",
        "Calidad",
        "Auditar procesos",
        "Toda la planta",
    )
    .expect("proceso");
    let a = Etapa::new(p.id(), 1, "Planificación", "auditor_lider", 48, true).expect("etapa");
    let b = Etapa::new(p.id(), 2, "Ejecución", "auditor", 72, false).expect("etapa");
    p.agregar_etapa(a).expect("agregar");
    p.agregar_etapa(b).expect("agregar");
    p.cambiar_estado(EstadoProceso::Activo).expect("activar");
    catalogo.guardar_proceso(p.clone()).expect("guardar");

    let servicio = Arc::new(ServicioInstancias::new(
        repo,
        catalogo,
        catalogo_docs.clone(),
        notificador,
    ));
    let router = create_router(AppState::new(servicio));
    Contexto {
        router,
        proceso: p,
        catalogo_docs,
    }
}

async fn enviar(router: &Router, metodo: &str, ruta: &str, cuerpo: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(metodo)
        .uri(ruta)
        .header(header::CONTENT_TYPE, "application/json");
    let req = match cuerpo {
        Some(v) => builder.body(Body::from(v.to_string())).expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let resp = router.clone().oneshot(req).await.expect("respuesta");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("body").to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json")
    };
    (status, json)
}

#[tokio::test]
async fn salud_responde_ok() {
    let ctx = contexto();
    let (status, body) = enviar(&ctx.router, "GET", "/salud", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn crear_y_consultar_instancia() {
    let ctx = contexto();
    let (status, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(creada["estado"], "en_proceso");

    let id = creada["id"].as_str().expect("id").to_string();
    let (status, vista) = enviar(&ctx.router, "GET", &format!("/api/v1/instancias/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vista["etapa_actual"]["nombre"], "Planificación");
    assert_eq!(vista["participantes"][0]["usuario_id"], "ana");
    assert_eq!(vista["vencida"], false);
}

#[tokio::test]
async fn avanzar_hasta_completar_por_http() {
    let ctx = contexto();
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();

    let avanzar = json!({"actor": "ana", "comentario": "plan listo"});
    let (status, inst) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/avanzar", id),
        Some(avanzar.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inst["estado"], "en_proceso");

    let (status, inst) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/avanzar", id),
        Some(avanzar.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inst["estado"], "completado");

    // sobre una instancia terminal la transición es un error de estado
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/avanzar", id),
        Some(avanzar),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(cuerpo["code"], "ESTADO_INVALIDO");

    let (status, acciones) = enviar(
        &ctx.router,
        "GET",
        &format!("/api/v1/instancias/{}/acciones", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let acciones = acciones.as_array().expect("lista");
    assert_eq!(acciones.len(), 3);
    assert_eq!(acciones[1]["comentario"], "plan listo");
}

#[tokio::test]
async fn errores_del_motor_se_traducen_a_http() {
    let ctx = contexto();

    // instancia inexistente
    let fantasma = Uuid::new_v4();
    let (status, cuerpo) = enviar(
        &ctx.router,
        "GET",
        &format!("/api/v1/instancias/{}", fantasma),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(cuerpo["code"], "NO_ENCONTRADO");

    // actor no autorizado
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/avanzar", id),
        Some(json!({"actor": "intruso"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(cuerpo["code"], "NO_AUTORIZADO");

    // bloqueo sin razón se rechaza antes de llegar al motor
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/bloquear", id),
        Some(json!({"actor": "ana", "razon": "  "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(cuerpo["code"], "PETICION_INVALIDA");
}

#[tokio::test]
async fn bloqueo_y_desbloqueo_por_http() {
    let ctx = contexto();
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();

    let (status, inst) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/bloquear", id),
        Some(json!({"actor": "ana", "razon": "falta evidencia"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inst["bloqueada"], true);

    // bloqueada no avanza
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/avanzar", id),
        Some(json!({"actor": "ana"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(cuerpo["code"], "ESTADO_INVALIDO");

    let (status, inst) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/desbloquear", id),
        Some(json!({"actor": "ana"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inst["bloqueada"], false);
}

#[tokio::test]
async fn participantes_y_tickets_por_http() {
    let ctx = contexto();
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();

    let (status, participante) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/participantes", id),
        Some(json!({"usuario_id": "beto", "rol": "auditor"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(participante["rol"], "auditor");

    // duplicado
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/participantes", id),
        Some(json!({"usuario_id": "beto", "rol": "otro"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(cuerpo["code"], "ESTADO_INVALIDO");

    let (status, ticket) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/tickets", id),
        Some(json!({"creado_por": "externo", "descripcion": "sin avances"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ticket_id = ticket["id"].as_str().expect("id").to_string();

    let (status, ticket) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/tickets/{}/asignar", ticket_id),
        Some(json!({"usuario_id": "beto"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["asignado_a"], "beto");

    let (status, ticket) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/tickets/{}/resolver", ticket_id),
        Some(json!({"solucion": "se retomó el plan"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ticket["estado"], "resuelto");

    let (status, _) = enviar(
        &ctx.router,
        "DELETE",
        &format!("/api/v1/instancias/{}/participantes/beto", id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn documentos_por_http() {
    let ctx = contexto();
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();

    let doc_id = Uuid::new_v4();

    // documento desconocido para el catálogo externo
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/documentos", id),
        Some(json!({"actor": "ana", "documento_id": doc_id, "nota": "manual"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(cuerpo["code"], "VALIDACION");

    ctx.catalogo_docs.registrar(doc_id);
    let (status, vinculo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/documentos", id),
        Some(json!({"actor": "ana", "documento_id": doc_id, "nota": "manual"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(vinculo["nota"], "manual");

    let (status, _) = enviar(
        &ctx.router,
        "DELETE",
        &format!("/api/v1/instancias/{}/documentos/{}?actor=ana", id, doc_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn respuestas_de_formulario_por_http() {
    let ctx = contexto();
    let (_, creada) = enviar(
        &ctx.router,
        "POST",
        "/api/v1/instancias",
        Some(json!({"proceso_id": ctx.proceso.id(), "iniciado_por": "ana"})),
    )
    .await;
    let id = creada["id"].as_str().expect("id").to_string();

    // clave que el proceso no define
    let (status, cuerpo) = enviar(
        &ctx.router,
        "POST",
        &format!("/api/v1/instancias/{}/respuestas", id),
        Some(json!({"actor": "ana", "clave": "inexistente", "valor": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(cuerpo["code"], "NO_ENCONTRADO");
}
