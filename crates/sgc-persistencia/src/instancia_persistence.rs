use crate::catalogo_persistence::MIGRATIONS;
use crate::schema;
use crate::schema::acciones::dsl as acciones_dsl;
use crate::schema::documentos_instancia::dsl as docs_dsl;
use crate::schema::instancias::dsl as instancias_dsl;
use crate::schema::participantes::dsl as part_dsl;
use crate::schema::respuestas_formulario::dsl as resp_dsl;
use crate::schema::tickets::dsl as tickets_dsl;
use crate::{a_ts, de_ts};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::MigrationHarness;
use instancias::{Accion, DocumentoVinculado, EstadoInstancia, EstadoTicket, Instancia, InstanciaRepository, MotorError,
                 Participante, RespuestaFormulario, ResultadoPersistencia, Ticket};
use std::sync::Arc;
use uuid::Uuid;

#[cfg(all(feature = "pg", not(test)))]
type DbPool = Pool<ConnectionManager<PgConnection>>;
#[cfg(any(test, not(feature = "pg")))]
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
#[cfg(all(feature = "pg", not(test)))]
type DbConn = PgConnection;
#[cfg(any(test, not(feature = "pg")))]
type DbConn = SqliteConnection;

/// Repo Diesel que implementa `InstanciaRepository`. El control optimista
/// se resuelve en SQL: el UPDATE filtra por (id, version) y un conteo de
/// filas afectadas en cero significa conflicto.
pub struct DieselInstanciaRepository {
  pool: Arc<DbPool>,
}

impl DieselInstanciaRepository {
  pub fn new(database_url: &str) -> Result<Self, MotorError> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .build(manager)
                              .map_err(|e| MotorError::Almacenamiento(format!("pool: {}", e)))?;
    let repo = DieselInstanciaRepository { pool: Arc::new(pool) };
    if let Ok(mut c) = repo.conn_raw() {
      #[cfg(any(test, not(feature = "pg")))]
      {
        let _ = diesel::sql_query("PRAGMA journal_mode = WAL;").execute(&mut c);
        let _ = diesel::sql_query("PRAGMA busy_timeout = 5000;").execute(&mut c);
      }
      let _ = c.run_pending_migrations(MIGRATIONS);
    }
    Ok(repo)
  }

  fn conn_raw(&self) -> std::result::Result<PooledConnection<ConnectionManager<DbConn>>, r2d2::Error> {
    self.pool.get()
  }

  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, MotorError> {
    self.conn_raw().map_err(|e| MotorError::Almacenamiento(format!("pool: {}", e)))
  }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::instancias)]
struct InstanciaRow {
  pub id: String,
  pub proceso_id: String,
  pub etapa_actual_id: String,
  pub estado: String,
  pub iniciado_por: String,
  pub iniciado_en_ts: i64,
  pub completado_en_ts: Option<i64>,
  pub datos: String,
  pub bloqueada: bool,
  pub razon_bloqueo: Option<String>,
  pub version: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::acciones)]
struct AccionRow {
  pub id: String,
  pub instancia_id: String,
  pub etapa_id: String,
  pub actor: String,
  pub tipo: String,
  pub comentario: Option<String>,
  pub ejecutado_en_ts: i64,
  pub tiempo_respuesta_segundos: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::participantes)]
struct ParticipanteRow {
  pub id: String,
  pub instancia_id: String,
  pub usuario_id: String,
  pub rol: String,
  pub asignado_en_ts: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::respuestas_formulario)]
struct RespuestaRow {
  pub id: String,
  pub instancia_id: String,
  pub campo_id: String,
  pub valor: String,
  pub actualizado_en_ts: i64,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::tickets)]
struct TicketRow {
  pub id: String,
  pub instancia_id: String,
  pub creado_por: String,
  pub asignado_a: Option<String>,
  pub estado: String,
  pub descripcion: String,
  pub solucion: Option<String>,
  pub creado_en_ts: i64,
  pub resuelto_en_ts: Option<i64>,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::documentos_instancia)]
struct DocumentoRow {
  pub id: String,
  pub instancia_id: String,
  pub documento_id: String,
  pub nota: String,
  pub vinculado_en_ts: i64,
}

fn map_db_err<T>(res: std::result::Result<T, diesel::result::Error>) -> Result<T, MotorError> {
  res.map_err(|e| MotorError::Almacenamiento(format!("db: {}", e)))
}

fn parse_uuid(s: &str) -> Result<Uuid, MotorError> {
  Uuid::parse_str(s).map_err(|e| MotorError::Almacenamiento(format!("uuid inválido '{}': {}", s, e)))
}

fn instancia_a_fila(i: &Instancia) -> Result<InstanciaRow, MotorError> {
  Ok(InstanciaRow { id: i.id.to_string(),
                    proceso_id: i.proceso_id.to_string(),
                    etapa_actual_id: i.etapa_actual_id.to_string(),
                    estado: i.estado.as_str().to_string(),
                    iniciado_por: i.iniciado_por.clone(),
                    iniciado_en_ts: a_ts(i.iniciado_en),
                    completado_en_ts: i.completado_en.map(a_ts),
                    datos: serde_json::to_string(&i.datos_dinamicos)?,
                    bloqueada: i.bloqueada,
                    razon_bloqueo: i.razon_bloqueo.clone(),
                    version: i.version })
}

fn fila_a_instancia(r: InstanciaRow) -> Result<Instancia, MotorError> {
  let estado = EstadoInstancia::parse(&r.estado)
    .ok_or_else(|| MotorError::Almacenamiento(format!("estado de instancia desconocido: {}", r.estado)))?;
  Ok(Instancia { id: parse_uuid(&r.id)?,
                 proceso_id: parse_uuid(&r.proceso_id)?,
                 etapa_actual_id: parse_uuid(&r.etapa_actual_id)?,
                 estado,
                 iniciado_por: r.iniciado_por,
                 iniciado_en: de_ts(r.iniciado_en_ts)?,
                 completado_en: r.completado_en_ts.map(de_ts).transpose()?,
                 datos_dinamicos: serde_json::from_str(&r.datos)
                   .map_err(|e| MotorError::Almacenamiento(format!("datos dinámicos corruptos: {}", e)))?,
                 bloqueada: r.bloqueada,
                 razon_bloqueo: r.razon_bloqueo,
                 version: r.version })
}

fn accion_a_fila(a: &Accion) -> AccionRow {
  AccionRow { id: a.id.to_string(),
              instancia_id: a.instancia_id.to_string(),
              etapa_id: a.etapa_id.to_string(),
              actor: a.actor.clone(),
              tipo: a.tipo.clone(),
              comentario: a.comentario.clone(),
              ejecutado_en_ts: a_ts(a.ejecutado_en),
              tiempo_respuesta_segundos: a.tiempo_respuesta_segundos }
}

fn fila_a_accion(r: AccionRow) -> Result<Accion, MotorError> {
  Ok(Accion { id: parse_uuid(&r.id)?,
              instancia_id: parse_uuid(&r.instancia_id)?,
              etapa_id: parse_uuid(&r.etapa_id)?,
              actor: r.actor,
              tipo: r.tipo,
              comentario: r.comentario,
              ejecutado_en: de_ts(r.ejecutado_en_ts)?,
              tiempo_respuesta_segundos: r.tiempo_respuesta_segundos })
}

fn fila_a_ticket(r: TicketRow) -> Result<Ticket, MotorError> {
  let estado = EstadoTicket::parse(&r.estado)
    .ok_or_else(|| MotorError::Almacenamiento(format!("estado de ticket desconocido: {}", r.estado)))?;
  Ok(Ticket { id: parse_uuid(&r.id)?,
              instancia_id: parse_uuid(&r.instancia_id)?,
              creado_por: r.creado_por,
              asignado_a: r.asignado_a,
              estado,
              descripcion: r.descripcion,
              solucion: r.solucion,
              creado_en: de_ts(r.creado_en_ts)?,
              resuelto_en: r.resuelto_en_ts.map(de_ts).transpose()? })
}

impl InstanciaRepository for DieselInstanciaRepository {
  fn crear_instancia(&self, instancia: &Instancia, accion_inicial: &Accion) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let row = instancia_a_fila(instancia)?;
    let fila_accion = accion_a_fila(accion_inicial);
    // Instancia y acción inicial en una sola transacción.
    map_db_err(conn.transaction::<_, diesel::result::Error, _>(|conn| {
                 diesel::insert_into(instancias_dsl::instancias).values(&row).execute(conn)?;
                 diesel::insert_into(acciones_dsl::acciones).values(&fila_accion).execute(conn)?;
                 Ok(())
               }))?;
    Ok(())
  }

  fn obtener_instancia(&self, id: &Uuid) -> instancias::Result<Instancia> {
    let mut conn = self.conn()?;
    let opt = map_db_err(instancias_dsl::instancias.filter(instancias_dsl::id.eq(id.to_string()))
                                                   .first::<InstanciaRow>(&mut conn)
                                                   .optional())?;
    match opt {
      Some(r) => fila_a_instancia(r),
      None => Err(MotorError::NoEncontrado(format!("instancia {}", id))),
    }
  }

  fn actualizar_instancia(&self,
                          instancia: &Instancia,
                          expected_version: i64,
                          accion: Option<&Accion>)
                          -> instancias::Result<ResultadoPersistencia> {
    let mut conn = self.conn()?;
    let id_s = instancia.id.to_string();
    let nueva_version = expected_version.saturating_add(1);
    let datos = serde_json::to_string(&instancia.datos_dinamicos)?;
    let fila_accion = accion.map(accion_a_fila);
    // El filtro por versión hace el CAS: si otra escritura ganó la
    // carrera, no hay fila que coincida y el conteo es cero. La acción de
    // la transición se inserta en la misma transacción, de modo que estado
    // y bitácora se confirman o se revierten juntos.
    let afectadas =
      map_db_err(conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                   let afectadas =
                     diesel::update(instancias_dsl::instancias.filter(instancias_dsl::id.eq(&id_s))
                                                              .filter(instancias_dsl::version.eq(expected_version)))
                       .set((instancias_dsl::etapa_actual_id.eq(instancia.etapa_actual_id.to_string()),
                             instancias_dsl::estado.eq(instancia.estado.as_str()),
                             instancias_dsl::completado_en_ts.eq(instancia.completado_en.map(a_ts)),
                             instancias_dsl::datos.eq(&datos),
                             instancias_dsl::bloqueada.eq(instancia.bloqueada),
                             instancias_dsl::razon_bloqueo.eq(instancia.razon_bloqueo.clone()),
                             instancias_dsl::version.eq(nueva_version)))
                       .execute(conn)?;
                   if afectadas == 1 {
                     if let Some(row) = &fila_accion {
                       diesel::insert_into(acciones_dsl::acciones).values(row).execute(conn)?;
                     }
                   }
                   Ok(afectadas)
                 }))?;
    if afectadas == 1 {
      return Ok(ResultadoPersistencia::Ok { nueva_version });
    }
    let existe = map_db_err(instancias_dsl::instancias.filter(instancias_dsl::id.eq(&id_s))
                                                      .select(instancias_dsl::id)
                                                      .first::<String>(&mut conn)
                                                      .optional())?;
    if existe.is_none() {
      return Err(MotorError::NoEncontrado(format!("instancia {}", instancia.id)));
    }
    Ok(ResultadoPersistencia::Conflicto)
  }

  fn registrar_accion(&self, accion: &Accion) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let row = accion_a_fila(accion);
    map_db_err(diesel::insert_into(acciones_dsl::acciones).values(&row).execute(&mut conn))?;
    Ok(())
  }

  fn acciones_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Accion>> {
    let mut conn = self.conn()?;
    let filas = map_db_err(acciones_dsl::acciones.filter(acciones_dsl::instancia_id.eq(instancia_id.to_string()))
                                                 .order(acciones_dsl::ejecutado_en_ts.asc())
                                                 .load::<AccionRow>(&mut conn))?;
    filas.into_iter().map(fila_a_accion).collect()
  }

  fn agregar_participante(&self, participante: &Participante) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let inst_s = participante.instancia_id.to_string();
    let existente = map_db_err(part_dsl::participantes.filter(part_dsl::instancia_id.eq(&inst_s))
                                                      .filter(part_dsl::usuario_id.eq(&participante.usuario_id))
                                                      .select(part_dsl::id)
                                                      .first::<String>(&mut conn)
                                                      .optional())?;
    if existente.is_some() {
      return Err(MotorError::participante_duplicado(&participante.usuario_id));
    }
    let row = ParticipanteRow { id: Uuid::new_v4().to_string(),
                                instancia_id: inst_s,
                                usuario_id: participante.usuario_id.clone(),
                                rol: participante.rol.clone(),
                                asignado_en_ts: a_ts(participante.asignado_en) };
    map_db_err(diesel::insert_into(part_dsl::participantes).values(&row).execute(&mut conn))?;
    Ok(())
  }

  fn remover_participante(&self, instancia_id: &Uuid, usuario_id: &str) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let borradas = map_db_err(diesel::delete(part_dsl::participantes
                                               .filter(part_dsl::instancia_id.eq(instancia_id.to_string()))
                                               .filter(part_dsl::usuario_id.eq(usuario_id))).execute(&mut conn))?;
    if borradas == 0 {
      return Err(MotorError::NoEncontrado(format!("participante '{}' en instancia {}", usuario_id, instancia_id)));
    }
    Ok(())
  }

  fn participantes_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Participante>> {
    let mut conn = self.conn()?;
    let filas = map_db_err(part_dsl::participantes.filter(part_dsl::instancia_id.eq(instancia_id.to_string()))
                                                  .order(part_dsl::asignado_en_ts.asc())
                                                  .load::<ParticipanteRow>(&mut conn))?;
    filas.into_iter()
         .map(|r| {
           Ok(Participante { instancia_id: parse_uuid(&r.instancia_id)?,
                             usuario_id: r.usuario_id,
                             rol: r.rol,
                             asignado_en: de_ts(r.asignado_en_ts)? })
         })
         .collect()
  }

  fn guardar_respuesta(&self, respuesta: &RespuestaFormulario) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let inst_s = respuesta.instancia_id.to_string();
    let campo_s = respuesta.campo_id.to_string();
    let actualizadas = map_db_err(diesel::update(resp_dsl::respuestas_formulario
                                                   .filter(resp_dsl::instancia_id.eq(&inst_s))
                                                   .filter(resp_dsl::campo_id.eq(&campo_s)))
                                    .set((resp_dsl::valor.eq(&respuesta.valor),
                                          resp_dsl::actualizado_en_ts.eq(a_ts(respuesta.actualizado_en))))
                                    .execute(&mut conn))?;
    if actualizadas == 0 {
      let row = RespuestaRow { id: Uuid::new_v4().to_string(),
                               instancia_id: inst_s,
                               campo_id: campo_s,
                               valor: respuesta.valor.clone(),
                               actualizado_en_ts: a_ts(respuesta.actualizado_en) };
      map_db_err(diesel::insert_into(resp_dsl::respuestas_formulario).values(&row).execute(&mut conn))?;
    }
    Ok(())
  }

  fn respuestas_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<RespuestaFormulario>> {
    let mut conn = self.conn()?;
    let filas =
      map_db_err(resp_dsl::respuestas_formulario.filter(resp_dsl::instancia_id.eq(instancia_id.to_string()))
                                                .load::<RespuestaRow>(&mut conn))?;
    filas.into_iter()
         .map(|r| {
           Ok(RespuestaFormulario { instancia_id: parse_uuid(&r.instancia_id)?,
                                    campo_id: parse_uuid(&r.campo_id)?,
                                    valor: r.valor,
                                    actualizado_en: de_ts(r.actualizado_en_ts)? })
         })
         .collect()
  }

  fn crear_ticket(&self, ticket: &Ticket) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let row = TicketRow { id: ticket.id.to_string(),
                          instancia_id: ticket.instancia_id.to_string(),
                          creado_por: ticket.creado_por.clone(),
                          asignado_a: ticket.asignado_a.clone(),
                          estado: ticket.estado.as_str().to_string(),
                          descripcion: ticket.descripcion.clone(),
                          solucion: ticket.solucion.clone(),
                          creado_en_ts: a_ts(ticket.creado_en),
                          resuelto_en_ts: ticket.resuelto_en.map(a_ts) };
    map_db_err(diesel::insert_into(tickets_dsl::tickets).values(&row).execute(&mut conn))?;
    Ok(())
  }

  fn obtener_ticket(&self, id: &Uuid) -> instancias::Result<Ticket> {
    let mut conn = self.conn()?;
    let opt = map_db_err(tickets_dsl::tickets.filter(tickets_dsl::id.eq(id.to_string()))
                                             .first::<TicketRow>(&mut conn)
                                             .optional())?;
    match opt {
      Some(r) => fila_a_ticket(r),
      None => Err(MotorError::NoEncontrado(format!("ticket {}", id))),
    }
  }

  fn actualizar_ticket(&self, ticket: &Ticket) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let actualizadas = map_db_err(diesel::update(tickets_dsl::tickets.filter(tickets_dsl::id.eq(ticket.id.to_string())))
                                    .set((tickets_dsl::asignado_a.eq(ticket.asignado_a.clone()),
                                          tickets_dsl::estado.eq(ticket.estado.as_str()),
                                          tickets_dsl::solucion.eq(ticket.solucion.clone()),
                                          tickets_dsl::resuelto_en_ts.eq(ticket.resuelto_en.map(a_ts))))
                                    .execute(&mut conn))?;
    if actualizadas == 0 {
      return Err(MotorError::NoEncontrado(format!("ticket {}", ticket.id)));
    }
    Ok(())
  }

  fn tickets_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<Ticket>> {
    let mut conn = self.conn()?;
    let filas = map_db_err(tickets_dsl::tickets.filter(tickets_dsl::instancia_id.eq(instancia_id.to_string()))
                                               .order(tickets_dsl::creado_en_ts.asc())
                                               .load::<TicketRow>(&mut conn))?;
    filas.into_iter().map(fila_a_ticket).collect()
  }

  fn vincular_documento(&self, vinculo: &DocumentoVinculado) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let inst_s = vinculo.instancia_id.to_string();
    let doc_s = vinculo.documento_id.to_string();
    let actualizadas = map_db_err(diesel::update(docs_dsl::documentos_instancia
                                                   .filter(docs_dsl::instancia_id.eq(&inst_s))
                                                   .filter(docs_dsl::documento_id.eq(&doc_s)))
                                    .set((docs_dsl::nota.eq(&vinculo.nota),
                                          docs_dsl::vinculado_en_ts.eq(a_ts(vinculo.vinculado_en))))
                                    .execute(&mut conn))?;
    if actualizadas == 0 {
      let row = DocumentoRow { id: Uuid::new_v4().to_string(),
                               instancia_id: inst_s,
                               documento_id: doc_s,
                               nota: vinculo.nota.clone(),
                               vinculado_en_ts: a_ts(vinculo.vinculado_en) };
      map_db_err(diesel::insert_into(docs_dsl::documentos_instancia).values(&row).execute(&mut conn))?;
    }
    Ok(())
  }

  fn desvincular_documento(&self, instancia_id: &Uuid, documento_id: &Uuid) -> instancias::Result<()> {
    let mut conn = self.conn()?;
    let borradas = map_db_err(diesel::delete(docs_dsl::documentos_instancia
                                               .filter(docs_dsl::instancia_id.eq(instancia_id.to_string()))
                                               .filter(docs_dsl::documento_id.eq(documento_id.to_string())))
                                .execute(&mut conn))?;
    if borradas == 0 {
      return Err(MotorError::NoEncontrado(format!("documento {} en instancia {}", documento_id, instancia_id)));
    }
    Ok(())
  }

  fn documentos_de(&self, instancia_id: &Uuid) -> instancias::Result<Vec<DocumentoVinculado>> {
    let mut conn = self.conn()?;
    let filas =
      map_db_err(docs_dsl::documentos_instancia.filter(docs_dsl::instancia_id.eq(instancia_id.to_string()))
                                               .order(docs_dsl::vinculado_en_ts.asc())
                                               .load::<DocumentoRow>(&mut conn))?;
    filas.into_iter()
         .map(|r| {
           Ok(DocumentoVinculado { instancia_id: parse_uuid(&r.instancia_id)?,
                                   documento_id: parse_uuid(&r.documento_id)?,
                                   nota: r.nota,
                                   vinculado_en: de_ts(r.vinculado_en_ts)? })
         })
         .collect()
  }
}

/// Crea el repositorio de instancias desde `SGC_DB_URL` / `DATABASE_URL`
/// (o SQLite en memoria bajo tests).
pub fn new_instancias_from_env() -> Result<DieselInstanciaRepository, MotorError> {
  dotenvy::dotenv().ok();
  if cfg!(all(feature = "pg", not(test))) {
    let url = std::env::var("SGC_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .map_err(|_| MotorError::Almacenamiento("SGC_DB_URL / DATABASE_URL sin definir".into()))?;
    if !(url.starts_with("postgres") || url.contains('@')) {
      return Err(MotorError::Almacenamiento("SGC_DB_URL no parece una URL de Postgres".into()));
    }
    DieselInstanciaRepository::new(&url)
  } else {
    let url = std::env::var("SGC_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .unwrap_or_else(|_| "file:sgcdb?mode=memory&cache=shared".into());
    DieselInstanciaRepository::new(&url)
  }
}
