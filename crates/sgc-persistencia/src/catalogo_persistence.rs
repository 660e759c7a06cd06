use crate::schema;
use crate::schema::campos_formulario::dsl as campos_dsl;
use crate::schema::etapas::dsl as etapas_dsl;
use crate::schema::procesos::dsl as procesos_dsl;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use sgc_dominio::{CampoFormulario, CatalogoRepository, DominioError, EstadoProceso, Etapa, Proceso, TipoCampo};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[cfg(all(feature = "pg", not(test)))]
type DbPool = Pool<ConnectionManager<PgConnection>>;
#[cfg(any(test, not(feature = "pg")))]
type DbPool = Pool<ConnectionManager<SqliteConnection>>;
#[cfg(all(feature = "pg", not(test)))]
type DbConn = PgConnection;
#[cfg(any(test, not(feature = "pg")))]
type DbConn = SqliteConnection;

/// Repo Diesel que implementa `CatalogoRepository`.
pub struct DieselCatalogoRepository {
  pool: Arc<DbPool>,
}

impl DieselCatalogoRepository {
  pub fn new(database_url: &str) -> Result<Self, DominioError> {
    let manager = ConnectionManager::<DbConn>::new(database_url);
    let pool = Pool::builder().max_size(4)
                              .build(manager)
                              .map_err(|e| DominioError::Externo(format!("pool: {}", e)))?;
    let repo = DieselCatalogoRepository { pool: Arc::new(pool) };
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

  fn conn(&self) -> Result<PooledConnection<ConnectionManager<DbConn>>, DominioError> {
    self.conn_raw().map_err(|e| DominioError::Externo(format!("pool: {}", e)))
  }
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::procesos)]
struct ProcesoRow {
  pub id: String,
  pub codigo: String,
  pub nombre: String,
  pub area: String,
  pub objetivo: String,
  pub alcance: String,
  pub estado: String,
  pub version: i32,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::etapas)]
struct EtapaRow {
  pub id: String,
  pub proceso_id: String,
  pub orden: i32,
  pub nombre: String,
  pub rol_responsable: String,
  pub horas_maximas: i64,
  pub reabrible: bool,
}

#[derive(Debug, Queryable, Insertable)]
#[diesel(table_name = schema::campos_formulario)]
struct CampoRow {
  pub id: String,
  pub proceso_id: String,
  pub etiqueta: String,
  pub clave: String,
  pub tipo: String,
  pub requerido: bool,
  pub orden: i32,
  pub opciones: String,
}

fn map_db_err<T>(res: std::result::Result<T, diesel::result::Error>) -> Result<T, DominioError> {
  res.map_err(|e| DominioError::Externo(format!("db: {}", e)))
}

fn parse_uuid(s: &str) -> Result<Uuid, DominioError> {
  Uuid::parse_str(s).map_err(|e| DominioError::Externo(format!("uuid inválido '{}': {}", s, e)))
}

fn fila_a_etapa(r: EtapaRow) -> Result<Etapa, DominioError> {
  Etapa::from_parts(parse_uuid(&r.id)?,
                    parse_uuid(&r.proceso_id)?,
                    r.orden,
                    &r.nombre,
                    &r.rol_responsable,
                    r.horas_maximas,
                    r.reabrible)
}

fn fila_a_proceso(r: ProcesoRow, etapas: Vec<Etapa>) -> Result<Proceso, DominioError> {
  Proceso::from_parts(parse_uuid(&r.id)?,
                      &r.codigo,
                      &r.nombre,
                      &r.area,
                      &r.objetivo,
                      &r.alcance,
                      EstadoProceso::from_str(&r.estado)?,
                      r.version,
                      etapas)
}

fn fila_a_campo(r: CampoRow) -> Result<CampoFormulario, DominioError> {
  let opciones: Vec<String> = serde_json::from_str(&r.opciones).unwrap_or_default();
  CampoFormulario::from_parts(parse_uuid(&r.id)?,
                              parse_uuid(&r.proceso_id)?,
                              &r.etiqueta,
                              &r.clave,
                              TipoCampo::from_str(&r.tipo)?,
                              r.requerido,
                              r.orden,
                              opciones)
}

impl DieselCatalogoRepository {
  fn etapas_de(&self, conn: &mut DbConn, proceso_id: &str) -> Result<Vec<Etapa>, DominioError> {
    let filas = map_db_err(etapas_dsl::etapas.filter(etapas_dsl::proceso_id.eq(proceso_id))
                                             .order(etapas_dsl::orden.asc())
                                             .load::<EtapaRow>(conn))?;
    filas.into_iter().map(fila_a_etapa).collect()
  }
}

impl CatalogoRepository for DieselCatalogoRepository {
  fn guardar_proceso(&self, proceso: Proceso) -> Result<Uuid, DominioError> {
    let mut conn = self.conn()?;
    let id_s = proceso.id().to_string();

    let duplicado = map_db_err(procesos_dsl::procesos.filter(procesos_dsl::codigo.eq(proceso.codigo()))
                                                     .filter(procesos_dsl::id.ne(&id_s))
                                                     .select(procesos_dsl::id)
                                                     .first::<String>(&mut conn)
                                                     .optional())?;
    if duplicado.is_some() {
      return Err(DominioError::Validacion(format!("Ya existe un proceso con código '{}'", proceso.codigo())));
    }

    let row = ProcesoRow { id: id_s.clone(),
                           codigo: proceso.codigo().to_string(),
                           nombre: proceso.nombre().to_string(),
                           area: proceso.area().to_string(),
                           objetivo: proceso.objetivo().to_string(),
                           alcance: proceso.alcance().to_string(),
                           estado: proceso.estado().to_string(),
                           version: proceso.version() };
    // Upsert: si la fila ya existe se reemplaza junto con sus etapas.
    if diesel::insert_into(procesos_dsl::procesos).values(&row).execute(&mut conn).is_err() {
      let _ = diesel::delete(procesos_dsl::procesos.filter(procesos_dsl::id.eq(&id_s))).execute(&mut conn);
      map_db_err(diesel::insert_into(procesos_dsl::procesos).values(&row).execute(&mut conn))?;
    }
    let _ = diesel::delete(etapas_dsl::etapas.filter(etapas_dsl::proceso_id.eq(&id_s))).execute(&mut conn);
    for e in proceso.etapas() {
      let er = EtapaRow { id: e.id().to_string(),
                          proceso_id: id_s.clone(),
                          orden: e.orden(),
                          nombre: e.nombre().to_string(),
                          rol_responsable: e.rol_responsable().to_string(),
                          horas_maximas: e.horas_maximas(),
                          reabrible: e.reabrible() };
      map_db_err(diesel::insert_into(etapas_dsl::etapas).values(&er).execute(&mut conn))?;
    }
    Ok(proceso.id())
  }

  fn obtener_proceso(&self, id: &Uuid) -> Result<Option<Proceso>, DominioError> {
    let mut conn = self.conn()?;
    let id_s = id.to_string();
    let opt = map_db_err(procesos_dsl::procesos.filter(procesos_dsl::id.eq(&id_s))
                                               .first::<ProcesoRow>(&mut conn)
                                               .optional())?;
    match opt {
      Some(r) => {
        let etapas = self.etapas_de(&mut conn, &id_s)?;
        Ok(Some(fila_a_proceso(r, etapas)?))
      }
      None => Ok(None),
    }
  }

  fn proceso_por_codigo(&self, codigo: &str) -> Result<Option<Proceso>, DominioError> {
    let mut conn = self.conn()?;
    let opt = map_db_err(procesos_dsl::procesos.filter(procesos_dsl::codigo.eq(codigo))
                                               .first::<ProcesoRow>(&mut conn)
                                               .optional())?;
    match opt {
      Some(r) => {
        let id_s = r.id.clone();
        let etapas = self.etapas_de(&mut conn, &id_s)?;
        Ok(Some(fila_a_proceso(r, etapas)?))
      }
      None => Ok(None),
    }
  }

  fn listar_procesos(&self) -> Result<Vec<Proceso>, DominioError> {
    let mut conn = self.conn()?;
    let filas = map_db_err(procesos_dsl::procesos.load::<ProcesoRow>(&mut conn))?;
    let mut out = Vec::with_capacity(filas.len());
    for r in filas {
      let id_s = r.id.clone();
      let etapas = self.etapas_de(&mut conn, &id_s)?;
      out.push(fila_a_proceso(r, etapas)?);
    }
    Ok(out)
  }

  fn definir_campo(&self, campo: CampoFormulario) -> Result<Uuid, DominioError> {
    let mut conn = self.conn()?;
    let proceso_s = campo.proceso_id().to_string();
    let existe = map_db_err(procesos_dsl::procesos.filter(procesos_dsl::id.eq(&proceso_s))
                                                  .select(procesos_dsl::id)
                                                  .first::<String>(&mut conn)
                                                  .optional())?;
    if existe.is_none() {
      return Err(DominioError::Validacion(format!("Proceso {} no existe", campo.proceso_id())));
    }
    let duplicada = map_db_err(campos_dsl::campos_formulario.filter(campos_dsl::proceso_id.eq(&proceso_s))
                                                            .filter(campos_dsl::clave.eq(campo.clave()))
                                                            .filter(campos_dsl::id.ne(campo.id().to_string()))
                                                            .select(campos_dsl::id)
                                                            .first::<String>(&mut conn)
                                                            .optional())?;
    if duplicada.is_some() {
      return Err(DominioError::Validacion(format!("La clave '{}' ya está definida para el proceso {}",
                                                  campo.clave(),
                                                  campo.proceso_id())));
    }
    let row = CampoRow { id: campo.id().to_string(),
                         proceso_id: proceso_s,
                         etiqueta: campo.etiqueta().to_string(),
                         clave: campo.clave().to_string(),
                         tipo: campo.tipo().to_string(),
                         requerido: campo.requerido(),
                         orden: campo.orden(),
                         opciones: serde_json::to_string(campo.opciones()).map_err(DominioError::from)? };
    map_db_err(diesel::insert_into(campos_dsl::campos_formulario).values(&row).execute(&mut conn))?;
    Ok(campo.id())
  }

  fn campos_de_proceso(&self, proceso_id: &Uuid) -> Result<Vec<CampoFormulario>, DominioError> {
    let mut conn = self.conn()?;
    let filas = map_db_err(campos_dsl::campos_formulario.filter(campos_dsl::proceso_id.eq(proceso_id.to_string()))
                                                        .order(campos_dsl::orden.asc())
                                                        .load::<CampoRow>(&mut conn))?;
    filas.into_iter().map(fila_a_campo).collect()
  }

  fn obtener_campo(&self, campo_id: &Uuid) -> Result<Option<CampoFormulario>, DominioError> {
    let mut conn = self.conn()?;
    let opt = map_db_err(campos_dsl::campos_formulario.filter(campos_dsl::id.eq(campo_id.to_string()))
                                                      .first::<CampoRow>(&mut conn)
                                                      .optional())?;
    opt.map(fila_a_campo).transpose()
  }
}

/// Crea el repositorio de catálogo desde `SGC_DB_URL` / `DATABASE_URL`
/// (o SQLite en memoria bajo tests).
pub fn new_catalogo_from_env() -> Result<DieselCatalogoRepository, DominioError> {
  dotenvy::dotenv().ok();
  if cfg!(all(feature = "pg", not(test))) {
    let url = std::env::var("SGC_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .map_err(|_| DominioError::Externo("SGC_DB_URL / DATABASE_URL sin definir".into()))?;
    if !(url.starts_with("postgres") || url.contains('@')) {
      return Err(DominioError::Externo("SGC_DB_URL no parece una URL de Postgres".into()));
    }
    DieselCatalogoRepository::new(&url)
  } else {
    let url = std::env::var("SGC_DB_URL").or_else(|_| std::env::var("DATABASE_URL"))
                                         .unwrap_or_else(|_| "file:sgcdb?mode=memory&cache=shared".into());
    DieselCatalogoRepository::new(&url)
  }
}
