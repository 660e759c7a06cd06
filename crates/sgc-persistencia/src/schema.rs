// Esquema Diesel compartido por SQLite (tests) y Postgres (producción).
// Tablas de catálogo: procesos, etapas, campos_formulario.
// Tablas de ejecución: instancias, acciones, participantes,
// respuestas_formulario, tickets, documentos_instancia.
//
// Los ids son Uuid serializados como Text y las fechas van como epoch en
// microsegundos (`*_ts`) para conservar el orden de la bitácora.
use diesel::allow_tables_to_appear_in_same_query;

diesel::table! {
  procesos (id) {
    id -> Text,
    codigo -> Text,
    nombre -> Text,
    area -> Text,
    objetivo -> Text,
    alcance -> Text,
    estado -> Text,
    version -> Integer,
  }
}

diesel::table! {
  etapas (id) {
    id -> Text,
    proceso_id -> Text,
    orden -> Integer,
    nombre -> Text,
    rol_responsable -> Text,
    horas_maximas -> BigInt,
    reabrible -> Bool,
  }
}

diesel::table! {
  campos_formulario (id) {
    id -> Text,
    proceso_id -> Text,
    etiqueta -> Text,
    clave -> Text,
    tipo -> Text,
    requerido -> Bool,
    orden -> Integer,
    opciones -> Text,
  }
}

allow_tables_to_appear_in_same_query!(procesos, etapas, campos_formulario);

diesel::table! {
  instancias (id) {
    id -> Text,
    proceso_id -> Text,
    etapa_actual_id -> Text,
    estado -> Text,
    iniciado_por -> Text,
    iniciado_en_ts -> BigInt,
    completado_en_ts -> Nullable<BigInt>,
    datos -> Text,
    bloqueada -> Bool,
    razon_bloqueo -> Nullable<Text>,
    version -> BigInt,
  }
}

diesel::table! {
  acciones (id) {
    id -> Text,
    instancia_id -> Text,
    etapa_id -> Text,
    actor -> Text,
    tipo -> Text,
    comentario -> Nullable<Text>,
    ejecutado_en_ts -> BigInt,
    tiempo_respuesta_segundos -> BigInt,
  }
}

diesel::table! {
  participantes (id) {
    id -> Text,
    instancia_id -> Text,
    usuario_id -> Text,
    rol -> Text,
    asignado_en_ts -> BigInt,
  }
}

diesel::table! {
  respuestas_formulario (id) {
    id -> Text,
    instancia_id -> Text,
    campo_id -> Text,
    valor -> Text,
    actualizado_en_ts -> BigInt,
  }
}

diesel::table! {
  tickets (id) {
    id -> Text,
    instancia_id -> Text,
    creado_por -> Text,
    asignado_a -> Nullable<Text>,
    estado -> Text,
    descripcion -> Text,
    solucion -> Nullable<Text>,
    creado_en_ts -> BigInt,
    resuelto_en_ts -> Nullable<BigInt>,
  }
}

diesel::table! {
  documentos_instancia (id) {
    id -> Text,
    instancia_id -> Text,
    documento_id -> Text,
    nota -> Text,
    vinculado_en_ts -> BigInt,
  }
}

allow_tables_to_appear_in_same_query!(instancias, acciones, participantes, respuestas_formulario, tickets,
                                      documentos_instancia);
