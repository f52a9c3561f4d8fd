use std::fmt::Debug;
use std::io;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::{HallbookAuthSource, Identity, UserDirectory};
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, SqlError};

pub struct HallbookHandler {
    engine: Arc<Engine>,
    directory: Arc<UserDirectory>,
    query_parser: Arc<HallbookQueryParser>,
}

impl HallbookHandler {
    pub fn new(engine: Arc<Engine>, directory: Arc<UserDirectory>) -> Self {
        Self {
            engine,
            directory,
            query_parser: Arc::new(HallbookQueryParser),
        }
    }

    /// The authenticated login user, with the role the directory grants it.
    fn resolve_identity<C: ClientInfo>(&self, client: &C) -> PgWireResult<Identity> {
        let user = client.metadata().get("user").cloned().unwrap_or_default();
        self.directory.identity(&user).ok_or_else(|| {
            user_error("28000", format!("no identity for user \"{user}\""))
        })
    }

    async fn run(&self, identity: Identity, query: &str) -> PgWireResult<Response> {
        let cmd = sql::parse_sql(query).map_err(|e| {
            metrics::counter!(observability::QUERIES_TOTAL, "command" => "parse", "status" => "error").increment(1);
            sql_err(e)
        })?;

        let label = observability::command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(&identity, cmd).await;
        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        tracing::debug!(user = %identity.user, command = label, status, "query executed");
        result
    }

    async fn execute_command(&self, identity: &Identity, cmd: Command) -> PgWireResult<Response> {
        let engine = &self.engine;
        match cmd {
            Command::SubmitBooking { booking } => {
                let created = engine.submit_booking(booking, identity).await.map_err(engine_err)?;
                Ok(booking_response(vec![created]))
            }
            Command::DecideBooking { id, decision } => {
                let decided = engine
                    .decide_booking(id, decision, identity)
                    .await
                    .map_err(engine_err)?;
                Ok(booking_response(vec![decided]))
            }
            Command::SelectBookings { id: Some(id), filter } => {
                let found = engine.get_booking(id).await.map_err(engine_err)?;
                let rows = if filter.matches(&found) { vec![found] } else { Vec::new() };
                Ok(booking_response(rows))
            }
            Command::SelectBookings { id: None, filter } => {
                Ok(booking_response(engine.list_bookings(&filter).await))
            }
            Command::SelectSchedule { hall } => {
                let bookings = engine.list_hall_bookings(&hall).await.map_err(engine_err)?;
                Ok(booking_response(bookings))
            }
            Command::SelectConflicts { hall, start, end } => {
                let hits = engine.find_conflicts(&hall, start, end).await.map_err(engine_err)?;
                Ok(query_response(conflict_schema(), hits, |enc, b| {
                    enc.encode_field(&b.id.to_string())?;
                    enc.encode_field(&b.hall)?;
                    enc.encode_field(&b.span.start)?;
                    enc.encode_field(&b.span.end)?;
                    enc.encode_field(&b.status.as_str())?;
                    enc.encode_field(&b.details.topic)?;
                    enc.encode_field(&b.details.department)
                }))
            }
            Command::SelectAvailability { query } => {
                let day = engine.day_availability(&query).await.map_err(engine_err)?;
                let summaries: Vec<BookingSummary> = day.blockers.iter().map(Booking::summary).collect();
                let blockers = serde_json::to_string(&summaries)
                    .map_err(|e| user_error("XX000", format!("encoding blockers: {e}")))?;
                let free_slots = day.free_slots().count() as i32;
                Ok(query_response(availability_schema(), [day], |enc, day| {
                    enc.encode_field(&day.hall)?;
                    enc.encode_field(&day.day.to_string())?;
                    enc.encode_field(&day.available)?;
                    enc.encode_field(&day.has_approved_blockers)?;
                    enc.encode_field(&day.message())?;
                    enc.encode_field(&blockers)?;
                    enc.encode_field(&free_slots)
                }))
            }
            Command::SelectSlots { hall, day } => {
                let query = crate::engine::AvailabilityQuery::new(hall, day);
                let result = engine.day_availability(&query).await.map_err(engine_err)?;
                let hall = result.hall.clone();
                let day = result.day.to_string();
                Ok(query_response(slot_schema(), result.slots, |enc, slot| {
                    enc.encode_field(&hall)?;
                    enc.encode_field(&day)?;
                    enc.encode_field(&slot.span.start)?;
                    enc.encode_field(&slot.span.end)?;
                    enc.encode_field(&slot.free)
                }))
            }
        }
    }
}

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn booking_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("hall"),
        field("start", Type::INT8),
        field("end", Type::INT8),
        text_field("status"),
        text_field("topic"),
        text_field("department"),
        text_field("coordinator_name"),
        text_field("coordinator_number"),
        text_field("speaker_name"),
        text_field("speaker_number"),
        field("required_attendance", Type::INT8),
        text_field("requested_by"),
        field("created_at", Type::INT8),
    ]
}

fn conflict_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("hall"),
        field("start", Type::INT8),
        field("end", Type::INT8),
        text_field("status"),
        text_field("topic"),
        text_field("department"),
    ]
}

fn availability_schema() -> Vec<FieldInfo> {
    vec![
        text_field("hall"),
        text_field("day"),
        field("available", Type::BOOL),
        field("has_approved_blockers", Type::BOOL),
        text_field("message"),
        text_field("blockers"),
        field("free_slots", Type::INT4),
    ]
}

fn slot_schema() -> Vec<FieldInfo> {
    vec![
        text_field("hall"),
        text_field("day"),
        field("start", Type::INT8),
        field("end", Type::INT8),
        field("free", Type::BOOL),
    ]
}

/// Result columns for the table a statement addresses.
fn schema_for(sql: &str) -> Vec<FieldInfo> {
    match sql::target_table(sql).as_deref() {
        Some("bookings" | "decisions" | "schedule") => booking_schema(),
        Some("conflicts") => conflict_schema(),
        Some("availability") => availability_schema(),
        Some("slots") => slot_schema(),
        _ => Vec::new(),
    }
}

fn query_response<T, F>(schema: Vec<FieldInfo>, items: impl IntoIterator<Item = T>, encode: F) -> Response
where
    F: Fn(&mut DataRowEncoder, T) -> PgWireResult<()>,
{
    let schema = Arc::new(schema);
    let rows: Vec<_> = items
        .into_iter()
        .map(|item| -> PgWireResult<_> {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Response::Query(QueryResponse::new(schema, stream::iter(rows)))
}

fn booking_response(bookings: Vec<Booking>) -> Response {
    query_response(booking_schema(), bookings, |enc, b| {
        enc.encode_field(&b.id.to_string())?;
        enc.encode_field(&b.hall)?;
        enc.encode_field(&b.span.start)?;
        enc.encode_field(&b.span.end)?;
        enc.encode_field(&b.status.as_str())?;
        enc.encode_field(&b.details.topic)?;
        enc.encode_field(&b.details.department)?;
        enc.encode_field(&b.details.coordinator_name)?;
        enc.encode_field(&b.details.coordinator_number)?;
        enc.encode_field(&b.details.speaker_name)?;
        enc.encode_field(&b.details.speaker_number)?;
        enc.encode_field(&i64::from(b.details.required_attendance))?;
        enc.encode_field(&b.requested_by)?;
        enc.encode_field(&b.created_at)
    })
}

#[async_trait]
impl SimpleQueryHandler for HallbookHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        if query.trim().trim_end_matches(';').is_empty() {
            return Ok(vec![Response::EmptyQuery]);
        }
        let identity = self.resolve_identity(client)?;
        Ok(vec![self.run(identity, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct HallbookQueryParser;

#[async_trait]
impl QueryParser for HallbookQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(schema_for(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for HallbookHandler {
    type Statement = String;
    type QueryParser = HallbookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let identity = self.resolve_identity(client)?;
        let sql = substitute_params(portal);
        self.run(identity, &sql).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(param_types, schema_for(&target.statement)))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(schema_for(&target.statement.statement)))
    }
}

/// Byte range and index of every `$N` placeholder outside quoted literals
/// and quoted identifiers.
fn placeholders(sql: &str) -> Vec<(Range<usize>, usize)> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // A doubled quote closes and reopens, so it needs no special case.
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'$' => {
                let start = i;
                while i + 1 < bytes.len() && bytes[i + 1].is_ascii_digit() {
                    i += 1;
                }
                if let Ok(n) = sql[start + 1..i + 1].parse::<usize>() {
                    found.push((start..i + 1, n));
                }
            }
            None => {}
        }
        i += 1;
    }
    found
}

/// Highest `$N` placeholder in the statement.
fn count_params(sql: &str) -> usize {
    placeholders(sql).into_iter().map(|(_, n)| n).max().unwrap_or(0)
}

/// Inline bound text parameters as quoted literals in one pass over the
/// statement. Inlined values are never scanned again, so a value containing
/// `$1` stays as written.
fn inline_params<P: AsRef<[u8]>>(sql: &str, params: &[Option<P>]) -> String {
    let mut result = String::with_capacity(sql.len());
    let mut copied = 0;
    for (range, n) in placeholders(sql) {
        let Some(param) = n.checked_sub(1).and_then(|i| params.get(i)) else {
            continue;
        };
        result.push_str(&sql[copied..range.start]);
        match param {
            Some(bytes) => {
                let text = String::from_utf8_lossy(bytes.as_ref());
                result.push('\'');
                result.push_str(&text.replace('\'', "''"));
                result.push('\'');
            }
            None => result.push_str("NULL"),
        }
        copied = range.end;
    }
    result.push_str(&sql[copied..]);
    result
}

fn substitute_params(portal: &Portal<String>) -> String {
    inline_params(&portal.statement.statement, &portal.parameters)
}

// ── Factory ──────────────────────────────────────────────────────

pub struct HallbookFactory {
    handler: Arc<HallbookHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<HallbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl HallbookFactory {
    pub fn new(engine: Arc<Engine>, directory: Arc<UserDirectory>) -> Self {
        let auth_source = HallbookAuthSource::new(directory.clone());
        Self {
            handler: Arc::new(HallbookHandler::new(engine, directory)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for HallbookFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    directory: Arc<UserDirectory>,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(HallbookFactory::new(engine, directory));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new("ERROR".into(), code.into(), message)))
}

fn sqlstate(e: &EngineError) -> &'static str {
    match e {
        EngineError::Validation(_)
        | EngineError::MissingFields(_)
        | EngineError::UnknownHall(_)
        | EngineError::LimitExceeded(_) => "22023",
        EngineError::Conflict(_) => "23P01",
        EngineError::NotFound(_) => "P0002",
        EngineError::InvalidTransition { .. } => "55000",
        EngineError::Forbidden(_) => "42501",
        EngineError::WalError(_) => "58030",
    }
}

fn engine_err(e: EngineError) -> PgWireError {
    let code = sqlstate(&e);
    let message = match &e {
        EngineError::Conflict(hits) => match serde_json::to_string(hits) {
            Ok(json) => format!("{e}: {json}"),
            Err(_) => e.to_string(),
        },
        EngineError::WalError(_) => {
            tracing::error!("store unavailable: {e}");
            e.to_string()
        }
        _ => e.to_string(),
    };
    user_error(code, message)
}

fn sql_err(e: SqlError) -> PgWireError {
    user_error("42601", e.to_string())
}
