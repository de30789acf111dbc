use std::fmt::Debug;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use futures::stream;
use futures::Sink;
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;

use crate::auth::{Credentials, SlotbookAuthSource};
use crate::engine::{format_time, minutes_to_time, Engine};
use crate::model::*;
use crate::notify::format_price;
use crate::observability::{command_label, QUERIES_TOTAL, QUERY_DURATION_SECONDS};
use crate::sql::{self, Command};

pub struct SlotbookHandler {
    engine: Arc<Engine>,
    query_parser: Arc<SlotbookQueryParser>,
}

impl SlotbookHandler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            query_parser: Arc::new(SlotbookQueryParser),
        }
    }

    /// Parse, execute and record metrics for one statement.
    async fn run(&self, sql: &str) -> PgWireResult<Vec<Response>> {
        let cmd = match sql::parse_sql(sql) {
            Ok(cmd) => cmd,
            Err(e) => {
                metrics::counter!(QUERIES_TOTAL, "command" => "unparsed", "status" => "error")
                    .increment(1);
                return Err(sql_err(e));
            }
        };
        let label = command_label(&cmd);
        let started = Instant::now();
        let result = self.execute_command(cmd).await;
        metrics::histogram!(QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(QUERIES_TOTAL, "command" => label, "status" => status).increment(1);
        result
    }

    async fn execute_command(&self, cmd: Command) -> PgWireResult<Vec<Response>> {
        let engine = &self.engine;
        match cmd {
            Command::SelectServices => {
                let schema = Arc::new(services_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .services()
                    .into_iter()
                    .map(|service| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&service.id.as_str().to_string())?;
                        encoder.encode_field(&service.name)?;
                        encoder.encode_field(&(service.duration_minutes as i32))?;
                        encoder.encode_field(&(service.price_cents as i64))?;
                        encoder.encode_field(&format_price(service.price_cents))?;
                        encoder.encode_field(&service.description)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectHours { date } => {
                let hours = match date {
                    Some(date) => {
                        let window = engine.day_window(date).map_err(engine_err)?;
                        vec![(date.weekday(), window)]
                    }
                    None => engine.weekly_hours(),
                };
                let schema = Arc::new(hours_schema());
                let rows: Vec<PgWireResult<_>> = hours
                    .into_iter()
                    .map(|(day, window)| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&weekday_name(day).to_string())?;
                        encoder.encode_field(&minutes_to_time(window.open))?;
                        encoder.encode_field(&minutes_to_time(window.close))?;
                        encoder.encode_field(&window.closed)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectSlots { date, service } => {
                let slots = engine.available_slots(date, &service).map_err(engine_err)?;
                let schema = Arc::new(slots_schema());
                let date_str = format_date(date);
                let rows: Vec<PgWireResult<_>> = slots
                    .into_iter()
                    .map(|start| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&date_str)?;
                        encoder.encode_field(&service)?;
                        encoder.encode_field(&(start as i32))?;
                        encoder.encode_field(&minutes_to_time(start))?;
                        encoder.encode_field(&format_time(start))?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::SelectRequests { date } => {
                let schema = Arc::new(requests_schema());
                let rows: Vec<PgWireResult<_>> = engine
                    .list_requests(date)
                    .into_iter()
                    .map(|request| {
                        let mut encoder = DataRowEncoder::new(schema.clone());
                        encoder.encode_field(&request.id.to_string())?;
                        encoder.encode_field(&request.client_name)?;
                        encoder.encode_field(&request.phone)?;
                        encoder.encode_field(&request.email)?;
                        encoder.encode_field(&request.service.as_str().to_string())?;
                        encoder.encode_field(&format_date(request.date))?;
                        encoder.encode_field(&minutes_to_time(request.start))?;
                        encoder.encode_field(&request.special_requests)?;
                        encoder.encode_field(&request.status.as_str().to_string())?;
                        encoder.encode_field(&request.created_at)?;
                        Ok(encoder.take_row())
                    })
                    .collect();
                Ok(vec![Response::Query(QueryResponse::new(schema, stream::iter(rows)))])
            }
            Command::InsertRequest { request } => {
                engine.submit_request(request).await.map_err(engine_err)?;
                Ok(vec![Response::Execution(Tag::new("INSERT").with_rows(1))])
            }
        }
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn text_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn services_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("name", Type::VARCHAR),
        text_field("duration_minutes", Type::INT4),
        text_field("price_cents", Type::INT8),
        text_field("price", Type::VARCHAR),
        text_field("description", Type::VARCHAR),
    ]
}

fn hours_schema() -> Vec<FieldInfo> {
    vec![
        text_field("day", Type::VARCHAR),
        text_field("open", Type::VARCHAR),
        text_field("close", Type::VARCHAR),
        text_field("closed", Type::BOOL),
    ]
}

fn slots_schema() -> Vec<FieldInfo> {
    vec![
        text_field("date", Type::VARCHAR),
        text_field("service", Type::VARCHAR),
        text_field("start_minutes", Type::INT4),
        text_field("time", Type::VARCHAR),
        text_field("display", Type::VARCHAR),
    ]
}

fn requests_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id", Type::VARCHAR),
        text_field("client_name", Type::VARCHAR),
        text_field("phone", Type::VARCHAR),
        text_field("email", Type::VARCHAR),
        text_field("service", Type::VARCHAR),
        text_field("date", Type::VARCHAR),
        text_field("time", Type::VARCHAR),
        text_field("special_requests", Type::VARCHAR),
        text_field("status", Type::VARCHAR),
        text_field("created_at", Type::INT8),
    ]
}

/// Row shape of a statement, judged from the table after `FROM`.
fn result_schema(sql: &str) -> Vec<FieldInfo> {
    let upper = sql.to_uppercase();
    let mut words = upper.split_whitespace();
    if words.next() != Some("SELECT") {
        return vec![];
    }
    let table = words
        .skip_while(|w| *w != "FROM")
        .nth(1)
        .map(|w| w.trim_end_matches(';'));
    match table {
        Some("SERVICES") => services_schema(),
        Some("HOURS") => hours_schema(),
        Some("SLOTS") => slots_schema(),
        Some("REQUESTS") => requests_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for SlotbookHandler {
    async fn do_query<C>(
        &self,
        _client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        self.run(query).await
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct SlotbookQueryParser;

#[async_trait]
impl QueryParser for SlotbookQueryParser {
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
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for SlotbookHandler {
    type Statement = String;
    type QueryParser = SlotbookQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        _client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql = substitute_params(portal);
        let mut responses = self.run(&sql).await?;
        Ok(responses.remove(0))
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
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
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
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Count the highest $N parameter placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let mut max = 0usize;
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            i += 1;
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > start {
                if let Ok(n) = sql[start..i].parse::<usize>() {
                    max = max.max(n);
                }
            }
        } else {
            i += 1;
        }
    }
    max
}

/// Substitute $1, $2, ... placeholders with bound parameter values (text format).
fn substitute_params(portal: &Portal<String>) -> String {
    let params: Vec<Option<String>> = portal
        .parameters
        .iter()
        .map(|p| p.as_ref().map(|bytes| String::from_utf8_lossy(bytes).into_owned()))
        .collect();
    substitute(&portal.statement.statement, &params)
}

/// One left-to-right pass over the statement text. Bound values are copied
/// out verbatim (quoted) and never scanned again; `$N` inside a quoted
/// literal, or past the last bound parameter, is left as written.
fn substitute(sql: &str, params: &[Option<String>]) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.char_indices().peekable();
    let mut in_literal = false;
    while let Some((i, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
        }
        if c != '$' || in_literal {
            out.push(c);
            continue;
        }
        let mut end = i + 1;
        while let Some(&(j, d)) = chars.peek() {
            if !d.is_ascii_digit() {
                break;
            }
            end = j + 1;
            chars.next();
        }
        let param = sql[i + 1..end]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|idx| params.get(idx));
        match param {
            Some(Some(text)) => {
                out.push('\'');
                out.push_str(&text.replace('\'', "''"));
                out.push('\'');
            }
            Some(None) => out.push_str("NULL"),
            None => out.push_str(&sql[i..end]),
        }
    }
    out
}

// ── Factory ──────────────────────────────────────────────────────

pub struct SlotbookFactory {
    handler: Arc<SlotbookHandler>,
    auth_handler:
        Arc<CleartextPasswordAuthStartupHandler<SlotbookAuthSource, DefaultServerParameterProvider>>,
    noop: Arc<NoopHandler>,
}

impl SlotbookFactory {
    pub fn new(engine: Arc<Engine>, credentials: Credentials) -> Self {
        let auth_source = SlotbookAuthSource::new(credentials);
        let param_provider = DefaultServerParameterProvider::default();
        Self {
            handler: Arc::new(SlotbookHandler::new(engine)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                auth_source,
                param_provider,
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for SlotbookFactory {
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
    credentials: Credentials,
    tls: Option<TlsAcceptor>,
) -> io::Result<()> {
    let factory = Arc::new(SlotbookFactory::new(engine, credentials));
    pgwire::tokio::process_socket(socket, tls, factory).await
}

fn engine_err(e: crate::engine::EngineError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "P0001".into(),
        e.to_string(),
    )))
}

fn sql_err(e: crate::sql::SqlError) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        "42601".into(),
        e.to_string(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM services"), 0);
        assert_eq!(
            count_params("SELECT * FROM slots WHERE date = $1 AND service = $2"),
            2
        );
        assert_eq!(count_params("SELECT $3, $1"), 3);
    }

    #[test]
    fn substitutes_and_quotes_params() {
        let sql = "INSERT INTO requests VALUES ($1, $2, $3, $4, $5, $6)";
        let params = vec![
            Some("O'Brien".to_string()),
            Some("555".to_string()),
            None,
            Some("gel".to_string()),
            Some("2025-06-02".to_string()),
            Some("14:00".to_string()),
        ];
        assert_eq!(
            substitute(sql, &params),
            "INSERT INTO requests VALUES ('O''Brien', '555', NULL, 'gel', '2025-06-02', '14:00')"
        );
    }

    #[test]
    fn substitution_handles_double_digit_placeholders() {
        let params: Vec<Option<String>> = (1..=10).map(|i| Some(i.to_string())).collect();
        assert_eq!(substitute("$1 $10", &params), "'1' '10'");
    }

    #[test]
    fn bound_text_is_not_rescanned() {
        let params = vec![
            Some("Ada".to_string()),
            Some("under $1 please".to_string()),
        ];
        assert_eq!(
            substitute("VALUES ($1, $2)", &params),
            "VALUES ('Ada', 'under $1 please')"
        );

        let params = vec![Some("$2".to_string()), Some("x' OR '1".to_string())];
        assert_eq!(
            substitute("VALUES ($1, $2)", &params),
            "VALUES ('$2', 'x'' OR ''1')"
        );
    }

    #[test]
    fn placeholders_in_literals_and_out_of_range_stay_put() {
        let params = vec![Some("gel".to_string())];
        assert_eq!(
            substitute("SELECT '$1', $1, $2, $", &params),
            "SELECT '$1', 'gel', $2, $"
        );
    }

    #[test]
    fn schema_follows_table() {
        assert_eq!(result_schema("SELECT * FROM services").len(), 6);
        assert_eq!(result_schema("select * from hours where date = $1").len(), 4);
        assert_eq!(
            result_schema("SELECT * FROM slots WHERE date = $1 AND service = $2").len(),
            5
        );
        assert_eq!(result_schema("SELECT * FROM requests;").len(), 10);
        assert!(result_schema("INSERT INTO requests VALUES ($1)").is_empty());
    }
}
