use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::model::NewRequest;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    SelectServices,
    SelectHours {
        date: Option<NaiveDate>,
    },
    SelectSlots {
        date: NaiveDate,
        service: String,
    },
    SelectRequests {
        date: Option<NaiveDate>,
    },
    InsertRequest {
        request: NewRequest,
    },
}

/// Column order for positional `INSERT INTO requests VALUES (...)`.
const REQUEST_COLUMNS: [&str; 7] = [
    "client_name",
    "phone",
    "email",
    "service",
    "date",
    "time",
    "special_requests",
];

/// Everything up to `time` must be given positionally.
const REQUIRED_POSITIONAL: usize = 6;

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    if table != "requests" {
        return Err(SqlError::UnknownTable(table));
    }
    let values = extract_insert_values(insert)?;

    let mut fields: [Option<&Expr>; 7] = [None; 7];
    if insert.columns.is_empty() {
        if values.len() < REQUIRED_POSITIONAL {
            return Err(SqlError::WrongArity("requests", REQUIRED_POSITIONAL, values.len()));
        }
        if values.len() > REQUEST_COLUMNS.len() {
            return Err(SqlError::WrongArity("requests", REQUEST_COLUMNS.len(), values.len()));
        }
        for (slot, value) in fields.iter_mut().zip(values.iter()) {
            *slot = Some(value);
        }
    } else {
        if insert.columns.len() != values.len() {
            return Err(SqlError::WrongArity("requests", insert.columns.len(), values.len()));
        }
        for (column, value) in insert.columns.iter().zip(values.iter()) {
            let name = column.value.to_lowercase();
            let idx = REQUEST_COLUMNS
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| SqlError::UnknownColumn(name.clone()))?;
            fields[idx] = Some(value);
        }
    }

    let text = |idx: usize| -> Result<Option<String>, SqlError> {
        fields[idx].map(parse_text_or_null).transpose().map(Option::flatten)
    };
    let date = fields[4]
        .map(parse_date)
        .transpose()?
        .ok_or(SqlError::MissingColumn("date"))?;

    // NULL in a required column reaches the engine as an empty field.
    let request = NewRequest {
        client_name: text(0)?.unwrap_or_default(),
        phone: text(1)?.unwrap_or_default(),
        email: text(2)?,
        service: text(3)?.unwrap_or_default(),
        date,
        time: text(5)?.unwrap_or_default(),
        special_requests: text(6)?,
    };
    Ok(Command::InsertRequest { request })
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Filters::default();
    if let Some(selection) = &select.selection {
        extract_filters(selection, &mut filters)?;
    }

    match table.as_str() {
        "services" => {
            filters.reject_any()?;
            Ok(Command::SelectServices)
        }
        "hours" => {
            filters.reject_service()?;
            Ok(Command::SelectHours { date: filters.date })
        }
        "slots" => Ok(Command::SelectSlots {
            date: filters.date.ok_or(SqlError::MissingFilter("date"))?,
            service: filters.service.ok_or(SqlError::MissingFilter("service"))?,
        }),
        "requests" => {
            filters.reject_service()?;
            Ok(Command::SelectRequests { date: filters.date })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Default)]
struct Filters {
    date: Option<NaiveDate>,
    service: Option<String>,
}

impl Filters {
    fn reject_service(&self) -> Result<(), SqlError> {
        match self.service {
            Some(_) => Err(SqlError::Unsupported("filter on service".into())),
            None => Ok(()),
        }
    }

    fn reject_any(&self) -> Result<(), SqlError> {
        self.reject_service()?;
        match self.date {
            Some(_) => Err(SqlError::Unsupported("filter on date".into())),
            None => Ok(()),
        }
    }
}

/// Collect `col = value` terms joined by AND.
fn extract_filters(expr: &Expr, filters: &mut Filters) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => extract_filters(inner, filters),
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_filters(left, filters)?;
                extract_filters(right, filters)
            }
            ast::BinaryOperator::Eq => match expr_column_name(left).as_deref() {
                Some("date") => {
                    filters.date = Some(parse_date(right)?);
                    Ok(())
                }
                Some("service") => {
                    filters.service = Some(parse_text(right)?);
                    Ok(())
                }
                Some(other) => Err(SqlError::Unsupported(format!("filter on {other}"))),
                None => Err(SqlError::Unsupported(format!("filter {expr}"))),
            },
            _ => Err(SqlError::Unsupported(format!("operator {op}"))),
        },
        _ => Err(SqlError::Unsupported(format!("filter {expr}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_values(insert: &ast::Insert) -> Result<Vec<Expr>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => match values.rows.as_slice() {
            [] => Err(SqlError::Parse("empty VALUES".into())),
            [row] => Ok(row.clone()),
            _ => Err(SqlError::Unsupported("multi-row INSERT".into())),
        },
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_text_or_null(expr: &Expr) -> Result<Option<String>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(Some(s.clone())),
        Some(value) => Err(SqlError::Parse(format!("expected string or NULL, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    parse_text_or_null(expr)?.ok_or_else(|| SqlError::Parse("unexpected NULL".into()))
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_text(expr)?;
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?}: {e}")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    UnknownColumn(String),
    WrongArity(&'static str, usize, usize),
    MissingFilter(&'static str),
    MissingColumn(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::UnknownColumn(c) => write!(f, "unknown column: {c}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}
