use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::calendar::{parse_day, parse_instant};
use crate::engine::{AvailabilityQuery, BookingFilter, Decision, SearchFilters};
use crate::model::*;

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// `INSERT INTO bookings (...) VALUES (...)`
    SubmitBooking { booking: NewBooking },
    /// `INSERT INTO decisions (id, status) VALUES ('<ulid>', 'Approved')`
    DecideBooking { id: Ulid, decision: Decision },
    /// `SELECT * FROM bookings [WHERE id = .. | hall = .. AND status = .. AND department = ..]`
    SelectBookings { id: Option<Ulid>, filter: BookingFilter },
    /// `SELECT * FROM schedule WHERE hall = ..`: the hall's non-rejected bookings.
    SelectSchedule { hall: String },
    /// `SELECT * FROM conflicts WHERE hall = .. AND start >= .. AND "end" <= ..`
    SelectConflicts { hall: String, start: Ms, end: Ms },
    /// `SELECT * FROM availability WHERE hall = .. AND day = .. [AND topic = .. ...]`
    SelectAvailability { query: AvailabilityQuery },
    /// `SELECT * FROM slots WHERE hall = .. AND day = ..`
    SelectSlots { hall: String, day: NaiveDate },
}

/// Column order for `INSERT INTO bookings VALUES (...)` without a column list.
pub const BOOKING_COLUMNS: [&str; 10] = [
    "hall",
    "start",
    "end",
    "topic",
    "department",
    "coordinator_name",
    "coordinator_number",
    "speaker_name",
    "speaker_number",
    "required_attendance",
];

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(first) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match first {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Table addressed by an INSERT or SELECT, without interpreting its values.
/// Used to describe result columns of statements that still carry `$n`
/// placeholders.
pub fn target_table(sql: &str) -> Option<String> {
    let stmts = Parser::parse_sql(&PostgreSqlDialect {}, sql).ok()?;
    match stmts.first()? {
        Statement::Insert(insert) => insert_table_name(insert).ok(),
        Statement::Query(query) => match query.body.as_ref() {
            SetExpr::Select(select) => table_factor_name(&select.from.first()?.relation).ok(),
            _ => None,
        },
        _ => None,
    }
}

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let rows = extract_all_insert_rows(insert)?;
    if rows.len() != 1 {
        return Err(SqlError::Unsupported(format!("{table}: one row per INSERT")));
    }
    let values = &rows[0];

    let columns: Vec<String> = insert.columns.iter().map(|c| c.value.to_lowercase()).collect();

    match table.as_str() {
        "bookings" => parse_booking_row(&columns, values),
        "decisions" => {
            let cols = resolve_columns(&columns, &["id", "status"], values.len(), "decisions")?;
            let mut id = None;
            let mut decision = None;
            for (col, expr) in cols.iter().zip(values) {
                match col.as_str() {
                    "id" => id = Some(parse_ulid_expr(expr)?),
                    "status" | "decision" => {
                        decision = Some(parse_text(expr)?.parse::<Decision>().map_err(SqlError::Parse)?)
                    }
                    other => return Err(SqlError::UnknownColumn(other.to_string())),
                }
            }
            Ok(Command::DecideBooking {
                id: id.ok_or(SqlError::MissingColumn("id"))?,
                decision: decision.ok_or(SqlError::MissingColumn("status"))?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Map an explicit column list, or fall back to the table's positional order.
fn resolve_columns(
    columns: &[String],
    positional: &[&str],
    arity: usize,
    table: &'static str,
) -> Result<Vec<String>, SqlError> {
    if columns.is_empty() {
        if arity != positional.len() {
            return Err(SqlError::WrongArity(table, positional.len(), arity));
        }
        return Ok(positional.iter().map(|c| c.to_string()).collect());
    }
    if columns.len() != arity {
        return Err(SqlError::WrongArity(table, columns.len(), arity));
    }
    Ok(columns.to_vec())
}

/// Missing descriptive columns are left empty so the engine can report
/// every missing field in one error.
fn parse_booking_row(columns: &[String], values: &[Expr]) -> Result<Command, SqlError> {
    let cols = resolve_columns(columns, &BOOKING_COLUMNS, values.len(), "bookings")?;
    let mut hall = String::new();
    let (mut start, mut end) = (None, None);
    let mut details = BookingDetails::default();

    for (col, expr) in cols.iter().zip(values) {
        match col.as_str() {
            "hall" => hall = parse_text(expr)?,
            "start" => start = Some(parse_instant_expr(expr)?),
            "end" => end = Some(parse_instant_expr(expr)?),
            "topic" => details.topic = parse_text(expr)?,
            "department" => details.department = parse_text(expr)?,
            "coordinator_name" => details.coordinator_name = parse_text(expr)?,
            "coordinator_number" => details.coordinator_number = parse_text(expr)?,
            "speaker_name" => details.speaker_name = parse_text(expr)?,
            "speaker_number" => details.speaker_number = parse_text(expr)?,
            "required_attendance" => details.required_attendance = parse_u32_or_null(expr)?,
            other => return Err(SqlError::UnknownColumn(other.to_string())),
        }
    }

    Ok(Command::SubmitBooking {
        booking: NewBooking {
            hall,
            start: start.ok_or(SqlError::MissingColumn("start"))?,
            end: end.ok_or(SqlError::MissingColumn("end"))?,
            details,
        },
    })
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;

    let mut preds = Vec::new();
    if let Some(selection) = &select.selection {
        collect_predicates(selection, &mut preds)?;
    }
    let filters = Filters(preds);

    match table.as_str() {
        "bookings" => {
            let id = filters.eq("id").map(parse_ulid_expr).transpose()?;
            let status = filters
                .eq("status")
                .map(|e| -> Result<BookingStatus, SqlError> {
                    parse_text(e)?.parse().map_err(SqlError::Parse)
                })
                .transpose()?;
            Ok(Command::SelectBookings {
                id,
                filter: BookingFilter {
                    hall: filters.eq_text("hall")?,
                    status,
                    department: filters.eq_text("department")?,
                },
            })
        }
        "schedule" => Ok(Command::SelectSchedule {
            hall: filters.eq_text("hall")?.ok_or(SqlError::MissingFilter("hall"))?,
        }),
        "conflicts" => Ok(Command::SelectConflicts {
            hall: filters.eq_text("hall")?.ok_or(SqlError::MissingFilter("hall"))?,
            start: filters
                .get("start", Cmp::GtEq)
                .map(parse_instant_expr)
                .transpose()?
                .ok_or(SqlError::MissingFilter("start"))?,
            end: filters
                .get("end", Cmp::LtEq)
                .map(parse_instant_expr)
                .transpose()?
                .ok_or(SqlError::MissingFilter("end"))?,
        }),
        "availability" => {
            let hall = filters.eq_text("hall")?.ok_or(SqlError::MissingFilter("hall"))?;
            let day = filters.day()?;
            Ok(Command::SelectAvailability {
                query: AvailabilityQuery {
                    hall,
                    day,
                    filters: SearchFilters {
                        coordinator_name: filters.eq_text("coordinator_name")?,
                        speaker_name: filters.eq_text("speaker_name")?,
                        department: filters.eq_text("department")?,
                        topic: filters.eq_text("topic")?,
                    },
                },
            })
        }
        "slots" => Ok(Command::SelectSlots {
            hall: filters.eq_text("hall")?.ok_or(SqlError::MissingFilter("hall"))?,
            day: filters.day()?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Eq,
    GtEq,
    LtEq,
}

/// Column comparisons from a WHERE clause of `AND`-joined terms.
struct Filters<'a>(Vec<(String, Cmp, &'a Expr)>);

impl<'a> Filters<'a> {
    fn get(&self, column: &str, cmp: Cmp) -> Option<&'a Expr> {
        self.0
            .iter()
            .find(|(c, op, _)| c == column && *op == cmp)
            .map(|(_, _, e)| *e)
    }

    fn eq(&self, column: &str) -> Option<&'a Expr> {
        self.get(column, Cmp::Eq)
    }

    fn eq_text(&self, column: &str) -> Result<Option<String>, SqlError> {
        self.eq(column).map(parse_text).transpose()
    }

    fn day(&self) -> Result<NaiveDate, SqlError> {
        let raw = self.eq_text("day")?.ok_or(SqlError::MissingFilter("day"))?;
        parse_day(&raw).map_err(SqlError::Parse)
    }
}

fn collect_predicates<'a>(expr: &'a Expr, out: &mut Vec<(String, Cmp, &'a Expr)>) -> Result<(), SqlError> {
    match expr {
        Expr::Nested(inner) => collect_predicates(inner, out),
        Expr::BinaryOp { left, op, right } => {
            let cmp = match op {
                ast::BinaryOperator::And => {
                    collect_predicates(left, out)?;
                    return collect_predicates(right, out);
                }
                ast::BinaryOperator::Eq => Cmp::Eq,
                ast::BinaryOperator::GtEq => Cmp::GtEq,
                ast::BinaryOperator::LtEq => Cmp::LtEq,
                other => return Err(SqlError::Unsupported(format!("operator {other} in WHERE"))),
            };
            let col = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("expected column on the left of {op}")))?;
            out.push((col, cmp, right.as_ref()));
            Ok(())
        }
        other => Err(SqlError::Unsupported(format!("WHERE term {other}"))),
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

fn extract_all_insert_rows(insert: &ast::Insert) -> Result<Vec<Vec<Expr>>, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) => {
            if values.rows.is_empty() {
                return Err(SqlError::Parse("empty VALUES".into()));
            }
            Ok(values.rows.clone())
        }
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

fn parse_ulid_expr(expr: &Expr) -> Result<Ulid, SqlError> {
    let s = parse_text(expr)?;
    Ulid::from_string(s.trim()).map_err(|e| SqlError::Parse(format!("bad ULID {s:?}: {e}")))
}

/// String literal, bare number, or NULL (as empty).
fn parse_text(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) | Some(Value::Number(s, _)) => Ok(s.clone()),
        Some(Value::Null) => Ok(String::new()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr}"))),
    }
}

fn parse_i64_expr(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .trim()
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer {s:?}: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64_expr(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr}")))
    }
}

/// Unix milliseconds, or an RFC 3339 string.
fn parse_instant_expr(expr: &Expr) -> Result<Ms, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => parse_instant(s).map_err(SqlError::Parse),
        _ => parse_i64_expr(expr),
    }
}

/// NULL maps to 0, which the engine reports as a missing attendance.
fn parse_u32_or_null(expr: &Expr) -> Result<u32, SqlError> {
    if let Some(Value::Null) = extract_value(expr) {
        return Ok(0);
    }
    let v = parse_i64_expr(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of range")))
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("{0}: expected {1} values, got {2}")]
    WrongArity(&'static str, usize, usize),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    fn full_insert(start: &str, end: &str) -> String {
        format!(
            r#"INSERT INTO bookings (hall, start, "end", topic, department, coordinator_name, coordinator_number, speaker_name, speaker_number, required_attendance)
               VALUES ('Auditorium', {start}, {end}, 'Quantum Seminar', 'Physics', 'Ada', '5550100', 'Grace', '5550101', 120)"#
        )
    }

    #[test]
    fn parse_submit_booking_with_columns() {
        let cmd = parse_sql(&full_insert("1714572000000", "1714575600000")).unwrap();
        match cmd {
            Command::SubmitBooking { booking } => {
                assert_eq!(booking.hall, "Auditorium");
                assert_eq!(booking.start, 1_714_572_000_000);
                assert_eq!(booking.end, 1_714_575_600_000);
                assert_eq!(booking.details.topic, "Quantum Seminar");
                assert_eq!(booking.details.speaker_number, "5550101");
                assert_eq!(booking.details.required_attendance, 120);
            }
            _ => panic!("expected SubmitBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_submit_booking_with_rfc3339_instants() {
        let cmd = parse_sql(&full_insert("'2024-05-01T14:00:00Z'", "'2024-05-01T16:00:00+01:00'")).unwrap();
        match cmd {
            Command::SubmitBooking { booking } => {
                assert_eq!(booking.start, 1_714_572_000_000);
                assert_eq!(booking.end, 1_714_575_600_000);
            }
            _ => panic!("expected SubmitBooking, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_submit_booking_positional() {
        let sql = "INSERT INTO bookings VALUES ('Lab', 1000, 2000, 't', 'd', 'c', '1', 's', '2', 5)";
        match parse_sql(sql).unwrap() {
            Command::SubmitBooking { booking } => {
                assert_eq!(booking.hall, "Lab");
                assert_eq!(booking.details.required_attendance, 5);
            }
            cmd => panic!("expected SubmitBooking, got {cmd:?}"),
        }
        assert!(matches!(
            parse_sql("INSERT INTO bookings VALUES ('Lab', 1000, 2000)"),
            Err(SqlError::WrongArity("bookings", 10, 3))
        ));
    }

    #[test]
    fn parse_submit_booking_leaves_missing_fields_empty() {
        let sql = r#"INSERT INTO bookings (hall, start, "end", topic) VALUES ('Lab', 1000, 2000, 'Talk')"#;
        match parse_sql(sql).unwrap() {
            Command::SubmitBooking { booking } => {
                assert_eq!(booking.details.topic, "Talk");
                assert!(booking.details.department.is_empty());
                assert_eq!(booking.details.required_attendance, 0);
            }
            cmd => panic!("expected SubmitBooking, got {cmd:?}"),
        }
        assert!(matches!(
            parse_sql("INSERT INTO bookings (hall, start) VALUES ('Lab', 1000)"),
            Err(SqlError::MissingColumn("end"))
        ));
    }

    #[test]
    fn parse_submit_booking_rejects_unknown_column() {
        let sql = r#"INSERT INTO bookings (hall, start, "end", colour) VALUES ('Lab', 1000, 2000, 'red')"#;
        assert!(matches!(parse_sql(sql), Err(SqlError::UnknownColumn(c)) if c == "colour"));
    }

    #[test]
    fn parse_multi_row_insert_is_unsupported() {
        let sql = "INSERT INTO decisions (id, status) VALUES ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'Approved'), ('01ARZ3NDEKTSV4RRFFQ69G5FAV', 'Rejected')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_decision() {
        let sql = format!("INSERT INTO decisions (id, status) VALUES ('{ID}', 'Approved')");
        match parse_sql(&sql).unwrap() {
            Command::DecideBooking { id, decision } => {
                assert_eq!(id.to_string(), ID);
                assert_eq!(decision, Decision::Approve);
            }
            cmd => panic!("expected DecideBooking, got {cmd:?}"),
        }

        let sql = format!("INSERT INTO decisions VALUES ('{ID}', 'reject')");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::DecideBooking { decision: Decision::Reject, .. }
        ));

        let sql = format!("INSERT INTO decisions VALUES ('{ID}', 'Pending')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_select_bookings_filters() {
        let sql = "SELECT * FROM bookings WHERE hall = 'Auditorium' AND status = 'approved' AND department = 'Physics'";
        match parse_sql(sql).unwrap() {
            Command::SelectBookings { id, filter } => {
                assert_eq!(id, None);
                assert_eq!(filter.hall.as_deref(), Some("Auditorium"));
                assert_eq!(filter.status, Some(BookingStatus::Approved));
                assert_eq!(filter.department.as_deref(), Some("Physics"));
            }
            cmd => panic!("expected SelectBookings, got {cmd:?}"),
        }

        match parse_sql("SELECT * FROM bookings").unwrap() {
            Command::SelectBookings { id, filter } => {
                assert_eq!(id, None);
                assert_eq!(filter, BookingFilter::default());
            }
            cmd => panic!("expected SelectBookings, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_booking_by_id() {
        let sql = format!("SELECT * FROM bookings WHERE id = '{ID}'");
        match parse_sql(&sql).unwrap() {
            Command::SelectBookings { id, .. } => assert_eq!(id.map(|i| i.to_string()).as_deref(), Some(ID)),
            cmd => panic!("expected SelectBookings, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_schedule() {
        let cmd = parse_sql("SELECT * FROM schedule WHERE hall = 'Auditorium'").unwrap();
        assert_eq!(cmd, Command::SelectSchedule { hall: "Auditorium".into() });
        assert!(matches!(
            parse_sql("SELECT * FROM schedule"),
            Err(SqlError::MissingFilter("hall"))
        ));
    }

    #[test]
    fn parse_select_conflicts() {
        let sql = r#"SELECT * FROM conflicts WHERE hall = 'Auditorium' AND start >= 1000 AND "end" <= 2000"#;
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectConflicts {
                hall: "Auditorium".into(),
                start: 1000,
                end: 2000
            }
        );
        let sql = "SELECT * FROM conflicts WHERE hall = 'Auditorium' AND start >= 1000";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("end"))));
    }

    #[test]
    fn parse_select_availability_with_filters() {
        let sql = "SELECT * FROM availability WHERE hall = 'Auditorium' AND day = '2024-05-01' AND (topic = 'quantum' AND speaker_name = 'grace')";
        match parse_sql(sql).unwrap() {
            Command::SelectAvailability { query } => {
                assert_eq!(query.hall, "Auditorium");
                assert_eq!(query.day, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
                assert_eq!(query.filters.topic.as_deref(), Some("quantum"));
                assert_eq!(query.filters.speaker_name.as_deref(), Some("grace"));
                assert_eq!(query.filters.department, None);
            }
            cmd => panic!("expected SelectAvailability, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_select_availability_requires_day() {
        let sql = "SELECT * FROM availability WHERE hall = 'Auditorium'";
        assert!(matches!(parse_sql(sql), Err(SqlError::MissingFilter("day"))));
        let sql = "SELECT * FROM availability WHERE hall = 'Auditorium' AND day = '2024-13-01'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_select_slots() {
        let sql = "SELECT * FROM slots WHERE hall = 'Auditorium' AND day = '2024-05-01'";
        assert_eq!(
            parse_sql(sql).unwrap(),
            Command::SelectSlots {
                hall: "Auditorium".into(),
                day: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            }
        );
    }

    #[test]
    fn parse_where_rejects_unsupported_operators() {
        let sql = "SELECT * FROM bookings WHERE hall = 'A' OR hall = 'B'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("SELECT * FROM rooms"),
            Err(SqlError::UnknownTable(t)) if t == "rooms"
        ));
        assert!(matches!(
            parse_sql("DELETE FROM bookings"),
            Err(SqlError::Unsupported(_))
        ));
    }

    #[test]
    fn target_table_tolerates_placeholders() {
        assert_eq!(
            target_table("SELECT * FROM slots WHERE hall = $1 AND day = $2").as_deref(),
            Some("slots")
        );
        assert_eq!(
            target_table("INSERT INTO decisions (id, status) VALUES ($1, $2)").as_deref(),
            Some("decisions")
        );
        assert_eq!(target_table("not sql at all"), None);
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}
