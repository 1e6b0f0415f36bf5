use dbx_core::{
    API_VERSION, BackendOutcome, BasicOps, BindMethod, ColumnType, DbOption, Driver, Error,
    ErrorKind, Escape, LoOps, LoStream, OptionValue, Registry, Result, ResultOps, RowStatus,
    Severity, TlsMode,
};
use std::{
    borrow::Cow,
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

/// Counters observing the calls the core makes into the scripted backend.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub setups: Arc<AtomicUsize>,
    pub teardowns: Arc<AtomicUsize>,
    pub row_fetches: Arc<AtomicUsize>,
    pub result_finishes: Arc<AtomicUsize>,
    pub lo_closes: Arc<AtomicUsize>,
    pub lo_finishes: Arc<AtomicUsize>,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn hit(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Behaviour of a [`ScriptedDriver`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedConfig {
    /// Time the first result of a statement takes to become available.
    pub latency: Duration,
    /// Escape with backslashes instead of the core fallback.
    pub native_escape: bool,
    /// Enables large objects with the given maximum transfer size.
    pub large_objects: Option<usize>,
    /// Credential required by `bind`.
    pub password: Option<String>,
    pub fail_setup: bool,
    pub counters: Counters,
}

/// In-memory backend answering a tiny SQL dialect, used to exercise the
/// core without a database.
///
/// Understood statements:
/// - `SELECT <literal> [AS name], ... [UNION ALL SELECT ...]` where literals
///   are `NULL`, numbers and quoted strings.
/// - `SELECT LOB <name>` returns a locator of a large object. Objects named
///   `ro_*` refuse writes.
/// - `CREATE`, `DROP`, `BEGIN`, `COMMIT`, `ROLLBACK` (no rows) and `INSERT`,
///   `UPDATE`, `DELETE` (no rows, one affected).
/// - `DISCONNECT` fails with a fatal error.
#[derive(Debug)]
pub struct ScriptedDriver {
    config: ScriptedConfig,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl ScriptedDriver {
    pub fn new(config: ScriptedConfig) -> Self {
        Self {
            config,
            objects: Default::default(),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.config.counters
    }
}

impl Driver for ScriptedDriver {
    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&self, host: Option<&str>, _port: Option<&str>) -> Result<Box<dyn BasicOps>> {
        if host == Some("unreachable") {
            return Err(Error::msg("Can't reach host unreachable"));
        }
        Ok(Box::new(ScriptedConnection {
            config: self.config.clone(),
            objects: self.objects.clone(),
            database: None,
            pending: VecDeque::new(),
            ready_at: None,
            last_error: None,
            tls: TlsMode::Never,
            multi_statements: true,
            mode: String::new(),
            connect_timeout: 0,
        }))
    }

    fn setup(&self) -> Result<()> {
        Counters::hit(&self.config.counters.setups);
        if self.config.fail_setup {
            return Err(Error::msg("Scripted backend refused to start"));
        }
        Ok(())
    }

    fn teardown(&self) {
        Counters::hit(&self.config.counters.teardowns);
    }
}

/// Register a scripted backend under `name`.
pub fn register_scripted(
    registry: &Registry,
    name: &str,
    config: ScriptedConfig,
) -> Arc<ScriptedDriver> {
    let driver = Arc::new(ScriptedDriver::new(config));
    registry.register(name, driver.clone());
    driver
}

#[derive(Debug, Clone, PartialEq)]
enum Statement {
    Rows {
        columns: Vec<String>,
        types: Vec<ColumnType>,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    },
    NoRows {
        affected: u64,
    },
}

struct ScriptedConnection {
    config: ScriptedConfig,
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    database: Option<String>,
    pending: VecDeque<Statement>,
    ready_at: Option<Instant>,
    last_error: Option<(String, Severity)>,
    tls: TlsMode,
    multi_statements: bool,
    mode: String,
    connect_timeout: i64,
}

impl ScriptedConnection {
    fn fail(&mut self, message: String, severity: Severity) -> Error {
        let error = Error::msg(message.clone());
        self.last_error = Some((message, severity));
        error
    }
}

impl BasicOps for ScriptedConnection {
    fn bind(
        &mut self,
        database: &str,
        _principal: Option<&str>,
        credential: Option<&str>,
        method: BindMethod,
    ) -> Result<()> {
        if method != BindMethod::Simple {
            return Err(Error::with_detail(
                ErrorKind::NotSupported,
                format!("Bind method {} is not supported", method.id()),
            ));
        }
        if let Some(password) = &self.config.password
            && credential != Some(password.as_str())
        {
            return Err(self.fail("Access denied".into(), Severity::Fatal));
        }
        self.database = Some(database.into());
        self.last_error = None;
        Ok(())
    }

    fn unbind(&mut self) -> Result<()> {
        self.database = None;
        self.pending.clear();
        self.ready_at = None;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.unbind()?;
        self.last_error = None;
        Ok(())
    }

    fn get_option(&self, option: DbOption) -> Result<OptionValue> {
        Ok(match option {
            DbOption::ApiVersion => OptionValue::Int(API_VERSION),
            DbOption::ThreadSafe => OptionValue::Flag(true),
            DbOption::Tls => OptionValue::Tls(self.tls),
            DbOption::MultiStatements => OptionValue::Flag(self.multi_statements),
            DbOption::PagedResults | DbOption::Compress => OptionValue::Flag(false),
            DbOption::Mode => OptionValue::Text(self.mode.clone()),
            DbOption::ConnectTimeout => OptionValue::Int(self.connect_timeout),
            DbOption::LibVersion => return Err(Error::new(ErrorKind::InvalidOption)),
        })
    }

    fn set_option(&mut self, option: DbOption, value: OptionValue) -> Result<()> {
        match (option, value) {
            (DbOption::Tls, OptionValue::Tls(TlsMode::Always)) => {
                Err(Error::with_detail(
                    ErrorKind::OptionWriteFailed,
                    "The scripted backend has no encryption",
                ))
            }
            (DbOption::Tls, OptionValue::Tls(mode)) => {
                self.tls = mode;
                Ok(())
            }
            (DbOption::MultiStatements, OptionValue::Flag(v)) => {
                self.multi_statements = v;
                Ok(())
            }
            (DbOption::PagedResults | DbOption::Compress, OptionValue::Flag(false)) => Ok(()),
            (DbOption::PagedResults | DbOption::Compress, OptionValue::Flag(true)) => {
                Err(Error::new(ErrorKind::OptionWriteFailed))
            }
            (DbOption::Mode, OptionValue::Text(mode)) => {
                self.mode = mode;
                Ok(())
            }
            (DbOption::ConnectTimeout, OptionValue::Int(v)) if v >= 0 => {
                self.connect_timeout = v;
                Ok(())
            }
            (DbOption::ApiVersion | DbOption::ThreadSafe | DbOption::LibVersion, _) => {
                Err(Error::new(ErrorKind::OptionReadOnly))
            }
            _ => Err(Error::new(ErrorKind::InvalidParam)),
        }
    }

    fn error(&self) -> Cow<'_, str> {
        match &self.last_error {
            Some((message, _)) => Cow::Borrowed(message),
            None => Cow::Borrowed(""),
        }
    }

    fn error_type(&self) -> Severity {
        self.last_error
            .as_ref()
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::None)
    }

    fn query(&mut self, sql: &[u8]) -> Result<()> {
        if self.database.is_none() {
            return Err(self.fail("Not connected".into(), Severity::Fatal));
        }
        let sql = std::str::from_utf8(sql)?;
        let parts = split_statements(sql);
        if parts.len() > 1 && !self.multi_statements {
            return Err(self.fail(
                "Multiple statements are disabled".into(),
                Severity::Recoverable,
            ));
        }
        let mut pending = VecDeque::with_capacity(parts.len());
        for part in parts {
            match parse_statement(part) {
                Ok(statement) => pending.push_back(statement),
                Err((message, severity)) => return Err(self.fail(message, severity)),
            }
        }
        self.pending = pending;
        self.ready_at = Some(Instant::now() + self.config.latency);
        self.last_error = None;
        Ok(())
    }

    fn result(&mut self, timeout: Option<Duration>, _chunk: u64) -> Result<BackendOutcome> {
        if self.pending.is_empty() {
            return Ok(BackendOutcome::Done);
        }
        if let Some(ready_at) = self.ready_at {
            let remaining = ready_at.saturating_duration_since(Instant::now());
            match timeout {
                Some(timeout) if timeout < remaining => {
                    thread::sleep(timeout);
                    return Ok(BackendOutcome::Timeout);
                }
                _ => thread::sleep(remaining),
            }
            self.ready_at = None;
        }
        let Some(statement) = self.pending.pop_front() else {
            return Ok(BackendOutcome::Done);
        };
        let counters = self.config.counters.clone();
        Ok(match statement {
            Statement::Rows {
                columns,
                types,
                rows,
            } => BackendOutcome::Rows(Box::new(ScriptedCursor {
                columns,
                types,
                rows,
                next: 0,
                current: None,
                affected: 0,
                counters,
            })),
            Statement::NoRows { affected } => BackendOutcome::NoRows(Box::new(ScriptedCursor {
                columns: Vec::new(),
                types: Vec::new(),
                rows: Vec::new(),
                next: 0,
                current: None,
                affected,
                counters,
            })),
        })
    }

    fn escaper(&self) -> Option<&dyn Escape> {
        if self.config.native_escape {
            Some(self as &dyn Escape)
        } else {
            None
        }
    }

    fn large_objects(&self) -> Option<&dyn LoOps> {
        if self.config.large_objects.is_some() {
            Some(self as &dyn LoOps)
        } else {
            None
        }
    }
}

impl Escape for ScriptedConnection {
    fn escape(&self, input: &[u8], output: &mut Vec<u8>) -> Result<()> {
        for &b in input {
            if b == b'\'' || b == b'\\' {
                output.push(b'\\');
            }
            output.push(b);
        }
        Ok(())
    }
}

impl LoOps for ScriptedConnection {
    fn open(&self, _result: &dyn ResultOps, locator: &[u8]) -> Result<Box<dyn LoStream>> {
        let name = std::str::from_utf8(locator)?;
        Ok(Box::new(ScriptedObject {
            objects: self.objects.clone(),
            name: name.into(),
            position: 0,
            staged: Vec::new(),
            max_transfer: self.config.large_objects.unwrap_or(usize::MAX),
            counters: self.config.counters.clone(),
        }))
    }
}

struct ScriptedCursor {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    rows: Vec<Vec<Option<Vec<u8>>>>,
    next: usize,
    current: Option<usize>,
    affected: u64,
    counters: Counters,
}

impl ResultOps for ScriptedCursor {
    fn row_fetch(&mut self) -> Result<RowStatus> {
        Counters::hit(&self.counters.row_fetches);
        if self.next < self.rows.len() {
            self.current = Some(self.next);
            self.next += 1;
            Ok(RowStatus::Next)
        } else {
            self.current = None;
            Ok(RowStatus::Done)
        }
    }

    fn rows_affected(&self) -> u64 {
        self.affected
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, pos: usize) -> Option<&str> {
        self.columns.get(pos).map(String::as_str)
    }

    fn column_type(&self, pos: usize) -> Result<ColumnType> {
        self.types
            .get(pos)
            .copied()
            .ok_or_else(|| Error::new(ErrorKind::InvalidParam))
    }

    fn field_length(&self, pos: usize) -> usize {
        self.field_value(pos).map(<[u8]>::len).unwrap_or(0)
    }

    fn field_value(&self, pos: usize) -> Option<&[u8]> {
        self.rows.get(self.current?)?.get(pos)?.as_deref()
    }

    fn finish(self: Box<Self>) -> Result<()> {
        Counters::hit(&self.counters.result_finishes);
        Ok(())
    }
}

struct ScriptedObject {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    name: String,
    position: usize,
    staged: Vec<u8>,
    max_transfer: usize,
    counters: Counters,
}

impl ScriptedObject {
    fn objects(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| Error::msg("The large object store is poisoned"))
    }
}

impl LoStream for ScriptedObject {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let position = self.position;
        let read = {
            let objects = self.objects()?;
            let data = objects.get(&self.name).map(Vec::as_slice).unwrap_or_default();
            let available = data.get(position..).unwrap_or_default();
            let read = available.len().min(buffer.len());
            buffer[..read].copy_from_slice(&available[..read]);
            read
        };
        self.position += read;
        Ok(read)
    }

    fn write(&mut self, buffer: &[u8]) -> Result<usize> {
        if self.name.starts_with("ro_") {
            return Err(Error::msg(format!(
                "Large object `{}` is read only",
                self.name
            )));
        }
        self.staged.extend_from_slice(buffer);
        Ok(buffer.len())
    }

    fn max_transfer(&self) -> usize {
        self.max_transfer
    }

    fn finish_write(&mut self) -> Result<()> {
        Counters::hit(&self.counters.lo_finishes);
        let staged = std::mem::take(&mut self.staged);
        self.objects()?.insert(self.name.clone(), staged);
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        Counters::hit(&self.counters.lo_closes);
        Ok(())
    }
}

fn split_statements(sql: &str) -> Vec<&str> {
    let mut statements = Vec::new();
    let mut quoted = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in sql.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '\'' => quoted = !quoted,
            ';' if !quoted => {
                statements.push(&sql[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(&sql[start..]);
    statements
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

type ParseError = (String, Severity);

fn syntax_error(near: &str) -> ParseError {
    let near: String = near.chars().take(20).collect();
    (
        format!("Syntax error near \"{}\"", near),
        Severity::Recoverable,
    )
}

fn parse_statement(text: &str) -> std::result::Result<Statement, ParseError> {
    let mut cursor = Cursor { text, pos: 0 };
    let keyword = cursor.word().to_ascii_uppercase();
    match keyword.as_str() {
        "SELECT" => {
            cursor.pos = 0;
            parse_select(&mut cursor)
        }
        "CREATE" | "DROP" | "BEGIN" | "COMMIT" | "ROLLBACK" => {
            Ok(Statement::NoRows { affected: 0 })
        }
        "INSERT" | "UPDATE" | "DELETE" => Ok(Statement::NoRows { affected: 1 }),
        "DISCONNECT" => Err(("Connection lost".into(), Severity::Fatal)),
        _ => Err(syntax_error(text)),
    }
}

fn parse_select(cursor: &mut Cursor<'_>) -> std::result::Result<Statement, ParseError> {
    let mut columns = Vec::new();
    let mut types = Vec::new();
    let mut rows = Vec::new();
    loop {
        cursor.skip_whitespace();
        if !cursor.keyword("SELECT") {
            return Err(syntax_error(cursor.rest()));
        }
        cursor.skip_whitespace();
        if rows.is_empty() && cursor.keyword("LOB") {
            cursor.skip_whitespace();
            let name = cursor.word();
            if name.is_empty() || !cursor.at_end() {
                return Err(syntax_error(cursor.rest()));
            }
            return Ok(Statement::Rows {
                columns: vec!["locator".into()],
                types: vec![ColumnType::Blob],
                rows: vec![vec![Some(name.as_bytes().to_vec())]],
            });
        }
        let fields = parse_fields(cursor)?;
        if rows.is_empty() {
            columns = fields.iter().map(|(name, _, _)| name.clone()).collect();
            types = fields.iter().map(|(_, _, ty)| *ty).collect();
        } else if fields.len() != columns.len() {
            return Err((
                "SELECTs to the left and right of UNION ALL do not have the same number of result columns".into(),
                Severity::Recoverable,
            ));
        }
        rows.push(fields.into_iter().map(|(_, value, _)| value).collect());
        cursor.skip_whitespace();
        if cursor.at_end() {
            break;
        }
        if !(cursor.keyword("UNION") && {
            cursor.skip_whitespace();
            cursor.keyword("ALL")
        }) {
            return Err(syntax_error(cursor.rest()));
        }
    }
    Ok(Statement::Rows {
        columns,
        types,
        rows,
    })
}

type Field = (String, Option<Vec<u8>>, ColumnType);

fn parse_fields(cursor: &mut Cursor<'_>) -> std::result::Result<Vec<Field>, ParseError> {
    let mut fields = Vec::new();
    loop {
        cursor.skip_whitespace();
        let start = cursor.pos;
        let (value, ty) = if cursor.rest().starts_with('\'') {
            (Some(cursor.string()?), ColumnType::Clob)
        } else {
            let word = cursor.word();
            if word.eq_ignore_ascii_case("NULL") {
                (None, ColumnType::Unknown)
            } else if word.parse::<i64>().is_ok() {
                (Some(word.as_bytes().to_vec()), ColumnType::BigInt)
            } else if word.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
                && word.parse::<f64>().is_ok()
            {
                (Some(word.as_bytes().to_vec()), ColumnType::Double)
            } else if word.is_empty() {
                return Err(syntax_error(cursor.rest()));
            } else {
                return Err((format!("No such column: {}", word), Severity::Recoverable));
            }
        };
        let mut name = cursor.text[start..cursor.pos].to_string();
        cursor.skip_whitespace();
        if cursor.keyword("AS") {
            cursor.skip_whitespace();
            let alias = cursor.word();
            if alias.is_empty() {
                return Err(syntax_error(cursor.rest()));
            }
            name = alias.into();
            cursor.skip_whitespace();
        }
        fields.push((name, value, ty));
        if !cursor.eat(',') {
            return Ok(fields);
        }
    }
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.rest().trim().is_empty()
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, c: char) -> bool {
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            return true;
        }
        false
    }

    /// Consume `keyword` when it is the next whole word, ignoring case.
    fn keyword(&mut self, keyword: &str) -> bool {
        let rest = self.rest();
        let matches = rest
            .get(..keyword.len())
            .is_some_and(|s| s.eq_ignore_ascii_case(keyword))
            && !rest[keyword.len()..].starts_with(is_word_char);
        if matches {
            self.pos += keyword.len();
        }
        matches
    }

    fn word(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !is_word_char(c))
            .unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn string(&mut self) -> std::result::Result<Vec<u8>, ParseError> {
        let start = self.pos;
        if !self.eat('\'') {
            return Err(syntax_error(self.rest()));
        }
        let mut value = String::new();
        let mut chars = self.rest().char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => value.push(escaped),
                    None => break,
                },
                '\'' if self.rest()[i + 1..].starts_with('\'') => {
                    value.push('\'');
                    chars.next();
                }
                '\'' => {
                    self.pos += i + 1;
                    return Ok(value.into_bytes());
                }
                c => value.push(c),
            }
        }
        Err((
            format!("Unterminated string {}", &self.text[start..]),
            Severity::Recoverable,
        ))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-' | '+')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(statement: Statement) -> Vec<Vec<Option<Vec<u8>>>> {
        match statement {
            Statement::Rows { rows, .. } => rows,
            other => panic!("Expected rows, got {:?}", other),
        }
    }

    #[test]
    fn statements_are_split_outside_quotes() {
        assert_eq!(
            split_statements("SELECT 'a;b'; SELECT 2;;  "),
            vec!["SELECT 'a;b'", "SELECT 2"]
        );
        assert_eq!(
            split_statements(r"SELECT 'it\'s;'; SELECT 1"),
            vec![r"SELECT 'it\'s;'", "SELECT 1"]
        );
    }

    #[test]
    fn select_literals() {
        let statement = parse_statement("select 1 AS one, 'it''s' AS two, NULL, 2.5").unwrap();
        let Statement::Rows {
            columns,
            types,
            rows,
        } = statement
        else {
            panic!("Expected rows");
        };
        assert_eq!(columns, ["one", "two", "NULL", "2.5"]);
        assert_eq!(
            types,
            [
                ColumnType::BigInt,
                ColumnType::Clob,
                ColumnType::Unknown,
                ColumnType::Double
            ]
        );
        assert_eq!(
            rows,
            vec![vec![
                Some(b"1".to_vec()),
                Some(b"it's".to_vec()),
                None,
                Some(b"2.5".to_vec())
            ]]
        );
    }

    #[test]
    fn union_all() {
        let rows = rows(parse_statement("SELECT 1 AS n UNION ALL SELECT 2 UNION ALL SELECT ''").unwrap());
        assert_eq!(
            rows,
            vec![
                vec![Some(b"1".to_vec())],
                vec![Some(b"2".to_vec())],
                vec![Some(Vec::new())]
            ]
        );
        assert!(parse_statement("SELECT 1 UNION ALL SELECT 1, 2").is_err());
    }

    #[test]
    fn backslash_escapes() {
        let rows = rows(parse_statement(r"SELECT 'a\'b\\c'").unwrap());
        assert_eq!(rows, vec![vec![Some(br"a'b\c".to_vec())]]);
    }

    #[test]
    fn other_statements() {
        assert_eq!(
            parse_statement("INSERT INTO t VALUES (1)").unwrap(),
            Statement::NoRows { affected: 1 }
        );
        assert_eq!(
            parse_statement("create table t (a int)").unwrap(),
            Statement::NoRows { affected: 0 }
        );
        assert_eq!(parse_statement("SELEC 1").unwrap_err().1, Severity::Recoverable);
        assert_eq!(parse_statement("DISCONNECT").unwrap_err().1, Severity::Fatal);
        assert!(parse_statement("SELECT 'open").is_err());
        assert!(parse_statement("SELECT column_name").is_err());
    }
}
