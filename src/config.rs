//! Config lexer, parser, and service extraction (Component A).
use std::{fmt, fs, path::Path};

use indexmap::IndexMap;
use nix::sys::signal::Signal;
use tracing::warn;

use crate::error::ConfigError;

const WHITESPACE: &str = " \t\r\n";

/// A parsed configuration leaf or nested table.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Table(IndexMap<String, ConfigValue>),
}

impl ConfigValue {
    pub fn as_table(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// A single lexical token plus its value and the position just past it.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    BareKey(String),
    String(String),
    Int(i64),
    Float(f64),
    Equal,
    Semicolon,
    LeftBrace,
    RightBrace,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BareKey(_) => write!(f, "barekey"),
            Token::String(_) => write!(f, "string"),
            Token::Int(_) | Token::Float(_) => write!(f, "number"),
            Token::Equal => write!(f, "'='"),
            Token::Semicolon => write!(f, "';'"),
            Token::LeftBrace => write!(f, "'{{'"),
            Token::RightBrace => write!(f, "'}}'"),
            Token::Eof => write!(f, "EOF"),
        }
    }
}

fn is_delimiter(c: char) -> bool {
    WHITESPACE.contains(c) || matches!(c, '=' | ';' | '{' | '}' | '#')
}

fn char_at(bytes: &[u8], pos: usize) -> Option<char> {
    bytes.get(pos).map(|&b| b as char)
}

/// Scans exactly one token starting at `pos`, skipping leading whitespace
/// and comments first. Returns the token and the position immediately
/// after it.
fn scan(s: &str, mut pos: usize) -> Result<(Token, usize), ConfigError> {
    let bytes = s.as_bytes();

    loop {
        match char_at(bytes, pos) {
            None => return Ok((Token::Eof, s.len())),
            Some(c) if WHITESPACE.contains(c) => pos += 1,
            Some('#') => {
                pos = skip_comment(bytes, pos);
                continue;
            }
            _ => break,
        }
    }

    let c = char_at(bytes, pos).expect("checked above");
    match c {
        '=' => Ok((Token::Equal, pos + 1)),
        ';' => Ok((Token::Semicolon, pos + 1)),
        '{' => Ok((Token::LeftBrace, pos + 1)),
        '}' => Ok((Token::RightBrace, pos + 1)),
        c if c.is_ascii_digit() || c == '+' || c == '-' => scan_number(s, pos),
        '.' if char_at(bytes, pos + 1).is_some_and(|d| d.is_ascii_digit()) => scan_number(s, pos),
        c if c.is_alphabetic() || c == '_' => scan_barekey(s, pos),
        '\'' | '"' => scan_string(s, pos),
        other => Err(parse_error(format!("Unexpected character '{other}'"))),
    }
}

/// Consumes a `#` comment up to and including its terminating newline. An
/// unterminated trailing comment (no newline before EOF) is consumed to
/// EOF instead of left in place, to avoid looping forever on a re-scan.
fn skip_comment(bytes: &[u8], start: usize) -> usize {
    let mut pos = start;
    while let Some(c) = char_at(bytes, pos) {
        pos += 1;
        if c == '\n' || c == '\r' {
            return pos;
        }
    }
    pos
}

fn scan_barekey(s: &str, start: usize) -> Result<(Token, usize), ConfigError> {
    let bytes = s.as_bytes();
    let mut pos = start;

    let first = char_at(bytes, pos).unwrap();
    if !first.is_alphabetic() && first != '_' {
        return Err(parse_error(format!(
            "Unexpected character '{first}' while scanning key"
        )));
    }
    pos += 1;

    loop {
        match char_at(bytes, pos) {
            None => return Ok((Token::BareKey(s[start..pos].to_string()), pos)),
            Some(c) if is_delimiter(c) => return Ok((Token::BareKey(s[start..pos].to_string()), pos)),
            Some(c) if c.is_alphanumeric() || c == '_' => pos += 1,
            Some(c) => {
                return Err(parse_error(format!(
                    "Unexpected character '{c}' while scanning key"
                )));
            }
        }
    }
}

fn scan_number(s: &str, start: usize) -> Result<(Token, usize), ConfigError> {
    let bytes = s.as_bytes();
    let mut pos = start;

    if matches!(char_at(bytes, pos), Some('+') | Some('-')) {
        pos += 1;
    }

    match char_at(bytes, pos) {
        Some('0') => pos += 1,
        Some(c) if c.is_ascii_digit() => {
            while char_at(bytes, pos).is_some_and(|c| c.is_ascii_digit()) {
                pos += 1;
            }
        }
        other => {
            return Err(parse_error(format!(
                "Unpexected character '{}' while scanning number",
                other.map(String::from).unwrap_or_else(|| "EOF".into())
            )));
        }
    }

    let mut is_float = false;

    if char_at(bytes, pos) == Some('.') {
        is_float = true;
        pos += 1;
        while char_at(bytes, pos).is_some_and(|c| c.is_ascii_digit()) {
            pos += 1;
        }
    }

    if matches!(char_at(bytes, pos), Some('e') | Some('E')) {
        is_float = true;
        pos += 1;
        if matches!(char_at(bytes, pos), Some('+') | Some('-')) {
            pos += 1;
        }
        while char_at(bytes, pos).is_some_and(|c| c.is_ascii_digit()) {
            pos += 1;
        }
    }

    match char_at(bytes, pos) {
        Some(c) if !is_delimiter(c) => {
            return Err(parse_error(format!(
                "Unpexected character '{c}' while scanning number"
            )));
        }
        _ => {}
    }

    let lexeme = &s[start..pos];
    let token = if is_float {
        Token::Float(
            lexeme
                .parse::<f64>()
                .map_err(|_| parse_error(format!("invalid numeric literal '{lexeme}'")))?,
        )
    } else {
        match lexeme.parse::<i64>() {
            Ok(n) => Token::Int(n),
            Err(_) => Token::Float(
                lexeme
                    .parse::<f64>()
                    .map_err(|_| parse_error(format!("invalid numeric literal '{lexeme}'")))?,
            ),
        }
    };
    Ok((token, pos))
}

fn scan_string(s: &str, start: usize) -> Result<(Token, usize), ConfigError> {
    let bytes = s.as_bytes();
    let quote = char_at(bytes, start).unwrap();
    let mut pos = start + 1;
    let mut buf = String::new();

    loop {
        let c = char_at(bytes, pos).ok_or_else(|| parse_error("EOL while scanning string"))?;
        if c == quote {
            return Ok((Token::String(buf), pos + 1));
        }
        if c == '\r' || c == '\n' {
            return Err(parse_error("EOL while scanning string"));
        }
        if c == '\\' {
            pos += 1;
            let escaped =
                char_at(bytes, pos).ok_or_else(|| parse_error("EOL while scanning string"))?;
            let mapped = match escaped {
                '\\' => '\\',
                'b' => '\u{8}',
                'f' => '\u{c}',
                'v' => '\u{b}',
                't' => '\t',
                'r' => '\r',
                'n' => '\n',
                other => other,
            };
            buf.push(mapped);
            pos += 1;
            continue;
        }
        buf.push(c);
        pos += 1;
    }
}

fn parse_error(message: impl Into<String>) -> ConfigError {
    ConfigError::Parse(message.into())
}

/// Walks tokens over the source text; the only mutable state is the
/// cursor position.
struct Scanner<'a> {
    data: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(data: &'a str) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Result<Token, ConfigError> {
        scan(self.data, self.pos).map(|(tok, _)| tok)
    }

    fn next(&mut self) -> Result<Token, ConfigError> {
        let (tok, pos) = scan(self.data, self.pos)?;
        self.pos = pos;
        Ok(tok)
    }
}

fn expect_key(scanner: &mut Scanner) -> Result<String, ConfigError> {
    match scanner.next()? {
        Token::BareKey(key) | Token::String(key) => Ok(key),
        other => Err(parse_error(format!("Unexpected token {other}"))),
    }
}

fn expect_semicolon(scanner: &mut Scanner) -> Result<(), ConfigError> {
    match scanner.next()? {
        Token::Semicolon => Ok(()),
        other => Err(parse_error(format!("Unexpected token {other}"))),
    }
}

fn resolve_reserved(lexeme: &str) -> Option<bool> {
    match lexeme {
        "true" | "yes" | "on" => Some(true),
        "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Inserts `key: value`, logging a warning (not an error) on collision;
/// the later value always wins.
fn update_leaf(table: &mut IndexMap<String, ConfigValue>, key: String, value: ConfigValue) {
    if table.contains_key(&key) {
        warn!(%key, "duplicated entry");
    }
    table.insert(key, value);
}

/// Merges a parsed section body into `table` at the path given by `keys`,
/// creating intermediate tables as needed. Recursive (rather than
/// iterative-with-reborrows) to sidestep holding a chained `&mut` across
/// loop iterations.
fn update_section(
    table: &mut IndexMap<String, ConfigValue>,
    keys: &[String],
    value: IndexMap<String, ConfigValue>,
) {
    let (head, rest) = keys.split_first().expect("keys is non-empty");

    if rest.is_empty() {
        match table.get_mut(head) {
            None => {
                table.insert(head.clone(), ConfigValue::Table(value));
            }
            Some(ConfigValue::Table(existing)) => {
                for (k, v) in value {
                    update_leaf(existing, k, v);
                }
            }
            Some(_) => {
                // A leaf key collides with a section header; the section wins.
                warn!(key = %head, "duplicated entry");
                table.insert(head.clone(), ConfigValue::Table(value));
            }
        }
        return;
    }

    let sub_table = match table.entry(head.clone()).or_insert_with(|| ConfigValue::Table(IndexMap::new())) {
        ConfigValue::Table(sub) => sub,
        slot => {
            *slot = ConfigValue::Table(IndexMap::new());
            match slot {
                ConfigValue::Table(sub) => sub,
                _ => unreachable!(),
            }
        }
    };
    update_section(sub_table, rest, value);
}

/// Parses one object body: either the whole file (`depth == 0`) or the
/// inside of a `{ ... }` block (`depth > 0`, already past the `{`).
fn parse_body(
    scanner: &mut Scanner,
    depth: usize,
) -> Result<IndexMap<String, ConfigValue>, ConfigError> {
    let mut table = IndexMap::new();

    loop {
        match scanner.peek()? {
            Token::Eof => {
                if depth > 0 {
                    return Err(parse_error("Unclosed block"));
                }
                return Ok(table);
            }
            Token::RightBrace => {
                if depth < 1 {
                    return Err(parse_error("Unexpected token '}'"));
                }
                scanner.next()?;
                return Ok(table);
            }
            _ => {}
        }

        let key = expect_key(scanner)?;

        if matches!(scanner.peek()?, Token::Equal) {
            scanner.next()?;
            let value = match scanner.next()? {
                Token::BareKey(lexeme) => match resolve_reserved(&lexeme) {
                    Some(b) => ConfigValue::Bool(b),
                    None => ConfigValue::String(lexeme),
                },
                Token::Int(n) => ConfigValue::Int(n),
                Token::Float(n) => ConfigValue::Float(n),
                Token::String(s) => ConfigValue::String(s),
                other => return Err(parse_error(format!("Unexpected token {other}"))),
            };
            update_leaf(&mut table, key, value);
            expect_semicolon(scanner)?;
            continue;
        }

        let mut keys = vec![key];
        loop {
            match scanner.next()? {
                Token::BareKey(subkey) | Token::String(subkey) => keys.push(subkey),
                Token::LeftBrace => {
                    let body = parse_body(scanner, depth + 1)?;
                    update_section(&mut table, &keys, body);
                    break;
                }
                other => return Err(parse_error(format!("Unexpected token {other}"))),
            }
        }
    }
}

/// Parses a complete config document from a string.
pub fn parse(source: &str) -> Result<ConfigValue, ConfigError> {
    let mut scanner = Scanner::new(source);
    Ok(ConfigValue::Table(parse_body(&mut scanner, 0)?))
}

/// Reads a config file from disk and parses it.
pub fn load_file(path: &Path) -> Result<ConfigValue, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}

/// Typed view of one `service.<name> { ... }` section.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub command: String,
    pub num_processes: u32,
    pub stop_signal: Signal,
    pub extra: IndexMap<String, ConfigValue>,
}

const DEFAULT_NUM_PROCESSES: u32 = 1;
const DEFAULT_STOP_SIGNAL: Signal = Signal::SIGTERM;

/// Maps a signal name (e.g. `"SIGTERM"` or `"TERM"`) to a [`Signal`].
/// Hand-rolled rather than relying on a `FromStr` impl, over the full set
/// of POSIX signals a service might reasonably request.
pub fn parse_signal(name: &str) -> Option<Signal> {
    let canonical = name.trim();
    let stripped = canonical.strip_prefix("SIG").unwrap_or(canonical);
    let signal = match stripped.to_ascii_uppercase().as_str() {
        "HUP" => Signal::SIGHUP,
        "INT" => Signal::SIGINT,
        "QUIT" => Signal::SIGQUIT,
        "ILL" => Signal::SIGILL,
        "TRAP" => Signal::SIGTRAP,
        "ABRT" => Signal::SIGABRT,
        "BUS" => Signal::SIGBUS,
        "FPE" => Signal::SIGFPE,
        "KILL" => Signal::SIGKILL,
        "USR1" => Signal::SIGUSR1,
        "SEGV" => Signal::SIGSEGV,
        "USR2" => Signal::SIGUSR2,
        "PIPE" => Signal::SIGPIPE,
        "ALRM" => Signal::SIGALRM,
        "TERM" => Signal::SIGTERM,
        "CHLD" => Signal::SIGCHLD,
        "CONT" => Signal::SIGCONT,
        "STOP" => Signal::SIGSTOP,
        "TSTP" => Signal::SIGTSTP,
        "TTIN" => Signal::SIGTTIN,
        "TTOU" => Signal::SIGTTOU,
        "URG" => Signal::SIGURG,
        "XCPU" => Signal::SIGXCPU,
        "XFSZ" => Signal::SIGXFSZ,
        "VTALRM" => Signal::SIGVTALRM,
        "PROF" => Signal::SIGPROF,
        "WINCH" => Signal::SIGWINCH,
        "SYS" => Signal::SIGSYS,
        _ => return None,
    };
    Some(signal)
}

/// Extracts one typed [`ServiceConfig`] from a parsed section body.
fn build_service_config(
    name: &str,
    section: &IndexMap<String, ConfigValue>,
) -> Result<ServiceConfig, ConfigError> {
    let command = section
        .get("command")
        .and_then(ConfigValue::as_str)
        .ok_or_else(|| ConfigError::MissingCommand(name.to_string()))?
        .to_string();

    let num_processes = match section.get("num_processes") {
        None => DEFAULT_NUM_PROCESSES,
        Some(value) => {
            let n = value.as_int().ok_or_else(|| ConfigError::InvalidNumProcesses {
                service: name.to_string(),
                value: format!("{value:?}"),
            })?;
            if n < 1 {
                return Err(ConfigError::InvalidNumProcesses {
                    service: name.to_string(),
                    value: n.to_string(),
                });
            }
            n as u32
        }
    };

    let stop_signal = match section.get("stop_signal") {
        None => DEFAULT_STOP_SIGNAL,
        Some(value) => {
            let name_str = value.as_str().unwrap_or_default();
            parse_signal(name_str).ok_or_else(|| ConfigError::UnknownSignal {
                service: name.to_string(),
                signal: name_str.to_string(),
            })?
        }
    };

    let extra = section
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "command" | "num_processes" | "stop_signal"))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    Ok(ServiceConfig {
        command,
        num_processes,
        stop_signal,
        extra,
    })
}

/// Walks the top-level `service` table and extracts a typed config per
/// named subsection, preserving insertion order.
pub fn build_services(root: &ConfigValue) -> Result<Vec<(String, ServiceConfig)>, ConfigError> {
    let table = root.as_table().ok_or(ConfigError::MissingServiceSection)?;
    let service_section = table
        .get("service")
        .and_then(ConfigValue::as_table)
        .ok_or(ConfigError::MissingServiceSection)?;

    service_section
        .iter()
        .map(|(name, value)| {
            let section = value
                .as_table()
                .ok_or_else(|| ConfigError::MissingCommand(name.clone()))?;
            Ok((name.clone(), build_service_config(name, section)?))
        })
        .collect()
}
