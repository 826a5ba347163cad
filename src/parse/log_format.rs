//! Apache-style log format strings compiled to line-matching regexes

use super::timestamp::parse_timestamp;
use super::ParsedRow;
use crate::error::{Error, Result};
use crate::models::Request;
use regex::Regex;
use std::collections::HashSet;

/// Body of a quoted field; Apache escapes `"` and `\` inside it
const QUOTED: &str = r#"(?:[^"\\]|\\.)*"#;

/// A compiled access-log format
#[derive(Debug, Clone)]
pub struct LogFormat {
    pattern: Regex,
}

impl LogFormat {
    /// Compile a format such as `%h %l %u %t "%r" %>s %b "%{Referer}i" "%{User-Agent}i"`.
    ///
    /// The format must name the client (`%h` or `%a`), the time (`%t`) and the
    /// URL (`%r` or `%U`).
    pub fn compile(format: &str) -> Result<Self> {
        let mut regex_src = String::from("^");
        let mut groups: HashSet<&'static str> = HashSet::new();
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                regex_src.push_str(&regex::escape(&c.to_string()));
                continue;
            }

            // Status modifiers (`%>s`, `%<s`) don't change the field shape
            while matches!(chars.peek(), Some('>') | Some('<')) {
                chars.next();
            }

            let mut header = None;
            if chars.peek() == Some(&'{') {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(Error::Config(format!(
                                "Unterminated %{{...}} in log format: {}",
                                format
                            )))
                        }
                    }
                }
                header = Some(name);
            }

            let directive = chars.next().ok_or_else(|| {
                Error::Config(format!("Dangling '%' at end of log format: {}", format))
            })?;

            let piece = match (directive, header.as_deref()) {
                ('%', None) => "%".to_string(),
                ('h', None) | ('a', None) => capture(&mut groups, "host", r"\S+"),
                ('l', None) | ('u', None) => r"\S+".to_string(),
                ('t', None) => format!(r"\[{}\]", capture(&mut groups, "time", r"[^\]]+")),
                ('r', None) => capture(&mut groups, "request", QUOTED),
                ('s', None) => capture(&mut groups, "status", r"\S+"),
                ('U', None) => capture(&mut groups, "url", r"[^\s?]+"),
                ('q', None) => capture(&mut groups, "query", r"\S*"),
                ('b', None) | ('B', None) | ('D', None) | ('T', None) | ('O', None)
                | ('I', None) | ('v', None) | ('V', None) | ('p', None) => r"\S+".to_string(),
                ('i', Some(name)) if name.eq_ignore_ascii_case("referer") => {
                    capture(&mut groups, "referer", QUOTED)
                }
                ('i', Some(name)) if name.eq_ignore_ascii_case("user-agent") => {
                    capture(&mut groups, "user_agent", QUOTED)
                }
                ('i', Some(_)) => QUOTED.to_string(),
                (other, _) => {
                    return Err(Error::Config(format!(
                        "Unsupported log format directive '%{}' in: {}",
                        other, format
                    )))
                }
            };
            regex_src.push_str(&piece);
        }
        regex_src.push('$');

        if !groups.contains("host") {
            return Err(Error::Config(
                "Log format must include a client field (%h or %a)".to_string(),
            ));
        }
        if !groups.contains("time") {
            return Err(Error::Config(
                "Log format must include a time field (%t)".to_string(),
            ));
        }
        if !groups.contains("request") && !groups.contains("url") {
            return Err(Error::Config(
                "Log format must include a request field (%r or %U)".to_string(),
            ));
        }

        Ok(Self {
            pattern: Regex::new(&regex_src)?,
        })
    }

    /// Normalize one line; `line_no` is 1-based and only used in errors
    pub fn parse_line(&self, line: &str, line_no: usize, timestamp_format: &str) -> Result<ParsedRow> {
        let caps = self
            .pattern
            .captures(line)
            .ok_or_else(|| Error::parse(line_no, "line does not match log format"))?;

        let client_id = caps
            .name("host")
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let time = caps.name("time").map(|m| m.as_str()).unwrap_or_default();
        let timestamp =
            parse_timestamp(time, timestamp_format).map_err(|e| Error::parse(line_no, e))?;

        let url = match caps.name("url") {
            Some(path) => {
                let query = caps.name("query").map(|m| m.as_str()).unwrap_or_default();
                format!("{}{}", path.as_str(), query)
            }
            None => {
                let request_line = caps.name("request").map(|m| m.as_str()).unwrap_or_default();
                url_from_request_line(&unescape(request_line))
                    .ok_or_else(|| Error::parse(line_no, "empty request line"))?
            }
        };

        let response_code = match caps.name("status").map(|m| m.as_str()) {
            None | Some("-") => None,
            Some(code) => Some(code.parse::<u16>().map_err(|_| {
                Error::parse(line_no, format!("invalid response code {:?}", code))
            })?),
        };

        let mut request = Request::new(timestamp, url);
        request.referer = optional_field(caps.name("referer").map(|m| m.as_str()));
        request.response_code = response_code;

        Ok(ParsedRow {
            client_id,
            user_agent: optional_field(caps.name("user_agent").map(|m| m.as_str())),
            request,
        })
    }
}

fn capture(groups: &mut HashSet<&'static str>, name: &'static str, body: &str) -> String {
    if groups.insert(name) {
        format!("(?P<{}>{})", name, body)
    } else {
        format!("(?:{})", body)
    }
}

/// `GET /path HTTP/1.1` -> `/path`. An unescaped target may contain spaces.
fn url_from_request_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line == "-" {
        return None;
    }
    let Some((_method, rest)) = line.split_once(char::is_whitespace) else {
        return Some(line.to_string());
    };
    let rest = rest.trim_start();
    let target = match rest.rsplit_once(char::is_whitespace) {
        Some((target, protocol)) if protocol.starts_with("HTTP/") => target.trim_end(),
        _ => rest,
    };
    Some(target.to_string())
}

/// Undo Apache's `\"` and `\\` escapes; other sequences stay as written
fn unescape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\\')) => out.push(next),
            Some(next) => {
                out.push('\\');
                out.push(next);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn optional_field(value: Option<&str>) -> Option<String> {
    match value {
        None | Some("") | Some("-") => None,
        Some(v) => Some(unescape(v)),
    }
}
