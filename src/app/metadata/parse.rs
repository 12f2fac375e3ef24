//! Script header parsing
//!
//! Extracts [`ScriptMetadata`] from the comment header of a user script.
//! Two forms are accepted: an explicit `==UserScript==` ... `==/UserScript==`
//! block, or a bare run of `// @key value` comment lines at the top of the
//! file.
//!
//! [`extract`] is written to be called repeatedly on growing prefixes of the
//! same text: it returns `Ok(None)` while the header cannot be complete yet
//! (block opened but not closed, or a leading comment run that may still be
//! growing) and has no side effects, so a caller can simply retry on the next
//! chunk. [`extract_complete`] is the strict variant for text known to be
//! final, where "not yet" becomes a hard error.

use url::Url;

use crate::constants::parser;
use crate::errors::{ParseError, ParseResult};

use super::types::ScriptMetadata;

/// Attempt extraction against a possibly-incomplete script text
///
/// Returns `Ok(None)` when the text does not yet contain a parseable header.
///
/// # Errors
///
/// Returns `ParseError` for a header that is present and complete but
/// malformed. Callers streaming the script decide whether that is fatal
/// based on whether the transfer has finished.
pub fn extract(text: &str, origin: Option<&Url>) -> ParseResult<Option<ScriptMetadata>> {
    match header_slice(text) {
        HeaderSlice::Closed(lines) => {
            let builder = parse_directives(&lines, origin)?;
            builder.finish().map(Some)
        }
        HeaderSlice::Unclosed => Ok(None),
        HeaderSlice::Absent => {
            let (lines, terminated) = leading_comment_run(text);
            if !terminated {
                // The comment run may still be growing.
                return Ok(None);
            }
            let builder = parse_directives(&lines, origin)?;
            if builder.name.is_none() {
                // A leading comment block without @name is not a header.
                return Ok(None);
            }
            builder.finish().map(Some)
        }
    }
}

/// Extraction against text known to be complete
///
/// # Errors
///
/// Returns `ParseError::HeaderNotClosed` for an unterminated block,
/// `ParseError::HeaderMissing` when no header can be found at all, and the
/// usual directive errors otherwise.
pub fn extract_complete(text: &str, origin: Option<&Url>) -> ParseResult<ScriptMetadata> {
    match header_slice(text) {
        HeaderSlice::Closed(lines) => parse_directives(&lines, origin)?.finish(),
        HeaderSlice::Unclosed => Err(ParseError::HeaderNotClosed),
        HeaderSlice::Absent => {
            let (lines, _) = leading_comment_run(text);
            let builder = parse_directives(&lines, origin)?;
            if builder.is_empty() {
                Err(ParseError::HeaderMissing)
            } else {
                builder.finish()
            }
        }
    }
}

enum HeaderSlice<'a> {
    /// Block present and closed; holds the lines between the markers
    Closed(Vec<(usize, &'a str)>),
    /// Block opened but the closing marker has not appeared
    Unclosed,
    /// No block markers in the text
    Absent,
}

fn header_slice(text: &str) -> HeaderSlice<'_> {
    let mut in_block = false;
    let mut lines = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let Some(content) = comment_body(line) else {
            continue;
        };
        if !in_block {
            if content == parser::HEADER_START {
                in_block = true;
            }
        } else if content == parser::HEADER_END {
            return HeaderSlice::Closed(lines);
        } else {
            lines.push((index + 1, line));
        }
    }

    if in_block {
        HeaderSlice::Unclosed
    } else {
        HeaderSlice::Absent
    }
}

/// The run of comment lines at the top of the text
///
/// The second value is true when a non-comment line follows the run, i.e.
/// the run cannot grow any further as more text arrives.
fn leading_comment_run(text: &str) -> (Vec<(usize, &str)>, bool) {
    let mut lines = Vec::new();
    for (index, line) in text.lines().enumerate() {
        if comment_body(line).is_some() {
            lines.push((index + 1, line));
        } else {
            return (lines, true);
        }
    }
    (lines, false)
}

fn comment_body(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(parser::COMMENT_PREFIX)
        .map(str::trim)
}

#[derive(Default)]
struct MetadataBuilder {
    name: Option<String>,
    namespace: Option<String>,
    version: Option<String>,
    description: Option<String>,
    icon_url: Option<Url>,
    require_urls: Vec<Url>,
    resource_urls: Vec<(String, Url)>,
}

impl MetadataBuilder {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.namespace.is_none()
            && self.icon_url.is_none()
            && self.require_urls.is_empty()
            && self.resource_urls.is_empty()
    }

    fn finish(self) -> ParseResult<ScriptMetadata> {
        let name = self.name.ok_or(ParseError::MissingName)?;
        Ok(ScriptMetadata {
            name,
            namespace: self.namespace.unwrap_or_default(),
            version: self.version,
            description: self.description,
            icon_url: self.icon_url,
            require_urls: self.require_urls,
            resource_urls: self.resource_urls,
        })
    }
}

fn parse_directives(lines: &[(usize, &str)], origin: Option<&Url>) -> ParseResult<MetadataBuilder> {
    let mut builder = MetadataBuilder::default();

    for &(line_no, raw) in lines {
        let Some(content) = comment_body(raw) else {
            continue;
        };
        let Some(body) = content.strip_prefix(parser::DIRECTIVE_PREFIX) else {
            continue;
        };

        let malformed = || ParseError::MalformedDirective {
            line: line_no,
            content: raw.trim().to_string(),
        };

        let (key, value) = match body.split_once(char::is_whitespace) {
            Some((key, value)) => (key, value.trim()),
            None => (body, ""),
        };
        if key.is_empty() {
            return Err(malformed());
        }

        match key {
            "name" => {
                if value.is_empty() {
                    return Err(malformed());
                }
                builder.name = Some(value.to_string());
            }
            "namespace" => builder.namespace = Some(value.to_string()),
            "version" => builder.version = Some(value.to_string()),
            "description" => builder.description = Some(value.to_string()),
            "icon" | "iconURL" => {
                if value.is_empty() {
                    return Err(malformed());
                }
                builder.icon_url = Some(resolve_url(value, origin)?);
            }
            "require" => {
                if value.is_empty() {
                    return Err(malformed());
                }
                builder.require_urls.push(resolve_url(value, origin)?);
            }
            "resource" => {
                let Some((name, url_value)) = value.split_once(char::is_whitespace) else {
                    return Err(malformed());
                };
                let name = name.trim();
                let url_value = url_value.trim();
                if name.is_empty() || url_value.is_empty() {
                    return Err(malformed());
                }
                if builder.resource_urls.iter().any(|(n, _)| n == name) {
                    return Err(ParseError::DuplicateResource {
                        name: name.to_string(),
                    });
                }
                builder
                    .resource_urls
                    .push((name.to_string(), resolve_url(url_value, origin)?));
            }
            // Directives this installer does not act on (@match, @grant, ...)
            // are preserved in the script content itself.
            _ => {}
        }
    }

    Ok(builder)
}

fn resolve_url(value: &str, origin: Option<&Url>) -> ParseResult<Url> {
    let result = match origin {
        Some(origin) => origin.join(value),
        None => Url::parse(value),
    };
    result.map_err(|e| ParseError::InvalidUrl {
        value: value.to_string(),
        error: e.to_string(),
    })
}
