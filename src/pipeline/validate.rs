//! Input validation: is the upload a well-formed SVG document?
//!
//! The check is deliberately shallow. We parse the whole document with
//! `quick-xml` so malformed markup is caught before OpenSCAD sees it, then
//! look at the root element's name in Clark notation (`{namespace}local`).
//! If that string contains `svg` (any case) the document passes. Both
//! `<svg xmlns="http://www.w3.org/2000/svg">` and a bare `<svg>` qualify.
//!
//! Entity references must resolve: the five predefined XML entities,
//! character references and entities declared in the document's DOCTYPE are
//! accepted, anything else (`&nbsp;` in a hand-edited file) is malformed.
//!
//! A failed check is a verdict, not an error: the reason goes back to the
//! end user verbatim.

use crate::error::Svg2StlError;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use regex::Regex;
use std::path::Path;

static RE_ENTITY_DECL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<!ENTITY\s+([A-Za-z_:][A-Za-z0-9_.:-]*)").unwrap());

const PREDEFINED_ENTITIES: [&str; 5] = ["lt", "gt", "amp", "apos", "quot"];

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: String,
}

impl Validation {
    fn pass() -> Self {
        Self {
            valid: true,
            reason: "Valid SVG".to_string(),
        }
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }

    fn malformed(detail: impl std::fmt::Display) -> Self {
        Self::fail(format!("Invalid SVG file: {detail}"))
    }

    pub fn into_result(self) -> Result<(), Svg2StlError> {
        if self.valid {
            Ok(())
        } else {
            Err(Svg2StlError::InvalidSvg {
                reason: self.reason,
            })
        }
    }
}

/// Validate the document at `path`.
///
/// Parsing runs on the blocking pool; uploads can be up to 16 MiB.
pub async fn validate_svg(path: &Path) -> Validation {
    let bytes = match tokio::fs::read(path).await {
        Ok(b) => b,
        Err(e) => return Validation::malformed(e),
    };
    tokio::task::spawn_blocking(move || validate_svg_bytes(&bytes))
        .await
        .unwrap_or_else(|e| Validation::malformed(format!("validator panicked: {e}")))
}

/// Validate an in-memory document.
pub fn validate_svg_bytes(bytes: &[u8]) -> Validation {
    match root_tag(bytes) {
        Ok(tag) if tag.to_lowercase().contains("svg") => Validation::pass(),
        Ok(_) => Validation::fail("File is not a valid SVG"),
        Err(detail) => Validation::malformed(detail),
    }
}

/// Parse the whole document and return the root element's Clark name.
fn root_tag(bytes: &[u8]) -> Result<String, String> {
    let mut reader = NsReader::from_reader(bytes);
    let mut depth = 0usize;
    let mut root: Option<String> = None;
    let mut declared: Vec<String> = Vec::new();

    loop {
        let (ns, event) = reader.read_resolved_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if depth == 0 {
                    if root.is_some() {
                        return Err("junk after document element".into());
                    }
                    let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    root = Some(match ns {
                        ResolveResult::Bound(ns) => {
                            format!("{{{}}}{local}", String::from_utf8_lossy(ns.as_ref()))
                        }
                        ResolveResult::Unbound => local,
                        ResolveResult::Unknown(prefix) => {
                            return Err(format!(
                                "unbound prefix '{}'",
                                String::from_utf8_lossy(&prefix)
                            ));
                        }
                    });
                }
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Text(ref t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(if root.is_some() {
                        "junk after document element".into()
                    } else {
                        "text before the root element".into()
                    });
                }
            }
            Event::DocType(ref d) => {
                let body = String::from_utf8_lossy(d);
                declared.extend(RE_ENTITY_DECL.captures_iter(&body).map(|c| c[1].to_string()));
            }
            Event::GeneralRef(ref r) => {
                let name = String::from_utf8_lossy(r);
                if !entity_resolves(&name, &declared) {
                    return Err(format!("undefined entity &{name};"));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth > 0 {
        return Err("unclosed element at end of document".into());
    }
    root.ok_or_else(|| "no element found".into())
}

fn entity_resolves(name: &str, declared: &[String]) -> bool {
    if let Some(code) = name.strip_prefix('#') {
        let value = match code.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => code.parse::<u32>().ok(),
        };
        return value
            .and_then(char::from_u32)
            .is_some_and(|c| c != '\0');
    }
    PREDEFINED_ENTITIES.contains(&name) || declared.iter().any(|d| d == name)
}
