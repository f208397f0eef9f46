//! Media query based context.
//!
//! [`MediaQueryContext`] maps media queries to lists of zone ids. A zone is visible while any
//! query listing it matches the current [`Viewport`].
//!
//! Only a subset of media queries is understood:
//!
//! - comma separated alternatives, any of which may match,
//! - each alternative a conjunction (`and`) of the media types `all` and `screen` and the
//!   features `min-width`, `max-width`, `min-height`, `max-height` (in `px`) and
//!   `orientation` (`portrait` or `landscape`).
//!
//! ```
//! use advertol_engine::{MediaQuery, Viewport};
//!
//! let query = MediaQuery::parse("screen and (min-width: 600px), (orientation: portrait)").unwrap();
//! assert!(query.matches(&Viewport::new(800, 600)));
//! assert!(query.matches(&Viewport::new(400, 700)));
//! assert!(!query.matches(&Viewport::new(500, 400)));
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use crate::engine::context::{Context, ResolveHandle, ZonePartition};
use crate::engine::errors::EngineError;
use crate::engine::viewport::Viewport;
use crate::engine::zone::ZoneId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    /// `all` or `screen`
    AnyMedia,
    MinWidth(u32),
    MaxWidth(u32),
    MinHeight(u32),
    MaxHeight(u32),
    Orientation(Orientation),
}

impl Condition {
    fn matches(&self, viewport: &Viewport) -> bool {
        match *self {
            Condition::AnyMedia => true,
            Condition::MinWidth(px) => viewport.width >= px,
            Condition::MaxWidth(px) => viewport.width <= px,
            Condition::MinHeight(px) => viewport.height >= px,
            Condition::MaxHeight(px) => viewport.height <= px,
            Condition::Orientation(Orientation::Portrait) => viewport.is_portrait(),
            Condition::Orientation(Orientation::Landscape) => viewport.is_landscape(),
        }
    }
}

/// A parsed media query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaQuery {
    source: String,
    /// Alternatives, each one a conjunction of conditions
    alternatives: Vec<Vec<Condition>>,
}

impl MediaQuery {
    pub fn parse(source: &str) -> Result<Self, EngineError> {
        let invalid = |reason: String| EngineError::InvalidMediaQuery { query: source.to_string(), reason };

        let normalized = source.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Ok(Self { source: source.to_string(), alternatives: vec![vec![Condition::AnyMedia]] });
        }

        let alternatives = normalized
            .split(',')
            .map(|alternative| parse_alternative(alternative.trim()))
            .collect::<Result<Vec<_>, String>>()
            .map_err(invalid)?;

        Ok(Self { source: source.to_string(), alternatives })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, viewport: &Viewport) -> bool {
        self.alternatives
            .iter()
            .any(|conditions| conditions.iter().all(|c| c.matches(viewport)))
    }
}

impl fmt::Display for MediaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    /// Contents of a parenthesized feature, without the parentheses
    Feature(&'a str),
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if let Some(inner) = rest.strip_prefix('(') {
            let end = inner.find(')').ok_or("unbalanced parenthesis")?;
            tokens.push(Token::Feature(inner[..end].trim()));
            rest = &inner[end + 1..];
        } else {
            let end = rest
                .find(|c: char| c.is_whitespace() || c == '(')
                .unwrap_or(rest.len());
            let word = &rest[..end];
            if word.contains(')') {
                return Err("unbalanced parenthesis".to_string());
            }
            tokens.push(Token::Word(word));
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }

    Ok(tokens)
}

fn parse_alternative(input: &str) -> Result<Vec<Condition>, String> {
    if input.is_empty() {
        return Err("empty alternative".to_string());
    }

    let mut conditions = Vec::new();
    let mut expect_term = true;

    for token in tokenize(input)? {
        match (expect_term, token) {
            (true, Token::Word("all" | "screen")) if conditions.is_empty() => conditions.push(Condition::AnyMedia),
            (true, Token::Word(word)) => return Err(format!("unsupported media type {word:?}")),
            (true, Token::Feature(feature)) => conditions.push(parse_feature(feature)?),
            (false, Token::Word("and")) => {}
            (false, token) => return Err(format!("expected \"and\", found {token:?}")),
        }
        expect_term = !expect_term;
    }

    if expect_term {
        return Err("dangling \"and\"".to_string());
    }
    Ok(conditions)
}

fn parse_feature(feature: &str) -> Result<Condition, String> {
    let (name, value) = feature
        .split_once(':')
        .ok_or_else(|| format!("feature ({feature}) has no value"))?;
    let value = value.trim();

    match name.trim() {
        "min-width" => parse_px(value).map(Condition::MinWidth),
        "max-width" => parse_px(value).map(Condition::MaxWidth),
        "min-height" => parse_px(value).map(Condition::MinHeight),
        "max-height" => parse_px(value).map(Condition::MaxHeight),
        "orientation" => match value {
            "portrait" => Ok(Condition::Orientation(Orientation::Portrait)),
            "landscape" => Ok(Condition::Orientation(Orientation::Landscape)),
            other => Err(format!("unknown orientation {other:?}")),
        },
        other => Err(format!("unsupported feature {other:?}")),
    }
}

fn parse_px(value: &str) -> Result<u32, String> {
    let number = match value.strip_suffix("px") {
        Some(number) => number.trim_end(),
        None if value == "0" => value,
        None => return Err(format!("length {value:?} is not in px")),
    };
    number.parse().map_err(|_| format!("invalid length {value:?}"))
}

struct Entry {
    query: MediaQuery,
    zones: Vec<ZoneId>,
    matches: bool,
}

struct State {
    entries: Vec<Entry>,
    viewport: Viewport,
    listening: bool,
}

/// Context that keeps zones visible while one of their media queries matches.
pub struct MediaQueryContext {
    state: Mutex<State>,
    handle: Mutex<ResolveHandle>,
}

impl MediaQueryContext {
    /// Creates the context from `(query, zone ids)` pairs, evaluated against `viewport`.
    pub fn new<Q: AsRef<str>>(
        viewport: Viewport,
        entries: impl IntoIterator<Item = (Q, Vec<ZoneId>)>,
    ) -> Result<Self, EngineError> {
        let entries = entries
            .into_iter()
            .map(|(query, zones)| {
                let query = MediaQuery::parse(query.as_ref())?;
                let matches = query.matches(&viewport);
                Ok::<_, EngineError>(Entry { query, zones, matches })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        Ok(Self {
            state: Mutex::new(State { entries, viewport, listening: true }),
            handle: Mutex::new(ResolveHandle::detached()),
        })
    }

    /// Creates the context from a JSON object mapping media queries to arrays of zone ids.
    ///
    /// ```
    /// use advertol_engine::{MediaQueryContext, Viewport};
    ///
    /// let ctx = MediaQueryContext::from_json(
    ///     Viewport::new(1024, 768),
    ///     r#"{ "(min-width: 1000px)": ["sidebar"], "(max-width: 999px)": ["inline"] }"#,
    /// ).unwrap();
    /// assert_eq!(ctx.matching_queries(), vec!["(min-width: 1000px)".to_string()]);
    /// ```
    pub fn from_json(viewport: Viewport, json: &str) -> Result<Self, EngineError> {
        let entries: BTreeMap<String, Vec<ZoneId>> = serde_json::from_str(json)?;
        Self::new(viewport, entries)
    }

    pub fn viewport(&self) -> Viewport {
        self.state().viewport
    }

    /// Queries currently matching the viewport.
    pub fn matching_queries(&self) -> Vec<String> {
        self.state()
            .entries
            .iter()
            .filter(|e| e.matches)
            .map(|e| e.query.as_str().to_string())
            .collect()
    }

    /// Re-evaluates every query against `viewport`.
    ///
    /// A resolution round is requested when a query changed state and either it now matches or
    /// no query matches anymore. Returns whether a round was requested. Does nothing once the
    /// context has been destroyed.
    pub fn set_viewport(&self, viewport: Viewport) -> bool {
        let should_resolve = {
            let mut state = self.state();
            if !state.listening {
                return false;
            }
            state.viewport = viewport;

            let mut changed = Vec::new();
            for entry in state.entries.iter_mut() {
                let matches = entry.query.matches(&viewport);
                if matches != entry.matches {
                    entry.matches = matches;
                    changed.push(matches);
                    log::trace!("media query {} now {}", entry.query, if matches { "matches" } else { "fails" });
                }
            }

            let any_active = state.entries.iter().any(|e| e.matches);
            changed.iter().any(|&matches| matches || !any_active)
        };

        if !should_resolve {
            return false;
        }
        log::debug!("viewport changed to {:?}; requesting resolution", viewport);
        self.handle.lock().unwrap_or_else(PoisonError::into_inner).request()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Context for MediaQueryContext {
    fn attach(&self, handle: ResolveHandle) {
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }

    fn calculate(&self, visible: &[ZoneId]) -> anyhow::Result<ZonePartition> {
        let state = self.state();
        let active: HashSet<&ZoneId> = state
            .entries
            .iter()
            .filter(|e| e.matches)
            .flat_map(|e| e.zones.iter())
            .collect();

        let (visible, hidden) = visible.iter().cloned().partition(|id| active.contains(id));
        Ok(ZonePartition { visible, hidden })
    }

    fn destroy(&self) {
        let mut state = self.state();
        state.listening = false;
        state.entries.clear();
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = ResolveHandle::detached();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ids;
    use tokio::sync::mpsc;

    fn parse_err(source: &str) -> String {
        match MediaQuery::parse(source) {
            Err(EngineError::InvalidMediaQuery { reason, .. }) => reason,
            other => panic!("expected an invalid query, got {other:?}"),
        }
    }

    #[test]
    fn parses_supported_subset() {
        let query = MediaQuery::parse("Screen AND (min-width: 600px) and (max-width:1023px)").unwrap();
        assert!(query.matches(&Viewport::new(600, 100)));
        assert!(query.matches(&Viewport::new(1023, 100)));
        assert!(!query.matches(&Viewport::new(1024, 100)));
        assert!(!query.matches(&Viewport::new(599, 100)));
        assert_eq!(query.as_str(), "Screen AND (min-width: 600px) and (max-width:1023px)");

        let heights = MediaQuery::parse("(min-height: 0) and (max-height: 400px)").unwrap();
        assert!(heights.matches(&Viewport::new(10, 400)));
        assert!(!heights.matches(&Viewport::new(10, 401)));

        assert!(MediaQuery::parse("all").unwrap().matches(&Viewport::default()));
        assert!(MediaQuery::parse("").unwrap().matches(&Viewport::default()));
    }

    #[test]
    fn alternatives_match_independently() {
        let query = MediaQuery::parse("(orientation: landscape), (max-width: 320px)").unwrap();
        assert!(query.matches(&Viewport::new(800, 600)));
        assert!(query.matches(&Viewport::new(320, 600)));
        assert!(!query.matches(&Viewport::new(400, 600)));
    }

    #[test]
    fn rejects_unsupported_queries() {
        assert!(parse_err("print").contains("media type"));
        assert!(parse_err("(min-width: 40em)").contains("px"));
        assert!(parse_err("(hover: hover)").contains("unsupported feature"));
        assert!(parse_err("(orientation: sideways)").contains("orientation"));
        assert!(parse_err("(min-width: 600px").contains("parenthesis"));
        assert!(parse_err("screen and").contains("dangling"));
        assert!(parse_err("screen (min-width: 1px)").contains("expected"));
        assert!(parse_err("screen,,all").contains("empty"));
        assert!(parse_err("(color)").contains("no value"));
    }

    fn context(viewport: Viewport) -> MediaQueryContext {
        MediaQueryContext::new(
            viewport,
            vec![
                ("(max-width: 599px)", ids(&["mobile", "shared"])),
                ("(min-width: 600px)", ids(&["desktop", "shared"])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn calculate_keeps_input_order() {
        let ctx = context(Viewport::new(1024, 768));
        let partition = ctx.calculate(&ids(&["shared", "mobile", "other", "desktop"])).unwrap();
        assert_eq!(partition.visible, ids(&["shared", "desktop"]));
        assert_eq!(partition.hidden, ids(&["mobile", "other"]));
    }

    #[test]
    fn from_json_validates_input() {
        let ctx = MediaQueryContext::from_json(Viewport::new(320, 480), r#"{"(max-width: 599px)": ["a"]}"#).unwrap();
        assert_eq!(ctx.calculate(&ids(&["a", "b"])).unwrap().visible, ids(&["a"]));

        assert!(matches!(
            MediaQueryContext::from_json(Viewport::default(), r#"{"(max-width: 1px)": ["not valid"]}"#),
            Err(EngineError::Json(_))
        ));
        assert!(matches!(
            MediaQueryContext::from_json(Viewport::default(), r#"{"tv": []}"#),
            Err(EngineError::InvalidMediaQuery { .. })
        ));
    }

    #[test]
    fn viewport_changes_request_resolution() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = context(Viewport::new(1024, 768));
        ctx.attach(ResolveHandle::new(&tx));

        // no query changes state
        assert!(!ctx.set_viewport(Viewport::new(800, 600)));

        // one query stops matching, the other starts: a single request
        assert!(ctx.set_viewport(Viewport::new(400, 600)));
        assert_eq!(ctx.matching_queries(), vec!["(max-width: 599px)".to_string()]);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
        assert_eq!(ctx.viewport(), Viewport::new(400, 600));
    }

    #[test]
    fn last_query_turning_off_requests_resolution() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = MediaQueryContext::new(Viewport::new(1024, 768), vec![("(min-width: 600px)", ids(&["a"]))]).unwrap();
        ctx.attach(ResolveHandle::new(&tx));

        assert!(ctx.set_viewport(Viewport::new(400, 768)));
        assert!(rx.try_recv().is_ok());
        assert!(ctx.calculate(&ids(&["a"])).unwrap().visible.is_empty());
    }

    #[test]
    fn query_turning_off_while_another_matches_is_silent() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = MediaQueryContext::new(
            Viewport::new(1024, 768),
            vec![("(min-width: 600px)", ids(&["a"])), ("all", ids(&["b"]))],
        )
        .unwrap();
        ctx.attach(ResolveHandle::new(&tx));

        assert!(!ctx.set_viewport(Viewport::new(400, 768)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn destroyed_context_ignores_viewport_changes() {
        let (tx, mut rx) = mpsc::channel(8);
        let ctx = context(Viewport::new(1024, 768));
        ctx.attach(ResolveHandle::new(&tx));
        ctx.destroy();

        assert!(!ctx.set_viewport(Viewport::new(400, 600)));
        assert!(rx.try_recv().is_err());
        assert!(ctx.calculate(&ids(&["desktop"])).unwrap().visible.is_empty());
    }
}
