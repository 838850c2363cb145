//! Pattern compiler.
//!
//! A route pattern is text made of literal pieces and `{name}` placeholders,
//! separated by whitespace or `/`:
//!
//! ```text
//! "user {id}"            → Literal("user"), Param(id)
//! "/start {ref?}"        → /Literal("start"), Param(ref, optional)
//! "vote:{dir} {post}"    → Literal("vote:"), Param(dir), Param(post)
//! "post {post:slug}"     → Literal("post"), Param(post, bound by field `slug`)
//! ```
//!
//! Placeholders may sit inside a token (`vote:{dir}`); only whitespace and `/`
//! separate tokens. Whitespace runs match any amount of whitespace in the
//! payload, and `/` matches a single slash. Matching is anchored on both ends.
//!
//! Only trailing parameters may be optional. An empty pattern compiles to a
//! wildcard that accepts any payload.

use std::collections::{BTreeMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::constraints::{Constraints, compile_anchored};
use crate::error::{GenerateError, PatternError};

/// Regex used for parameters without a constraint: one run of non-separators.
pub const DEFAULT_PARAM_REGEX: &str = r"[^\s/]+";

/// The separator preceding a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
    Space,
    Slash,
}

impl Separator {
    fn regex(self) -> &'static str {
        match self {
            Self::Space => r"\s+",
            Self::Slash => r"\s*/\s*",
        }
    }

    fn render(self) -> &'static str {
        match self {
            Self::Space => " ",
            Self::Slash => "/",
        }
    }

    fn merge(prev: Option<Self>, next: Self) -> Self {
        match (prev, next) {
            (Some(Self::Slash), _) | (_, Self::Slash) => Self::Slash,
            _ => Self::Space,
        }
    }
}

/// A named capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub optional: bool,
    /// The regex the value must match in full.
    pub constraint: String,
    /// Custom lookup field for model binding (`{post:slug}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// What a segment matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentSpec {
    Literal { text: String },
    Param(ParamSpec),
}

/// One piece of a compiled pattern.
///
/// `leading` is the separator between this segment and the previous one;
/// `None` means the segment is glued to its predecessor (or starts the pattern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leading: Option<Separator>,
    #[serde(flatten)]
    pub spec: SegmentSpec,
}

impl Segment {
    pub fn as_param(&self) -> Option<&ParamSpec> {
        match &self.spec {
            SegmentSpec::Param(p) => Some(p),
            SegmentSpec::Literal { .. } => None,
        }
    }
}

/// Placeholder as parsed, before constraints are attached.
struct RawParam {
    name: String,
    optional: bool,
    field: Option<String>,
}

enum RawSpec {
    Literal(String),
    Param(RawParam),
}

/// A compiled matcher for one route pattern.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    source: String,
    segments: Vec<Segment>,
    /// `None` for the empty (wildcard) pattern.
    regex: Option<Regex>,
    /// Per-parameter anchored regexes, in capture order.
    param_regexes: Vec<Regex>,
}

impl CompiledPattern {
    /// Compiles `pattern`.
    ///
    /// Each parameter's regex is taken from `route_constraints`, then
    /// `global_constraints`, then [`DEFAULT_PARAM_REGEX`].
    pub fn compile(
        pattern: &str,
        route_constraints: &Constraints,
        global_constraints: &Constraints,
    ) -> Result<Self, PatternError> {
        let raw = tokenize(pattern)?;
        let segments = raw
            .into_iter()
            .map(|(leading, spec)| Segment {
                leading,
                spec: match spec {
                    RawSpec::Literal(text) => SegmentSpec::Literal { text },
                    RawSpec::Param(p) => {
                        let constraint = route_constraints
                            .get(&p.name)
                            .or_else(|| global_constraints.get(&p.name))
                            .unwrap_or(DEFAULT_PARAM_REGEX)
                            .to_string();
                        SegmentSpec::Param(ParamSpec {
                            name: p.name,
                            optional: p.optional,
                            constraint,
                            field: p.field,
                        })
                    }
                },
            })
            .collect();
        Self::from_segments(pattern.trim().to_string(), segments)
    }

    /// Rebuilds a pattern from already-resolved segments.
    pub fn from_segments(source: String, segments: Vec<Segment>) -> Result<Self, PatternError> {
        validate(&source, &segments)?;

        let mut param_regexes = Vec::new();
        for param in segments.iter().filter_map(Segment::as_param) {
            param_regexes.push(compile_anchored(&param.name, &param.constraint)?);
        }

        if segments.is_empty() {
            return Ok(Self {
                source,
                segments,
                regex: None,
                param_regexes,
            });
        }

        let mut re = String::from(r"^\s*");
        let mut open_optionals = 0;
        let mut index = 0;
        for segment in &segments {
            let sep = segment.leading.map(Separator::regex).unwrap_or("");
            match &segment.spec {
                SegmentSpec::Literal { text } => {
                    re.push_str(sep);
                    re.push_str(&regex::escape(text));
                }
                SegmentSpec::Param(param) => {
                    let group = format!("(?P<{}>(?:{}))", group_name(index), param.constraint);
                    index += 1;
                    if param.optional {
                        re.push_str("(?:");
                        open_optionals += 1;
                    }
                    re.push_str(sep);
                    re.push_str(&group);
                }
            }
        }
        re.push_str(&")?".repeat(open_optionals));
        re.push_str(r"\s*$");

        let regex = Regex::new(&re).map_err(|e| PatternError::InvalidConstraintRegex {
            param: source.clone(),
            regex: re.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            source,
            segments,
            regex: Some(regex),
            param_regexes,
        })
    }

    /// The pattern text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if this is the empty pattern that accepts any payload.
    pub fn is_wildcard(&self) -> bool {
        self.regex.is_none()
    }

    pub fn params(&self) -> impl Iterator<Item = &ParamSpec> {
        self.segments.iter().filter_map(Segment::as_param)
    }

    /// Returns `true` if the payload matches start to end.
    pub fn is_match(&self, payload: &str) -> bool {
        self.regex.as_ref().is_none_or(|re| re.is_match(payload))
    }

    /// Matches `payload` and returns captures in pattern order.
    ///
    /// Optional parameters absent from the payload are returned as `None`.
    pub fn captures(&self, payload: &str) -> Option<Vec<(String, Option<String>)>> {
        let Some(re) = &self.regex else {
            return Some(Vec::new());
        };
        let caps = re.captures(payload)?;
        Some(
            self.params()
                .enumerate()
                .map(|(i, p)| {
                    let value = caps.name(&group_name(i)).map(|m| m.as_str().to_string());
                    (p.name.clone(), value)
                })
                .collect(),
        )
    }

    /// Renders a payload that this pattern would match.
    pub fn generate(
        &self,
        route: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<String, GenerateError> {
        let mut out = String::new();
        let mut index = 0;
        for segment in &self.segments {
            let sep = segment.leading.map(Separator::render).unwrap_or("");
            match &segment.spec {
                SegmentSpec::Literal { text } => {
                    out.push_str(sep);
                    out.push_str(text);
                }
                SegmentSpec::Param(param) => {
                    let Some(value) = params.get(&param.name) else {
                        if param.optional {
                            // everything after the first absent optional is optional too
                            break;
                        }
                        return Err(GenerateError::MissingParam {
                            route: route.to_string(),
                            param: param.name.clone(),
                        });
                    };
                    if !self.param_regexes[index].is_match(value) {
                        return Err(GenerateError::ConstraintViolation {
                            route: route.to_string(),
                            param: param.name.clone(),
                            value: value.clone(),
                        });
                    }
                    out.push_str(sep);
                    out.push_str(value);
                }
            }
            if segment.as_param().is_some() {
                index += 1;
            }
        }
        Ok(out)
    }
}

impl PartialEq for CompiledPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.segments == other.segments
    }
}

impl Eq for CompiledPattern {}

#[derive(Serialize, Deserialize)]
struct PatternRepr {
    source: String,
    segments: Vec<Segment>,
}

impl Serialize for CompiledPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PatternRepr {
            source: self.source.clone(),
            segments: self.segments.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CompiledPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = PatternRepr::deserialize(deserializer)?;
        CompiledPattern::from_segments(repr.source, repr.segments).map_err(serde::de::Error::custom)
    }
}

fn group_name(index: usize) -> String {
    format!("p{index}")
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_placeholder(pattern: &str, inner: &str) -> Result<RawParam, PatternError> {
    let (body, optional) = match inner.strip_suffix('?') {
        Some(body) => (body, true),
        None => (inner, false),
    };
    let (name, field) = match body.split_once(':') {
        Some((name, field)) => (name, Some(field)),
        None => (body, None),
    };
    let invalid = || PatternError::InvalidParamName {
        pattern: pattern.to_string(),
        name: inner.to_string(),
    };
    if !is_ident(name) || field.is_some_and(|f| !is_ident(f)) {
        return Err(invalid());
    }
    Ok(RawParam {
        name: name.to_string(),
        optional,
        field: field.map(str::to_string),
    })
}

fn tokenize(pattern: &str) -> Result<Vec<(Option<Separator>, RawSpec)>, PatternError> {
    let mut out: Vec<(Option<Separator>, RawSpec)> = Vec::new();
    let mut literal = String::new();
    let mut pending: Option<Separator> = None;
    let mut chars = pattern.chars();

    fn push(
        out: &mut Vec<(Option<Separator>, RawSpec)>,
        pending: &mut Option<Separator>,
        spec: RawSpec,
    ) {
        let mut leading = pending.take();
        if out.is_empty() && leading == Some(Separator::Space) {
            leading = None;
        }
        out.push((leading, spec));
    }

    while let Some(c) = chars.next() {
        if c.is_whitespace() || c == '/' {
            if !literal.is_empty() {
                push(&mut out, &mut pending, RawSpec::Literal(std::mem::take(&mut literal)));
            }
            let sep = if c == '/' {
                Separator::Slash
            } else {
                Separator::Space
            };
            pending = Some(Separator::merge(pending, sep));
        } else if c == '{' {
            if !literal.is_empty() {
                push(&mut out, &mut pending, RawSpec::Literal(std::mem::take(&mut literal)));
            }
            let mut inner = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                inner.push(c);
            }
            if !closed {
                return Err(PatternError::UnterminatedParam {
                    pattern: pattern.to_string(),
                });
            }
            let param = parse_placeholder(pattern, inner.trim())?;
            push(&mut out, &mut pending, RawSpec::Param(param));
        } else {
            literal.push(c);
        }
    }
    if !literal.is_empty() {
        push(&mut out, &mut pending, RawSpec::Literal(literal));
    }
    Ok(out)
}

fn validate(pattern: &str, segments: &[Segment]) -> Result<(), PatternError> {
    let mut seen = HashSet::new();
    let mut first_optional: Option<&str> = None;
    for segment in segments {
        match &segment.spec {
            SegmentSpec::Param(p) => {
                if !seen.insert(p.name.as_str()) {
                    return Err(PatternError::DuplicateParam {
                        pattern: pattern.to_string(),
                        param: p.name.clone(),
                    });
                }
                if p.optional {
                    first_optional.get_or_insert(p.name.as_str());
                } else if let Some(opt) = first_optional {
                    return Err(PatternError::NonTrailingOptional {
                        pattern: pattern.to_string(),
                        param: opt.to_string(),
                    });
                }
            }
            SegmentSpec::Literal { .. } => {
                if let Some(opt) = first_optional {
                    return Err(PatternError::NonTrailingOptional {
                        pattern: pattern.to_string(),
                        param: opt.to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::constraints::NUMERIC;

    fn compile(pattern: &str) -> CompiledPattern {
        CompiledPattern::compile(pattern, &Constraints::new(), &Constraints::new()).unwrap()
    }

    fn caps(p: &CompiledPattern, payload: &str) -> Option<Vec<(String, Option<String>)>> {
        p.captures(payload)
    }

    #[test]
    fn test_literal_and_param() {
        let p = compile("user {id}");
        assert_eq!(
            caps(&p, "user 5"),
            Some(vec![("id".to_string(), Some("5".to_string()))])
        );
        assert!(caps(&p, "user").is_none());
        assert!(caps(&p, "users 5").is_none());
        assert!(caps(&p, "user 5 extra").is_none());
    }

    #[test]
    fn test_whitespace_runs_and_surrounding_space() {
        let p = compile("user   {id}");
        assert!(p.is_match("user 5"));
        assert!(p.is_match("  user\t\t5 "));
    }

    #[test]
    fn test_route_constraint_enforced() {
        let route: Constraints = [("id", NUMERIC)].into_iter().collect();
        let p = CompiledPattern::compile("user {id}", &route, &Constraints::new()).unwrap();
        assert!(!p.is_match("user abc"));
        assert_eq!(
            caps(&p, "user 42"),
            Some(vec![("id".to_string(), Some("42".to_string()))])
        );
    }

    #[test]
    fn test_route_constraint_beats_global() {
        let route: Constraints = [("id", "[a-z]+")].into_iter().collect();
        let global: Constraints = [("id", NUMERIC)].into_iter().collect();
        let p = CompiledPattern::compile("user {id}", &route, &global).unwrap();
        assert!(p.is_match("user abc"));
        assert!(!p.is_match("user 42"));

        let p = CompiledPattern::compile("user {id}", &Constraints::new(), &global).unwrap();
        assert!(p.is_match("user 42"));
        assert!(!p.is_match("user abc"));
    }

    #[test]
    fn test_optional_trailing_param() {
        let p = compile("user {id?}");
        assert_eq!(caps(&p, "user"), Some(vec![("id".to_string(), None)]));
        assert_eq!(
            caps(&p, "user 7"),
            Some(vec![("id".to_string(), Some("7".to_string()))])
        );
    }

    #[test]
    fn test_multiple_trailing_optionals() {
        let p = compile("list {page?} {size?}");
        assert_eq!(
            caps(&p, "list 2"),
            Some(vec![
                ("page".to_string(), Some("2".to_string())),
                ("size".to_string(), None),
            ])
        );
        assert!(p.is_match("list"));
        assert!(p.is_match("list 2 10"));
    }

    #[test]
    fn test_non_trailing_optional_rejected() {
        let err = CompiledPattern::compile("user {id?} {name}", &Constraints::new(), &Constraints::new())
            .unwrap_err();
        assert!(matches!(err, PatternError::NonTrailingOptional { ref param, .. } if param == "id"));

        let err = CompiledPattern::compile("user {id?} edit", &Constraints::new(), &Constraints::new())
            .unwrap_err();
        assert!(matches!(err, PatternError::NonTrailingOptional { .. }));
    }

    #[test]
    fn test_duplicate_param_rejected() {
        let err = CompiledPattern::compile("move {id} {id}", &Constraints::new(), &Constraints::new())
            .unwrap_err();
        assert!(matches!(err, PatternError::DuplicateParam { ref param, .. } if param == "id"));
    }

    #[test]
    fn test_invalid_constraint_rejected() {
        let route: Constraints = [("id", "[0-9")].into_iter().collect();
        let err = CompiledPattern::compile("user {id}", &route, &Constraints::new()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidConstraintRegex { .. }));
    }

    #[test]
    fn test_anchored_constraint_rejected_at_compile() {
        let route: Constraints = [("id", "^[0-9]+$")].into_iter().collect();
        let err = CompiledPattern::compile("user {id}", &route, &Constraints::new()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidConstraintRegex { ref param, .. } if param == "id"));

        let route: Constraints = [("id", "(?P<p1>[0-9]+)")].into_iter().collect();
        let err = CompiledPattern::compile("user {id} {name}", &route, &Constraints::new()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidConstraintRegex { .. }));
    }

    #[test]
    fn test_malformed_placeholders() {
        let none = Constraints::new();
        assert!(matches!(
            CompiledPattern::compile("user {id", &none, &none),
            Err(PatternError::UnterminatedParam { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("user {}", &none, &none),
            Err(PatternError::InvalidParamName { .. })
        ));
        assert!(matches!(
            CompiledPattern::compile("user {1st}", &none, &none),
            Err(PatternError::InvalidParamName { .. })
        ));
    }

    #[test]
    fn test_command_keeps_leading_slash() {
        let p = compile("/start {ref?}");
        assert!(p.is_match("/start"));
        assert!(p.is_match("/start abc"));
        assert!(!p.is_match("start abc"));
        assert_eq!(p.segments()[0].leading, Some(Separator::Slash));
    }

    #[test]
    fn test_slash_separated_callback_data() {
        let p = compile("post/{id}//edit");
        assert!(p.is_match("post/5/edit"));
        assert!(!p.is_match("post/5/6/edit"));
        assert_eq!(p.params().count(), 1);
    }

    #[test]
    fn test_param_inside_token() {
        let p = compile("vote:{dir} {post}");
        assert_eq!(
            caps(&p, "vote:up 12"),
            Some(vec![
                ("dir".to_string(), Some("up".to_string())),
                ("post".to_string(), Some("12".to_string())),
            ])
        );
    }

    #[test]
    fn test_custom_binding_field() {
        let p = compile("post {post:slug}");
        let param = p.params().next().unwrap();
        assert_eq!(param.name, "post");
        assert_eq!(param.field.as_deref(), Some("slug"));
        assert!(p.is_match("post hello-world"));
    }

    #[test]
    fn test_empty_pattern_is_wildcard() {
        let p = compile("   ");
        assert!(p.is_wildcard());
        assert_eq!(caps(&p, "anything at all"), Some(vec![]));
        assert!(p.is_match(""));
    }

    #[test]
    fn test_generate() {
        let route: Constraints = [("id", NUMERIC)].into_iter().collect();
        let p = CompiledPattern::compile("/user {id} {tab?}", &route, &Constraints::new()).unwrap();
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "5".to_string());
        assert_eq!(p.generate("user", &params).unwrap(), "/user 5");
        params.insert("tab".to_string(), "posts".to_string());
        assert_eq!(p.generate("user", &params).unwrap(), "/user 5 posts");

        params.insert("id".to_string(), "abc".to_string());
        assert!(matches!(
            p.generate("user", &params),
            Err(GenerateError::ConstraintViolation { .. })
        ));
        assert!(matches!(
            p.generate("user", &BTreeMap::new()),
            Err(GenerateError::MissingParam { .. })
        ));
    }

    #[test]
    fn test_serde_recompiles() {
        let route: Constraints = [("id", NUMERIC)].into_iter().collect();
        let p = CompiledPattern::compile("user {id?}", &route, &Constraints::new()).unwrap();
        let json = serde_json::to_string(&p).unwrap();
        let back: CompiledPattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
        assert!(back.is_match("user 1"));
        assert!(!back.is_match("user x"));
    }
}
