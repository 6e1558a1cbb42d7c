//! Chart directive extraction, validation and column binding.
//!
//! The upstream text generator returns free-form prose that may embed zero
//! or more brace-delimited JSON chart directives. Extraction isolates each
//! balanced brace span as a candidate and strips it from the displayed text;
//! validation parses the candidate strictly, checks the required-field set
//! for its chart kind and binds column references against the dataset. A bad
//! candidate never aborts the others: each failure carries its own reason.

use serde_json::Value;

use crate::dataset::ColumnResolver;

/// A raw brace-delimited span lifted out of the response text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveCandidate {
    pub raw: String,
}

/// Parsed chart directive, discriminated by `chart_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartDirective {
    Bar {
        x_column: String,
        y_column: String,
        title: String,
    },
    Line {
        x_column: String,
        y_column: String,
        title: String,
    },
    Scatter {
        x_column: String,
        y_column: String,
        title: String,
    },
    Pie {
        x_column: String,
        y_column: String,
        title: String,
    },
    WordCloud {
        text_column: String,
        title: String,
    },
}

/// The four 2-D plot kinds. Word clouds bind differently and carry no axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XyKind {
    Bar,
    Line,
    Scatter,
    Pie,
}

/// The y series of a bound 2-D directive: either a real column or the
/// `count` sentinel requesting on-the-fly aggregation over x.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum YSeries {
    Column(String),
    Count,
}

/// A directive whose column references all resolved to canonical names.
/// Only bound directives ever reach the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundDirective {
    Xy {
        kind: XyKind,
        x_column: String,
        y_series: YSeries,
        title: String,
    },
    WordCloud {
        text_column: String,
        title: String,
    },
}

impl BoundDirective {
    pub fn title(&self) -> &str {
        match self {
            BoundDirective::Xy { title, .. } => title,
            BoundDirective::WordCloud { title, .. } => title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DirectiveError {
    #[error("Could not parse chart specification.")]
    Unparsable,

    #[error("Invalid chart specification format. Missing required field '{0}'.")]
    MissingField(&'static str),

    #[error("Unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("Column '{column}' not found. Available columns: {}", .available.join(", "))]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },
}

/// Scan `raw` for balanced brace spans. Returns the candidates in order of
/// appearance and the text with every successfully delimited span removed.
///
/// An opening brace that never closes before end of text is treated as
/// malformed: scanning stops, candidates found so far are kept, and the
/// trailing text (open brace included) stays in the cleaned output.
pub fn extract_directives(raw: &str) -> (Vec<DirectiveCandidate>, String) {
    let mut candidates = Vec::new();
    let mut segments: Vec<&str> = Vec::new();

    let bytes = raw.as_bytes();
    let mut segment_start = 0;
    let mut span_start: Option<usize> = None;
    let mut depth = 0usize;

    for (idx, byte) in bytes.iter().enumerate() {
        match *byte {
            b'{' => {
                if span_start.is_none() {
                    span_start = Some(idx);
                    segments.push(&raw[segment_start..idx]);
                }
                depth += 1;
            }
            b'}' => {
                if let Some(start) = span_start {
                    depth -= 1;
                    if depth == 0 {
                        candidates.push(DirectiveCandidate {
                            raw: raw[start..=idx].to_string(),
                        });
                        span_start = None;
                        segment_start = idx + 1;
                    }
                }
                // A closing brace outside any span is plain text.
            }
            _ => {}
        }
    }

    if let Some(start) = span_start {
        // Unterminated span: keep it as text, it was never delimited.
        segments.push(&raw[start..]);
    } else {
        segments.push(&raw[segment_start..]);
    }

    let cleaned = segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    (candidates, cleaned)
}

/// Parse a candidate's raw span into a typed directive, classifying failures
/// as unparsable, missing-field or unsupported-kind.
pub fn parse_directive(candidate: &DirectiveCandidate) -> Result<ChartDirective, DirectiveError> {
    let value: Value =
        serde_json::from_str(&candidate.raw).map_err(|_| DirectiveError::Unparsable)?;
    let obj = value.as_object().ok_or(DirectiveError::Unparsable)?;

    let kind = obj
        .get("chart_type")
        .and_then(Value::as_str)
        .ok_or(DirectiveError::MissingField("chart_type"))?;

    if kind == "word_cloud" {
        let text_column = require_str(obj, "text_column")?;
        let title = require_str(obj, "title")?;
        return Ok(ChartDirective::WordCloud { text_column, title });
    }

    let x_column = require_str(obj, "x_column")?;
    let y_column = require_str(obj, "y_column")?;
    let title = require_str(obj, "title")?;

    match kind {
        "bar" => Ok(ChartDirective::Bar { x_column, y_column, title }),
        "line" => Ok(ChartDirective::Line { x_column, y_column, title }),
        "scatter" => Ok(ChartDirective::Scatter { x_column, y_column, title }),
        "pie" => Ok(ChartDirective::Pie { x_column, y_column, title }),
        other => Err(DirectiveError::UnsupportedChartType(other.to_string())),
    }
}

fn require_str(
    obj: &serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<String, DirectiveError> {
    obj.get(field)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or(DirectiveError::MissingField(field))
}

/// Bind a parsed directive's column references to canonical dataset columns.
pub fn bind_directive(
    directive: &ChartDirective,
    resolver: &ColumnResolver,
) -> Result<BoundDirective, DirectiveError> {
    let unknown = |column: &str| DirectiveError::UnknownColumn {
        column: column.to_string(),
        available: resolver.available().to_vec(),
    };

    match directive {
        ChartDirective::WordCloud { text_column, title } => {
            let text_column = resolver
                .resolve(text_column)
                .ok_or_else(|| unknown(text_column))?;
            Ok(BoundDirective::WordCloud {
                text_column: text_column.to_string(),
                title: title.clone(),
            })
        }
        ChartDirective::Bar { x_column, y_column, title }
        | ChartDirective::Line { x_column, y_column, title }
        | ChartDirective::Scatter { x_column, y_column, title }
        | ChartDirective::Pie { x_column, y_column, title } => {
            let kind = match directive {
                ChartDirective::Bar { .. } => XyKind::Bar,
                ChartDirective::Line { .. } => XyKind::Line,
                ChartDirective::Scatter { .. } => XyKind::Scatter,
                _ => XyKind::Pie,
            };

            let x = resolver.resolve(x_column).ok_or_else(|| unknown(x_column))?;

            // The count sentinel is case-sensitive: "Count" is a column name.
            let y_series = if y_column == "count" {
                YSeries::Count
            } else {
                let y = resolver.resolve(y_column).ok_or_else(|| unknown(y_column))?;
                YSeries::Column(y.to_string())
            };

            Ok(BoundDirective::Xy {
                kind,
                x_column: x.to_string(),
                y_series,
                title: title.clone(),
            })
        }
    }
}

/// Full validation of one candidate: strict parse, field check, binding.
pub fn validate_candidate(
    candidate: &DirectiveCandidate,
    resolver: &ColumnResolver,
) -> Result<BoundDirective, DirectiveError> {
    let directive = parse_directive(candidate)?;
    bind_directive(&directive, resolver)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> ColumnResolver {
        ColumnResolver::new(vec![
            "Region".to_string(),
            "Sales".to_string(),
            "Comment".to_string(),
        ])
    }

    fn candidate(raw: &str) -> DirectiveCandidate {
        DirectiveCandidate { raw: raw.to_string() }
    }

    #[test]
    fn test_extract_single_span() {
        let raw = r#"Here is your chart: {"chart_type":"bar","x_column":"a","y_column":"b","title":"T"} Enjoy!"#;
        let (candidates, cleaned) = extract_directives(raw);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].raw.starts_with('{'));
        assert!(candidates[0].raw.ends_with('}'));
        assert_eq!(cleaned, "Here is your chart: Enjoy!");
    }

    #[test]
    fn test_extract_multiple_spans_in_order() {
        let raw = r#"First {"chart_type":"bar"} then {"chart_type":"pie"} done."#;
        let (candidates, cleaned) = extract_directives(raw);
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].raw.contains("bar"));
        assert!(candidates[1].raw.contains("pie"));
        assert_eq!(cleaned, "First then done.");
        assert!(!cleaned.contains('{'));
    }

    #[test]
    fn test_extract_nested_braces() {
        let raw = r#"x {"a": {"b": 1}} y"#;
        let (candidates, cleaned) = extract_directives(raw);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].raw, r#"{"a": {"b": 1}}"#);
        assert_eq!(cleaned, "x y");
    }

    #[test]
    fn test_extract_unterminated_span_kept_as_text() {
        let raw = r#"ok {"chart_type":"bar"} broken {"oops": 1"#;
        let (candidates, cleaned) = extract_directives(raw);
        assert_eq!(candidates.len(), 1);
        assert!(cleaned.contains("broken"));
        assert!(cleaned.contains(r#"{"oops": 1"#));
    }

    #[test]
    fn test_extract_stray_closing_brace_is_text() {
        let raw = "a } b";
        let (candidates, cleaned) = extract_directives(raw);
        assert!(candidates.is_empty());
        assert_eq!(cleaned, "a } b");
    }

    #[test]
    fn test_extract_no_spans() {
        let (candidates, cleaned) = extract_directives("just prose");
        assert!(candidates.is_empty());
        assert_eq!(cleaned, "just prose");
    }

    #[test]
    fn test_parse_unparsable() {
        let err = parse_directive(&candidate("{not json}")).unwrap_err();
        assert_eq!(err, DirectiveError::Unparsable);
    }

    #[test]
    fn test_parse_missing_fields() {
        let err = parse_directive(&candidate(r#"{"x_column":"a"}"#)).unwrap_err();
        assert_eq!(err, DirectiveError::MissingField("chart_type"));

        let err =
            parse_directive(&candidate(r#"{"chart_type":"bar","x_column":"a"}"#)).unwrap_err();
        assert_eq!(err, DirectiveError::MissingField("y_column"));

        let err =
            parse_directive(&candidate(r#"{"chart_type":"word_cloud","title":"T"}"#)).unwrap_err();
        assert_eq!(err, DirectiveError::MissingField("text_column"));
    }

    #[test]
    fn test_parse_unsupported_kind() {
        let raw = r#"{"chart_type":"hexbin","x_column":"a","y_column":"b","title":"T"}"#;
        let err = parse_directive(&candidate(raw)).unwrap_err();
        assert_eq!(err, DirectiveError::UnsupportedChartType("hexbin".to_string()));
    }

    #[test]
    fn test_bind_case_insensitive() {
        let raw = r#"{"chart_type":"bar","x_column":"REGION","y_column":"sales","title":"T"}"#;
        let bound = validate_candidate(&candidate(raw), &resolver()).unwrap();
        assert_eq!(
            bound,
            BoundDirective::Xy {
                kind: XyKind::Bar,
                x_column: "Region".to_string(),
                y_series: YSeries::Column("Sales".to_string()),
                title: "T".to_string(),
            }
        );
    }

    #[test]
    fn test_bind_count_sentinel() {
        let raw = r#"{"chart_type":"pie","x_column":"region","y_column":"count","title":"T"}"#;
        let bound = validate_candidate(&candidate(raw), &resolver()).unwrap();
        match bound {
            BoundDirective::Xy { y_series, .. } => assert_eq!(y_series, YSeries::Count),
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_bind_count_sentinel_is_case_sensitive() {
        // "Count" is treated as a column name, which this dataset lacks.
        let raw = r#"{"chart_type":"bar","x_column":"region","y_column":"Count","title":"T"}"#;
        let err = validate_candidate(&candidate(raw), &resolver()).unwrap_err();
        assert!(matches!(err, DirectiveError::UnknownColumn { .. }));
    }

    #[test]
    fn test_bind_unknown_column_lists_available() {
        let raw = r#"{"chart_type":"bar","x_column":"Profit","y_column":"sales","title":"T"}"#;
        let err = validate_candidate(&candidate(raw), &resolver()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Profit"));
        assert!(message.contains("Region, Sales, Comment"));
    }

    #[test]
    fn test_bind_word_cloud() {
        let raw = r#"{"chart_type":"word_cloud","text_column":"comment","title":"Words"}"#;
        let bound = validate_candidate(&candidate(raw), &resolver()).unwrap();
        assert_eq!(
            bound,
            BoundDirective::WordCloud {
                text_column: "Comment".to_string(),
                title: "Words".to_string(),
            }
        );
    }
}
