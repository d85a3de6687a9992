//! Provenance marker parser.
//!
//! Synthesized reports wrap each passage in a marker naming the local
//! ordinal of the article it came from:
//!
//! ```text
//! <context id="0">Chipmakers rallied</context> while <context id="2">regulators ...</context>
//! ```
//!
//! The parser is a small state machine over that grammar:
//!
//! ```text
//! open   := "<context" WS+ "id" WS* "=" WS* QUOTE DIGIT+ QUOTE WS* ">"
//! close  := "</context" WS* ">"
//! marker := open TEXT close
//! ```
//!
//! `QUOTE` is `"` or `'` and must match on both sides. Text outside markers
//! is ignored. Behaviour on bad input is fixed:
//!
//! - an unterminated marker is dropped;
//! - a malformed opening tag is dropped and scanning continues after its `<`;
//! - an opening tag inside a marker is an overlap: the outer marker is
//!   dropped and scanning resumes at the inner tag;
//! - a closing tag outside any marker is ignored;
//! - a marker whose ordinal has no article is dropped.
//!
//! ```rust
//! use newsbrief_core::context::parse_report;
//!
//! let parsed = parse_report(r#"<context id="1">Markets fell.</context>"#, &[40, 41]);
//! assert_eq!(parsed.sections.len(), 1);
//! assert_eq!(parsed.sections[0].article_id, 41);
//! ```

use std::ops::Range;

use thiserror::Error;

use crate::models::ReportSection;

const OPEN: &str = "<context";
const CLOSE: &str = "</context";

/// Why a marker was skipped. Offsets are byte positions in the report text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFailure {
    #[error("malformed opening tag at byte {0}")]
    MalformedOpen(usize),
    #[error("marker opened at byte {0} overlaps a marker opened at byte {1}")]
    Overlap(usize, usize),
    #[error("marker opened at byte {0} is never closed")]
    Unterminated(usize),
    #[error("marker at byte {at} names unknown source {index}")]
    UnknownSource { at: usize, index: usize },
}

/// A well-formed marker found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker<'a> {
    /// Local source ordinal from the `id` attribute.
    pub index: usize,
    /// Enclosed text, verbatim.
    pub text: &'a str,
    /// Byte range of the whole marker, tags included.
    pub span: Range<usize>,
}

/// Result of scanning a text for markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerScan<'a> {
    pub markers: Vec<Marker<'a>>,
    pub skipped: Vec<ParseFailure>,
}

/// Sections recovered from a report, plus what was skipped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedReport {
    pub sections: Vec<ReportSection>,
    pub skipped: Vec<ParseFailure>,
}

#[derive(Clone, Copy)]
enum State {
    Outside,
    Inside {
        index: usize,
        open_at: usize,
        content_start: usize,
    },
}

/// Scan `text` for markers in document order.
pub fn scan_markers(text: &str) -> MarkerScan<'_> {
    let mut scan = MarkerScan::default();
    let mut state = State::Outside;
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('<') {
        let at = pos + offset;
        let rest = &text[at..];

        match state {
            State::Outside => {
                if !is_open_tag(rest) {
                    // Any other tag, including a stray close.
                    pos = at + 1;
                    continue;
                }
                match parse_open(rest) {
                    Some((index, len)) => {
                        state = State::Inside {
                            index,
                            open_at: at,
                            content_start: at + len,
                        };
                        pos = at + len;
                    }
                    None => {
                        scan.skipped.push(ParseFailure::MalformedOpen(at));
                        pos = at + 1;
                    }
                }
            }
            State::Inside {
                index,
                open_at,
                content_start,
            } => {
                if let Some(len) = parse_close(rest) {
                    scan.markers.push(Marker {
                        index,
                        text: &text[content_start..at],
                        span: open_at..at + len,
                    });
                    state = State::Outside;
                    pos = at + len;
                } else if is_open_tag(rest) {
                    scan.skipped.push(ParseFailure::Overlap(open_at, at));
                    state = State::Outside;
                    // Re-read this `<` as a fresh opening tag.
                    pos = at;
                } else {
                    pos = at + 1;
                }
            }
        }
    }

    if let State::Inside { open_at, .. } = state {
        scan.skipped.push(ParseFailure::Unterminated(open_at));
    }

    scan
}

/// Parse a synthesized report into sections.
///
/// `article_ids[i]` is the global article id for local ordinal `i`.
pub fn parse_report(text: &str, article_ids: &[i64]) -> ParsedReport {
    let scan = scan_markers(text);
    let mut parsed = ParsedReport {
        sections: Vec::with_capacity(scan.markers.len()),
        skipped: scan.skipped,
    };

    for marker in scan.markers {
        match article_ids.get(marker.index) {
            Some(&article_id) => parsed.sections.push(ReportSection {
                position: parsed.sections.len(),
                text: marker.text.to_string(),
                article_id,
            }),
            None => parsed.skipped.push(ParseFailure::UnknownSource {
                at: marker.span.start,
                index: marker.index,
            }),
        }
    }

    parsed
}

/// Whether `rest` begins with `<context` followed by whitespace or `>`.
fn is_open_tag(rest: &str) -> bool {
    rest.strip_prefix(OPEN)
        .and_then(|after| after.chars().next())
        .is_some_and(|c| c.is_whitespace() || c == '>')
}

/// Parse an opening tag at the start of `rest`, returning the ordinal and
/// the tag length in bytes.
fn parse_open(rest: &str) -> Option<(usize, usize)> {
    let mut cursor = Cursor::new(rest);
    cursor.expect(OPEN)?;
    if cursor.skip_whitespace() == 0 {
        return None;
    }
    cursor.expect("id")?;
    cursor.skip_whitespace();
    cursor.expect("=")?;
    cursor.skip_whitespace();
    let quote = cursor.next_if(|c| c == '"' || c == '\'')?;
    let digits = cursor.take_while(|c| c.is_ascii_digit());
    if digits.is_empty() {
        return None;
    }
    let index = digits.parse::<usize>().ok()?;
    cursor.next_if(|c| c == quote)?;
    cursor.skip_whitespace();
    cursor.expect(">")?;
    Some((index, cursor.pos))
}

/// Parse a closing tag at the start of `rest`, returning its length.
fn parse_close(rest: &str) -> Option<usize> {
    let mut cursor = Cursor::new(rest);
    cursor.expect(CLOSE)?;
    cursor.skip_whitespace();
    cursor.expect(">")?;
    Some(cursor.pos)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn expect(&mut self, literal: &str) -> Option<()> {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            Some(())
        } else {
            None
        }
    }

    fn next_if(&mut self, pred: impl Fn(char) -> bool) -> Option<char> {
        let c = self.rest().chars().next().filter(|&c| pred(c))?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while self.next_if(&pred).is_some() {}
        &self.src[start..self.pos]
    }

    fn skip_whitespace(&mut self) -> usize {
        self.take_while(char::is_whitespace).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_markers_in_document_order() {
        let text = concat!(
            r#"<context id="0">Chips rallied</context>, "#,
            r#"<context id="2">rates held</context> and "#,
            r#"<context id="1">oil slid</context>."#,
        );
        let parsed = parse_report(text, &[100, 200, 300]);

        assert!(parsed.skipped.is_empty());
        let got: Vec<(usize, &str, i64)> = parsed
            .sections
            .iter()
            .map(|s| (s.position, s.text.as_str(), s.article_id))
            .collect();
        assert_eq!(
            got,
            vec![
                (0, "Chips rallied", 100),
                (1, "rates held", 300),
                (2, "oil slid", 200)
            ]
        );
    }

    #[test]
    fn test_no_markers_is_not_an_error() {
        let parsed = parse_report("A plain paragraph with no tags.", &[1]);
        assert!(parsed.sections.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_unterminated_marker_yields_nothing() {
        let text = r#"<context id="0">Complete</context> <context id="1">never closed"#;
        let parsed = parse_report(text, &[7, 8]);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].article_id, 7);
        assert_eq!(parsed.skipped, vec![ParseFailure::Unterminated(35)]);
    }

    #[test]
    fn test_nested_marker_drops_outer() {
        let text = r#"<context id="0">outer <context id="1">inner</context> tail</context>"#;
        let parsed = parse_report(text, &[10, 11]);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].text, "inner");
        assert_eq!(parsed.sections[0].article_id, 11);
        assert!(matches!(parsed.skipped[0], ParseFailure::Overlap(0, 22)));
    }

    #[test]
    fn test_malformed_open_tags_are_skipped() {
        let text = concat!(
            r#"<context>no id</context>"#,
            r#"<context id="x">bad id</context>"#,
            r#"<context id="3>unbalanced</context>"#,
            r#"<context id="0">good</context>"#,
        );
        let parsed = parse_report(text, &[5]);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].text, "good");
        assert_eq!(parsed.skipped.len(), 3);
    }

    #[test]
    fn test_unknown_source_index_is_skipped() {
        let parsed = parse_report(r#"<context id="4">orphan</context>"#, &[1, 2]);
        assert!(parsed.sections.is_empty());
        assert_eq!(
            parsed.skipped,
            vec![ParseFailure::UnknownSource { at: 0, index: 4 }]
        );
    }

    #[test]
    fn test_attribute_whitespace_and_single_quotes() {
        let text = "<context  id = '1' >spaced</context >";
        let parsed = parse_report(text, &[1, 2]);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].article_id, 2);
        assert_eq!(parsed.sections[0].text, "spaced");
    }

    #[test]
    fn test_multiline_and_unicode_content_kept_verbatim() {
        let text = "<context id=\"0\">Zürich —\n  markets <b>up</b></context>";
        let scan = scan_markers(text);
        assert_eq!(scan.markers.len(), 1);
        assert_eq!(scan.markers[0].text, "Zürich —\n  markets <b>up</b>");
        assert_eq!(scan.markers[0].span, 0..text.len());
    }

    #[test]
    fn test_stray_close_and_lookalike_tags_ignored() {
        let text = r#"</context> <contexts id="0">x</contexts> <context id="0">y</context>"#;
        let parsed = parse_report(text, &[9]);
        assert_eq!(parsed.sections.len(), 1);
        assert_eq!(parsed.sections[0].text, "y");
        assert!(parsed.skipped.is_empty());
    }
}
