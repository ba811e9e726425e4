//! Region directive extraction.
//!
//! Source buffers may contain matched pairs of start/end region markers with
//! a free-text label on the start marker. This module pairs them with an
//! explicit stack scan and turns each pair into a [`Viewport`] whose span is
//! the exclusive range between the two directives.
//!
//! Pairing policy:
//! - Nesting is LIFO: a close marker pairs with the most recent open marker.
//! - An unmatched close marker (empty stack) is silently ignored.
//! - An unmatched open marker (missing close) is likewise silently ignored;
//!   it never pairs and yields no viewport and no error.
//! - A label collision anywhere in one extraction call aborts the whole
//!   call with [`BridgeError::DuplicateRegionLabel`].

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use crate::error::{BridgeError, BridgeResult};

use super::buffer::{Buffer, BufferId};
use super::viewport::Viewport;

/// A region directive located in a buffer, in document order.
///
/// Spans cover the directive text itself plus the adjacent line terminator,
/// so that the range *between* an open and a close directive is exactly the
/// region body with no surrounding newlines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A start-region marker with its trailing label text.
    Open { span: Range<usize>, label: String },
    /// An end-region marker.
    Close { span: Range<usize> },
}

/// The parse capability consumed by extraction: enumerate the directive
/// markers of a buffer in document order.
///
/// The real language front-end supplies these from syntax trivia; the
/// built-in [`LineDirectiveScanner`] recognizes `#region` / `#endregion`
/// lines without a full parse.
pub trait DirectiveScanner: Send + Sync {
    fn scan(&self, content: &str) -> Vec<Directive>;
}

/// Line-based scanner for `#region <label>` / `#endregion` directives.
///
/// A directive line may be indented; indentation and any trailing `\r` are
/// not part of the label. The open directive's span runs to the end of its
/// line terminator and the close directive's span starts at the terminator
/// of the preceding line, so the region body excludes both directive lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LineDirectiveScanner;

const OPEN_KEYWORD: &str = "#region";
const CLOSE_KEYWORD: &str = "#endregion";

impl DirectiveScanner for LineDirectiveScanner {
    fn scan(&self, content: &str) -> Vec<Directive> {
        let mut directives = Vec::new();
        let bytes = content.as_bytes();
        let mut line_start = 0;

        while line_start < content.len() {
            let line_end = content[line_start..]
                .find('\n')
                .map(|pos| line_start + pos);
            // End of the line's terminator, or end of input for the last line.
            let after = line_end.map(|end| end + 1).unwrap_or(content.len());
            let line = &content[line_start..line_end.unwrap_or(content.len())];
            let trimmed = line.trim();

            if let Some(rest) = keyword_rest(trimmed, OPEN_KEYWORD) {
                directives.push(Directive::Open {
                    span: line_start..after,
                    label: rest.trim().to_string(),
                });
            } else if keyword_rest(trimmed, CLOSE_KEYWORD).is_some() {
                // Claim the preceding line terminator so the region body
                // ends at the last content character.
                let mut span_start = line_start;
                if span_start > 0 && bytes[span_start - 1] == b'\n' {
                    span_start -= 1;
                    if span_start > 0 && bytes[span_start - 1] == b'\r' {
                        span_start -= 1;
                    }
                }
                directives.push(Directive::Close {
                    span: span_start..after,
                });
            }

            line_start = after;
        }

        directives
    }
}

/// Strip `keyword` from the start of a trimmed line, requiring it to be a
/// whole word. Returns the trailing text on a match.
fn keyword_rest<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

/// Extract every labeled region of `buffers` as a viewport.
///
/// Labels must be unique across the entire call, including across buffers;
/// a collision fails the whole extraction with
/// [`BridgeError::DuplicateRegionLabel`]. Re-extracting the same input
/// reproduces identical spans and labels.
pub fn extract_viewports(
    buffers: &[Arc<Buffer>],
    scanner: &dyn DirectiveScanner,
) -> BridgeResult<Vec<Viewport>> {
    let mut seen_labels: HashSet<String> = HashSet::new();
    let mut viewports = Vec::new();

    for buffer in buffers {
        let mut open_stack: Vec<(Range<usize>, String)> = Vec::new();

        for directive in scanner.scan(&buffer.content) {
            match directive {
                Directive::Open { span, label } => open_stack.push((span, label)),
                Directive::Close { span } => {
                    let Some((open_span, label)) = open_stack.pop() else {
                        // Unmatched close marker: ignored by contract.
                        continue;
                    };
                    if !seen_labels.insert(label.clone()) {
                        return Err(BridgeError::duplicate_region_label(label));
                    }
                    let start = open_span.end;
                    let end = span.start.max(start);
                    viewports.push(Viewport::new(
                        Arc::clone(buffer),
                        start..end,
                        BufferId::region(&buffer.id.file_name, label),
                    ));
                }
            }
        }
    }

    Ok(viewports)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(file_name: &str, content: &str) -> Arc<Buffer> {
        Arc::new(Buffer::new(BufferId::file(file_name), content, 0))
    }

    fn extract(buffers: &[Arc<Buffer>]) -> BridgeResult<Vec<Viewport>> {
        extract_viewports(buffers, &LineDirectiveScanner)
    }

    #[test]
    fn single_region_yields_exact_body() {
        let buffers = [buffer("A.cs", "#region X\nreturn 1;\n#endregion")];
        let viewports = extract(&buffers).unwrap();

        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0].id(), &BufferId::region("A.cs", "X"));
        assert_eq!(viewports[0].text(), "return 1;");
    }

    #[test]
    fn crlf_region_yields_exact_body() {
        let buffers = [buffer("A.cs", "#region X\r\nreturn 1;\r\n#endregion\r\n")];
        let viewports = extract(&buffers).unwrap();
        assert_eq!(viewports[0].text(), "return 1;");
    }

    #[test]
    fn indented_directives_are_recognized() {
        let buffers = [buffer(
            "A.cs",
            "class C {\n    #region body\n    int x;\n    #endregion\n}\n",
        )];
        let viewports = extract(&buffers).unwrap();
        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0].id(), &BufferId::region("A.cs", "body"));
        assert_eq!(viewports[0].text(), "    int x;");
    }

    #[test]
    fn nested_regions_pair_lifo() {
        let source = "#region outer\nbefore\n#region inner\nmiddle\n#endregion\nafter\n#endregion\n";
        let buffers = [buffer("A.cs", source)];
        let viewports = extract(&buffers).unwrap();

        assert_eq!(viewports.len(), 2);
        // The inner region closes first.
        assert_eq!(viewports[0].id(), &BufferId::region("A.cs", "inner"));
        assert_eq!(viewports[0].text(), "middle");
        assert_eq!(viewports[1].id(), &BufferId::region("A.cs", "outer"));
        assert_eq!(
            viewports[1].text(),
            "before\n#region inner\nmiddle\n#endregion\nafter"
        );
    }

    #[test]
    fn spans_exclude_all_directive_text() {
        let source = "#region a\none\n#endregion\n#region b\ntwo\n#endregion\n";
        let buffers = [buffer("A.cs", source)];
        let viewports = extract(&buffers).unwrap();

        assert_eq!(viewports.len(), 2);
        for viewport in &viewports {
            assert!(!viewport.text().contains("#region"));
            assert!(!viewport.text().contains("#endregion"));
        }
        // Pairwise non-overlapping.
        let (first, second) = (viewports[0].span(), viewports[1].span());
        assert!(first.end <= second.start || second.end <= first.start);
    }

    #[test]
    fn duplicate_label_in_one_file_fails() {
        let buffers = [buffer("A.cs", "#region X\na\n#endregion\n#region X\nb\n#endregion\n")];
        let err = extract(&buffers).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::DuplicateRegionLabel { label } if label == "X"
        ));
    }

    #[test]
    fn duplicate_label_across_files_fails() {
        let buffers = [
            buffer("A.cs", "#region X\na\n#endregion\n"),
            buffer("B.cs", "#region X\nb\n#endregion\n"),
        ];
        let err = extract(&buffers).unwrap_err();
        assert!(matches!(err, BridgeError::DuplicateRegionLabel { .. }));
    }

    #[test]
    fn unmatched_close_is_ignored() {
        let buffers = [buffer("A.cs", "#endregion\n#region X\nbody\n#endregion\n")];
        let viewports = extract(&buffers).unwrap();
        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0].text(), "body");
    }

    #[test]
    fn unmatched_open_is_ignored() {
        let buffers = [buffer("A.cs", "#region dangling\nbody\n")];
        let viewports = extract(&buffers).unwrap();
        assert!(viewports.is_empty());
    }

    #[test]
    fn empty_region_has_empty_span() {
        let buffers = [buffer("A.cs", "#region X\n#endregion\n")];
        let viewports = extract(&buffers).unwrap();
        assert_eq!(viewports.len(), 1);
        assert_eq!(viewports[0].text(), "");
    }

    #[test]
    fn extraction_is_idempotent() {
        let buffers = [buffer("A.cs", "#region X\nreturn 1;\n#endregion\n")];
        let first = extract(&buffers).unwrap();
        let second = extract(&buffers).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.span(), b.span());
        }
    }

    #[test]
    fn region_keyword_must_be_a_whole_word() {
        // "#regions" is not a directive; neither is "#endregionx".
        let buffers = [buffer("A.cs", "#regions X\nbody\n#endregionx\n")];
        let viewports = extract(&buffers).unwrap();
        assert!(viewports.is_empty());
    }

    #[test]
    fn many_regions_all_extracted() {
        let mut source = String::new();
        for i in 0..10 {
            source.push_str(&format!("#region r{i}\nbody {i}\n#endregion\n"));
        }
        let buffers = [buffer("A.cs", &source)];
        let viewports = extract(&buffers).unwrap();

        assert_eq!(viewports.len(), 10);
        for (i, viewport) in viewports.iter().enumerate() {
            assert_eq!(viewport.id(), &BufferId::region("A.cs", format!("r{i}")));
            assert_eq!(viewport.text(), format!("body {i}"));
        }
    }
}
