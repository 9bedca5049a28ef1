//! Cleanup of raw backend replies before they reach the user.
//!
//! The backend returns its reply XML-escaped and sprinkled with client-side
//! markup (`xlink ... xlink` link blocks, escaped `<P>` image blocks, escaped
//! `<br>` tags). The scanner below finds every known marker once and cuts the
//! spans each rule claims.

use std::ops::Range;

/// Messenger rejects text messages longer than this many characters.
pub const MESSAGE_CHAR_LIMIT: usize = 640;

const ESCAPED_QUOTE: &str = "&quot;";
const ESCAPED_BREAK: &str = "&lt;br&gt;";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    XLink,
    XGallery,
    XnsLink,
    XLoadSwf,
    ParagraphOpen,
    ParagraphClose,
}

impl Marker {
    const ALL: [Marker; 6] = [
        Marker::XLink,
        Marker::XGallery,
        Marker::XnsLink,
        Marker::XLoadSwf,
        Marker::ParagraphOpen,
        Marker::ParagraphClose,
    ];

    fn literal(self) -> &'static str {
        match self {
            Marker::XLink => "xlink",
            Marker::XGallery => "xgallery",
            Marker::XnsLink => "xnslink",
            Marker::XLoadSwf => "xloadswf",
            Marker::ParagraphOpen => "&lt;P",
            Marker::ParagraphClose => "P&gt;",
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    marker: Marker,
    span: Range<usize>,
}

/// Cut from the first `open` token through the end of the last `close` token.
#[derive(Debug, Clone, Copy)]
struct StripRule {
    open: Marker,
    close: Marker,
}

const STRIP_RULES: [StripRule; 5] = [
    StripRule {
        open: Marker::XLink,
        close: Marker::XLink,
    },
    StripRule {
        open: Marker::XGallery,
        close: Marker::XGallery,
    },
    StripRule {
        open: Marker::XnsLink,
        close: Marker::XnsLink,
    },
    StripRule {
        open: Marker::XLoadSwf,
        close: Marker::XLoadSwf,
    },
    StripRule {
        open: Marker::ParagraphOpen,
        close: Marker::ParagraphClose,
    },
];

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

fn scan(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Marker::ALL
        .iter()
        .flat_map(|&marker| {
            let literal = marker.literal();
            text.match_indices(literal).map(move |(start, _)| Token {
                marker,
                span: start..start + literal.len(),
            })
        })
        .collect();
    tokens.sort_by_key(|t| t.span.start);
    tokens
}

/// Byte ranges to delete, in rule order. Tokens swallowed by an earlier cut
/// no longer count for later rules.
fn plan_cuts(tokens: &[Token]) -> Vec<Range<usize>> {
    let mut cuts: Vec<Range<usize>> = Vec::new();
    for rule in STRIP_RULES {
        let alive = |t: &&Token| !cuts.iter().any(|cut| overlaps(cut, &t.span));
        let start = tokens
            .iter()
            .filter(alive)
            .filter(|t| t.marker == rule.open)
            .map(|t| t.span.start)
            .min();
        let end = tokens
            .iter()
            .filter(alive)
            .filter(|t| t.marker == rule.close)
            .map(|t| t.span.end)
            .max();
        if let (Some(start), Some(end)) = (start, end) {
            if end > start {
                cuts.push(start..end);
            }
        }
    }
    cuts
}

fn strip_markup(text: &str) -> String {
    let mut cuts = plan_cuts(&scan(text));
    if cuts.is_empty() {
        return text.to_string();
    }
    cuts.sort_by_key(|cut| cut.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for cut in cuts {
        if cut.start > cursor {
            out.push_str(&text[cursor..cut.start]);
        }
        cursor = cursor.max(cut.end);
    }
    out.push_str(&text[cursor..]);
    out
}

/// Fit `text` into `limit` characters, preferring to end on a full sentence.
///
/// Keeps everything up to and including the last `.` inside the window; with
/// no period in the window the text is hard-cut at `limit` characters.
pub fn truncate_at_sentence(text: &str, limit: usize) -> &str {
    let Some((cut, _)) = text.char_indices().nth(limit) else {
        return text;
    };
    let window = &text[..cut];
    match window.rfind('.') {
        Some(idx) => &text[..=idx],
        None => window,
    }
}

/// Truncate, unescape quotes, strip backend markup, drop escaped line breaks.
pub fn sanitize_reply(raw: &str) -> String {
    let truncated = truncate_at_sentence(raw, MESSAGE_CHAR_LIMIT);
    let unquoted = truncated.replace(ESCAPED_QUOTE, "\"");
    strip_markup(&unquoted).replace(ESCAPED_BREAK, "")
}
