//! Correspondence parser: turns the oracle's free-text answer into a
//! [`ColumnMapping`].
//!
//! Expected grammar, one assertion per line:
//!
//! ```text
//! 表1的第3列 对应 表2的第1列
//! ```
//!
//! Every line is classified on its own. Lines without the marker are noise;
//! lines with the marker that cannot be read are rejected individually and
//! never poison the rest of the response.

use crate::model::{ColumnMapping, MappingConflict, MappingType};

/// Marker meaning "corresponds to".
pub const MARKER: &str = "对应";
/// Separator between a table label and its column position.
pub const SEPARATOR: char = '的';

/// Which side of an assertion a problem was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One assertion, 0-based, in prompt orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correspondence {
    pub left: usize,
    pub right: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// No `的` in the phrase.
    MissingPosition(Side),
    /// Text after `的` is not a positive column number.
    BadPosition { side: Side, text: String },
    /// 1-based position past the end of the header list.
    OutOfRange { side: Side, position: usize, width: usize },
    /// Would break the partial injection.
    Conflict(MappingConflict),
}

/// Classification of a single response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineVerdict {
    Match(Correspondence),
    Noise,
    Rejected(Rejection),
}

/// Shape of the prompt the response answers.
#[derive(Debug, Clone, Copy)]
pub struct PromptShape {
    pub mapping_type: MappingType,
    pub left_width: usize,
    pub right_width: usize,
}

/// Parse result: the mapping plus every rejected line (1-based line number).
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub mapping: ColumnMapping,
    pub rejected: Vec<(usize, Rejection)>,
}

/// Parse a whole response. Mapping direction is `right → left`, i.e.
/// `{secondary_index: canonical_index}` for the canonical mapping types.
pub fn parse_response(text: &str, shape: PromptShape) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for (line_no, line) in text.lines().enumerate() {
        match classify_line(line, shape) {
            LineVerdict::Match(c) => {
                if let Err(conflict) = outcome.mapping.insert(c.right, c.left) {
                    log::debug!("line {}: {:?}: {}", line_no + 1, conflict, line.trim());
                    outcome
                        .rejected
                        .push((line_no + 1, Rejection::Conflict(conflict)));
                }
            }
            LineVerdict::Noise => {}
            LineVerdict::Rejected(reason) => {
                log::debug!("line {}: {:?}: {}", line_no + 1, reason, line.trim());
                outcome.rejected.push((line_no + 1, reason));
            }
        }
    }

    outcome
}

/// Classify one line independently of its neighbours.
pub fn classify_line(line: &str, shape: PromptShape) -> LineVerdict {
    let cleaned: String = line
        .chars()
        .filter(|c| !matches!(c, '。' | '*' | '`'))
        .collect();

    let Some((left, right)) = cleaned.split_once(MARKER) else {
        return LineVerdict::Noise;
    };

    let left = match read_phrase(strip_bullet(left), Side::Left) {
        Ok(p) => p,
        Err(r) => return LineVerdict::Rejected(r),
    };
    let right = match read_phrase(right, Side::Right) {
        Ok(p) => p,
        Err(r) => return LineVerdict::Rejected(r),
    };

    // Oracle answered with the tables swapped; follow its labels.
    let (expected_left, expected_right) = shape.mapping_type.table_labels();
    let (left_pos, right_pos) = if left.label == expected_right && right.label == expected_left {
        (right.position, left.position)
    } else {
        (left.position, right.position)
    };

    if let Err(r) = check_range(left_pos, shape.left_width, Side::Left) {
        return LineVerdict::Rejected(r);
    }
    if let Err(r) = check_range(right_pos, shape.right_width, Side::Right) {
        return LineVerdict::Rejected(r);
    }

    LineVerdict::Match(Correspondence {
        left: left_pos - 1,
        right: right_pos - 1,
    })
}

struct Phrase {
    label: String,
    /// 1-based.
    position: usize,
}

fn read_phrase(phrase: &str, side: Side) -> Result<Phrase, Rejection> {
    let (label, rest) = phrase
        .split_once(SEPARATOR)
        .ok_or(Rejection::MissingPosition(side))?;

    let label: String = label.chars().filter(|c| !c.is_whitespace()).collect();

    let body = rest.trim().trim_start_matches('第').trim_start();
    let end = body
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(body.len());
    let (digits, tail) = body.split_at(end);

    // A trailing `（学号）` / `(学号)` annotation repeats the label; ignore it.
    let tail = tail.trim_start().trim_start_matches('列').trim_start();
    let tail = if tail.starts_with(['（', '(']) { "" } else { tail };
    let tail_is_noise = tail
        .chars()
        .all(|c| matches!(c, '.' | ',' | '，' | ';' | '；' | '、') || c.is_whitespace());

    match digits.parse::<usize>() {
        Ok(n) if n > 0 && tail_is_noise => Ok(Phrase { label, position: n }),
        _ => Err(Rejection::BadPosition {
            side,
            text: rest.trim().to_string(),
        }),
    }
}

fn check_range(position: usize, width: usize, side: Side) -> Result<(), Rejection> {
    if position > width {
        Err(Rejection::OutOfRange { side, position, width })
    } else {
        Ok(())
    }
}

/// Drop list bullets such as `- `, `1. ` or `2、` in front of an assertion.
fn strip_bullet(phrase: &str) -> &str {
    let trimmed = phrase.trim_start().trim_start_matches(|c: char| c == '-' || c == '•').trim_start();
    let digits_end = trimmed
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    if digits_end == 0 {
        return trimmed;
    }
    let rest = &trimmed[digits_end..];
    match rest.chars().next() {
        Some(c @ ('.' | '、' | ')')) => rest[c.len_utf8()..].trim_start(),
        _ => trimmed,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
