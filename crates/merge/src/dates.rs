//! `MM.DD` normalization for date columns.
//!
//! Values that are unambiguous locally are rewritten without a round trip;
//! the rest go to the oracle in one batch and its answer lines are laid back
//! onto the non-empty positions in order.

use chrono::NaiveDate;

use crate::oracle::Oracle;

/// Counts for one normalized column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateStats {
    pub local: usize,
    pub oracle: usize,
}

/// Normalize a single value without the oracle, if its shape is unambiguous.
///
/// Accepted: `M.D`, `M/D`, `M-D`, `M月D日`, and the same with a leading
/// four-digit year (`2024/1/7`, `2024-01-07`, `2024年1月7日`). A trailing time
/// part after whitespace is ignored.
pub fn normalize_local(value: &str) -> Option<String> {
    let date_part = value.split_whitespace().next()?;

    if date_part
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '.' | '/' | '-' | '年' | '月' | '日')))
    {
        return None;
    }

    let groups: Vec<&str> = date_part
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .collect();

    let (month, day) = match groups.as_slice() {
        [m, d] if m.len() <= 2 && d.len() <= 2 => (m.parse().ok()?, d.parse().ok()?),
        [y, m, d] if y.len() == 4 && m.len() <= 2 && d.len() <= 2 => {
            (m.parse().ok()?, d.parse().ok()?)
        }
        _ => return None,
    };

    // Leap year so 02.29 is accepted.
    NaiveDate::from_ymd_opt(2000, month, day)?;
    Some(format!("{month:02}.{day:02}"))
}

/// Lay oracle answer lines onto the non-empty positions of `values`.
///
/// Empty inputs stay empty. Blank answer lines count as answers, so a value
/// the oracle could not read comes back empty without shifting the rest.
/// `None` when the number of answer lines does not match the number of
/// non-empty values.
pub fn align_answer(values: &[String], answer: &str) -> Option<Vec<String>> {
    let lines: Vec<&str> = answer.trim_end().lines().collect();
    let expected = values.iter().filter(|v| !v.trim().is_empty()).count();
    if lines.len() != expected {
        return None;
    }

    let mut lines = lines.into_iter();
    Some(
        values
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    return String::new();
                }
                let line = lines.next().unwrap_or_default().trim();
                normalize_local(line).unwrap_or_else(|| line.to_string())
            })
            .collect(),
    )
}

/// Normalize a whole column. Never fails: if the oracle is unavailable the
/// values it would have handled are kept verbatim.
pub fn normalize_column(values: &[String], oracle: &dyn Oracle) -> (Vec<String>, DateStats) {
    let mut out = values.to_vec();
    let mut stats = DateStats::default();
    let mut pending: Vec<usize> = Vec::new();

    for (i, v) in values.iter().enumerate() {
        if v.trim().is_empty() {
            out[i] = String::new();
            continue;
        }
        match normalize_local(v) {
            Some(d) => {
                out[i] = d;
                stats.local += 1;
            }
            None => pending.push(i),
        }
    }

    if pending.is_empty() {
        return (out, stats);
    }

    let batch: Vec<String> = pending.iter().map(|&i| values[i].trim().to_string()).collect();
    match oracle.normalize_dates(&batch) {
        Ok(answer) if !answer.trim().is_empty() => match align_answer(&batch, &answer) {
            Some(aligned) => {
                for (&i, d) in pending.iter().zip(aligned) {
                    out[i] = d;
                }
                stats.oracle = pending.len();
            }
            None => log::warn!(
                "date normalization: answer has {} lines for {} values, keeping them",
                answer.trim_end().lines().count(),
                pending.len()
            ),
        },
        Ok(_) => log::warn!("date normalization: empty answer, keeping {} values", pending.len()),
        Err(e) => log::warn!("date normalization failed ({e}), keeping {} values", pending.len()),
    }

    (out, stats)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
