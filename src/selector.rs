use regex::Regex;

use crate::error::{Result, TransformError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedSheet {
    /// Position in the list the sheet was selected from.
    pub index: usize,
    pub name: String,
    pub date: String,
}

/// Picks the pending detail sheet with the greatest date token.
///
/// All-digit tokens compare as numbers of any length and rank above other
/// tokens, which compare as strings. The sort is stable, so among equal tokens
/// the sheet listed last wins.
pub fn select_detail_sheet(sheet_names: &[String], pattern: &Regex) -> Result<SelectedSheet> {
    let mut matches: Vec<SelectedSheet> = sheet_names
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            pattern.captures(name).and_then(|caps| {
                caps.get(1).map(|date| SelectedSheet {
                    index,
                    name: name.clone(),
                    date: date.as_str().to_string(),
                })
            })
        })
        .collect();

    matches.sort_by(|a, b| token_key(&a.date).cmp(&token_key(&b.date)));

    matches.pop().ok_or_else(|| TransformError::NoPendingSheet {
        pattern: pattern.as_str().to_string(),
    })
}

/// `(is_numeric, significant digits, digits, token)`; leading zeros only
/// break ties.
fn token_key(token: &str) -> (bool, usize, &str, &str) {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        let digits = token.trim_start_matches('0');
        (true, digits.len(), digits, token)
    } else {
        (false, 0, token, token)
    }
}
