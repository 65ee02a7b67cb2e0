use std::collections::HashSet;

use super::grammar::Grammar;

/// Remove every directive line. Returns whether at least one was present.
pub fn take_directive<'a>(lines: Vec<&'a str>, grammar: &Grammar) -> (bool, Vec<&'a str>) {
    let before = lines.len();
    let rest: Vec<&str> = lines
        .into_iter()
        .filter(|line| !grammar.is_directive(line))
        .collect();
    (rest.len() < before, rest)
}

/// Remove accessor declarations, keeping each distinct trimmed line once in first-seen order.
pub fn take_accessors<'a>(lines: Vec<&'a str>, grammar: &Grammar) -> (Vec<String>, Vec<&'a str>) {
    let mut seen = HashSet::new();
    let mut accessors = Vec::new();
    let mut rest = Vec::with_capacity(lines.len());

    for line in lines {
        if !grammar.is_accessor(line) {
            rest.push(line);
            continue;
        }
        let norm = line.trim();
        if seen.insert(norm) {
            accessors.push(norm.to_string());
        }
    }

    (accessors, rest)
}
