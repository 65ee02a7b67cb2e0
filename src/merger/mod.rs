pub mod blocks;
pub mod extract;
pub mod grammar;
pub mod ordered;
pub mod output;
pub mod procedures;

use tracing::debug;

pub use grammar::{Grammar, GrammarError, Syntax};
pub use output::OutputBlock;
pub use procedures::Procedure;

/// Merge concatenated generator output into one page-object class named `name`.
pub fn merge(raw: &str, name: &str) -> String {
    merge_with(raw, name, Grammar::page_object()).to_string()
}

/// Five passes: blocks → directive → accessors → procedures → assembly.
/// Total over any input; malformed structure degrades to best-effort inclusion.
pub fn merge_with(raw: &str, name: &str, grammar: &Grammar) -> OutputBlock {
    let normalized = raw.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let content = blocks::extract_blocks(&lines, grammar);
    let (opened, fallback) = (content.opened, content.fallback);
    let (has_directive, rest) = extract::take_directive(content.lines, grammar);
    let (accessors, rest) = extract::take_accessors(rest, grammar);
    let scanned = procedures::scan(&rest, grammar);

    let duplicates: usize = scanned
        .procedures
        .iter()
        .map(|(_, occurrences)| occurrences.len().saturating_sub(1))
        .sum();
    let procedures: Vec<Procedure> = scanned
        .procedures
        .iter()
        .filter_map(|(key, occurrences)| procedures::merge_occurrences(key, occurrences, grammar))
        .collect();

    // A stray end marker would close the output block early.
    let leftover_note = grammar.leftover_note();
    let leftovers: Vec<String> = scanned
        .leftovers
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && *line != leftover_note && !grammar.is_end(line))
        .map(str::to_string)
        .collect();

    debug!(
        blocks = opened,
        fallback,
        directive = has_directive,
        accessors = accessors.len(),
        procedures = procedures.len(),
        duplicates,
        leftovers = leftovers.len(),
        "merged {}",
        name
    );

    OutputBlock {
        name: name.to_string(),
        directive: has_directive.then(|| grammar.directive_line()),
        accessors,
        procedures,
        leftovers,
        header: grammar.block_open_line(name),
        footer: grammar.end_line().to_string(),
        leftover_note,
    }
}
