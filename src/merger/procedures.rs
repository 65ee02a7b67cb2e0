use super::grammar::{Grammar, INDENT};
use super::ordered::OrderedMap;

/// One captured `def … end` span as it appeared in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub opening: String,
    pub body: Vec<String>,
    /// `None` when the input ended before the span was closed.
    pub closing: Option<String>,
}

impl Occurrence {
    fn open(line: &str) -> Self {
        Occurrence {
            opening: line.to_string(),
            body: Vec::new(),
            closing: None,
        }
    }
}

/// Multi-line procedures group by name; one-line definitions by their exact text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Inline { name: String, line: String },
}

impl Key {
    pub fn name(&self) -> &str {
        match self {
            Key::Name(name) | Key::Inline { name, .. } => name,
        }
    }
}

#[derive(Debug)]
enum Scanner {
    Scanning,
    Capturing { name: String, occurrence: Occurrence },
}

#[derive(Debug)]
pub struct Scanned<'a> {
    pub procedures: OrderedMap<Key, Vec<Occurrence>>,
    pub leftovers: Vec<&'a str>,
}

/// Split lines into procedure spans (grouped by [`Key`]) and everything else.
pub fn scan<'a>(lines: &[&'a str], grammar: &Grammar) -> Scanned<'a> {
    let mut procedures: OrderedMap<Key, Vec<Occurrence>> = OrderedMap::new();
    let mut leftovers = Vec::new();
    let mut state = Scanner::Scanning;

    for &line in lines {
        state = match state {
            Scanner::Scanning => match grammar.procedure_name(line) {
                Some(name) if grammar.is_inline_procedure(line) => {
                    let key = Key::Inline {
                        name: name.to_string(),
                        line: line.trim().to_string(),
                    };
                    procedures.get_or_insert_with(key, Vec::new).push(Occurrence::open(line));
                    Scanner::Scanning
                }
                Some(name) => Scanner::Capturing {
                    name: name.to_string(),
                    occurrence: Occurrence::open(line),
                },
                None => {
                    leftovers.push(line);
                    Scanner::Scanning
                }
            },
            Scanner::Capturing {
                name,
                mut occurrence,
            } => {
                if grammar.is_end(line) {
                    occurrence.closing = Some(line.to_string());
                    procedures
                        .get_or_insert_with(Key::Name(name), Vec::new)
                        .push(occurrence);
                    Scanner::Scanning
                } else {
                    occurrence.body.push(line.to_string());
                    Scanner::Capturing { name, occurrence }
                }
            }
        };
    }

    // Input ended mid-procedure: keep what was captured.
    if let Scanner::Capturing { name, occurrence } = state {
        procedures
            .get_or_insert_with(Key::Name(name), Vec::new)
            .push(occurrence);
    }

    Scanned {
        procedures,
        leftovers,
    }
}

/// A procedure after all of its occurrences were combined.
///
/// `lines` is relative to the procedure: the opening and closing lines carry no
/// indentation and body lines are indented one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Procedure {
    pub name: String,
    pub lines: Vec<String>,
}

impl Procedure {
    pub fn body(&self) -> &[String] {
        match self.lines.len() {
            0..=2 => &[],
            n => &self.lines[1..n - 1],
        }
    }
}

/// Keep the first occurrence's opening and closing lines and join every
/// occurrence's body in order, separated by a marker comment.
/// A one-line definition is its own trimmed line.
pub fn merge_occurrences(
    key: &Key,
    occurrences: &[Occurrence],
    grammar: &Grammar,
) -> Option<Procedure> {
    let (first, rest) = occurrences.split_first()?;
    let name = match key {
        Key::Name(name) => name,
        Key::Inline { name, line } => {
            return Some(Procedure {
                name: name.clone(),
                lines: vec![line.clone()],
            })
        }
    };

    let mut lines = vec![first.opening.trim().to_string()];
    lines.extend(reindent(&first.body));
    for other in rest {
        lines.push(format!("{INDENT}{}", grammar.merge_separator()));
        lines.extend(reindent(&other.body));
    }
    let closing = first
        .closing
        .as_deref()
        .map(str::trim)
        .unwrap_or_else(|| grammar.end_line());
    lines.push(closing.to_string());

    Some(Procedure {
        name: name.clone(),
        lines,
    })
}

/// Strip the body's common indentation and indent it one level.
fn reindent(body: &[String]) -> Vec<String> {
    let common = body
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
        .min()
        .unwrap_or(0);

    body.iter()
        .map(|l| {
            if l.trim().is_empty() {
                String::new()
            } else {
                let rest: String = l.chars().skip(common).collect();
                format!("{INDENT}{}", rest.trim_end())
            }
        })
        .collect()
}
