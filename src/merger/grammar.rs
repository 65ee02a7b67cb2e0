use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// One level of indentation in the merged output.
pub const INDENT: &str = "  ";

const MERGE_SEPARATOR: &str = "----- Merged from duplicate method definition -----";
const LEFTOVER_NOTE: &str =
    "leftover lines that did not belong to any recognized method or accessor";

const PAGE_OBJECT_ACCESSORS: &[&str] = &[
    "text_field",
    "hidden_field",
    "button",
    "link",
    "select_list",
    "checkbox",
    "radio_button",
    "radio_button_group",
    "textarea",
    "div",
    "span",
    "table",
    "cell",
    "image",
    "element",
    "heading",
    "paragraph",
];

static PAGE_OBJECT: LazyLock<Grammar> =
    LazyLock::new(|| Grammar::new(&Syntax::default()).unwrap());

/// The textual dialect the generator answers in. Defaults to Ruby page-object classes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Syntax {
    pub block_keyword: String,
    pub procedure_keyword: String,
    pub end_keyword: String,
    pub directive: String,
    pub accessor_keywords: Vec<String>,
    pub comment_prefix: String,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax {
            block_keyword: "class".into(),
            procedure_keyword: "def".into(),
            end_keyword: "end".into(),
            directive: "include PageObject".into(),
            accessor_keywords: PAGE_OBJECT_ACCESSORS.iter().map(|k| k.to_string()).collect(),
            comment_prefix: "#".into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("syntax.{0} must not be empty")]
    EmptyKeyword(&'static str),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Line matchers compiled from a [`Syntax`].
#[derive(Debug, Clone)]
pub struct Grammar {
    syntax: Syntax,
    block_open: Regex,
    procedure_open: Regex,
    /// `def name(args) = expr`: a definition with no closing line.
    endless: Regex,
    directive: Option<Regex>,
    accessor: Option<Regex>,
}

impl Grammar {
    pub fn new(syntax: &Syntax) -> Result<Self, GrammarError> {
        for (field, value) in [
            ("block_keyword", &syntax.block_keyword),
            ("procedure_keyword", &syntax.procedure_keyword),
            ("end_keyword", &syntax.end_keyword),
        ] {
            if value.trim().is_empty() {
                return Err(GrammarError::EmptyKeyword(field));
            }
        }

        let block_open = Regex::new(&format!(
            r"^\s*{}\s+(\S+)",
            regex::escape(syntax.block_keyword.trim())
        ))?;
        let procedure_open = Regex::new(&format!(
            r"^\s*{}\s+([a-zA-Z0-9_!?]+)",
            regex::escape(syntax.procedure_keyword.trim())
        ))?;
        let endless = Regex::new(&format!(
            r"^\s*{}\s+[a-zA-Z0-9_!?]+(?:\([^)]*\))?\s+=[^=~]",
            regex::escape(syntax.procedure_keyword.trim())
        ))?;

        let directive_tokens: Vec<String> = syntax
            .directive
            .split_whitespace()
            .map(regex::escape)
            .collect();
        let directive = if directive_tokens.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"^\s*{}\s*$", directive_tokens.join(r"\s+")))?)
        };

        let keywords: Vec<String> = syntax
            .accessor_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        let accessor = if keywords.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(r"^\s*(?:{})\s*\(", keywords.join("|")))?)
        };

        Ok(Grammar {
            syntax: syntax.clone(),
            block_open,
            procedure_open,
            endless,
            directive,
            accessor,
        })
    }

    /// The built-in Ruby page-object grammar.
    pub fn page_object() -> &'static Grammar {
        &PAGE_OBJECT
    }

    /// Declared name of a block-opening line, if the line opens a block.
    pub fn block_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.block_open
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    pub fn procedure_name<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.procedure_open
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// A procedure opener that is closed on the same line, so no end line follows.
    pub fn is_inline_procedure(&self, line: &str) -> bool {
        if self.procedure_name(line).is_none() {
            return false;
        }
        let closed = line
            .trim()
            .strip_suffix(self.end_line())
            .is_some_and(|head| head.ends_with(|c: char| c == ';' || c.is_whitespace()));
        closed || self.endless.is_match(line)
    }

    pub fn is_end(&self, line: &str) -> bool {
        line.trim() == self.syntax.end_keyword.trim()
    }

    pub fn is_directive(&self, line: &str) -> bool {
        self.directive.as_ref().is_some_and(|re| re.is_match(line.trim()))
    }

    pub fn is_accessor(&self, line: &str) -> bool {
        self.accessor.as_ref().is_some_and(|re| re.is_match(line.trim()))
    }

    pub fn block_open_line(&self, name: &str) -> String {
        format!("{} {}", self.syntax.block_keyword.trim(), name)
    }

    pub fn end_line(&self) -> &str {
        self.syntax.end_keyword.trim()
    }

    /// Directive with its whitespace normalized to single spaces.
    pub fn directive_line(&self) -> String {
        self.syntax.directive.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn merge_separator(&self) -> String {
        self.comment(MERGE_SEPARATOR)
    }

    pub fn leftover_note(&self) -> String {
        self.comment(LEFTOVER_NOTE)
    }

    fn comment(&self, text: &str) -> String {
        format!("{} {}", self.syntax.comment_prefix.trim(), text)
    }
}
