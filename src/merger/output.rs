use std::fmt;

use super::grammar::INDENT;
use super::procedures::Procedure;

/// The single reconstructed block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputBlock {
    pub name: String,
    /// Normalized directive line, present when any input block carried one.
    pub directive: Option<String>,
    pub accessors: Vec<String>,
    pub procedures: Vec<Procedure>,
    /// Unrecognized non-blank lines, trimmed.
    pub leftovers: Vec<String>,
    pub(super) header: String,
    pub(super) footer: String,
    pub(super) leftover_note: String,
}

impl OutputBlock {
    pub fn procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }

    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![self.header.clone(), String::new()];

        if let Some(directive) = &self.directive {
            out.push(format!("{INDENT}{directive}"));
            out.push(String::new());
        }

        for accessor in &self.accessors {
            out.push(format!("{INDENT}{accessor}"));
        }
        out.push(String::new());

        for procedure in &self.procedures {
            for line in &procedure.lines {
                if line.is_empty() {
                    out.push(String::new());
                } else {
                    out.push(format!("{INDENT}{line}"));
                }
            }
            out.push(String::new());
        }

        if !self.leftovers.is_empty() {
            out.push(format!("{INDENT}{}", self.leftover_note));
            for line in &self.leftovers {
                out.push(format!("{INDENT}{line}"));
            }
        }

        out.push(self.footer.clone());
        out
    }
}

impl fmt::Display for OutputBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}
