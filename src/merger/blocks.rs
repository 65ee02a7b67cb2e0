use super::grammar::Grammar;

/// Nesting state of the block scanner. Markers are counted, never matched by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Depth {
    Outside,
    Inside {
        /// Open block markers.
        blocks: usize,
        /// Open multi-line procedures inside the current block; their `end` lines are content.
        nested: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContent<'a> {
    pub lines: Vec<&'a str>,
    pub opened: usize,
    /// No block marker was found, so `lines` is the whole input.
    pub fallback: bool,
}

/// Flatten every block body into one line stream, dropping the block markers.
pub fn extract_blocks<'a>(lines: &[&'a str], grammar: &Grammar) -> BlockContent<'a> {
    let mut content = Vec::with_capacity(lines.len());
    let mut opened = 0;
    let mut depth = Depth::Outside;

    for &line in lines {
        depth = match depth {
            Depth::Outside => {
                if grammar.block_name(line).is_some() {
                    opened += 1;
                    Depth::Inside { blocks: 1, nested: 0 }
                } else {
                    Depth::Outside
                }
            }
            Depth::Inside { blocks, nested } => {
                if grammar.block_name(line).is_some() {
                    opened += 1;
                    Depth::Inside {
                        blocks: blocks + 1,
                        nested,
                    }
                } else if grammar.is_end(line) {
                    if nested > 0 {
                        content.push(line);
                        Depth::Inside {
                            blocks,
                            nested: nested - 1,
                        }
                    } else if blocks > 1 {
                        Depth::Inside {
                            blocks: blocks - 1,
                            nested: 0,
                        }
                    } else {
                        Depth::Outside
                    }
                } else {
                    content.push(line);
                    let opens_span = grammar.procedure_name(line).is_some()
                        && !grammar.is_inline_procedure(line);
                    let nested = if opens_span {
                        nested + 1
                    } else {
                        nested
                    };
                    Depth::Inside { blocks, nested }
                }
            }
        };
    }

    if opened == 0 {
        return BlockContent {
            lines: lines.to_vec(),
            opened,
            fallback: true,
        };
    }

    BlockContent {
        lines: content,
        opened,
        fallback: false,
    }
}
