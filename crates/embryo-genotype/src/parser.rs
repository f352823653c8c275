//! Parser: recursive descent over genotype text
//!
//! A chain is a run of simple tokens ending in `>`, or in a division or
//! repetition whose second child carries the rest of the chain. Before a
//! division or repetition is descended into, `scan_closing` locates the `>`
//! that ends its first branch, so an unmatched opener is reported at its own
//! offset rather than wherever the input happens to run out.
//!
//! Only first branches recurse; the second branch continues the loop of the
//! enclosing chain. First branches nest at most `MAX_NESTING_DEPTH` deep.

use embryo_alphabet::{Alphabet, NeuronProperty, Sign};

use crate::error::{GenoError, GenoResult};
use crate::tree::{CellKind, GenoTree, LinkSource, NodeId, NodeKind};
use crate::{MAX_NESTING_DEPTH, MAX_REPEAT_COUNT, MIN_REPEAT_COUNT};

/// Parse genotype text into a program tree
pub fn parse(alphabet: &Alphabet, text: &str) -> GenoResult<GenoTree> {
    let mut parser = Parser {
        text,
        bytes: text.as_bytes(),
        alphabet,
        tree: GenoTree::new(),
    };
    let root = parser.tree.root();
    let end = parser.parse_chain(0, text.len(), root, 0, None, 0)?;
    let rest = parser.skip_whitespace(end, text.len());
    if rest < text.len() {
        return Err(GenoError::syntax(rest, "unexpected text after the end of the genotype"));
    }
    if parser.tree.program().is_none() {
        return Err(GenoError::syntax(0, "empty genotype"));
    }
    Ok(parser.tree)
}

/// Find the `>` closing the construct whose body starts at `from`.
///
/// Divisions and repetitions nested inside need one extra `>` each.
/// Bracketed connections and quoted names are skipped whole.
pub fn scan_closing(bytes: &[u8], from: usize, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = from;
    while i < end {
        match bytes[i] {
            b'<' | b'#' => depth += 1,
            b'>' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            b'[' => i = scan_bracket(bytes, i + 1, end)?,
            b'"' => i = scan_quote(bytes, i + 1, end)?,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Position of the `]` closing a connection body starting at `from`
pub(crate) fn scan_bracket(bytes: &[u8], from: usize, end: usize) -> Option<usize> {
    let mut i = from;
    while i < end {
        match bytes[i] {
            b']' => return Some(i),
            b'"' => i = scan_quote(bytes, i + 1, end)?,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Position of the `"` closing a quoted name starting at `from`
pub(crate) fn scan_quote(bytes: &[u8], from: usize, end: usize) -> Option<usize> {
    (from..end).find(|&i| bytes[i] == b'"')
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    alphabet: &'a Alphabet,
    tree: GenoTree,
}

impl<'a> Parser<'a> {
    fn skip_whitespace(&self, mut pos: usize, end: usize) -> usize {
        while pos < end && self.bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        pos
    }

    /// Parse one chain in `[start, end)` and hang it under `parent`'s `slot`.
    /// Returns the position just after the chain's closing `>`.
    fn parse_chain(
        &mut self,
        start: usize,
        end: usize,
        parent: NodeId,
        slot: usize,
        opener: Option<usize>,
        depth: usize,
    ) -> GenoResult<usize> {
        let (mut parent, mut slot, mut opener) = (parent, slot, opener);
        let mut pos = start;
        loop {
            pos = self.skip_whitespace(pos, end);
            if pos >= end {
                return Err(match opener {
                    Some(at) => GenoError::syntax(at, "branch is never closed with '>'"),
                    None => GenoError::syntax(pos, "genotype must end with '>'"),
                });
            }

            let split = match self.bytes[pos] {
                b'<' => Some((NodeKind::Division, pos + 1)),
                b'#' => {
                    let (count, body) = self.parse_count(pos, end)?;
                    Some((NodeKind::Repetition { count }, body))
                }
                _ => None,
            };
            if let Some((kind, body)) = split {
                let (node, second) = self.parse_split(pos, body, end, kind, parent, slot, depth)?;
                (parent, slot, opener) = (node, 1, Some(pos));
                pos = second;
                continue;
            }

            let (kind, next) = match self.bytes[pos] {
                b'>' => {
                    let node = self.tree.add_node(NodeKind::Terminal, pos);
                    self.tree.attach(parent, slot, node);
                    return Ok(pos + 1);
                }
                b'[' => self.parse_connection(pos, end)?,
                b':' => self.parse_neuron_property(pos, end)?,
                b'"' => {
                    let (name, next) = self.parse_quoted(pos, end)?;
                    (NodeKind::ClassName(name), next)
                }
                b'X' => (NodeKind::Differentiate(CellKind::Stick), pos + 1),
                b'N' => (NodeKind::Differentiate(CellKind::Neuron), pos + 1),
                _ => self.parse_symbol(pos, end)?,
            };

            let node = self.tree.add_node(kind, pos);
            self.tree.attach(parent, slot, node);
            parent = node;
            slot = 0;
            pos = next;
        }
    }

    /// Division or repetition: parse the first branch, which runs to the
    /// matching `>`. Returns the new node and where its second branch starts.
    #[allow(clippy::too_many_arguments)]
    fn parse_split(
        &mut self,
        at: usize,
        body: usize,
        end: usize,
        kind: NodeKind,
        parent: NodeId,
        slot: usize,
        depth: usize,
    ) -> GenoResult<(NodeId, usize)> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(GenoError::syntax(
                at,
                format!("branches nested deeper than {}", MAX_NESTING_DEPTH),
            ));
        }
        let symbol = self.bytes[at] as char;
        let close = scan_closing(self.bytes, body, end)
            .ok_or_else(|| GenoError::syntax(at, format!("unmatched '{}'", symbol)))?;

        let node = self.tree.add_node(kind, at);
        self.tree.attach(parent, slot, node);

        let first_end = self.parse_chain(body, close + 1, node, 0, Some(at), depth + 1)?;
        if first_end != close + 1 {
            return Err(GenoError::syntax(first_end, "malformed branch"));
        }
        Ok((node, close + 1))
    }

    /// `#` followed by one or two digits
    fn parse_count(&self, at: usize, end: usize) -> GenoResult<(u8, usize)> {
        let digits_start = at + 1;
        let mut digits_end = digits_start;
        while digits_end < end && digits_end - digits_start < 2 && self.bytes[digits_end].is_ascii_digit() {
            digits_end += 1;
        }
        if digits_end == digits_start {
            return Err(GenoError::syntax(at, "repetition count expected after '#'"));
        }
        let count: u8 = self.text[digits_start..digits_end]
            .parse()
            .map_err(|_| GenoError::syntax(digits_start, "invalid repetition count"))?;
        if !(MIN_REPEAT_COUNT..=MAX_REPEAT_COUNT).contains(&count) {
            return Err(GenoError::syntax(
                digits_start,
                format!(
                    "repetition count {} outside {}..={}",
                    count, MIN_REPEAT_COUNT, MAX_REPEAT_COUNT
                ),
            ));
        }
        Ok((count, digits_end))
    }

    /// `[source:weight]` or `[source]`
    fn parse_connection(&self, at: usize, end: usize) -> GenoResult<(NodeKind, usize)> {
        let close = scan_bracket(self.bytes, at + 1, end)
            .ok_or_else(|| GenoError::syntax(at, "unmatched '['"))?;
        let mut pos = at + 1;

        let source = match self.bytes.get(pos) {
            Some(b'"') => {
                let (name, next) = self.parse_quoted(pos, close)?;
                pos = next;
                LinkSource::Sensor(name)
            }
            Some(b) if b.is_ascii_digit() || *b == b'-' || *b == b'+' => {
                let digits_end = (pos + 1..close)
                    .find(|&i| !self.bytes[i].is_ascii_digit())
                    .unwrap_or(close);
                let offset: i32 = self.text[pos..digits_end]
                    .parse()
                    .map_err(|_| GenoError::syntax(pos, "invalid relative connection offset"))?;
                pos = digits_end;
                LinkSource::Relative(offset)
            }
            _ => {
                let class = self
                    .alphabet
                    .neurons
                    .longest_prefix(&self.text[pos..close])
                    .ok_or_else(|| GenoError::syntax(pos, "unknown connection source"))?;
                pos += class.name.len();
                LinkSource::Sensor(class.name.clone())
            }
        };

        let weight = if pos == close {
            1.0
        } else if self.bytes[pos] == b':' {
            let raw = &self.text[pos + 1..close];
            raw.trim()
                .parse::<f64>()
                .ok()
                .filter(|w| w.is_finite())
                .ok_or_else(|| GenoError::syntax(pos + 1, "invalid connection weight"))?
        } else {
            return Err(GenoError::syntax(pos, "expected ':' or ']' in connection"));
        };

        Ok((NodeKind::Connection { source, weight }, close + 1))
    }

    /// `:` sign property `:`
    fn parse_neuron_property(&self, at: usize, end: usize) -> GenoResult<(NodeKind, usize)> {
        if at + 3 >= end {
            return Err(GenoError::syntax(at, "truncated neuron property"));
        }
        let sign = Sign::from_symbol(self.bytes[at + 1] as char)
            .ok_or_else(|| GenoError::syntax(at + 1, "expected '+' or '-'"))?;
        let property = NeuronProperty::from_symbol(self.bytes[at + 2] as char)
            .ok_or_else(|| GenoError::syntax(at + 2, "unknown neuron property"))?;
        if self.bytes[at + 3] != b':' {
            return Err(GenoError::syntax(at + 3, "expected ':' closing neuron property"));
        }
        Ok((NodeKind::NeuronProperty { sign, property }, at + 4))
    }

    /// `"name"`; the name must be a registered class
    fn parse_quoted(&self, at: usize, end: usize) -> GenoResult<(String, usize)> {
        let close = scan_quote(self.bytes, at + 1, end)
            .ok_or_else(|| GenoError::syntax(at, "unterminated quoted name"))?;
        let name = &self.text[at + 1..close];
        if self.alphabet.neurons.find(name).is_none() {
            return Err(GenoError::syntax(at, format!("unknown neuron class '{}'", name)));
        }
        Ok((name.to_string(), close + 1))
    }

    /// Simple modifier, or the longest bare neuron class name
    fn parse_symbol(&self, at: usize, end: usize) -> GenoResult<(NodeKind, usize)> {
        let rest = &self.text[at..end];
        let Some(c) = rest.chars().next() else {
            return Err(GenoError::syntax(at, "unexpected end of genotype"));
        };
        if self.alphabet.is_modifier(c) {
            return Ok((NodeKind::Modifier(c), at + c.len_utf8()));
        }
        match self.alphabet.neurons.longest_prefix(rest) {
            Some(class) => Ok((NodeKind::ClassName(class.name.clone()), at + class.name.len())),
            None => Err(GenoError::syntax(at, format!("unknown symbol '{}'", c))),
        }
    }
}
