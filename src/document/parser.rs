//! Comment-Preserving YAML Parser
//!
//! Line-oriented recursive descent over the block structure of a single YAML
//! document, with a character-level sub-parser for flow collections and
//! quoted scalars. Structure is parsed first; comment lines between entries
//! are attached once a block is complete, innermost blocks first, so a
//! comment is claimed by the deepest block it can belong to.

use std::collections::HashMap;

use super::{Node, NodeKind, ParseError, Scalar, ScalarStyle};

type PResult<T> = std::result::Result<T, ParseError>;

/// Rows occupied by one mapping entry or sequence item
struct EntrySpan {
    /// Row of the key or `-` indicator
    start: usize,
    /// Column of the key or `-` indicator
    col: usize,
    /// Last row holding content of the entry's value
    end: usize,
}

#[derive(Clone, Copy)]
enum Chomp {
    Strip,
    Clip,
    Keep,
}

pub(crate) struct Parser<'a> {
    lines: Vec<&'a str>,
    row: usize,
    col: usize,
    /// Last row on which content was consumed
    end_row: usize,
    doc_start: usize,
    doc_end: usize,
    /// Comment and blank rows already attached to a node
    claimed: Vec<bool>,
    anchors: HashMap<String, Node>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let lines: Vec<&'a str> = source.lines().collect();
        let (doc_start, doc_end) = document_bounds(&lines);
        Self {
            claimed: vec![false; lines.len()],
            lines,
            row: doc_start,
            col: 0,
            end_row: doc_start,
            doc_start,
            doc_end,
            anchors: HashMap::new(),
        }
    }

    pub(crate) fn parse(mut self) -> PResult<Node> {
        let Some(first) = self.next_content_row(self.doc_start) else {
            return Ok(Node::new(
                NodeKind::Scalar(Scalar::default()),
                self.doc_start + 1,
                1,
            ));
        };
        self.enter_row(first)?;
        let root = self.parse_at(-1, false)?;
        if let Some(r) = self.next_content_row(self.row) {
            return Err(self.error_at(
                r,
                self.indent_of(r),
                "unexpected content after the document root",
            ));
        }
        Ok(root)
    }

    // =========================================================================
    // Block structure
    // =========================================================================

    /// Parse the value following `key:` or `-`, starting mid-line
    fn parse_node(&mut self, parent_indent: isize, indentless: bool) -> PResult<(Node, String)> {
        self.skip_inline_space();
        if self.at_comment() {
            let comment = self.take_comment();
            self.finish_row();
            return self.parse_block_value(parent_indent, indentless, comment);
        }
        if self.at_eol() {
            self.finish_row();
            return self.parse_block_value(parent_indent, indentless, String::new());
        }
        let node = self.parse_at(parent_indent, indentless)?;
        Ok((node, String::new()))
    }

    /// Parse a value that starts on a following row, if one is indented deep enough.
    /// The returned string is the comment left on the introducing line.
    fn parse_block_value(
        &mut self,
        parent_indent: isize,
        indentless: bool,
        dangling: String,
    ) -> PResult<(Node, String)> {
        if let Some(r) = self.next_content_row(self.row) {
            let indent = self.indent_of(r);
            let nested = indent as isize > parent_indent
                || (indentless && indent as isize == parent_indent && self.is_seq_entry(r, indent));
            if nested {
                self.enter_row(r)?;
                let node = self.parse_at(parent_indent, false)?;
                return Ok((node, dangling));
            }
        }
        let column = self.lines.get(self.end_row).map_or(0, |l| l.len()) + 1;
        Ok((
            Node::new(NodeKind::Scalar(Scalar::default()), self.end_row + 1, column),
            dangling,
        ))
    }

    /// Parse node properties (anchor, tag) and the content at the cursor
    fn parse_at(&mut self, parent_indent: isize, indentless: bool) -> PResult<Node> {
        let mut anchor = None;
        let mut tag = None;
        loop {
            match self.peek() {
                Some('&') => {
                    self.col += 1;
                    anchor = Some(self.read_token());
                }
                Some('!') => tag = Some(self.read_token()),
                _ => break,
            }
            self.skip_inline_space();
        }

        let has_properties = anchor.is_some() || tag.is_some();
        let mut node = if has_properties && (self.at_eol() || self.at_comment()) {
            let comment = if self.at_comment() {
                self.take_comment()
            } else {
                String::new()
            };
            self.finish_row();
            let (mut node, dangling) = self.parse_block_value(parent_indent, indentless, comment)?;
            if node.line_comment.is_empty() {
                node.line_comment = dangling;
            }
            node
        } else {
            self.parse_content(parent_indent)?
        };

        if tag.is_some() {
            node.tag = tag;
        }
        if let Some(name) = anchor {
            self.anchors.insert(name, node.clone());
        }
        Ok(node)
    }

    fn parse_content(&mut self, parent_indent: isize) -> PResult<Node> {
        let (row, col) = (self.row, self.col);
        let block = self.block_start_allowed();
        match self.peek() {
            Some('-') if self.is_seq_indicator() => {
                if !block {
                    return Err(
                        self.error("block sequence entries are not allowed in this context")
                    );
                }
                self.parse_block_sequence(col)
            }
            Some('|') | Some('>') => self.parse_block_scalar(parent_indent),
            Some('[') | Some('{') => {
                let node = self.parse_flow()?;
                self.finish_inline(node)
            }
            Some('*') => {
                let node = self.parse_alias()?;
                self.finish_inline(node)
            }
            Some('?') if self.rest()[1..].starts_with([' ', '\t']) || self.rest().len() == 1 => {
                Err(self.error("complex mapping keys are not supported"))
            }
            _ if block && mapping_colon(self.rest()).is_some() => self.parse_block_mapping(col),
            Some('"') => {
                let value = self.read_double_quoted()?;
                let node = scalar_node(value, ScalarStyle::DoubleQuoted, row, col);
                self.finish_inline(node)
            }
            Some('\'') => {
                let value = self.read_single_quoted()?;
                let node = scalar_node(value, ScalarStyle::SingleQuoted, row, col);
                self.finish_inline(node)
            }
            _ => {
                let node = self.parse_plain(parent_indent)?;
                self.finish_inline(node)
            }
        }
    }

    fn parse_block_mapping(&mut self, indent: usize) -> PResult<Node> {
        let (start_row, start_col) = (self.row, self.col);
        let mut pairs: Vec<(Node, Node)> = Vec::new();
        let mut spans = Vec::new();

        loop {
            let (key_row, key_col) = (self.row, self.col);
            if mapping_colon(self.rest()).is_none() {
                return Err(self.error("expected a mapping key"));
            }
            let mut key = self.parse_key()?;
            if pairs.iter().any(|(k, _)| k.same_key(&key)) {
                return Err(self.error_at(
                    key_row,
                    key_col,
                    format!("mapping key {:?} already defined", key.text().unwrap_or_default()),
                ));
            }

            let (value, dangling) = self.parse_node(indent as isize, true)?;
            key.line_comment = dangling;
            spans.push(EntrySpan {
                start: key_row,
                col: key_col,
                end: self.end_row,
            });
            pairs.push((key, value));

            match self.next_content_row(self.row) {
                Some(r) if self.indent_of(r) == indent && !self.is_seq_entry(r, indent) => {
                    self.enter_row(r)?;
                }
                Some(r) if self.indent_of(r) > indent => {
                    return Err(self.error_at(
                        r,
                        self.indent_of(r),
                        "bad indentation of a mapping entry",
                    ));
                }
                _ => break,
            }
        }

        let comments = self.attach_comments(&spans, indent);
        for ((key, _), (head, foot)) in pairs.iter_mut().zip(comments) {
            key.head_comment = head;
            key.foot_comment = foot;
        }
        Ok(Node::new(NodeKind::Mapping(pairs), start_row + 1, start_col + 1))
    }

    fn parse_key(&mut self) -> PResult<Node> {
        let (row, col) = (self.row, self.col);
        let (value, style) = match self.peek() {
            Some('"') => (self.read_double_quoted()?, ScalarStyle::DoubleQuoted),
            Some('\'') => (self.read_single_quoted()?, ScalarStyle::SingleQuoted),
            _ => {
                let rest = self.rest();
                let offset = mapping_colon(rest).unwrap_or(rest.len());
                self.col += offset;
                (rest[..offset].trim_end().to_string(), ScalarStyle::Plain)
            }
        };
        self.skip_inline_space();
        if self.peek() != Some(':') {
            return Err(self.error("expected ':' after mapping key"));
        }
        self.col += 1;
        Ok(scalar_node(value, style, row, col))
    }

    fn parse_block_sequence(&mut self, indent: usize) -> PResult<Node> {
        let (start_row, start_col) = (self.row, self.col);
        let mut items = Vec::new();
        let mut spans = Vec::new();

        loop {
            let (item_row, item_col) = (self.row, self.col);
            self.col += 1;
            let (mut item, dangling) = self.parse_node(indent as isize, false)?;
            if item.line_comment.is_empty() {
                item.line_comment = dangling;
            }
            spans.push(EntrySpan {
                start: item_row,
                col: item_col,
                end: self.end_row,
            });
            items.push(item);

            match self.next_content_row(self.row) {
                Some(r) if self.indent_of(r) == indent && self.is_seq_entry(r, indent) => {
                    self.enter_row(r)?;
                }
                _ => break,
            }
        }

        let comments = self.attach_comments(&spans, indent);
        for (item, (head, foot)) in items.iter_mut().zip(comments) {
            if !head.is_empty() {
                item.head_comment = head;
            }
            if !foot.is_empty() {
                item.foot_comment = foot;
            }
        }
        Ok(Node::new(NodeKind::Sequence(items), start_row + 1, start_col + 1))
    }

    // =========================================================================
    // Comment attachment
    // =========================================================================

    /// Distribute free comment rows around a block's entries into
    /// (head, foot) pairs, one per entry.
    fn attach_comments(&mut self, spans: &[EntrySpan], indent: usize) -> Vec<(String, String)> {
        let mut out = vec![(String::new(), String::new()); spans.len()];
        let Some(first) = spans.first() else {
            return out;
        };

        // Entries that start mid-line (`- key: v`) leave the rows above to their parent
        if self.indent_of(first.start) == first.col {
            let mut top = first.start;
            while top > self.doc_start && self.is_free_gap(top - 1) {
                top -= 1;
            }
            let rows: Vec<usize> = (top..first.start).collect();
            out[0].0 = self.claim_rows(&rows);
        }

        for i in 0..spans.len() - 1 {
            let (end, next) = (spans[i].end, spans[i + 1].start);
            let rows: Vec<usize> = (end + 1..next).filter(|&r| !self.claimed[r]).collect();
            let adjacent = rows.first() == Some(&(end + 1)) && self.is_comment(end + 1);
            match rows.iter().position(|&r| self.is_blank(r)) {
                Some(split) if adjacent => {
                    out[i].1 = self.claim_rows(&rows[..split]);
                    out[i + 1].0 = self.claim_rows(&rows[split..]);
                }
                _ => out[i + 1].0 = self.claim_rows(&rows),
            }
        }

        let last = spans.len() - 1;
        let mut rows = Vec::new();
        let mut r = spans[last].end + 1;
        while r < self.doc_end && !self.claimed[r] {
            if self.is_blank(r) || (self.is_comment(r) && self.indent_of(r) >= indent) {
                rows.push(r);
                r += 1;
            } else {
                break;
            }
        }
        while rows.last().is_some_and(|&r| self.is_blank(r)) {
            rows.pop();
        }
        out[last].1 = self.claim_rows(&rows);
        out
    }

    /// Mark rows as attached and render their comments, one empty line between paragraphs
    fn claim_rows(&mut self, rows: &[usize]) -> String {
        let mut text = String::new();
        let mut paragraph_break = false;
        for &r in rows {
            self.claimed[r] = true;
            if self.is_blank(r) {
                paragraph_break = !text.is_empty();
                continue;
            }
            if !text.is_empty() {
                text.push_str(if paragraph_break { "\n\n" } else { "\n" });
            }
            text.push_str(self.lines[r].trim());
            paragraph_break = false;
        }
        text
    }

    fn is_free_gap(&self, row: usize) -> bool {
        !self.claimed[row] && !self.is_content(row)
    }

    // =========================================================================
    // Scalars
    // =========================================================================

    fn parse_plain(&mut self, parent_indent: isize) -> PResult<Node> {
        let (row, col) = (self.row, self.col);
        let mut value = self.read_plain_line().to_string();

        while self.at_eol() {
            let mut r = self.row + 1;
            let mut blanks = 0;
            while r < self.doc_end && self.is_blank(r) {
                blanks += 1;
                r += 1;
            }
            if r >= self.doc_end
                || !self.is_content(r)
                || self.indent_of(r) as isize <= parent_indent
            {
                break;
            }
            let indent = self.indent_of(r);
            if mapping_colon(&self.lines[r][indent..]).is_some() {
                break;
            }
            if blanks == 0 {
                value.push(' ');
            } else {
                value.push_str(&"\n".repeat(blanks));
            }
            self.enter_row(r)?;
            value.push_str(self.read_plain_line());
        }

        Ok(scalar_node(value, ScalarStyle::Plain, row, col))
    }

    /// Read plain text up to a comment, a `: ` separator or the end of the line
    fn read_plain_line(&mut self) -> &'a str {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = bytes.len();
        for i in 0..bytes.len() {
            match bytes[i] {
                b'#' if i > 0 && matches!(bytes[i - 1], b' ' | b'\t') => {
                    end = i;
                    break;
                }
                b':' if bytes.get(i + 1).map_or(true, |b| matches!(b, b' ' | b'\t')) => {
                    end = i;
                    break;
                }
                _ => {}
            }
        }
        self.col += end;
        rest[..end].trim_end()
    }

    fn read_double_quoted(&mut self) -> PResult<String> {
        let (start_row, start_col) = (self.row, self.col);
        self.col += 1;
        let mut out = String::new();

        loop {
            let line = self.lines[self.row];
            let line_start = out.len();
            let mut continued = false;
            let mut chars = line[self.col..].char_indices();

            while let Some((offset, c)) = chars.next() {
                match c {
                    '"' => {
                        self.col += offset + 1;
                        return Ok(out);
                    }
                    '\\' => {
                        let Some((_, escape)) = chars.next() else {
                            continued = true;
                            break;
                        };
                        let decoded = match escape {
                            'x' | 'u' | 'U' => {
                                let len = match escape {
                                    'x' => 2,
                                    'u' => 4,
                                    _ => 8,
                                };
                                let hex: String =
                                    chars.by_ref().take(len).map(|(_, c)| c).collect();
                                u32::from_str_radix(&hex, 16)
                                    .ok()
                                    .filter(|_| hex.len() == len)
                                    .and_then(char::from_u32)
                            }
                            other => escaped_char(other),
                        };
                        match decoded {
                            Some(ch) => out.push(ch),
                            None => {
                                return Err(self.error_at(
                                    self.row,
                                    self.col + offset,
                                    format!("invalid escape sequence \\{}", escape),
                                ))
                            }
                        }
                    }
                    _ => out.push(c),
                }
            }

            if !continued {
                let kept = out[line_start..].trim_end_matches([' ', '\t']).len();
                out.truncate(line_start + kept);
            }
            let blanks = self.next_quoted_line(start_row, start_col, "double-quoted")?;
            if continued {
                out.push_str(&"\n".repeat(blanks));
            } else {
                fold_break(&mut out, blanks);
            }
        }
    }

    fn read_single_quoted(&mut self) -> PResult<String> {
        let (start_row, start_col) = (self.row, self.col);
        self.col += 1;
        let mut out = String::new();

        loop {
            let line = self.lines[self.row];
            let line_start = out.len();
            let mut chars = line[self.col..].char_indices().peekable();

            while let Some((offset, c)) = chars.next() {
                if c != '\'' {
                    out.push(c);
                    continue;
                }
                if chars.peek().map(|(_, next)| *next) == Some('\'') {
                    chars.next();
                    out.push('\'');
                    continue;
                }
                self.col += offset + 1;
                return Ok(out);
            }

            let kept = out[line_start..].trim_end_matches([' ', '\t']).len();
            out.truncate(line_start + kept);
            let blanks = self.next_quoted_line(start_row, start_col, "single-quoted")?;
            fold_break(&mut out, blanks);
        }
    }

    /// Move a multi-line quoted scalar to its next non-blank row, returning
    /// the number of blank rows skipped
    fn next_quoted_line(
        &mut self,
        start_row: usize,
        start_col: usize,
        style: &str,
    ) -> PResult<usize> {
        let mut blanks = 0;
        loop {
            self.row += 1;
            if self.row >= self.doc_end {
                let message = format!("unterminated {} string", style);
                return Err(self.error_at(start_row, start_col, message));
            }
            if !self.is_blank(self.row) {
                break;
            }
            blanks += 1;
        }
        let line = self.lines[self.row];
        self.col = line.len() - line.trim_start_matches([' ', '\t']).len();
        Ok(blanks)
    }

    fn parse_block_scalar(&mut self, parent_indent: isize) -> PResult<Node> {
        let (header_row, header_col) = (self.row, self.col);
        let folded = self.peek() == Some('>');
        self.col += 1;

        let mut chomp = Chomp::Clip;
        let mut explicit = None;
        while let Some(c) = self.peek() {
            match c {
                '-' => chomp = Chomp::Strip,
                '+' => chomp = Chomp::Keep,
                '1'..='9' => explicit = c.to_digit(10).map(|d| d as usize),
                _ => break,
            }
            self.col += 1;
        }
        self.skip_inline_space();
        let comment = if self.at_comment() {
            self.take_comment()
        } else if self.at_eol() {
            String::new()
        } else {
            return Err(self.error("invalid block scalar header"));
        };

        let first = header_row + 1;
        let content_indent = match explicit {
            Some(d) => parent_indent.max(0) as usize + d,
            None => (first..self.doc_end)
                .find(|&r| !self.is_blank(r))
                .map(|r| self.indent_of(r))
                .filter(|&i| i as isize > parent_indent)
                .unwrap_or(usize::MAX),
        };

        let mut lines = Vec::new();
        let mut last = header_row;
        let mut r = first;
        while r < self.doc_end {
            let line = self.lines[r];
            if line.trim().is_empty() {
                lines.push(line.get(content_indent..).unwrap_or(""));
            } else if self.indent_of(r) >= content_indent {
                lines.push(&line[content_indent..]);
                last = r;
            } else {
                break;
            }
            r += 1;
        }

        let body = &lines[..last - header_row];
        let trailing = lines.len() - body.len();
        let mut text = if folded {
            fold_lines(body)
        } else {
            body.join("\n")
        };
        match chomp {
            Chomp::Strip => {}
            Chomp::Clip if !body.is_empty() => text.push('\n'),
            Chomp::Clip => {}
            Chomp::Keep => {
                if !body.is_empty() {
                    text.push('\n');
                }
                text.push_str(&"\n".repeat(trailing));
            }
        }

        self.row = last;
        self.finish_row();
        let style = if folded {
            ScalarStyle::Folded
        } else {
            ScalarStyle::Literal
        };
        let mut node = scalar_node(text, style, header_row, header_col);
        node.line_comment = comment;
        Ok(node)
    }

    fn parse_alias(&mut self) -> PResult<Node> {
        let (row, col) = (self.row, self.col);
        self.col += 1;
        let name = self.read_token();
        let mut node = self
            .anchors
            .get(&name)
            .cloned()
            .ok_or_else(|| self.error_at(row, col, format!("unknown anchor {:?}", name)))?;
        node.line = row + 1;
        node.column = col + 1;
        node.head_comment.clear();
        node.line_comment.clear();
        node.foot_comment.clear();
        Ok(node)
    }

    // =========================================================================
    // Flow collections
    // =========================================================================

    fn parse_flow(&mut self) -> PResult<Node> {
        let (row, col) = (self.row, self.col);
        let open = self.peek();
        self.col += 1;

        if open == Some('[') {
            let mut items = Vec::new();
            loop {
                self.skip_flow_space(row, col)?;
                if self.peek() == Some(']') {
                    self.col += 1;
                    break;
                }
                let key = self.parse_flow_node(row, col)?;
                self.skip_flow_space(row, col)?;
                let item = if self.peek() == Some(':') {
                    let (line, column) = (key.line, key.column);
                    let value = self.parse_flow_value(row, col)?;
                    Node::new(NodeKind::Mapping(vec![(key, value)]), line, column)
                } else {
                    key
                };
                items.push(item);
                self.skip_flow_space(row, col)?;
                match self.peek() {
                    Some(',') => self.col += 1,
                    Some(']') => {
                        self.col += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ']' in flow sequence")),
                }
            }
            return Ok(Node::new(NodeKind::Sequence(items), row + 1, col + 1));
        }

        let mut pairs: Vec<(Node, Node)> = Vec::new();
        loop {
            self.skip_flow_space(row, col)?;
            if self.peek() == Some('}') {
                self.col += 1;
                break;
            }
            let (key_row, key_col) = (self.row, self.col);
            let key = self.parse_flow_node(row, col)?;
            if pairs.iter().any(|(k, _)| k.same_key(&key)) {
                return Err(self.error_at(
                    key_row,
                    key_col,
                    format!("mapping key {:?} already defined", key.text().unwrap_or_default()),
                ));
            }
            let value = self.parse_flow_value(row, col)?;
            pairs.push((key, value));
            self.skip_flow_space(row, col)?;
            match self.peek() {
                Some(',') => self.col += 1,
                Some('}') => {
                    self.col += 1;
                    break;
                }
                _ => return Err(self.error("expected ',' or '}' in flow mapping")),
            }
        }
        Ok(Node::new(NodeKind::Mapping(pairs), row + 1, col + 1))
    }

    /// Parse `: value` after a flow key; a missing value is null
    fn parse_flow_value(&mut self, open_row: usize, open_col: usize) -> PResult<Node> {
        self.skip_flow_space(open_row, open_col)?;
        let null = scalar_node(String::new(), ScalarStyle::Plain, self.row, self.col);
        if self.peek() != Some(':') {
            return Ok(null);
        }
        self.col += 1;
        self.skip_flow_space(open_row, open_col)?;
        match self.peek() {
            Some(',') | Some('}') | Some(']') => Ok(null),
            _ => self.parse_flow_node(open_row, open_col),
        }
    }

    fn parse_flow_node(&mut self, open_row: usize, open_col: usize) -> PResult<Node> {
        self.skip_flow_space(open_row, open_col)?;
        let mut anchor = None;
        let mut tag = None;
        loop {
            match self.peek() {
                Some('&') => {
                    self.col += 1;
                    anchor = Some(self.read_token());
                }
                Some('!') => tag = Some(self.read_token()),
                _ => break,
            }
            self.skip_flow_space(open_row, open_col)?;
        }

        let (row, col) = (self.row, self.col);
        let mut node = match self.peek() {
            Some('[') | Some('{') => self.parse_flow()?,
            Some('"') => {
                scalar_node(self.read_double_quoted()?, ScalarStyle::DoubleQuoted, row, col)
            }
            Some('\'') => {
                scalar_node(self.read_single_quoted()?, ScalarStyle::SingleQuoted, row, col)
            }
            Some('*') => self.parse_alias()?,
            Some(',') | Some(']') | Some('}') | Some(':') => {
                scalar_node(String::new(), ScalarStyle::Plain, row, col)
            }
            _ => {
                let text = self.read_flow_plain();
                scalar_node(text.to_string(), ScalarStyle::Plain, row, col)
            }
        };

        if tag.is_some() {
            node.tag = tag;
        }
        if let Some(name) = anchor {
            self.anchors.insert(name, node.clone());
        }
        Ok(node)
    }

    fn read_flow_plain(&mut self) -> &'a str {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let mut end = bytes.len();
        for i in 0..bytes.len() {
            let stop = match bytes[i] {
                b',' | b'[' | b']' | b'{' | b'}' => true,
                b':' => bytes
                    .get(i + 1)
                    .map_or(true, |b| matches!(b, b' ' | b'\t' | b',' | b']' | b'}')),
                b'#' => i > 0 && matches!(bytes[i - 1], b' ' | b'\t'),
                _ => false,
            };
            if stop {
                end = i;
                break;
            }
        }
        self.col += end;
        rest[..end].trim_end()
    }

    /// Skip whitespace, line breaks and comments inside a flow collection
    fn skip_flow_space(&mut self, open_row: usize, open_col: usize) -> PResult<()> {
        loop {
            self.skip_inline_space();
            if !(self.at_eol() || self.at_comment()) {
                return Ok(());
            }
            if self.row + 1 >= self.doc_end {
                return Err(self.error_at(open_row, open_col, "unterminated flow collection"));
            }
            self.row += 1;
            self.col = 0;
        }
    }

    // =========================================================================
    // Cursor helpers
    // =========================================================================

    /// Complete an inline value: optional trailing comment, then end of line
    fn finish_inline(&mut self, mut node: Node) -> PResult<Node> {
        self.skip_inline_space();
        if self.at_comment() {
            node.line_comment = self.take_comment();
        } else if !self.at_eol() {
            let message = if self.peek() == Some(':') {
                "mapping values are not allowed in this context"
            } else {
                "unexpected characters after value"
            };
            return Err(self.error(message));
        }
        self.finish_row();
        Ok(node)
    }

    fn finish_row(&mut self) {
        self.end_row = self.row;
        self.row += 1;
        self.col = 0;
    }

    fn enter_row(&mut self, row: usize) -> PResult<()> {
        self.row = row;
        self.col = self.indent_of(row);
        if self.rest().starts_with('\t') {
            return Err(self.error("found a tab character where indentation is expected"));
        }
        Ok(())
    }

    fn rest(&self) -> &'a str {
        let line: &'a str = self.lines.get(self.row).copied().unwrap_or("");
        &line[self.col.min(line.len())..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn at_eol(&self) -> bool {
        self.rest().is_empty()
    }

    fn at_comment(&self) -> bool {
        self.peek() == Some('#')
            && (self.col == 0
                || matches!(self.lines[self.row].as_bytes()[self.col - 1], b' ' | b'\t'))
    }

    fn take_comment(&mut self) -> String {
        let text = self.rest().trim_end().to_string();
        self.col = self.lines[self.row].len();
        text
    }

    fn skip_inline_space(&mut self) {
        let rest = self.rest();
        self.col += rest.len() - rest.trim_start_matches([' ', '\t']).len();
    }

    /// Anchor name or tag, up to whitespace or a flow indicator
    fn read_token(&mut self) -> String {
        let rest = self.rest();
        let len = if rest.starts_with("!<") {
            rest.find('>').map_or(rest.len(), |i| i + 1)
        } else {
            rest.find(|c: char| c.is_whitespace() || matches!(c, ',' | '[' | ']' | '{' | '}'))
                .unwrap_or(rest.len())
        };
        self.col += len;
        rest[..len].to_string()
    }

    /// Block collections start a row or follow a `-` indicator
    fn block_start_allowed(&self) -> bool {
        let line = self.lines.get(self.row).copied().unwrap_or("");
        let before = line[..self.col.min(line.len())].trim_end();
        before.is_empty() || before.ends_with('-')
    }

    fn is_seq_indicator(&self) -> bool {
        let rest = self.rest();
        rest.starts_with('-') && rest[1..].chars().next().map_or(true, |c| c == ' ' || c == '\t')
    }

    fn is_seq_entry(&self, row: usize, indent: usize) -> bool {
        let rest = &self.lines[row][indent..];
        rest.starts_with('-') && rest[1..].chars().next().map_or(true, |c| c == ' ' || c == '\t')
    }

    fn indent_of(&self, row: usize) -> usize {
        let line = self.lines[row];
        line.len() - line.trim_start_matches(' ').len()
    }

    fn is_blank(&self, row: usize) -> bool {
        self.lines[row].trim().is_empty()
    }

    fn is_comment(&self, row: usize) -> bool {
        self.lines[row].trim_start().starts_with('#')
    }

    fn is_content(&self, row: usize) -> bool {
        !self.is_blank(row) && !self.is_comment(row)
    }

    fn next_content_row(&self, from: usize) -> Option<usize> {
        (from..self.doc_end).find(|&r| self.is_content(r))
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.row, self.col, message)
    }

    fn error_at(&self, row: usize, col: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            line: row + 1,
            column: col + 1,
            message: message.into(),
        }
    }
}

fn scalar_node(value: String, style: ScalarStyle, row: usize, col: usize) -> Node {
    Node::new(NodeKind::Scalar(Scalar { value, style }), row + 1, col + 1)
}

/// Row range of the first document: after an optional `---`, up to the next marker
fn document_bounds(lines: &[&str]) -> (usize, usize) {
    let mut start = 0;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || line.starts_with('%') {
            continue;
        }
        if is_marker(line, "---") {
            start = i + 1;
        }
        break;
    }
    let end = (start..lines.len())
        .find(|&i| is_marker(lines[i], "---") || is_marker(lines[i], "..."))
        .unwrap_or(lines.len());
    (start, end)
}

fn is_marker(line: &str, marker: &str) -> bool {
    line.strip_prefix(marker)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

/// Byte offset of the `:` that ends a block mapping key on this line
fn mapping_colon(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = match bytes.first()? {
        b'"' => closing_double_quote(bytes)? + 1,
        b'\'' => closing_single_quote(bytes)? + 1,
        b'[' | b'{' | b'#' => return None,
        _ => 0,
    };
    let quoted = i > 0;
    while i < bytes.len() {
        match bytes[i] {
            b':' if bytes.get(i + 1).map_or(true, |b| matches!(b, b' ' | b'\t')) => return Some(i),
            b'#' if i > 0 && matches!(bytes[i - 1], b' ' | b'\t') => return None,
            b' ' | b'\t' => {}
            _ if quoted => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

fn closing_double_quote(bytes: &[u8]) -> Option<usize> {
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

fn closing_single_quote(bytes: &[u8]) -> Option<usize> {
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return Some(i);
        }
        i += 1;
    }
    None
}

fn escaped_char(escape: char) -> Option<char> {
    Some(match escape {
        '0' => '\0',
        'a' => '\u{07}',
        'b' => '\u{08}',
        't' | '\t' => '\t',
        'n' => '\n',
        'v' => '\u{0b}',
        'f' => '\u{0c}',
        'r' => '\r',
        'e' => '\u{1b}',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        'N' => '\u{85}',
        '_' => '\u{a0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        _ => return None,
    })
}

/// Line folding inside quoted scalars
fn fold_break(out: &mut String, blanks: usize) {
    if blanks == 0 {
        out.push(' ');
    } else {
        out.push_str(&"\n".repeat(blanks));
    }
}

/// Folded block scalar: single breaks between normal lines become spaces,
/// more-indented lines keep their breaks
fn fold_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut started = false;
    let mut prev_plain = false;
    let mut blanks = 0;
    for line in lines {
        if line.trim().is_empty() {
            blanks += 1;
            continue;
        }
        let plain = !line.starts_with([' ', '\t']);
        if !started {
            out.push_str(&"\n".repeat(blanks));
        } else if prev_plain && plain {
            if blanks == 0 {
                out.push(' ');
            } else {
                out.push_str(&"\n".repeat(blanks));
            }
        } else {
            out.push_str(&"\n".repeat(blanks + 1));
        }
        out.push_str(line);
        started = true;
        prev_plain = plain;
        blanks = 0;
    }
    out
}
