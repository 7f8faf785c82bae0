//! Markdown renderer for model replies, driven by pulldown-cmark events.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use unicode_width::UnicodeWidthStr;

const RULE_WIDTH: usize = 40;

fn body_style() -> Style {
    Style::default().fg(Color::White)
}

fn code_style() -> Style {
    Style::default().fg(Color::Yellow)
}

fn dim_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

fn heading_style(level: HeadingLevel) -> Style {
    match level {
        HeadingLevel::H1 => Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        HeadingLevel::H2 => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        HeadingLevel::H3 => Style::default().fg(Color::Cyan),
        _ => body_style().add_modifier(Modifier::BOLD),
    }
}

/// Render a whole reply. Unfinished constructs (an open fence while the
/// reply is still streaming) are closed at the end of the text.
pub fn render_markdown(text: &str) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = Renderer::default();
    for event in Parser::new_ext(text, options) {
        renderer.event(event);
    }
    renderer.finish()
}

/// Plain-text cells collected until the table closes and widths are known
#[derive(Default)]
struct Table {
    rows: Vec<Vec<String>>,
    header_rows: usize,
    row: Vec<String>,
    cell: String,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    styles: Vec<Style>,
    /// Next number per open list, `None` for bullets
    lists: Vec<Option<u64>>,
    /// The pending line starts with its item marker
    item_start: bool,
    quote_depth: usize,
    code: Option<String>,
    /// Open links: target and index of the first label span
    links: Vec<(String, usize)>,
    table: Option<Table>,
}

impl Renderer {
    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_else(body_style)
    }

    fn push_style(&mut self, modifier: Modifier) {
        let style = self.style().add_modifier(modifier);
        self.styles.push(style);
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push_str(&code);
                } else {
                    self.spans.push(Span::styled(code.to_string(), code_style()));
                }
            }
            Event::Html(html) => {
                for (i, part) in html.trim_end_matches('\n').split('\n').enumerate() {
                    if i > 0 {
                        self.flush();
                    }
                    self.text(part);
                }
            }
            Event::FootnoteReference(name) => self.text(&format!("[^{}]", name)),
            Event::SoftBreak | Event::HardBreak => {
                if let Some(table) = self.table.as_mut() {
                    table.cell.push(' ');
                } else {
                    self.flush();
                }
            }
            Event::Rule => {
                self.flush();
                self.block_gap();
                self.spans.push(Span::styled("─".repeat(RULE_WIDTH), dim_style()));
                self.flush();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
            }
            Tag::Heading(level, _, _) => {
                self.flush();
                self.block_gap();
                self.styles.push(heading_style(level));
            }
            Tag::BlockQuote => {
                self.flush();
                self.block_gap();
                self.quote_depth += 1;
                self.styles.push(dim_style().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if self.lists.is_empty() {
                    self.block_gap();
                }
                let label = match &kind {
                    CodeBlockKind::Fenced(info) => info.split_whitespace().next().unwrap_or("").to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                let label = if label.is_empty() { "code".to_string() } else { label };
                self.spans.push(Span::styled("┌ ", dim_style()));
                self.spans.push(Span::styled(
                    label,
                    Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
                ));
                self.flush();
                self.code = Some(String::new());
            }
            Tag::List(first) => {
                self.flush();
                if self.lists.is_empty() {
                    self.block_gap();
                }
                self.lists.push(first);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}{}. ", indent, n);
                        *n += 1;
                        marker
                    }
                    _ => format!("{}• ", indent),
                };
                self.spans.push(Span::styled(marker, Style::default().fg(Color::Cyan)));
                self.item_start = true;
            }
            Tag::FootnoteDefinition(name) => {
                self.flush();
                self.block_gap();
                self.spans.push(Span::styled(format!("[^{}]: ", name), dim_style()));
            }
            Tag::Table(_) => {
                self.flush();
                self.block_gap();
                self.table = Some(Table::default());
            }
            Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
            Tag::Emphasis => self.push_style(Modifier::ITALIC),
            Tag::Strong => self.push_style(Modifier::BOLD),
            Tag::Strikethrough => self.push_style(Modifier::CROSSED_OUT),
            Tag::Link(_, url, _) | Tag::Image(_, url, _) => {
                let style = Style::default().fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
                self.styles.push(style);
                self.links.push((url.to_string(), self.spans.len()));
            }
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph | Tag::Item | Tag::FootnoteDefinition(_) => self.flush(),
            Tag::Heading(..) => {
                self.flush();
                self.styles.pop();
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                self.styles.pop();
            }
            Tag::CodeBlock(_) => {
                let body = self.code.take().unwrap_or_default();
                for line in body.lines() {
                    self.spans.push(Span::styled("│ ", dim_style()));
                    self.spans.push(Span::styled(line.to_string(), code_style()));
                    self.flush();
                }
                self.spans.push(Span::styled("└", dim_style()));
                self.flush();
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
            }
            Tag::TableCell => {
                if let Some(table) = self.table.as_mut() {
                    let cell = std::mem::take(&mut table.cell);
                    table.row.push(cell.trim().to_string());
                }
            }
            Tag::TableHead | Tag::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                    if matches!(tag, Tag::TableHead) {
                        table.header_rows = table.rows.len();
                    }
                }
            }
            Tag::Table(_) => {
                if let Some(table) = self.table.take() {
                    self.emit_table(table);
                }
            }
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {
                self.styles.pop();
            }
            Tag::Link(..) | Tag::Image(..) => {
                self.styles.pop();
                let Some((url, start)) = self.links.pop() else {
                    return;
                };
                if self.table.is_some() || url.is_empty() {
                    return;
                }
                let label: String = self
                    .spans
                    .get(start..)
                    .unwrap_or_default()
                    .iter()
                    .map(|s| s.content.as_ref())
                    .collect();
                if label != url && label != url.trim_start_matches("mailto:") {
                    self.spans.push(Span::styled(format!(" ({})", url), dim_style()));
                }
            }
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = self.code.as_mut() {
            code.push_str(text);
            return;
        }
        if let Some(table) = self.table.as_mut() {
            table.cell.push_str(text);
            return;
        }
        if text.is_empty() {
            return;
        }

        let style = self.style();
        let label_start = self.links.last().map_or(0, |(_, start)| *start);
        let can_merge = self.spans.len() > label_start;
        match self.spans.last_mut() {
            // The parser splits text at unmatched delimiters; keep it one span.
            Some(last) if can_merge && last.style == style => {
                last.content.to_mut().push_str(text);
            }
            _ => self.spans.push(Span::styled(text.to_string(), style)),
        }
    }

    fn emit_table(&mut self, table: Table) {
        let columns = table.rows.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..columns)
            .map(|col| {
                table
                    .rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .map(|cell| cell.width())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for (index, row) in table.rows.iter().enumerate() {
            let header = index < table.header_rows;
            let style = if header {
                body_style().add_modifier(Modifier::BOLD)
            } else {
                body_style()
            };
            for (col, width) in widths.iter().enumerate() {
                if col > 0 {
                    self.spans.push(Span::styled(" │ ", dim_style()));
                }
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                let padding = " ".repeat(width.saturating_sub(cell.width()));
                self.spans.push(Span::styled(format!("{}{}", cell, padding), style));
            }
            self.flush();

            if header && index + 1 == table.header_rows {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
                self.spans.push(Span::styled(rule.join("─┼─"), dim_style()));
                self.flush();
            }
        }
    }

    /// Blank line between blocks, never doubled and never leading
    fn block_gap(&mut self) {
        if self.lines.last().is_some_and(|line| !line.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut line = Vec::with_capacity(self.spans.len() + 2);
        if self.quote_depth > 0 {
            line.push(Span::styled("│ ".repeat(self.quote_depth), dim_style()));
        }
        if !self.lists.is_empty() && !self.item_start {
            line.push(Span::raw("  ".repeat(self.lists.len())));
        }
        self.item_start = false;
        line.append(&mut self.spans);
        self.lines.push(Line::from(line));
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        if let Some(table) = self.table.take() {
            self.emit_table(table);
        }
        self.flush();
        while self.lines.last().is_some_and(|line| line.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}
