// Markdown to styled terminal lines
//
// Used by text, card, status card and notification renderers. Parses with
// pulldown-cmark and lays the events out into width-limited ratatui Lines.
// Inline formatting nests through a style stack, so **bold _italic_** keeps
// both modifiers. Supports headings, inline and fenced code, emphasis,
// strikethrough, nested lists, blockquotes, rules, links and tables.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use unicode_width::UnicodeWidthStr;

use super::palette;

/// Parse markdown and lay it out at `width` columns
pub fn render_markdown(markdown: &str, width: usize) -> Vec<Line<'static>> {
    let sanitized = sanitize_for_tui(markdown);
    let mut builder = LineBuilder::new(width.max(10));
    let mut code_block: Option<(Option<String>, String)> = None;
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut links: Vec<(String, String)> = Vec::new();
    let mut table: Option<TableBuffer> = None;

    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    for event in Parser::new_ext(&sanitized, options) {
        if let Some(buffer) = table.as_mut() {
            match event {
                Event::End(TagEnd::Table) => {
                    if let Some(buffer) = table.take() {
                        builder.flush();
                        builder.lines.extend(buffer.into_lines());
                        builder.blank();
                    }
                }
                other => buffer.feed(other),
            }
            continue;
        }

        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                builder.flush();
                let lang = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                    _ => None,
                };
                code_block = Some((lang, String::new()));
            }
            Event::Text(text) if code_block.is_some() => {
                if let Some((_, code)) = code_block.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, code)) = code_block.take() {
                    builder.code_block(lang.as_deref(), &code);
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                builder.flush();
                builder.styles.push(heading_style(level));
            }
            Event::End(TagEnd::Heading(_)) => {
                builder.styles.pop();
                builder.flush();
                builder.blank();
            }

            Event::End(TagEnd::Paragraph) => {
                builder.flush();
                if lists.is_empty() {
                    builder.blank();
                }
            }

            Event::Start(Tag::List(first)) => {
                builder.flush();
                lists.push(first);
            }
            Event::End(TagEnd::List(_)) => {
                builder.flush();
                lists.pop();
                if lists.is_empty() {
                    builder.blank();
                }
            }
            Event::Start(Tag::Item) => {
                builder.flush();
                let depth = lists.len().saturating_sub(1);
                let marker = match lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                builder.start_item(depth, marker);
            }
            Event::End(TagEnd::Item) => {
                builder.flush();
                builder.item_indent = 0;
            }

            Event::Start(Tag::Strong) => builder.push_modifier(Modifier::BOLD),
            Event::Start(Tag::Emphasis) => builder.push_modifier(Modifier::ITALIC),
            Event::Start(Tag::Strikethrough) => {
                builder.push_modifier(Modifier::CROSSED_OUT | Modifier::DIM)
            }
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                builder.styles.pop();
            }

            Event::Start(Tag::BlockQuote) => {
                builder.flush();
                builder.quote_depth += 1;
            }
            Event::End(TagEnd::BlockQuote) => {
                builder.flush();
                builder.quote_depth = builder.quote_depth.saturating_sub(1);
                builder.blank();
            }

            Event::Start(Tag::Link { dest_url, .. }) => {
                links.push((dest_url.to_string(), String::new()));
                let style = builder
                    .current_style()
                    .fg(palette::ACCENT)
                    .add_modifier(Modifier::UNDERLINED);
                builder.styles.push(style);
            }
            Event::End(TagEnd::Link) => {
                builder.styles.pop();
                if let Some((url, text)) = links.pop() {
                    if !url.is_empty() && text != url {
                        builder.push_text(&format!(" ({})", url), palette::muted());
                    }
                }
            }

            Event::Start(Tag::Table(_)) => table = Some(TableBuffer::default()),

            Event::Text(text) => {
                if let Some((_, link_text)) = links.last_mut() {
                    link_text.push_str(&text);
                }
                let style = builder.current_style();
                builder.push_text(&text, style);
            }
            Event::Code(code) => {
                builder.push_text(&code, Style::default().fg(palette::CODE));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                builder.push_text(html.trim_end(), palette::muted());
            }
            Event::SoftBreak => {
                let style = builder.current_style();
                builder.push_text(" ", style);
            }
            Event::HardBreak => builder.flush(),
            Event::Rule => {
                builder.flush();
                let rule = "─".repeat(builder.width.saturating_sub(4).clamp(10, 60));
                builder
                    .lines
                    .push(Line::from(Span::styled(rule, palette::muted())));
                builder.blank();
            }
            _ => {}
        }
    }

    builder.finish()
}

/// Lay out plain text, honouring embedded newlines
pub fn render_plain(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    let sanitized = sanitize_for_tui(text);
    let mut lines = Vec::new();
    for paragraph in sanitized.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(Line::from(""));
            continue;
        }
        for wrapped in wrap_text(paragraph, width.max(10)) {
            lines.push(Line::from(Span::styled(wrapped, style)));
        }
    }
    lines
}

fn heading_style(level: HeadingLevel) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => base.fg(palette::ACCENT).add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => base.fg(palette::ACCENT),
        _ => base.fg(palette::INFO),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Line layout
// ─────────────────────────────────────────────────────────────────────────────

struct LineBuilder {
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    used: usize,
    styles: Vec<Style>,
    quote_depth: usize,
    /// Continuation indent for wrapped list item lines
    item_indent: usize,
}

impl LineBuilder {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            spans: Vec::new(),
            used: 0,
            styles: Vec::new(),
            quote_depth: 0,
            item_indent: 0,
        }
    }

    fn current_style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn push_modifier(&mut self, modifier: Modifier) {
        let style = self.current_style().add_modifier(modifier);
        self.styles.push(style);
    }

    fn begin_line(&mut self) {
        if !self.spans.is_empty() {
            return;
        }
        self.used = 0;
        if self.quote_depth > 0 {
            let bar = "│ ".repeat(self.quote_depth);
            self.used += bar.width();
            self.spans.push(Span::styled(bar, palette::muted()));
        }
        if self.item_indent > 0 {
            self.spans.push(Span::raw(" ".repeat(self.item_indent)));
            self.used += self.item_indent;
        }
    }

    fn start_item(&mut self, depth: usize, marker: String) {
        self.item_indent = 0;
        self.begin_line();
        let indent = "  ".repeat(depth);
        let full = format!("{}{}", indent, marker);
        let marker_width = full.width();
        self.spans.push(Span::styled(full, palette::muted()));
        self.used += marker_width;
        self.item_indent = marker_width;
    }

    fn push_text(&mut self, text: &str, style: Style) {
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush();
            }
            for word in part.split_inclusive(' ') {
                let visible = word.trim_end().width();
                let margin = self.margin();
                if self.used > margin && self.used + visible > self.width {
                    self.flush();
                }
                self.begin_line();
                let word = if self.used == self.margin() {
                    word.trim_start()
                } else {
                    word
                };
                if word.is_empty() {
                    continue;
                }
                self.used += word.width();
                let past_margin = self.used > self.margin();
                match self.spans.last_mut() {
                    Some(last) if last.style == style && past_margin => {
                        last.content.to_mut().push_str(word);
                    }
                    _ => self.spans.push(Span::styled(word.to_string(), style)),
                }
            }
        }
    }

    fn margin(&self) -> usize {
        self.quote_depth * 2 + self.item_indent
    }

    fn code_block(&mut self, lang: Option<&str>, code: &str) {
        self.flush();
        if let Some(lang) = lang {
            self.lines
                .push(Line::from(Span::styled(format!("  ┌ {}", lang), palette::muted())));
        }
        for line in code.lines() {
            self.lines.push(Line::from(vec![
                Span::styled("  │ ".to_string(), palette::muted()),
                Span::styled(line.to_string(), Style::default().fg(palette::CODE)),
            ]));
        }
        self.blank();
    }

    fn flush(&mut self) {
        if let Some(last) = self.spans.last_mut() {
            let trimmed = last.content.trim_end().len();
            last.content.to_mut().truncate(trimmed);
        }
        if !self.spans.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        }
        self.used = 0;
    }

    /// Paragraph spacing, never doubled
    fn blank(&mut self) {
        self.flush();
        let last_blank = self
            .lines
            .last()
            .map(|l| l.spans.iter().all(|s| s.content.trim().is_empty()))
            .unwrap_or(true);
        if !last_blank {
            self.lines.push(Line::from(""));
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self
            .lines
            .last()
            .is_some_and(|l| l.spans.iter().all(|s| s.content.trim().is_empty()))
        {
            self.lines.pop();
        }
        self.lines
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tables
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct TableBuffer {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
    cell: String,
    in_head: bool,
}

impl TableBuffer {
    fn feed(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::TableHead) => self.in_head = true,
            Event::End(TagEnd::TableHead) => {
                self.header = std::mem::take(&mut self.row);
                self.in_head = false;
            }
            Event::End(TagEnd::TableRow) => {
                let row = std::mem::take(&mut self.row);
                self.rows.push(row);
            }
            Event::End(TagEnd::TableCell) => {
                let cell = std::mem::take(&mut self.cell);
                self.row.push(cell);
            }
            Event::Text(text) | Event::Code(text) => self.cell.push_str(&text),
            _ => {}
        }
    }

    fn into_lines(self) -> Vec<Line<'static>> {
        let columns = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.header.len()))
            .max()
            .unwrap_or(0);
        let mut widths = vec![3usize; columns];
        for row in std::iter::once(&self.header).chain(self.rows.iter()) {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.width());
            }
        }

        let mut lines = Vec::new();
        if !self.header.is_empty() {
            lines.push(table_row(&self.header, &widths, true));
            let separator = widths
                .iter()
                .map(|w| "─".repeat(w + 2))
                .collect::<Vec<_>>()
                .join("┼");
            lines.push(Line::from(Span::styled(separator, palette::muted())));
        }
        for row in &self.rows {
            lines.push(table_row(row, &widths, false));
        }
        lines
    }
}

fn table_row(cells: &[String], widths: &[usize], header: bool) -> Line<'static> {
    let style = if header {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let mut spans = Vec::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("│".to_string(), palette::muted()));
        }
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        spans.push(Span::styled(format!(" {} ", pad_to(cell, *width)), style));
    }
    Line::from(spans)
}

/// Left-align `text` in `width` display columns
pub fn pad_to(text: &str, width: usize) -> String {
    let w = text.width();
    if w >= width {
        text.to_string()
    } else {
        format!("{}{}", text, " ".repeat(width - w))
    }
}

/// Cut `text` to at most `width` display columns, marking the cut with `…`
pub fn truncate_to(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    // Measure the kept prefix as a string; per-char widths disagree with it
    // on presentation sequences such as `❤\u{FE0F}`.
    let mut out = String::new();
    for ch in text.chars() {
        out.push(ch);
        if out.width() + 1 > width {
            out.pop();
            break;
        }
    }
    out.push('…');
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Text helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Word-wrap to `width` display columns; words longer than a line stay whole
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 || text.is_empty() {
        return vec![text.to_string()];
    }

    let indent: String = text.chars().take_while(|c| *c == ' ').collect();
    let mut result = Vec::new();
    let mut current = indent.clone();
    let mut current_width = indent.len();

    for word in text.split_whitespace() {
        let word_width = word.width();
        if current_width == indent.len() {
            current.push_str(word);
            current_width += word_width;
        } else if current_width + 1 + word_width <= width {
            current.push(' ');
            current.push_str(word);
            current_width += 1 + word_width;
        } else {
            result.push(std::mem::take(&mut current));
            current = format!("{}{}", indent, word);
            current_width = indent.len() + word_width;
        }
    }

    if current_width > indent.len() || result.is_empty() {
        result.push(current);
    }
    result
}

/// Strip escape sequences and control characters that corrupt the terminal
pub fn sanitize_for_tui(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\x1b' => {
                if chars.peek() == Some(&'[') {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next.is_ascii_alphabetic() {
                            break;
                        }
                    }
                }
            }
            '\r' | '\x08' | '\x7f' => {}
            '\t' => result.push_str("    "),
            c if c.is_ascii_control() && c != '\n' => {}
            _ => result.push(ch),
        }
    }

    result
}
