//! Tabular view state for `dataframe` and `table` components
//!
//! `TableView` holds the rows plus the user's sort and search choices. The
//! renderer rebuilds rows on update but carries the view state across, so a
//! streamed refresh of the data keeps the user's ordering and filter.

use std::cmp::Ordering;

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use super::markdown::{pad_to, render_markdown, truncate_to};
use super::{palette, title_line, ComponentView, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::{display_value, ComponentBody, DataFrameData, TableData};
use crate::protocol::DataMap;

/// Placeholder drawn for null or missing cells
pub const NULL_PLACEHOLDER: &str = "∅";

const MAX_CELL_WIDTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub key: String,
    pub title: String,
    pub numeric: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    columns: Vec<Column>,
    rows: Vec<DataMap>,
    /// Declared total, which may exceed the rows actually sent
    row_count: Option<usize>,
    max_rows: usize,
    sort: Option<(String, SortDirection)>,
    search: String,
    pub searchable: bool,
    pub sortable: bool,
    pub exportable: bool,
}

impl TableView {
    pub fn new(columns: Vec<Column>, rows: Vec<DataMap>, max_rows: usize) -> Self {
        Self {
            columns,
            rows,
            row_count: None,
            max_rows: max_rows.max(1),
            sort: None,
            search: String::new(),
            searchable: true,
            sortable: true,
            exportable: true,
        }
    }

    pub fn from_dataframe(df: &DataFrameData, ctx: &RenderContext) -> Self {
        let keys = if df.columns.is_empty() {
            df.rows
                .first()
                .map(|row| row.keys().cloned().collect())
                .unwrap_or_default()
        } else {
            df.columns.clone()
        };
        let columns = keys
            .into_iter()
            .map(|key| {
                let numeric = match df.column_types.get(&key).and_then(Value::as_str) {
                    Some(hint) => is_numeric_hint(hint),
                    None => all_numbers(&df.rows, &key),
                };
                Column {
                    title: key.clone(),
                    key,
                    numeric,
                }
            })
            .collect();

        let mut view = Self::new(
            columns,
            df.rows.clone(),
            df.max_rows_displayed.unwrap_or(ctx.max_rows_displayed),
        );
        view.row_count = df.row_count;
        view.searchable = df.searchable.unwrap_or(true);
        view.sortable = df.sortable.unwrap_or(true);
        view.exportable = df.exportable.unwrap_or(true);
        view
    }

    pub fn from_table(table: &TableData, ctx: &RenderContext) -> Self {
        let columns = table
            .columns
            .iter()
            .map(|c| Column {
                key: c.key.clone(),
                title: c.title.clone().unwrap_or_else(|| c.key.clone()),
                numeric: all_numbers(&table.rows, &c.key),
            })
            .collect();
        Self::new(
            columns,
            table.rows.clone(),
            table.max_rows_displayed.unwrap_or(ctx.max_rows_displayed),
        )
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn sort_state(&self) -> Option<(&str, SortDirection)> {
        self.sort.as_ref().map(|(key, dir)| (key.as_str(), *dir))
    }

    /// Sort by column `index`, flipping direction when it is already the key
    pub fn toggle_sort(&mut self, index: usize) -> bool {
        if !self.sortable {
            return false;
        }
        let Some(column) = self.columns.get(index) else {
            return false;
        };
        let direction = match &self.sort {
            Some((key, SortDirection::Ascending)) if *key == column.key => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.sort = Some((column.key.clone(), direction));
        true
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, query: &str) {
        if self.searchable {
            self.search = query.to_string();
        }
    }

    /// Carry sort and search over from the previous view of the same component
    pub fn carry_view_state(&mut self, previous: &TableView) {
        if let Some((key, direction)) = &previous.sort {
            if self.columns.iter().any(|c| &c.key == key) {
                self.sort = Some((key.clone(), *direction));
            }
        }
        if self.searchable {
            self.search = previous.search.clone();
        }
    }

    /// Rows after search and sort, uncapped
    pub fn visible_rows(&self) -> Vec<&DataMap> {
        let needle = self.search.to_lowercase();
        let mut rows: Vec<&DataMap> = self
            .rows
            .iter()
            .filter(|row| {
                needle.is_empty()
                    || self.columns.iter().any(|c| {
                        row.get(&c.key)
                            .map(|v| display_value(v).to_lowercase().contains(&needle))
                            .unwrap_or(false)
                    })
            })
            .collect();

        if let Some((key, direction)) = &self.sort {
            let numeric = self
                .columns
                .iter()
                .find(|c| &c.key == key)
                .map(|c| c.numeric)
                .unwrap_or(false);
            rows.sort_by(|a, b| compare_cells(a.get(key), b.get(key), numeric, *direction));
        }
        rows
    }

    /// Total the truncation notice reports against
    fn total_rows(&self, visible: usize) -> usize {
        if self.search.is_empty() {
            self.row_count.unwrap_or(0).max(self.rows.len())
        } else {
            visible
        }
    }

    pub fn lines(&self) -> Vec<Line<'static>> {
        let visible = self.visible_rows();
        let shown: Vec<&DataMap> = visible.iter().take(self.max_rows).copied().collect();

        let cells: Vec<Vec<String>> = shown
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| match row.get(&c.key) {
                        None | Some(Value::Null) => NULL_PLACEHOLDER.to_string(),
                        Some(value) => display_value(value).replace('\n', " "),
                    })
                    .collect()
            })
            .collect();

        let headers: Vec<String> = self
            .columns
            .iter()
            .map(|c| match &self.sort {
                Some((key, SortDirection::Ascending)) if *key == c.key => format!("{} ▲", c.title),
                Some((key, SortDirection::Descending)) if *key == c.key => format!("{} ▼", c.title),
                _ => c.title.clone(),
            })
            .collect();

        let widths: Vec<usize> = (0..self.columns.len())
            .map(|i| {
                cells
                    .iter()
                    .map(|row| row[i].width())
                    .chain(std::iter::once(headers[i].width()))
                    .max()
                    .unwrap_or(1)
                    .min(MAX_CELL_WIDTH)
            })
            .collect();

        let mut lines = Vec::new();
        if !self.search.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("Search: ", palette::muted()),
                Span::styled(
                    self.search.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::styled(format!("  ({} matching)", visible.len()), palette::muted()),
            ]));
        }

        let header_style = Style::default()
            .fg(palette::ACCENT)
            .add_modifier(Modifier::BOLD);
        lines.push(self.row_line(&headers, &widths, |_| header_style));
        let separator = widths
            .iter()
            .map(|w| "─".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("┼");
        lines.push(Line::from(Span::styled(separator, palette::muted())));

        for row in &cells {
            lines.push(self.row_line(row, &widths, |cell| {
                if cell == NULL_PLACEHOLDER {
                    palette::muted()
                } else {
                    Style::default()
                }
            }));
        }

        let total = self.total_rows(visible.len());
        if shown.len() < total {
            lines.push(Line::from(Span::styled(
                format!("Showing {} of {} rows", shown.len(), total),
                palette::muted().add_modifier(Modifier::ITALIC),
            )));
        } else if shown.is_empty() {
            lines.push(Line::from(Span::styled("No rows", palette::muted())));
        }
        lines
    }

    fn row_line(&self, cells: &[String], widths: &[usize], style: impl Fn(&str) -> Style) -> Line<'static> {
        let mut spans = Vec::new();
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            if i > 0 {
                spans.push(Span::styled("│", palette::muted()));
            }
            let text = truncate_to(cell, *width);
            let padded = if self.columns[i].numeric && cell != NULL_PLACEHOLDER {
                format!("{}{}", " ".repeat(width.saturating_sub(text.width())), text)
            } else {
                pad_to(&text, *width)
            };
            spans.push(Span::styled(format!(" {} ", padded), style(cell)));
        }
        Line::from(spans)
    }

    /// RFC 4180 CSV of the searched and sorted rows, ignoring the display cap
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<String> = self.columns.iter().map(|c| csv_field(&c.title)).collect();
        out.push_str(&header.join(","));
        out.push_str("\r\n");
        for row in self.visible_rows() {
            let fields: Vec<String> = self
                .columns
                .iter()
                .map(|c| match row.get(&c.key) {
                    None | Some(Value::Null) => String::new(),
                    Some(value) => csv_field(&display_value(value)),
                })
                .collect();
            out.push_str(&fields.join(","));
            out.push_str("\r\n");
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn is_numeric_hint(hint: &str) -> bool {
    let hint = hint.to_ascii_lowercase();
    ["int", "uint", "float", "double", "decimal", "number", "numeric"]
        .iter()
        .any(|prefix| hint.starts_with(prefix))
}

fn all_numbers(rows: &[DataMap], key: &str) -> bool {
    let mut seen = false;
    for value in rows.iter().filter_map(|row| row.get(key)) {
        match value {
            Value::Null => {}
            Value::Number(_) => seen = true,
            _ => return false,
        }
    }
    seen
}

/// Nulls sort last in either direction
fn compare_cells(a: Option<&Value>, b: Option<&Value>, numeric: bool, direction: SortDirection) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    let (a, b) = match (a, b) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Greater,
        (Some(_), None) => return Ordering::Less,
        (Some(a), Some(b)) => (a, b),
    };

    let ordering = if numeric {
        match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => compare_text(a, b),
        }
    } else {
        compare_text(a, b)
    };

    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn compare_text(a: &Value, b: &Value) -> Ordering {
    display_value(a)
        .to_lowercase()
        .cmp(&display_value(b).to_lowercase())
}

// ─────────────────────────────────────────────────────────────────────────────
// Renderers
// ─────────────────────────────────────────────────────────────────────────────

pub struct DataFrameRenderer;

impl Renderer for DataFrameRenderer {
    fn name(&self) -> &'static str {
        "dataframe"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::DataFrame(df) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let mut body = Vec::new();
        if let Some(title) = &df.title {
            body.push(title_line(None, title, Style::default().fg(palette::ACCENT)));
        }
        if let Some(description) = &df.description {
            body.extend(render_markdown(description, ctx.wrap_width));
        }

        let mut handle = RenderHandle::new(view, self.name()).with_body(body);
        handle.table = Some(TableView::from_dataframe(df, ctx));
        handle
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let previous = handle.table.take();
        *handle = self.render(view, ctx);
        if let (Some(table), Some(previous)) = (handle.table.as_mut(), previous.as_ref()) {
            table.carry_view_state(previous);
        }
    }
}

pub struct TableRenderer;

impl Renderer for TableRenderer {
    fn name(&self) -> &'static str {
        "table"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Table(table) = view.body else {
            return RenderHandle::new(view, self.name());
        };
        let body = table
            .title
            .as_ref()
            .map(|t| vec![title_line(None, t, Style::default().fg(palette::ACCENT))])
            .unwrap_or_default();
        let mut handle = RenderHandle::new(view, self.name()).with_body(body);
        handle.table = Some(TableView::from_table(table, ctx));
        handle
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let previous = handle.table.take();
        *handle = self.render(view, ctx);
        if let (Some(table), Some(previous)) = (handle.table.as_mut(), previous.as_ref()) {
            table.carry_view_state(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::line_text;
    use serde_json::json;

    fn frame(data: Value) -> TableView {
        let df: DataFrameData = serde_json::from_value(data).unwrap();
        TableView::from_dataframe(&df, &RenderContext::default())
    }

    fn employees() -> TableView {
        frame(json!({
            "columns": ["name", "age", "city"],
            "rows": [
                {"name": "bob", "age": 25, "city": "Austin"},
                {"name": "Alice", "age": 30, "city": null},
                {"name": "carol", "age": 9, "city": "Boston"}
            ]
        }))
    }

    fn names(view: &TableView) -> Vec<String> {
        view.visible_rows()
            .iter()
            .map(|r| display_value(&r["name"]))
            .collect()
    }

    #[test]
    fn test_numeric_detection() {
        let view = employees();
        assert!(!view.columns()[0].numeric);
        assert!(view.columns()[1].numeric);

        let hinted = frame(json!({
            "columns": ["code"],
            "column_types": {"code": "int64"},
            "rows": [{"code": "7"}, {"code": "10"}]
        }));
        assert!(hinted.columns()[0].numeric);
    }

    #[test]
    fn test_sort_numeric_and_toggle() {
        let mut view = employees();
        assert!(view.toggle_sort(1));
        assert_eq!(names(&view), vec!["carol", "bob", "Alice"]);
        view.toggle_sort(1);
        assert_eq!(view.sort_state(), Some(("age", SortDirection::Descending)));
        assert_eq!(names(&view), vec!["Alice", "bob", "carol"]);
    }

    #[test]
    fn test_sort_text_case_insensitive() {
        let mut view = employees();
        view.toggle_sort(0);
        assert_eq!(names(&view), vec!["Alice", "bob", "carol"]);
    }

    #[test]
    fn test_numeric_strings_compare_numerically_when_hinted() {
        let mut view = frame(json!({
            "columns": ["code"],
            "column_types": {"code": "integer"},
            "rows": [{"code": "10"}, {"code": "9"}]
        }));
        view.toggle_sort(0);
        let codes: Vec<String> = view
            .visible_rows()
            .iter()
            .map(|r| display_value(&r["code"]))
            .collect();
        assert_eq!(codes, vec!["9", "10"]);
    }

    #[test]
    fn test_nulls_sort_last_both_directions() {
        let mut view = employees();
        view.toggle_sort(2);
        assert_eq!(names(&view).last().map(String::as_str), Some("Alice"));
        view.toggle_sort(2);
        assert_eq!(names(&view).last().map(String::as_str), Some("Alice"));
    }

    #[test]
    fn test_search_across_columns() {
        let mut view = employees();
        view.set_search("BOS");
        assert_eq!(names(&view), vec!["carol"]);
        view.set_search("25");
        assert_eq!(names(&view), vec!["bob"]);
        view.set_search("");
        assert_eq!(view.visible_rows().len(), 3);
    }

    #[test]
    fn test_null_placeholder_rendered() {
        let lines = employees().lines();
        let alice = lines
            .iter()
            .map(line_text)
            .find(|l| l.contains("Alice"))
            .unwrap();
        assert!(alice.contains(NULL_PLACEHOLDER));
    }

    #[test]
    fn test_truncation_notice() {
        let rows: Vec<Value> = (0..5).map(|i| json!({"n": i})).collect();
        let view = frame(json!({"columns": ["n"], "rows": rows, "max_rows_displayed": 2}));
        let lines: Vec<String> = view.lines().iter().map(line_text).collect();
        assert_eq!(lines.len(), 2 + 2 + 1);
        assert_eq!(lines.last().unwrap(), "Showing 2 of 5 rows");
    }

    #[test]
    fn test_wide_cell_in_numeric_column_is_cut_to_width() {
        let hearts = "❤\u{FE0F}".repeat(20);
        let view = frame(json!({
            "columns": ["n"],
            "column_types": {"n": "int64"},
            "rows": [{"n": hearts}, {"n": 3}]
        }));
        assert!(view.columns()[0].numeric);
        let lines: Vec<String> = view.lines().iter().map(line_text).collect();
        let header_width = lines[0].width();
        assert!(lines[2].contains('…'));
        assert!(lines[2].width() <= header_width);
    }

    #[test]
    fn test_declared_row_count_drives_notice() {
        let view = frame(json!({"columns": ["n"], "rows": [{"n": 1}], "row_count": 40}));
        let last = view.lines().iter().map(line_text).last().unwrap();
        assert_eq!(last, "Showing 1 of 40 rows");
    }

    #[test]
    fn test_csv_quoting_and_uncapped_export() {
        let view = frame(json!({
            "columns": ["name", "note"],
            "max_rows_displayed": 1,
            "rows": [
                {"name": "a,b", "note": "say \"hi\""},
                {"name": "line\nbreak", "note": null}
            ]
        }));
        assert_eq!(
            view.to_csv(),
            "name,note\r\n\"a,b\",\"say \"\"hi\"\"\"\r\n\"line\nbreak\",\r\n"
        );
    }

    #[test]
    fn test_csv_follows_sort_and_search() {
        let mut view = employees();
        view.toggle_sort(1);
        view.set_search("o");
        assert_eq!(view.to_csv(), "name,age,city\r\ncarol,9,Boston\r\nbob,25,Austin\r\n");
    }

    #[test]
    fn test_view_state_survives_update() {
        let ctx = RenderContext::default();
        let first = crate::protocol::RichComponent::new(
            "df",
            "dataframe",
            json!({"columns": ["n"], "rows": [{"n": 2}, {"n": 1}]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let body = ComponentBody::decode("dataframe", &first.data).unwrap();
        let mut handle = DataFrameRenderer.render(
            &ComponentView {
                component: &first,
                body: &body,
            },
            &ctx,
        );
        let table = handle.table.as_mut().unwrap();
        table.toggle_sort(0);
        table.set_search("1");

        let second = crate::protocol::RichComponent::new(
            "df",
            "dataframe",
            json!({"columns": ["n"], "rows": [{"n": 3}, {"n": 1}, {"n": 10}]})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let body = ComponentBody::decode("dataframe", &second.data).unwrap();
        DataFrameRenderer.update(
            &mut handle,
            &ComponentView {
                component: &second,
                body: &body,
            },
            None,
            &ctx,
        );
        let table = handle.table.as_ref().unwrap();
        assert_eq!(table.sort_state(), Some(("n", SortDirection::Ascending)));
        assert_eq!(table.search(), "1");
        assert_eq!(table.visible_rows().len(), 2);
    }
}
