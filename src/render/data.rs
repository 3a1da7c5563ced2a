//! Card, chart, task list and code block renderers

use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;
use unicode_width::UnicodeWidthStr;

use super::interactive::carry_control_state;
use super::markdown::{pad_to, render_markdown, render_plain, truncate_to};
use super::{palette, title_line, ComponentView, Control, RenderContext, RenderHandle, Renderer};
use crate::protocol::kinds::{display_value, ComponentBody};
use crate::protocol::DataMap;

pub struct CardRenderer;

impl Renderer for CardRenderer {
    fn name(&self) -> &'static str {
        "card"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Card(card) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let color = card
            .status
            .as_deref()
            .map(palette::variant_color)
            .unwrap_or(palette::ACCENT);
        let mut body = vec![title_line(
            card.icon.as_deref(),
            &card.title,
            Style::default().fg(color),
        )];
        if let Some(subtitle) = &card.subtitle {
            body.push(Line::from(Span::styled(
                subtitle.clone(),
                palette::muted().add_modifier(Modifier::ITALIC),
            )));
        }
        let content = if card.markdown || !card.content.is_empty() {
            render_markdown(&card.content, ctx.wrap_width)
        } else {
            Vec::new()
        };
        body.extend(content);

        let controls = card.actions.iter().map(Control::from_action).collect();
        RenderHandle::new(view, self.name())
            .with_body(body)
            .with_controls(controls)
    }

    fn update(
        &self,
        handle: &mut RenderHandle,
        view: &ComponentView<'_>,
        _changes: Option<&DataMap>,
        ctx: &RenderContext,
    ) {
        let mut next = self.render(view, ctx);
        carry_control_state(&handle.controls, &mut next.controls);
        *handle = next;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Charts
// ─────────────────────────────────────────────────────────────────────────────

const CHART_BAR_WIDTH: usize = 30;
const CHART_LABEL_WIDTH: usize = 16;

/// One named series of labelled values
#[derive(Debug, Clone, PartialEq)]
struct Series {
    name: String,
    points: Vec<(String, f64)>,
}

/// Extract series from a chart.js-style `{labels, datasets}` payload or
/// plotly-style traces (`{data: [{x, y, name}]}` or a bare trace array)
fn extract_series(data: &Value) -> Vec<Series> {
    if let Some(datasets) = data.get("datasets").and_then(Value::as_array) {
        let labels: Vec<String> = data
            .get("labels")
            .and_then(Value::as_array)
            .map(|l| l.iter().map(display_value).collect())
            .unwrap_or_default();
        return datasets
            .iter()
            .enumerate()
            .filter_map(|(i, set)| {
                let values = set.get("data")?.as_array()?;
                let points = values
                    .iter()
                    .enumerate()
                    .filter_map(|(j, v)| {
                        let label = labels.get(j).cloned().unwrap_or_else(|| j.to_string());
                        v.as_f64().map(|n| (label, n))
                    })
                    .collect();
                Some(Series {
                    name: set
                        .get("label")
                        .map(display_value)
                        .unwrap_or_else(|| format!("Series {}", i + 1)),
                    points,
                })
            })
            .collect();
    }

    let traces = match data.get("data") {
        Some(Value::Array(traces)) => traces.as_slice(),
        _ => match data {
            Value::Array(traces) => traces.as_slice(),
            _ => &[][..],
        },
    };
    traces
        .iter()
        .enumerate()
        .filter_map(|(i, trace)| {
            let ys = trace.get("y")?.as_array()?;
            let xs = trace.get("x").and_then(Value::as_array);
            let points = ys
                .iter()
                .enumerate()
                .filter_map(|(j, y)| {
                    let label = xs
                        .and_then(|xs| xs.get(j))
                        .map(display_value)
                        .unwrap_or_else(|| j.to_string());
                    y.as_f64().map(|n| (label, n))
                })
                .collect();
            Some(Series {
                name: trace
                    .get("name")
                    .map(display_value)
                    .unwrap_or_else(|| format!("Series {}", i + 1)),
                points,
            })
        })
        .collect()
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{:.2}", n)
    }
}

pub struct ChartRenderer;

impl Renderer for ChartRenderer {
    fn name(&self) -> &'static str {
        "chart"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::Chart(chart) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let title = chart
            .title
            .clone()
            .or_else(|| {
                chart
                    .data
                    .pointer("/layout/title")
                    .map(|t| t.get("text").unwrap_or(t))
                    .map(display_value)
            })
            .unwrap_or_else(|| "Chart".to_string());
        let kind = if chart.chart_type.is_empty() {
            String::new()
        } else {
            format!("  ({})", chart.chart_type)
        };
        let mut header = title_line(Some("📈"), &title, Style::default().fg(palette::ACCENT));
        header.spans.push(Span::styled(kind, palette::muted()));
        let mut body = vec![header];

        let series = extract_series(&chart.data);
        if series.iter().all(|s| s.points.is_empty()) {
            let pretty = serde_json::to_string_pretty(&chart.data).unwrap_or_default();
            for line in pretty.lines().take(ctx.preview_lines) {
                body.push(Line::from(Span::styled(line.to_string(), palette::muted())));
            }
            return RenderHandle::new(view, self.name()).with_body(body);
        }

        let max = series
            .iter()
            .flat_map(|s| s.points.iter().map(|(_, v)| v.abs()))
            .fold(0.0_f64, f64::max);
        let colors = [palette::ACCENT, palette::SUCCESS, palette::WARNING, palette::USER];

        for (i, s) in series.iter().enumerate() {
            if series.len() > 1 {
                body.push(Line::from(Span::styled(
                    s.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )));
            }
            let color = colors[i % colors.len()];
            for (label, value) in &s.points {
                let filled = if max > 0.0 {
                    ((value.abs() / max) * CHART_BAR_WIDTH as f64).round() as usize
                } else {
                    0
                };
                body.push(Line::from(vec![
                    Span::raw(pad_to(&truncate_to(label, CHART_LABEL_WIDTH), CHART_LABEL_WIDTH)),
                    Span::raw(" "),
                    Span::styled("▇".repeat(filled.max(1)), Style::default().fg(color)),
                    Span::raw(format!(" {}", format_number(*value))),
                ]));
            }
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Task list and code
// ─────────────────────────────────────────────────────────────────────────────

pub struct TaskListRenderer;

impl Renderer for TaskListRenderer {
    fn name(&self) -> &'static str {
        "task_list"
    }

    fn render(&self, view: &ComponentView<'_>, ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::TaskList(list) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let title = if list.title.is_empty() {
            "Tasks"
        } else {
            list.title.as_str()
        };
        let done = list
            .tasks
            .iter()
            .filter(|t| matches!(t.status.as_str(), "completed" | "done" | "success"))
            .count();
        let mut header = title_line(None, title, Style::default().fg(palette::ACCENT));
        header.spans.push(Span::styled(
            format!("  {}/{}", done, list.tasks.len()),
            palette::muted(),
        ));
        let mut body = vec![header];

        for task in &list.tasks {
            let status = if task.status.is_empty() {
                "pending"
            } else {
                task.status.as_str()
            };
            let mut spans = vec![
                Span::styled(
                    format!("{} ", palette::status_icon(status)),
                    Style::default().fg(palette::variant_color(status)),
                ),
                Span::raw(task.title.clone()),
            ];
            if list.show_progress {
                if let Some(progress) = task.progress {
                    spans.push(Span::styled(
                        format!("  {:.0}%", progress.clamp(0.0, 1.0) * 100.0),
                        palette::muted(),
                    ));
                }
            }
            body.push(Line::from(spans));
            if let Some(description) = &task.description {
                for mut line in render_plain(description, ctx.wrap_width.saturating_sub(2), palette::muted()) {
                    line.spans.insert(0, Span::raw("  "));
                    body.push(line);
                }
            }
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}

pub struct CodeBlockRenderer;

impl Renderer for CodeBlockRenderer {
    fn name(&self) -> &'static str {
        "code_block"
    }

    fn render(&self, view: &ComponentView<'_>, _ctx: &RenderContext) -> RenderHandle {
        let ComponentBody::CodeBlock(code) = view.body else {
            return RenderHandle::new(view, self.name());
        };

        let mut body = Vec::new();
        let label = match (&code.title, &code.language) {
            (Some(title), Some(lang)) => Some(format!("{} · {}", title, lang)),
            (Some(title), None) => Some(title.clone()),
            (None, Some(lang)) => Some(lang.clone()),
            (None, None) => None,
        };
        if let Some(label) = label {
            body.push(Line::from(Span::styled(label, palette::muted())));
        }

        let numbered = code.line_numbers.unwrap_or(true);
        let lines: Vec<&str> = code.content.lines().collect();
        let gutter = lines.len().to_string().width();
        for (i, line) in lines.iter().enumerate() {
            let mut spans = Vec::new();
            if numbered {
                spans.push(Span::styled(
                    format!("{:>gutter$} │ ", i + 1, gutter = gutter),
                    palette::muted(),
                ));
            }
            spans.push(Span::styled(line.to_string(), Style::default().fg(palette::CODE)));
            body.push(Line::from(spans));
        }
        RenderHandle::new(view, self.name()).with_body(body)
    }
}
