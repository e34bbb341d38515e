use crate::app::App;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use tui_pinmap::braille::BrailleCanvas;
use tui_pinmap::entity::ContentKind;
use tui_pinmap::interaction::TooltipStyle;
use tui_pinmap::map::MapLayers;

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Split into map area, tooltip line and status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),    // Map
            Constraint::Length(1), // Tooltip
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_map(frame, app, chunks[0]);
    render_tooltip(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    // Create a block with border
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Pin Map ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Markers were placed against app.viewport, which App keeps sized to
    // this pane; draw with the same one so hit testing lines up.
    let layers = app.map_renderer.render(
        inner.width as usize,
        inner.height as usize,
        &app.viewport,
        app.engine.surface(),
    );

    // Get mouse cursor position for marker
    let cursor_pos = app.mouse_pixel_pos().and_then(|(px, py)| {
        // Convert braille pixels to character position
        let cx = (px / 2) as u16;
        let cy = (py / 4) as u16;
        if cx < inner.width && cy < inner.height {
            Some((cx, cy))
        } else {
            None
        }
    });

    let map_widget = MapWidget { layers, cursor_pos };
    frame.render_widget(map_widget, inner);
}

/// Custom widget that renders braille map with text labels overlaid
struct MapWidget {
    layers: MapLayers,
    cursor_pos: Option<(u16, u16)>,
}

impl MapWidget {
    /// Render a braille canvas layer, each cell in its own tint or `fallback`
    fn render_layer(&self, canvas: &BrailleCanvas, fallback: Color, area: Rect, buf: &mut Buffer) {
        for cy in 0..area.height {
            for cx in 0..area.width {
                // Empty cells come back as None and keep what is underneath
                let Some((ch, tint)) = canvas.cell(cx as usize, cy as usize) else {
                    continue;
                };
                let color = tint.map_or(fallback, |[r, g, b]| Color::Rgb(r, g, b));
                buf[(area.x + cx, area.y + cy)].set_char(ch).set_fg(color);
            }
        }
    }
}

impl Widget for MapWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Back to front: base map, markers, text
        self.render_layer(&self.layers.basemap, Color::DarkGray, area, buf);
        self.render_layer(&self.layers.markers, Color::White, area, buf);

        for label in &self.layers.labels {
            if label.row >= area.height || label.col >= area.width {
                continue;
            }
            let [r, g, b] = label.tint;
            let mut style = Style::default().fg(Color::Rgb(r, g, b));
            if label.bold {
                style = style.add_modifier(Modifier::BOLD);
            }

            let max_len = area.width.saturating_sub(label.col) as usize;
            for (i, ch) in label.text.chars().take(max_len).enumerate() {
                buf[(area.x + label.col + i as u16, area.y + label.row)]
                    .set_char(ch)
                    .set_style(style);
            }
        }

        // Center reticle, drawn only on empty cells
        let (mx, my) = (area.x + area.width / 2, area.y + area.height / 2);
        if area.width > 0 && area.height > 0 && buf[(mx, my)].symbol() == " " {
            buf[(mx, my)].set_char('┼').set_fg(Color::DarkGray);
        }

        // Render cursor marker
        if let Some((cx, cy)) = self.cursor_pos {
            let x = area.x + cx;
            let y = area.y + cy;
            if x < area.x + area.width && y < area.y + area.height {
                buf[(x, y)].set_char('╋').set_fg(Color::Red);
            }
        }
    }
}

fn tooltip_style(style: TooltipStyle) -> Style {
    match style {
        TooltipStyle::Selected => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        TooltipStyle::Focus => Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
    }
}

fn render_tooltip(frame: &mut Frame, app: &App, area: Rect) {
    let line = match &app.tooltip {
        Some(tooltip) => {
            let mut spans = vec![
                Span::raw(" "),
                Span::styled(tooltip.text.clone(), tooltip_style(tooltip.style)),
            ];
            if let Some(focus) = &app.focus_tooltip {
                spans.push(Span::styled("  │  ", Style::default().fg(Color::DarkGray)));
                spans.push(Span::styled(focus.text.clone(), tooltip_style(focus.style)));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled(
            " click a marker to select it",
            Style::default().fg(Color::DarkGray),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn toggle_span(on: bool, text: String) -> Span<'static> {
    Span::styled(
        text,
        Style::default().fg(if on { Color::Green } else { Color::DarkGray }),
    )
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let stats = app.stats();
    let filter = app.filter();
    let dim = Style::default().fg(Color::DarkGray);

    let mut spans = vec![
        Span::styled(" ", dim),
        Span::styled(app.zoom_level(), Style::default().fg(Color::Yellow)),
        Span::styled(" | ", dim),
        Span::styled(app.center_coords(), Style::default().fg(Color::Cyan)),
        Span::styled(" | ", dim),
    ];

    // Filter indicators
    for (i, kind) in ContentKind::ALL.iter().enumerate() {
        let on = filter.kinds.contains(kind);
        spans.push(toggle_span(on, format!("{}:{} ", i + 1, kind.label())));
    }
    spans.push(toggle_span(filter.show_records, "a:audio ".to_string()));

    spans.push(Span::styled("| sel ", dim));
    spans.push(Span::styled(app.selection_status(), Style::default().fg(Color::Magenta)));
    spans.push(Span::styled(
        format!(
            " | {} markers, pool {}+{}",
            stats.markers, stats.pool.active, stats.pool.available
        ),
        dim,
    ));

    if let Some((painted, total)) = stats.progress {
        spans.push(Span::styled(
            format!(" | painting {painted}/{total}"),
            Style::default().fg(Color::Yellow),
        ));
    }
    if stats.pending_thumbnails > 0 {
        spans.push(Span::styled(
            format!(" | {} thumbs", stats.pending_thumbnails),
            dim,
        ));
    }
    if app.is_loading() {
        spans.push(Span::styled(" | loading…", Style::default().fg(Color::Yellow)));
    }

    spans.push(Span::styled(" | hjkl:pan +/-:zoom r:reset q:quit", dim));

    let paragraph = Paragraph::new(Line::from(spans));
    frame.render_widget(paragraph, area);
}
