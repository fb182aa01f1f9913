use ratatui::{
    buffer::Buffer,
    layout::{Position, Rect, Size},
    widgets::Widget,
};

/// Flatten a buffer into plain text, one line per row, with trailing blanks
/// trimmed from every line
pub(crate) fn buffer_to_text(buf: &Buffer) -> String {
    let area = buf.area;
    let mut lines = Vec::with_capacity(usize::from(area.height));
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell((x, y)) {
                line.push_str(cell.symbol());
            }
        }
        lines.push(line.trim_end().to_owned());
    }
    lines.join("\n")
}

/// Draw `widget` on an offscreen buffer of the given size and return the
/// result as text
pub(crate) fn render_to_text<W: Widget>(widget: W, size: Size) -> String {
    let area = Rect::from((Position::ORIGIN, size));
    let mut buf = Buffer::empty(area);
    widget.render(area, &mut buf);
    buffer_to_text(&buf)
}
