use crate::braille::BrailleCanvas;

/// Walk a line with Bresenham's algorithm
fn bresenham(x0: i32, y0: i32, x1: i32, y1: i32, mut plot: impl FnMut(i32, i32)) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        plot(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Draw a base-map line
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    bresenham(x0, y0, x1, y1, |x, y| canvas.set_pixel_signed(x, y));
}

/// Draw a colored line (leader from a displaced marker to its entity)
pub fn draw_line_tinted(canvas: &mut BrailleCanvas, from: (i32, i32), to: (i32, i32), tint: [u8; 3]) {
    bresenham(from.0, from.1, to.0, to.1, |x, y| canvas.set_pixel_tinted(x, y, tint));
}

/// Draw a point marker (small cross)
pub fn draw_marker(canvas: &mut BrailleCanvas, x: i32, y: i32, size: i32, tint: [u8; 3]) {
    for i in -size..=size {
        canvas.set_pixel_tinted(x + i, y, tint);
        canvas.set_pixel_tinted(x, y + i, tint);
    }
}

/// Draw a filled circle (placeholder for markers without an icon yet)
pub fn draw_circle(canvas: &mut BrailleCanvas, cx: i32, cy: i32, radius: i32, tint: [u8; 3]) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                canvas.set_pixel_tinted(cx + dx, cy + dy, tint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        // Top dot of both columns in every cell
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.to_string(), "⡇\n⡇");
    }

    #[test]
    fn test_tinted_line_colors_cells() {
        let mut canvas = BrailleCanvas::new(3, 1);
        draw_line_tinted(&mut canvas, (0, 0), (5, 0), [255, 0, 0]);
        for cx in 0..3 {
            assert_eq!(canvas.cell(cx, 0).and_then(|(_, t)| t), Some([255, 0, 0]));
        }
    }

    #[test]
    fn test_circle_radius_zero_is_one_dot() {
        let mut canvas = BrailleCanvas::new(1, 1);
        draw_circle(&mut canvas, 0, 0, 0, [0, 0, 0]);
        assert_eq!(canvas.to_string(), "⠁");
    }
}
