use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

/// A ring already projected to canvas coordinates
pub type CanvasRing = Vec<(f64, f64)>;

/// Alpha-composite `color` over the pixel at (x, y); out-of-bounds is a no-op
#[inline(always)]
pub fn blend_pixel(img: &mut RgbaImage, x: i32, y: i32, color: Rgba<u8>) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let dst = img.get_pixel_mut(x as u32, y as u32);
    let a = color[3] as u32;
    if a == 255 {
        *dst = color;
        return;
    }
    let inv = 255 - a;
    for c in 0..3 {
        dst[c] = ((color[c] as u32 * a + dst[c] as u32 * inv + 127) / 255) as u8;
    }
    dst[3] = (a + dst[3] as u32 * inv / 255).min(255) as u8;
}

/// Fill a set of rings with the even-odd rule, sampling at pixel centers.
///
/// Passing an exterior ring together with its holes yields exterior minus
/// holes. Rings need not repeat their first vertex.
pub fn fill_even_odd(img: &mut RgbaImage, rings: &[CanvasRing], color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    let Some((min_y, max_y)) = rings
        .iter()
        .flatten()
        .map(|&(_, y)| y)
        .fold(None, |acc: Option<(f64, f64)>, y| match acc {
            None => Some((y, y)),
            Some((lo, hi)) => Some((lo.min(y), hi.max(y))),
        })
    else {
        return;
    };

    let row_start = min_y.floor().max(0.0) as u32;
    let row_end = (max_y.ceil().max(0.0) as u32).min(height);
    let mut crossings: Vec<f64> = Vec::new();

    for row in row_start..row_end {
        let sy = row as f64 + 0.5;
        crossings.clear();

        for ring in rings {
            if ring.len() < 3 {
                continue;
            }
            let mut prev = ring[ring.len() - 1];
            for &cur in ring {
                let (x0, y0) = prev;
                let (x1, y1) = cur;
                // Half-open rule so shared vertices count once
                if (y0 <= sy && y1 > sy) || (y1 <= sy && y0 > sy) {
                    crossings.push(x0 + (sy - y0) / (y1 - y0) * (x1 - x0));
                }
                prev = cur;
            }
        }

        crossings.sort_by(|a, b| a.total_cmp(b));
        for span in crossings.chunks_exact(2) {
            // Pixel x is covered when its center x + 0.5 lies in [span0, span1)
            let first = (span[0] - 0.5).ceil().max(0.0) as u32;
            let last = ((span[1] - 0.5).ceil().max(0.0) as u32).min(width);
            for x in first..last {
                blend_pixel(img, x as i32, row as i32, color);
            }
        }
    }
}

/// Outline a closed ring
pub fn stroke_ring(img: &mut RgbaImage, ring: &[(f64, f64)], color: Rgba<u8>) {
    if ring.len() < 2 {
        return;
    }
    let mut prev = ring[ring.len() - 1];
    for &cur in ring {
        draw_line_segment_mut(
            img,
            (prev.0 as f32, prev.1 as f32),
            (cur.0 as f32, cur.1 as f32),
            color,
        );
        prev = cur;
    }
}

/// Small filled dot (other-platform marker)
pub fn draw_dot(img: &mut RgbaImage, x: f64, y: f64, radius: i32, color: Rgba<u8>) {
    draw_filled_circle_mut(img, (x.floor() as i32, y.floor() as i32), radius, color);
}

/// Two-pixel-thick plus sign, alpha blended (center marker)
pub fn draw_cross(img: &mut RgbaImage, x: f64, y: f64, arm: i32, color: Rgba<u8>) {
    let cx = x.floor() as i32;
    let cy = y.floor() as i32;
    for i in -arm..=arm {
        for t in 0..2 {
            blend_pixel(img, cx + i, cy + t, color);
            // Skip the hub on the vertical pass so it is not blended twice
            if !(0..2).contains(&i) {
                blend_pixel(img, cx + t, cy + i, color);
            }
        }
    }
}

/// Filled diamond with an outline (launch-platform marker)
pub fn draw_diamond(
    img: &mut RgbaImage,
    x: f64,
    y: f64,
    radius: f64,
    fill: Rgba<u8>,
    outline: Rgba<u8>,
) {
    let ring = vec![(x, y - radius), (x + radius, y), (x, y + radius), (x - radius, y)];
    fill_even_odd(img, std::slice::from_ref(&ring), fill);
    stroke_ring(img, &ring, outline);
}
