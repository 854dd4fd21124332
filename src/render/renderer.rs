use super::surface::Surface;

/// Draw a peak sequence across the full width of `surface`.
///
/// The backing store is sized to CSS size × device pixel ratio and cleared
/// first. Each pixel column shows the largest peak of the slice of the
/// sequence it covers, as a line centred on the middle row.
pub fn render_peaks(surface: &mut dyn Surface, peaks: &[f32]) {
    let (css_width, css_height) = surface.css_size();
    let ratio = surface.device_pixel_ratio().max(0.0);
    let width = (css_width * ratio).round().max(0.0) as u32;
    let height = (css_height * ratio).round().max(0.0) as u32;

    surface.resize_backing(width, height);
    surface.clear();

    if peaks.is_empty() || width == 0 || height == 0 {
        return;
    }

    // step = peaks / width, kept in integer form so column ranges are exact
    let count = peaks.len();
    let columns = width as usize;
    let mid = height as f32 / 2.0;

    for x in 0..columns {
        let start = x * count / columns;
        if start >= count {
            break;
        }
        let end = ((x + 1) * count / columns).max(start + 1).min(count);

        let amplitude = peaks[start..end]
            .iter()
            .fold(0.0f32, |max, &p| max.max(p))
            .clamp(0.0, 1.0);

        surface.vertical_line(x as f32, mid - amplitude * mid, mid + amplitude * mid);
    }
}
