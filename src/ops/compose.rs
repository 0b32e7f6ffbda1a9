// ============================================================================
// COMPOSE — software rasterization of the surface into an RgbaImage
// ============================================================================
//
// The export path: background (scaled to cover), base element (scaled to
// fit), then every placed element back-to-front.  Each draw inverse-maps
// destination pixels through the element's rotation/scale into the source
// image, bilinear-samples, and blends src-over.  Rows are processed in
// parallel with rayon.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::assets::ImageStore;
use crate::surface::{SurfaceState, fitted_half_extents};

/// Render the whole surface at its native resolution.
pub fn render(surface: &SurfaceState, store: &mut ImageStore) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(surface.width, surface.height, Rgba([255, 255, 255, 255]));
    let cx = surface.width as f32 * 0.5;
    let cy = surface.height as f32 * 0.5;

    if let Some(background) = &surface.background {
        if let Some(src) = store.resolve(background) {
            let (sw, sh) = (src.width() as f32, src.height() as f32);
            if sw > 0.0 && sh > 0.0 {
                let cover = (surface.width as f32 / sw).max(surface.height as f32 / sh);
                draw_transformed(
                    &mut out,
                    &src,
                    cx,
                    cy,
                    sw * cover * 0.5,
                    sh * cover * 0.5,
                    0.0,
                    1.0,
                );
            }
        }
    }

    if let Some(image) = &surface.base.image {
        if let Some(src) = store.resolve(image) {
            let (sw, sh) = (src.width() as f32, src.height() as f32);
            if sw > 0.0 && sh > 0.0 {
                let fit = (surface.width as f32 / sw).min(surface.height as f32 / sh);
                let s = surface.base.scale.max(0.0);
                draw_transformed(
                    &mut out,
                    &src,
                    cx,
                    cy,
                    sw * fit * 0.5 * s,
                    sh * fit * 0.5 * s,
                    surface.base.rotation as f32,
                    surface.base.opacity,
                );
            }
        }
    }

    for elem in &surface.elements {
        let src = match store.resolve(&elem.image) {
            Some(src) => src,
            None => store.placeholder(),
        };
        let (half_w, half_h) =
            fitted_half_extents(src.width() as usize, src.height() as usize, elem.scale);
        let center = elem.center();
        draw_transformed(
            &mut out,
            &src,
            center.x,
            center.y,
            half_w,
            half_h,
            elem.rotation as f32,
            elem.opacity,
        );
    }

    out
}

/// Draw `src` into `dst`, scaled to half extents `half_w`/`half_h` and
/// rotated `rotation_deg` clockwise about `(cx, cy)`, modulated by `opacity`.
///
/// Destination pixels inside the rotated bounding box are inverse-mapped
/// into source space and bilinear-sampled against a transparent border.
fn draw_transformed(
    dst: &mut RgbaImage,
    src: &RgbaImage,
    cx: f32,
    cy: f32,
    half_w: f32,
    half_h: f32,
    rotation_deg: f32,
    opacity: f32,
) {
    if half_w <= 0.0 || half_h <= 0.0 || opacity <= 0.0 {
        return;
    }
    let dst_w = dst.width() as usize;
    let dst_h = dst.height();
    let opacity = opacity.clamp(0.0, 1.0);

    let (sin, cos) = rotation_deg.to_radians().sin_cos();

    // Rotated bounding box, clamped to the destination.
    let ext_x = half_w * cos.abs() + half_h * sin.abs();
    let ext_y = half_w * sin.abs() + half_h * cos.abs();
    let min_x = ((cx - ext_x).floor().max(0.0)) as usize;
    let min_y = ((cy - ext_y).floor().max(0.0)) as u32;
    let max_x = ((cx + ext_x).ceil() as usize).min(dst_w);
    let max_y = ((cy + ext_y).ceil() as u32).min(dst_h);
    if min_x >= max_x || min_y >= max_y {
        return;
    }

    let sw = src.width() as f32;
    let sh = src.height() as f32;
    let row_bytes = dst_w * 4;

    dst.as_mut()
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(min_y as usize)
        .take((max_y - min_y) as usize)
        .for_each(|(dy, row)| {
            let py = dy as f32 + 0.5 - cy;
            for dx in min_x..max_x {
                let px = dx as f32 + 0.5 - cx;

                // Inverse of the clockwise rotation.
                let lx = px * cos + py * sin;
                let ly = -px * sin + py * cos;
                if lx.abs() > half_w || ly.abs() > half_h {
                    continue;
                }

                let sx = (lx / (half_w * 2.0) + 0.5) * sw - 0.5;
                let sy = (ly / (half_h * 2.0) + 0.5) * sh - 0.5;
                let mut sample = bilinear_sample(src, sx, sy);
                sample[3] *= opacity;
                blend_over(&mut row[dx * 4..dx * 4 + 4], sample);
            }
        });
}

/// Bilinear interpolation sampling, transparent outside the source bounds.
/// All four channels come back in the 0–255 range.
fn bilinear_sample(img: &RgbaImage, x: f32, y: f32) -> [f32; 4] {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let sample = |sx: i32, sy: i32| -> [f32; 4] {
        if sx < 0 || sy < 0 || sx >= img.width() as i32 || sy >= img.height() as i32 {
            [0.0; 4]
        } else {
            let p = img.get_pixel(sx as u32, sy as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
        }
    };

    let tl = sample(x0, y0);
    let tr = sample(x0 + 1, y0);
    let bl = sample(x0, y0 + 1);
    let br = sample(x0 + 1, y0 + 1);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    let mut out = [0.0f32; 4];
    for c in 0..4 {
        let top = lerp(tl[c], tr[c], fx);
        let bot = lerp(bl[c], br[c], fx);
        out[c] = lerp(top, bot, fy);
    }
    out
}

/// Src-over blend of a straight-alpha sample (channels 0–255) onto one
/// destination pixel.
fn blend_over(dst: &mut [u8], src: [f32; 4]) {
    let sa = (src[3] / 255.0).clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let oa = sa + da * (1.0 - sa);
    if oa <= 0.0 {
        return;
    }
    for c in 0..3 {
        let blended = (src[c] * sa + dst[c] as f32 * da * (1.0 - sa)) / oa;
        dst[c] = blended.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (oa * 255.0).round().clamp(0.0, 255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ImageRef, PlacedElement};

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    fn store_with(id: &str, img: RgbaImage) -> (ImageStore, ImageRef) {
        let mut store = ImageStore::default();
        let image = ImageRef::Builtin(id.to_string());
        store.insert(image.clone(), img);
        (store, image)
    }

    #[test]
    fn render_matches_surface_dimensions() {
        let surface = SurfaceState::new(320, 200);
        let mut store = ImageStore::default();
        let out = render(&surface, &mut store);
        assert_eq!((out.width(), out.height()), (320, 200));
    }

    #[test]
    fn element_pixels_land_centered_on_its_box() {
        let (mut store, image) = store_with("test.red", solid(50, 50, [255, 0, 0, 255]));
        let mut surface = SurfaceState::new(480, 480);
        // Top-left (190, 190) → box center (240, 240), fitted to 100×100.
        surface
            .elements
            .push(PlacedElement::new(image, 190.0, 190.0));

        let out = render(&surface, &mut store);
        assert_eq!(out.get_pixel(240, 240).0, [255, 0, 0, 255]);
        // Outside the box stays the white backdrop.
        assert_eq!(out.get_pixel(100, 100).0, [255, 255, 255, 255]);
    }

    #[test]
    fn opacity_blends_toward_the_backdrop() {
        let (mut store, image) = store_with("test.red", solid(50, 50, [255, 0, 0, 255]));
        let mut surface = SurfaceState::new(480, 480);
        let mut elem = PlacedElement::new(image, 190.0, 190.0);
        elem.opacity = 0.5;
        surface.elements.push(elem);

        let out = render(&surface, &mut store);
        let px = out.get_pixel(240, 240).0;
        // Half red over white: red stays saturated, green/blue land mid-way.
        assert_eq!(px[0], 255);
        assert!((px[1] as i32 - 128).abs() <= 2, "g = {}", px[1]);
        assert!((px[2] as i32 - 128).abs() <= 2, "b = {}", px[2]);
    }

    #[test]
    fn rotation_turns_the_source() {
        // Left half red, right half blue.
        let mut img = solid(50, 50, [255, 0, 0, 255]);
        for y in 0..50 {
            for x in 25..50 {
                img.put_pixel(x, y, Rgba([0, 0, 255, 255]));
            }
        }
        let (mut store, image) = store_with("test.split", img);
        let mut surface = SurfaceState::new(480, 480);
        let mut elem = PlacedElement::new(image, 190.0, 190.0);
        elem.rotation = 180;
        surface.elements.push(elem);

        let out = render(&surface, &mut store);
        // After a half turn the left side of the box shows the blue half.
        assert_eq!(out.get_pixel(210, 240).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(270, 240).0, [255, 0, 0, 255]);
    }

    #[test]
    fn scale_grows_the_painted_box() {
        let (mut store, image) = store_with("test.red", solid(50, 50, [255, 0, 0, 255]));
        let mut surface = SurfaceState::new(480, 480);
        let mut elem = PlacedElement::new(image, 190.0, 190.0);
        elem.scale = 2.0;
        surface.elements.push(elem);

        let out = render(&surface, &mut store);
        // (150, 240) is outside the unscaled box but inside the 2× box.
        assert_eq!(out.get_pixel(150, 240).0, [255, 0, 0, 255]);
    }

    #[test]
    fn elements_composite_back_to_front() {
        let (mut store, red) = store_with("test.red", solid(50, 50, [255, 0, 0, 255]));
        let green = ImageRef::Builtin("test.green".to_string());
        store.insert(green.clone(), solid(50, 50, [0, 255, 0, 255]));

        let mut surface = SurfaceState::new(480, 480);
        surface.elements.push(PlacedElement::new(red, 190.0, 190.0));
        surface
            .elements
            .push(PlacedElement::new(green, 190.0, 190.0));

        let out = render(&surface, &mut store);
        // The later element renders on top.
        assert_eq!(out.get_pixel(240, 240).0, [0, 255, 0, 255]);
    }
}
