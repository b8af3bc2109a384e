//! Pixel kernels standing in for fragment shaders.
//!
//! Every kernel writes a whole destination texture; inputs may be missing (`None`), which
//! reads as transparent black. Inputs of another size are sampled nearest-neighbour.

use rayon::prelude::*;

use crate::foundation::core::{Rgba8Premul, Size};
use crate::foundation::math::{add_sat_u8, mul_div255_u8, unit_weight};
use crate::gpu::context::{Texture, sample_rgba};

pub type PremulRgba8 = [u8; 4];

const TRANSPARENT: PremulRgba8 = [0, 0, 0, 0];

fn shade(dst: &mut Texture, f: impl Fn(u32, u32) -> PremulRgba8 + Sync) {
    let width = dst.size.width as usize;
    if width == 0 {
        return;
    }
    dst.data
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&f(x as u32, y as u32));
            }
        });
}

fn read(input: Option<&Texture>, dst: Size, x: u32, y: u32) -> PremulRgba8 {
    match input {
        Some(t) => t.sample(dst, x, y),
        None => TRANSPARENT,
    }
}

/// Source-over with the source scaled by `opacity`.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let op = unit_weight(opacity);
    let src_alpha = mul_div255_u8(u16::from(src[3]), op);
    if src_alpha == 0 {
        return dst;
    }
    let keep = 255 - u16::from(src_alpha);
    std::array::from_fn(|i| {
        let s = if i == 3 {
            src_alpha
        } else {
            mul_div255_u8(u16::from(src[i]), op)
        };
        add_sat_u8(s, mul_div255_u8(u16::from(dst[i]), keep))
    })
}

/// Linear blend from `a` (t = 0) to `b` (t = 1), alpha included.
pub fn crossfade(a: PremulRgba8, b: PremulRgba8, t: f32) -> PremulRgba8 {
    let wb = unit_weight(t);
    let wa = 255 - wb;
    std::array::from_fn(|i| {
        add_sat_u8(
            mul_div255_u8(u16::from(a[i]), wa),
            mul_div255_u8(u16::from(b[i]), wb),
        )
    })
}

pub fn fill(dst: &mut Texture, color: Rgba8Premul) {
    let c = color.to_array();
    shade(dst, |_, _| c);
}

pub fn checker(dst: &mut Texture, cell: u32, a: Rgba8Premul, b: Rgba8Premul) {
    let cell = cell.max(1);
    let (a, b) = (a.to_array(), b.to_array());
    shade(dst, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b }
    });
}

/// Horizontal (or vertical) linear gradient from `from` to `to`.
pub fn gradient(dst: &mut Texture, from: Rgba8Premul, to: Rgba8Premul, vertical: bool) {
    let (from, to) = (from.to_array(), to.to_array());
    let extent = if vertical {
        dst.size.height
    } else {
        dst.size.width
    };
    let span = extent.saturating_sub(1).max(1) as f32;
    shade(dst, |x, y| {
        let p = if vertical { y } else { x };
        crossfade(from, to, p as f32 / span)
    });
}

pub fn invert(dst: &mut Texture, src: Option<&Texture>) {
    let size = dst.size;
    shade(dst, |x, y| {
        let [r, g, b, a] = read(src, size, x, y);
        // Premultiplied inversion keeps colour within alpha.
        [a - r.min(a), a - g.min(a), a - b.min(a), a]
    });
}

/// Multiply the input by a premultiplied colour.
pub fn tint(dst: &mut Texture, src: Option<&Texture>, color: Rgba8Premul) {
    let size = dst.size;
    let c = color.to_array();
    shade(dst, |x, y| {
        let s = read(src, size, x, y);
        [
            mul_div255_u8(u16::from(s[0]), u16::from(c[0])),
            mul_div255_u8(u16::from(s[1]), u16::from(c[1])),
            mul_div255_u8(u16::from(s[2]), u16::from(c[2])),
            mul_div255_u8(u16::from(s[3]), u16::from(c[3])),
        ]
    });
}

pub fn mix(dst: &mut Texture, a: Option<&Texture>, b: Option<&Texture>, amount: f32) {
    let size = dst.size;
    shade(dst, |x, y| {
        crossfade(read(a, size, x, y), read(b, size, x, y), amount)
    });
}

/// `fg` composited over `bg`.
pub fn composite_over(
    dst: &mut Texture,
    bg: Option<&Texture>,
    fg: Option<&Texture>,
    opacity: f32,
) {
    let size = dst.size;
    shade(dst, |x, y| {
        over(read(bg, size, x, y), read(fg, size, x, y), opacity)
    });
}

/// Copy a tightly packed premultiplied RGBA8 buffer of `src_size` into `dst`, scaling
/// nearest-neighbour to fit.
pub fn blit_rgba(dst: &mut Texture, src: &[u8], src_size: Size) {
    let size = dst.size;
    shade(dst, |x, y| sample_rgba(src, src_size, size, x, y));
}

#[cfg(test)]
#[path = "../../tests/unit/gpu/kernels.rs"]
mod tests;
