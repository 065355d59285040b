//! Anti-aliased edge detection over a 3x3 neighbourhood.
//!
//! A pixel is treated as anti-aliasing when its neighbourhood contains both a
//! darker and a brighter neighbour and one of those extremes sits inside a flat
//! region in both images.

use crate::bitmap::{Bitmap, Rgba, over_white};

/// Luma of a pixel composited over white.
#[inline]
fn luma(pixel: Rgba) -> f64 {
    let [red, green, blue] = over_white(pixel);
    red * 0.298_895_31 + green * 0.586_622_47 + blue * 0.114_482_23
}

#[inline]
fn neighbourhood(image: &Bitmap, x: u32, y: u32) -> (u32, u32, u32, u32) {
    (
        x.saturating_sub(1),
        y.saturating_sub(1),
        (x + 1).min(image.width() - 1),
        (y + 1).min(image.height() - 1),
    )
}

/// `true` when `(x, y)` in `image` looks like an anti-aliased edge that `other`
/// also has the surrounding structure for.
pub(crate) fn is_antialiased(image: &Bitmap, x: u32, y: u32, other: &Bitmap) -> bool {
    let (left, top, right, bottom) = neighbourhood(image, x, y);
    let center = luma(image.pixel(x, y));
    let mut zeroes = u8::from(x == left || x == right || y == top || y == bottom);
    let mut darkest = (0.0_f64, None);
    let mut brightest = (0.0_f64, None);

    for ny in top..=bottom {
        for nx in left..=right {
            if nx == x && ny == y {
                continue;
            }
            let delta = center - luma(image.pixel(nx, ny));
            if delta.abs() < f64::EPSILON {
                zeroes += 1;
                if zeroes > 2 {
                    return false;
                }
            } else if delta < darkest.0 {
                darkest = (delta, Some((nx, ny)));
            } else if delta > brightest.0 {
                brightest = (delta, Some((nx, ny)));
            }
        }
    }

    let (Some(dark_at), Some(bright_at)) = (darkest.1, brightest.1) else {
        return false;
    };
    (has_many_siblings(image, dark_at) && has_many_siblings(other, dark_at))
        || (has_many_siblings(image, bright_at) && has_many_siblings(other, bright_at))
}

/// `true` when at least three neighbours of `at` are identical to it.
fn has_many_siblings(image: &Bitmap, at: (u32, u32)) -> bool {
    let (x, y) = at;
    if x >= image.width() || y >= image.height() {
        return false;
    }
    let (left, top, right, bottom) = neighbourhood(image, x, y);
    let center = image.pixel(x, y);
    let mut zeroes = u8::from(x == left || x == right || y == top || y == bottom);
    for ny in top..=bottom {
        for nx in left..=right {
            if nx == x && ny == y {
                continue;
            }
            if image.pixel(nx, ny) == center {
                zeroes += 1;
                if zeroes > 2 {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: Rgba = [0, 0, 0, 255];
    const GREY: Rgba = [128, 128, 128, 255];

    /// Left half black, right half white, with a one-pixel grey seam.
    fn edge() -> Bitmap {
        let mut image = Bitmap::white(9, 9);
        image.fill_rect(0, 0, 4, 9, BLACK);
        image.fill_rect(4, 0, 1, 9, GREY);
        image
    }

    #[test]
    fn grey_seam_between_flat_regions_is_antialiasing() {
        let image = edge();
        assert!(is_antialiased(&image, 4, 4, &image));
    }

    #[test]
    fn pixel_inside_flat_region_is_not_antialiasing() {
        let image = edge();
        assert!(!is_antialiased(&image, 1, 4, &image));
        assert!(!is_antialiased(&image, 7, 4, &image));
    }

    #[test]
    fn isolated_dot_is_not_antialiasing() {
        let mut image = Bitmap::white(5, 5);
        image.put_pixel(2, 2, BLACK);
        assert!(!is_antialiased(&image, 2, 2, &image));
    }
}
