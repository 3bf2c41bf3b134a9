/// A pointer position on the unit square. `x` runs left to right and `y`
/// top to bottom, the way the pointer moves over the surface.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Clamp both coordinates into [0, 1]. NaN reads as 0.
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: unit(x),
            y: unit(y),
        }
    }
}

fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// The on-screen area a pointer is interpreted against, in device units
/// (pixels or terminal cells).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.left
            && py >= self.top
            && px < self.left + self.width
            && py < self.top + self.height
    }
}

/// Map a device position to the unit square. Positions outside the
/// surface clamp to its edges; a degenerate surface maps everything to 0.
pub fn normalize(surface: &Surface, px: f32, py: f32) -> Point {
    let axis = |p: f32, origin: f32, extent: f32| {
        if extent > 0.0 {
            (p - origin) / extent
        } else {
            0.0
        }
    };
    Point::new(
        axis(px, surface.left, surface.width),
        axis(py, surface.top, surface.height),
    )
}
