#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned detection rectangle in frame coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Opposite corner, `(x + width, y + height)`.
    pub fn bottom_right(&self) -> Point {
        Point::new(
            self.x.saturating_add(self.width),
            self.y.saturating_add(self.height),
        )
    }
}

/// Color in OpenCV channel order (blue, green, red).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bgr {
    pub b: u8,
    pub g: u8,
    pub r: u8,
}

impl Bgr {
    pub const RED: Bgr = Bgr::new(0, 0, 255);
    pub const BLUE: Bgr = Bgr::new(255, 0, 0);
    pub const WHITE: Bgr = Bgr::new(255, 255, 255);

    pub const fn new(b: u8, g: u8, r: u8) -> Self {
        Self { b, g, r }
    }
}
