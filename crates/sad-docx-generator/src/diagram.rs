//! Placeholder box-and-arrow diagrams.
//!
//! These stand in for real architecture diagrams until exported artwork is
//! dropped into the diagrams directory. Output is deterministic for a given
//! diagram and font.

use std::fs;
use std::path::Path;

use ab_glyph::{point, Font, FontVec, GlyphId, PxScale, ScaleFont};
use image::{ImageFormat, Rgb, RgbImage};
use tiny_skia::{FillRule, LineCap, Paint, Path as SkPath, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use crate::error::{GenerateError, Result};

pub const CANVAS_WIDTH: u32 = 1600;
pub const CANVAS_HEIGHT: u32 = 900;

const TITLE_SIZE: f32 = 30.0;
const LABEL_SIZE: f32 = 24.0;
const ARROW_HEAD_LENGTH: f32 = 18.0;
const ARROW_HEAD_HALF_WIDTH: f32 = 10.0;
const OUTLINE_WIDTH: f32 = 3.0;
const SHAFT_WIDTH: f32 = 4.0;
/// Control-point distance for a quarter circle drawn as a cubic.
const KAPPA: f32 = 0.552_284_8;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const FRAME: Rgb<u8> = Rgb([40, 40, 40]);
const TITLE_INK: Rgb<u8> = Rgb([20, 20, 20]);
const BOX_OUTLINE: Rgb<u8> = Rgb([30, 30, 30]);
const BOX_FILL: Rgb<u8> = Rgb([245, 245, 245]);
const LABEL_INK: Rgb<u8> = Rgb([15, 15, 15]);
const ARROW_INK: Rgb<u8> = Rgb([60, 60, 60]);

/// TrueType fonts tried in order before falling back to the built-in bitmap font.
pub const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSansCondensed.ttf",
];

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Rect {
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Rounded outline whose stroke of `width` lies entirely inside the
    /// rectangle's pixels.
    fn outline_path(self, radius: f32, width: f32) -> Option<SkPath> {
        let half = width / 2.0;
        rounded_rect_path(
            self.x1 as f32 + half,
            self.y1 as f32 + half,
            (self.x2 - self.x1 + 1) as f32 - width,
            (self.y2 - self.y1 + 1) as f32 - width,
            radius - half,
        )
    }

    fn fill_path(self, radius: f32) -> Option<SkPath> {
        rounded_rect_path(
            self.x1 as f32,
            self.y1 as f32,
            (self.x2 - self.x1 + 1) as f32,
            (self.y2 - self.y1 + 1) as f32,
            radius,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledBox {
    pub label: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrow {
    pub from: (i32, i32),
    pub to: (i32, i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagram {
    pub title: String,
    pub boxes: Vec<LabeledBox>,
    pub arrows: Vec<Arrow>,
}

fn boxed(label: &str, x1: i32, y1: i32, x2: i32, y2: i32) -> LabeledBox {
    LabeledBox {
        label: label.to_string(),
        rect: Rect::new(x1, y1, x2, y2),
    }
}

fn arrow(from: (i32, i32), to: (i32, i32)) -> Arrow {
    Arrow { from, to }
}

impl Diagram {
    /// The placeholder layout for a figure id. The first three architecture
    /// figures get a rough sketch; every other figure gets a single box.
    pub fn placeholder(figure_id: &str) -> Self {
        match figure_id {
            "2-1" => Self {
                title: "Context (MarcoPolo)".to_string(),
                boxes: vec![
                    boxed("User", 90, 260, 340, 370),
                    boxed("Web/Mobile", 420, 260, 720, 370),
                    boxed("API", 800, 260, 1060, 370),
                    boxed("Providers", 1180, 160, 1490, 270),
                    boxed("Payment", 1180, 310, 1490, 420),
                    boxed("Notify", 1180, 460, 1490, 570),
                    boxed("Support", 1180, 610, 1490, 720),
                ],
                arrows: vec![
                    arrow((340, 315), (420, 315)),
                    arrow((720, 315), (800, 315)),
                    arrow((1060, 315), (1180, 215)),
                    arrow((1060, 315), (1180, 365)),
                    arrow((1060, 315), (1180, 515)),
                    arrow((1060, 315), (1180, 665)),
                ],
            },
            "2-2" => Self {
                title: "Containers".to_string(),
                boxes: vec![
                    boxed("Web UI", 120, 180, 420, 280),
                    boxed("Mobile UI", 120, 320, 420, 420),
                    boxed("API (Backend)", 520, 240, 930, 410),
                    boxed("DB", 1030, 180, 1460, 280),
                    boxed("Cache", 1030, 320, 1460, 420),
                    boxed("Queue", 1030, 460, 1460, 560),
                    boxed("External Services", 520, 460, 930, 620),
                ],
                arrows: vec![
                    arrow((420, 230), (520, 300)),
                    arrow((420, 370), (520, 330)),
                    arrow((930, 290), (1030, 230)),
                    arrow((930, 330), (1030, 370)),
                    arrow((930, 370), (1030, 510)),
                    arrow((930, 470), (930, 410)),
                ],
            },
            "2-3" => Self {
                title: "Backend Components".to_string(),
                boxes: vec![
                    boxed("API Layer", 120, 200, 520, 310),
                    boxed("Domain Services", 120, 360, 520, 470),
                    boxed("Integrations", 640, 200, 1120, 310),
                    boxed("Data Access", 640, 360, 1120, 470),
                    boxed("Background Jobs", 640, 520, 1120, 630),
                ],
                arrows: vec![
                    arrow((520, 255), (640, 255)),
                    arrow((520, 415), (640, 415)),
                    arrow((520, 415), (640, 575)),
                    arrow((320, 310), (320, 360)),
                ],
            },
            other => Self {
                title: format!("Figure {other}"),
                boxes: vec![boxed("Diagram (replace later)", 350, 350, 1250, 520)],
                arrows: Vec::new(),
            },
        }
    }

    /// Frame, boxes and arrows on a white canvas.
    fn paint_shapes(&self) -> Option<Pixmap> {
        let mut pixmap = Pixmap::new(CANVAS_WIDTH, CANVAS_HEIGHT)?;
        pixmap.fill(tiny_skia::Color::WHITE);
        let outline = Stroke {
            width: OUTLINE_WIDTH,
            ..Stroke::default()
        };

        let frame = Rect::new(30, 30, 1570, 870).outline_path(18.0, OUTLINE_WIDTH)?;
        pixmap.stroke_path(&frame, &paint(FRAME), &outline, Transform::identity(), None);

        for b in &self.boxes {
            let fill = b.rect.fill_path(16.0)?;
            pixmap.fill_path(&fill, &paint(BOX_FILL), FillRule::Winding, Transform::identity(), None);
            let edge = b.rect.outline_path(16.0, OUTLINE_WIDTH)?;
            pixmap.stroke_path(&edge, &paint(BOX_OUTLINE), &outline, Transform::identity(), None);
        }

        let shaft = Stroke {
            width: SHAFT_WIDTH,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        for a in &self.arrows {
            let mut pb = PathBuilder::new();
            pb.move_to(a.from.0 as f32, a.from.1 as f32);
            pb.line_to(a.to.0 as f32, a.to.1 as f32);
            let line = pb.finish()?;
            pixmap.stroke_path(&line, &paint(ARROW_INK), &shaft, Transform::identity(), None);

            let [tip, left, right] = arrow_head(a.from, a.to);
            let mut pb = PathBuilder::new();
            pb.move_to(tip.0, tip.1);
            pb.line_to(left.0, left.1);
            pb.line_to(right.0, right.1);
            pb.close();
            let head = pb.finish()?;
            pixmap.fill_path(&head, &paint(ARROW_INK), FillRule::Winding, Transform::identity(), None);
        }
        Some(pixmap)
    }

    pub fn render(&self, font: &LabelFont) -> Result<RgbImage> {
        let pixmap = self
            .paint_shapes()
            .ok_or_else(|| GenerateError::Diagram(format!("could not paint {:?}", self.title)))?;
        let mut img = to_rgb(&pixmap)
            .ok_or_else(|| GenerateError::Diagram("canvas size mismatch".to_string()))?;

        font.draw(&mut img, &self.title, 60.0, 50.0, TITLE_SIZE, TITLE_INK);
        for b in &self.boxes {
            let r = b.rect;
            let (tw, th) = font.text_size(&b.label, LABEL_SIZE);
            let x = (r.x1 + r.x2 - tw as i32) as f32 / 2.0;
            let y = (r.y1 + r.y2 - th as i32) as f32 / 2.0;
            font.draw(&mut img, &b.label, x, y, LABEL_SIZE, LABEL_INK);
        }
        Ok(img)
    }

    pub fn save(&self, path: &Path, font: &LabelFont) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        self.render(font)?.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Font used for titles and labels.
pub enum LabelFont {
    Outline(FontVec),
    /// Built-in 5x7 capitals, used when no TrueType font can be loaded.
    Bitmap,
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LabelFont::Outline(_) => f.write_str("LabelFont::Outline"),
            LabelFont::Bitmap => f.write_str("LabelFont::Bitmap"),
        }
    }
}

impl LabelFont {
    pub fn load() -> Self {
        Self::load_from(FONT_CANDIDATES)
    }

    /// First candidate that reads and parses as a font, else the bitmap font.
    pub fn load_from<P: AsRef<Path>>(candidates: &[P]) -> Self {
        for path in candidates {
            let path = path.as_ref();
            let Ok(bytes) = fs::read(path) else {
                continue;
            };
            match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    debug!("Using diagram font {}", path.display());
                    return LabelFont::Outline(font);
                }
                Err(e) => debug!("Skipping font {}: {}", path.display(), e),
            }
        }
        debug!("No TrueType font available, using built-in bitmap font");
        LabelFont::Bitmap
    }

    /// Width and height of rendered text in pixels.
    pub fn text_size(&self, text: &str, size: f32) -> (u32, u32) {
        match self {
            LabelFont::Outline(font) => {
                let scaled = font.as_scaled(PxScale::from(size));
                let mut width = 0.0f32;
                let mut prev: Option<GlyphId> = None;
                for ch in text.chars() {
                    let id = scaled.glyph_id(ch);
                    if let Some(p) = prev {
                        width += scaled.kern(p, id);
                    }
                    width += scaled.h_advance(id);
                    prev = Some(id);
                }
                (width.ceil() as u32, scaled.height().ceil() as u32)
            }
            LabelFont::Bitmap => {
                let cell = bitmap_cell(size);
                let n = text.chars().count() as u32;
                let width = (n * BITMAP_ADVANCE * cell).saturating_sub(cell);
                (width, BITMAP_ROWS * cell)
            }
        }
    }

    /// Draw text with its top-left corner at (x, y).
    pub fn draw(&self, img: &mut RgbImage, text: &str, x: f32, y: f32, size: f32, ink: Rgb<u8>) {
        match self {
            LabelFont::Outline(font) => {
                let scale = PxScale::from(size);
                let scaled = font.as_scaled(scale);
                let baseline = y + scaled.ascent();
                let mut caret = x;
                let mut prev: Option<GlyphId> = None;
                for ch in text.chars() {
                    let id = scaled.glyph_id(ch);
                    if let Some(p) = prev {
                        caret += scaled.kern(p, id);
                    }
                    let glyph = id.with_scale_and_position(scale, point(caret, baseline));
                    caret += scaled.h_advance(id);
                    prev = Some(id);
                    if let Some(outlined) = font.outline_glyph(glyph) {
                        let bounds = outlined.px_bounds();
                        outlined.draw(|gx, gy, coverage| {
                            let px = bounds.min.x as i32 + gx as i32;
                            let py = bounds.min.y as i32 + gy as i32;
                            blend(img, px, py, ink, coverage);
                        });
                    }
                }
            }
            LabelFont::Bitmap => {
                let cell = bitmap_cell(size) as i32;
                let (x0, y0) = (x.round() as i32, y.round() as i32);
                for (i, ch) in text.chars().enumerate() {
                    let rows = bitmap_glyph(ch);
                    let gx = x0 + i as i32 * BITMAP_ADVANCE as i32 * cell;
                    for (row, bits) in rows.iter().enumerate() {
                        for col in 0..5 {
                            if bits & (0b10000 >> col) == 0 {
                                continue;
                            }
                            let px = gx + col * cell;
                            let py = y0 + row as i32 * cell;
                            for dy in 0..cell {
                                for dx in 0..cell {
                                    blend(img, px + dx, py + dy, ink, 1.0);
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn blend(img: &mut RgbImage, x: i32, y: i32, ink: Rgb<u8>, coverage: f32) {
    if x < 0 || y < 0 || x as u32 >= img.width() || y as u32 >= img.height() {
        return;
    }
    let a = coverage.clamp(0.0, 1.0);
    let px = img.get_pixel_mut(x as u32, y as u32);
    for c in 0..3 {
        let bg = f32::from(px.0[c]);
        let fg = f32::from(ink.0[c]);
        px.0[c] = (bg + (fg - bg) * a).round() as u8;
    }
}

fn paint(color: Rgb<u8>) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.0[0], color.0[1], color.0[2], 255);
    paint.anti_alias = true;
    paint
}

fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, radius: f32) -> Option<SkPath> {
    let r = radius.max(0.0).min(w / 2.0).min(h / 2.0);
    let k = r * KAPPA;
    let (x2, y2) = (x + w, y + h);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x2 - r, y);
    pb.cubic_to(x2 - r + k, y, x2, y + r - k, x2, y + r);
    pb.line_to(x2, y2 - r);
    pb.cubic_to(x2, y2 - r + k, x2 - r + k, y2, x2 - r, y2);
    pb.line_to(x + r, y2);
    pb.cubic_to(x + r - k, y2, x, y2 - r + k, x, y2 - r);
    pb.line_to(x, y + r);
    pb.cubic_to(x, y + r - k, x + r - k, y, x + r, y);
    pb.close();
    pb.finish()
}

/// Drop alpha from a pixmap painted over an opaque background.
fn to_rgb(pixmap: &Pixmap) -> Option<RgbImage> {
    let rgb: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue()]
        })
        .collect();
    RgbImage::from_raw(pixmap.width(), pixmap.height(), rgb)
}

/// Triangle vertices of an arrowhead pointing at `to`: the tip, then the two
/// base corners offset along the unit normal.
pub fn arrow_head(from: (i32, i32), to: (i32, i32)) -> [(f32, f32); 3] {
    let (x1, y1) = (from.0 as f32, from.1 as f32);
    let (x2, y2) = (to.0 as f32, to.1 as f32);
    let (dx, dy) = (x2 - x1, y2 - y1);
    let mag = (dx * dx + dy * dy).sqrt().max(1.0);
    let (ux, uy) = (dx / mag, dy / mag);
    let (nx, ny) = (-uy, ux);
    let (hx, hy) = (x2 - ux * ARROW_HEAD_LENGTH, y2 - uy * ARROW_HEAD_LENGTH);
    [
        (x2, y2),
        (hx + nx * ARROW_HEAD_HALF_WIDTH, hy + ny * ARROW_HEAD_HALF_WIDTH),
        (hx - nx * ARROW_HEAD_HALF_WIDTH, hy - ny * ARROW_HEAD_HALF_WIDTH),
    ]
}

const BITMAP_ROWS: u32 = 7;
const BITMAP_ADVANCE: u32 = 6;

fn bitmap_cell(size: f32) -> u32 {
    ((size / 8.0).round() as u32).max(1)
}

/// 5x7 glyph rows, most significant of the low five bits on the left.
/// Lowercase letters use the capital forms.
fn bitmap_glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        ' ' => [0; 7],
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11100, 0b10010, 0b10001, 0b10001, 0b10001, 0b10010, 0b11100],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '_' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b11111],
        '<' => [0b00010, 0b00100, 0b01000, 0b10000, 0b01000, 0b00100, 0b00010],
        '>' => [0b01000, 0b00100, 0b00010, 0b00001, 0b00010, 0b00100, 0b01000],
        '=' => [0b00000, 0b00000, 0b11111, 0b00000, 0b11111, 0b00000, 0b00000],
        '\'' => [0b01100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        _ => [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11111],
    }
}
