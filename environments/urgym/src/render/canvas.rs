//! Scene rasterization using plotters' bitmap backend.

use plotters::prelude::*;

use crate::env::{Frame, Rgb, Scene, Shape};
use crate::error::{EnvError, EnvResult};

/// Fixed-size canvas mapping world coordinates of a scene onto pixels.
#[derive(Debug, Clone, Copy)]
pub struct SceneCanvas {
    width: u32,
    height: u32,
}

impl Default for SceneCanvas {
    fn default() -> Self {
        Self::new(320, 320)
    }
}

impl SceneCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Render a scene into an RGB frame.
    pub fn draw(&self, scene: &Scene) -> EnvResult<Frame> {
        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];

        {
            let root = BitMapBackend::with_buffer(&mut buffer, (self.width, self.height))
                .into_drawing_area();

            root.fill(&color(scene.background))
                .map_err(|e| EnvError::Render(e.to_string()))?;

            for shape in &scene.shapes {
                match *shape {
                    Shape::Circle { center, radius, color: c } => {
                        let r = (radius * self.scale(scene)).max(1.0) as i32;
                        root.draw(&Circle::new(self.to_px(scene, center), r, color(c).filled()))
                    }
                    Shape::Rect { min, max, color: c } => {
                        let (x0, y1) = self.to_px(scene, min);
                        let (x1, y0) = self.to_px(scene, max);
                        root.draw(&Rectangle::new([(x0, y0), (x1, y1)], color(c).filled()))
                    }
                    Shape::Segment { from, to, width, color: c } => root.draw(&PathElement::new(
                        vec![self.to_px(scene, from), self.to_px(scene, to)],
                        color(c).stroke_width(width),
                    )),
                }
                .map_err(|e| EnvError::Render(format!("{:?}", e)))?;
            }

            root.present()
                .map_err(|e| EnvError::Render(e.to_string()))?;
        }

        Ok(Frame {
            width: self.width,
            height: self.height,
            rgb: buffer,
        })
    }

    fn scale(&self, scene: &Scene) -> f32 {
        let sx = self.width as f32 / (scene.x_range.1 - scene.x_range.0);
        let sy = self.height as f32 / (scene.y_range.1 - scene.y_range.0);
        sx.min(sy)
    }

    /// World to pixel coordinates; pixel y grows downwards.
    fn to_px(&self, scene: &Scene, (x, y): (f32, f32)) -> (i32, i32) {
        let u = (x - scene.x_range.0) / (scene.x_range.1 - scene.x_range.0);
        let v = (y - scene.y_range.0) / (scene.y_range.1 - scene.y_range.0);
        (
            (u * self.width as f32) as i32,
            ((1.0 - v) * self.height as f32) as i32,
        )
    }
}

/// Render a scene with the default canvas size.
pub fn rasterize(scene: &Scene) -> EnvResult<Frame> {
    SceneCanvas::default().draw(scene)
}

fn color(c: Rgb) -> RGBColor {
    RGBColor(c.0, c.1, c.2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_fills_background_and_shapes() {
        let mut scene = Scene::new((0.0, 1.0), (0.0, 1.0));
        scene.background = Rgb(10, 20, 30);
        scene.push(Shape::Rect {
            min: (0.4, 0.4),
            max: (0.6, 0.6),
            color: Rgb(255, 0, 0),
        });

        let frame = SceneCanvas::new(100, 100).draw(&scene).unwrap();
        assert_eq!(frame.rgb.len(), 100 * 100 * 3);

        let pixel = |x: usize, y: usize| {
            let i = (y * 100 + x) * 3;
            (frame.rgb[i], frame.rgb[i + 1], frame.rgb[i + 2])
        };
        assert_eq!(pixel(2, 2), (10, 20, 30));
        assert_eq!(pixel(50, 50), (255, 0, 0));
    }

    #[test]
    fn test_to_px_flips_y() {
        let scene = Scene::new((-1.0, 1.0), (-1.0, 1.0));
        let canvas = SceneCanvas::new(200, 100);
        assert_eq!(canvas.to_px(&scene, (-1.0, 1.0)), (0, 0));
        assert_eq!(canvas.to_px(&scene, (1.0, -1.0)), (200, 100));
    }
}
