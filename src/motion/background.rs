use image::GrayImage;

/// Running-average background model.
///
/// The model starts out as the first frame and is blended with every new frame using the
/// learning rate `alpha`. The foreground of a frame is its absolute difference from the rounded
/// model.
#[derive(Debug)]
pub struct BackgroundSubtractor {
    alpha: f32,
    model: Vec<f32>,
    dimensions: (u32, u32),
}

impl BackgroundSubtractor {
    pub fn new(alpha: f32, first: &GrayImage) -> Self {
        Self {
            alpha,
            model: first.as_raw().iter().map(|&p| p as f32).collect(),
            dimensions: first.dimensions(),
        }
    }

    /// Updates the model with `frame` and returns its foreground.
    pub fn foreground(&mut self, frame: &GrayImage) -> GrayImage {
        debug_assert_eq!(frame.dimensions(), self.dimensions);

        let alpha = self.alpha;
        let data = frame
            .as_raw()
            .iter()
            .zip(self.model.iter_mut())
            .map(|(&p, m)| {
                let p = p as f32;
                *m = p * alpha + *m * (1.0 - alpha);
                (m.round() - p).abs() as u8
            })
            .collect();

        let (width, height) = self.dimensions;
        GrayImage::from_raw(width, height, data).unwrap_or_else(|| GrayImage::new(width, height))
    }
}
