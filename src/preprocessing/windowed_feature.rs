use ndarray::{s, Array2, ArrayView2};

/// Iterator over the model windows of a preprocessed feature.
///
/// Each item is `(start, window)`: `start` is the index of the first content
/// frame of the block (relative to the unpadded feature) and `window` holds
/// `margin_b + num_frame + margin_f` frames.
pub struct WindowedFeature<'a> {
    feature: &'a Array2<f32>,
    num_frame: usize,
    margin_b: usize,
    margin_f: usize,
    index: usize,
}

impl<'a> Iterator for WindowedFeature<'a> {
    type Item = (usize, ArrayView2<'a, f32>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_frame == 0 {
            return None;
        }
        let end_index = self.index + self.margin_b + self.num_frame + self.margin_f;
        if end_index > self.feature.nrows() {
            return None;
        }

        let window = self.feature.slice(s![self.index..end_index, ..]);
        let start = self.index;

        self.index += self.num_frame;
        Some((start, window))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.num_frame == 0 {
            return (0, Some(0));
        }
        let remaining = self
            .feature
            .nrows()
            .saturating_sub(self.index + self.margin_b + self.margin_f)
            / self.num_frame;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowedFeature<'_> {}

pub fn window_feature(
    feature: &Array2<f32>,
    num_frame: usize,
    margin_b: usize,
    margin_f: usize,
) -> WindowedFeature<'_> {
    WindowedFeature {
        feature,
        num_frame,
        margin_b,
        margin_f,
        index: 0,
    }
}
