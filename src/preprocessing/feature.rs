use ndarray::{concatenate, Array2, ArrayView2, Axis};

use crate::config::{Config, InputConfig};
use crate::error::{Error, Result};
use crate::preprocessing::windowed_feature::{window_feature, WindowedFeature};

/// Reshapes spectrograms of any length into the block geometry the model
/// consumes.
#[derive(Debug, Clone)]
pub struct FeaturePreprocessor {
    num_frame: usize,
    margin_b: usize,
    margin_f: usize,
    min_value: f32,
    n_bins: usize,
}

impl FeaturePreprocessor {
    pub fn new(input: &InputConfig, n_bins: usize) -> Result<Self> {
        if input.num_frame == 0 {
            return Err(Error::InvalidArgument("num_frame must be positive".into()));
        }
        Ok(Self {
            num_frame: input.num_frame,
            margin_b: input.margin_b,
            margin_f: input.margin_f,
            min_value: input.min_value,
            n_bins,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.input, config.feature.n_bins)
    }

    /// Pad `feature` (frames x n_bins) with `min_value` frames: `margin_b` in
    /// front, and behind it enough to fill the last block plus `margin_f`.
    ///
    /// The output has `margin_b + L + pad_tail + margin_f` frames where
    /// `L + pad_tail` is the smallest multiple of `num_frame` not below `L`.
    /// An empty feature yields only the two margins.
    pub fn preprocess(&self, feature: ArrayView2<f32>) -> Result<Array2<f32>> {
        if feature.ncols() != self.n_bins {
            return Err(Error::InvalidArgument(format!(
                "feature has {} bins, expected {}",
                feature.ncols(),
                self.n_bins
            )));
        }

        let len = feature.nrows();
        let pad_tail = self.content_len(len) - len;

        let head = Array2::from_elem((self.margin_b, self.n_bins), self.min_value);
        let tail = Array2::from_elem((pad_tail + self.margin_f, self.n_bins), self.min_value);

        Ok(concatenate(Axis(0), &[head.view(), feature.view(), tail.view()])?)
    }

    /// Length of the content region for `len` frames: `len` rounded up to a
    /// whole number of blocks.
    pub fn content_len(&self, len: usize) -> usize {
        len.div_ceil(self.num_frame) * self.num_frame
    }

    /// Iterate the model-sized windows of an already preprocessed feature.
    pub fn blocks<'a>(&self, padded: &'a Array2<f32>) -> WindowedFeature<'a> {
        window_feature(padded, self.num_frame, self.margin_b, self.margin_f)
    }

    pub fn num_frame(&self) -> usize {
        self.num_frame
    }

    pub fn margin_b(&self) -> usize {
        self.margin_b
    }

    pub fn margin_f(&self) -> usize {
        self.margin_f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array};

    fn preprocessor(num_frame: usize, margin_b: usize, margin_f: usize) -> FeaturePreprocessor {
        let input = InputConfig {
            num_frame,
            margin_b,
            margin_f,
            min_value: -18.0,
        };
        FeaturePreprocessor::new(&input, 4).unwrap()
    }

    fn ramp(len: usize) -> Array2<f32> {
        Array::range(0.0, (len * 4) as f32, 1.0)
            .into_shape((len, 4))
            .unwrap()
    }

    #[test]
    fn test_partial_block_is_padded() {
        let pre = preprocessor(100, 2, 4);
        let feature = ramp(150);
        let out = pre.preprocess(feature.view()).unwrap();

        assert_eq!(out.dim(), (206, 4));
        assert_eq!((out.nrows() - 2 - 4) % 100, 0);
        assert_eq!(out.slice(s![2..152, ..]), feature);
        assert!(out.slice(s![..2, ..]).iter().all(|&v| v == -18.0));
        assert!(out.slice(s![152.., ..]).iter().all(|&v| v == -18.0));
    }

    #[test]
    fn test_exact_multiple_gets_no_tail_padding() {
        let pre = preprocessor(100, 2, 4);
        let out = pre.preprocess(ramp(200).view()).unwrap();
        assert_eq!(out.nrows(), 2 + 200 + 4);
    }

    #[test]
    fn test_empty_feature_yields_margins_only() {
        let pre = preprocessor(100, 2, 4);
        let empty = Array2::<f32>::zeros((0, 4));
        let out = pre.preprocess(empty.view()).unwrap();
        assert_eq!(out.dim(), (6, 4));
        assert!(out.iter().all(|&v| v == -18.0));
    }

    #[test]
    fn test_content_region_is_block_aligned() {
        for (num_frame, margin_b, margin_f) in [(1, 0, 0), (7, 3, 1), (16, 0, 5)] {
            let pre = preprocessor(num_frame, margin_b, margin_f);
            for len in [0, 1, num_frame - 1, num_frame, num_frame + 1, 3 * num_frame + 2] {
                let feature = ramp(len);
                let out = pre.preprocess(feature.view()).unwrap();
                let content = out.nrows() - margin_b - margin_f;
                assert_eq!(content % num_frame, 0);
                assert!(content >= len);
                assert_eq!(out.slice(s![margin_b..margin_b + len, ..]), feature);
            }
        }
    }

    #[test]
    fn test_zero_block_size_rejected() {
        let input = InputConfig {
            num_frame: 0,
            margin_b: 2,
            margin_f: 4,
            min_value: -18.0,
        };
        assert!(matches!(FeaturePreprocessor::new(&input, 4), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_bin_mismatch_rejected() {
        let pre = preprocessor(10, 1, 1);
        let feature = Array2::<f32>::zeros((5, 3));
        assert!(matches!(pre.preprocess(feature.view()), Err(Error::InvalidArgument(_))));
    }
}
