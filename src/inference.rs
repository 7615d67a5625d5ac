use std::path::Path;

use ndarray::{concatenate, s, Array2, ArrayView1, ArrayView2, ArrayViewD, Axis, Ix2, Ix3};
use ort::{GraphOptimizationLevel, Session, Tensor};
use tracing::debug;

use crate::error::{Error, Result};

const SPEC_INPUT: &str = "spec";
const STYLE_INPUT: &str = "sv";
const ONSET_OUTPUT: &str = "onset";
const OFFSET_OUTPUT: &str = "offset";
const FRAME_OUTPUT: &str = "frame";
const VELOCITY_OUTPUT: &str = "velocity";

/// Per-frame model output, every stream shaped (frames, num_note).
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub onset: Array2<f32>,
    pub offset: Array2<f32>,
    pub frame: Array2<f32>,
    pub velocity: Array2<i64>,
}

impl FrameOutput {
    pub fn empty(num_note: usize) -> Self {
        Self {
            onset: Array2::zeros((0, num_note)),
            offset: Array2::zeros((0, num_note)),
            frame: Array2::zeros((0, num_note)),
            velocity: Array2::zeros((0, num_note)),
        }
    }

    pub fn num_frames(&self) -> usize {
        self.frame.nrows()
    }

    fn check_shape(&self, frames: usize, num_note: usize) -> Result<()> {
        let expected = (frames, num_note);
        for (name, dim) in [
            (ONSET_OUTPUT, self.onset.dim()),
            (OFFSET_OUTPUT, self.offset.dim()),
            (FRAME_OUTPUT, self.frame.dim()),
            (VELOCITY_OUTPUT, self.velocity.dim()),
        ] {
            if dim != expected {
                return Err(Error::InvalidArgument(format!(
                    "model output '{}' has shape {:?}, expected {:?}",
                    name, dim, expected
                )));
            }
        }
        Ok(())
    }

    /// Join block outputs in order and drop the frames that only cover tail
    /// padding.
    pub fn concat(blocks: &[FrameOutput], len: usize, num_note: usize) -> Result<Self> {
        if blocks.is_empty() {
            return Ok(Self::empty(num_note));
        }

        fn join<A: Clone>(parts: Vec<ArrayView2<A>>, len: usize) -> Result<Array2<A>> {
            let joined = concatenate(Axis(0), &parts)?;
            Ok(joined.slice(s![..len, ..]).to_owned())
        }

        Ok(Self {
            onset: join(blocks.iter().map(|b| b.onset.view()).collect(), len)?,
            offset: join(blocks.iter().map(|b| b.offset.view()).collect(), len)?,
            frame: join(blocks.iter().map(|b| b.frame.view()).collect(), len)?,
            velocity: join(blocks.iter().map(|b| b.velocity.view()).collect(), len)?,
        })
    }
}

/// Maps one model input block and a style vector to the frame output of the
/// block's content region.
pub trait Transcriber {
    fn transcribe_block(&self, block: ArrayView2<f32>, style: ArrayView1<f32>) -> Result<FrameOutput>;
}

/// Run `transcriber` over every block of a preprocessed feature and check
/// each block yields `num_frame` rows of `num_note` pitches.
pub fn run_blocks<'a, T, I>(
    transcriber: &T,
    blocks: I,
    style: ArrayView1<f32>,
    num_frame: usize,
    num_note: usize,
) -> Result<Vec<FrameOutput>>
where
    T: Transcriber + ?Sized,
    I: Iterator<Item = (usize, ArrayView2<'a, f32>)>,
{
    blocks
        .map(|(start, block)| {
            let output = transcriber.transcribe_block(block, style)?;
            output.check_shape(num_frame, num_note)?;
            debug!(start, "transcribed block");
            Ok(output)
        })
        .collect()
}

/// Transcription model exported to ONNX.
///
/// Inputs: `spec` (1, block frames, n_bins) and `sv` (1, style dim).
/// Outputs: `onset`, `offset`, `frame` (1, num_frame, num_note) and
/// `velocity`, either class logits (1, num_frame, num_note, num_velocity) or
/// velocity values (1, num_frame, num_note).
pub struct OnnxTranscriber {
    session: Session,
}

impl OnnxTranscriber {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::not_found("model", path.display().to_string()));
        }
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(path)?;
        debug!(path = %path.display(), "loaded transcription model");
        Ok(Self { session })
    }
}

impl Transcriber for OnnxTranscriber {
    fn transcribe_block(&self, block: ArrayView2<f32>, style: ArrayView1<f32>) -> Result<FrameOutput> {
        let spec_shape = vec![1_i64, block.nrows() as i64, block.ncols() as i64];
        let spec_tensor = Tensor::from_array((spec_shape, block.iter().copied().collect::<Vec<f32>>()))?;
        let style_tensor = Tensor::from_array((vec![1_i64, style.len() as i64], style.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            SPEC_INPUT => spec_tensor,
            STYLE_INPUT => style_tensor
        ]?)?;

        Ok(FrameOutput {
            onset: unbatch(outputs[ONSET_OUTPUT].try_extract_tensor::<f32>()?)?,
            offset: unbatch(outputs[OFFSET_OUTPUT].try_extract_tensor::<f32>()?)?,
            frame: unbatch(outputs[FRAME_OUTPUT].try_extract_tensor::<f32>()?)?,
            velocity: velocity_classes(outputs[VELOCITY_OUTPUT].try_extract_tensor::<f32>()?)?,
        })
    }
}

fn unbatch(output: ArrayViewD<f32>) -> Result<Array2<f32>> {
    Ok(output
        .index_axis(Axis(0), 0)
        .into_dimensionality::<Ix2>()?
        .to_owned())
}

fn velocity_classes(output: ArrayViewD<f32>) -> Result<Array2<i64>> {
    let output = output.index_axis(Axis(0), 0);
    match output.ndim() {
        2 => Ok(output.into_dimensionality::<Ix2>()?.mapv(|v| v.round() as i64)),
        3 => {
            let logits = output.into_dimensionality::<Ix3>()?;
            Ok(logits.map_axis(Axis(2), |row| {
                row.iter()
                    .enumerate()
                    .fold((0, f32::NEG_INFINITY), |(best, best_v), (i, &v)| {
                        if v > best_v {
                            (i, v)
                        } else {
                            (best, best_v)
                        }
                    })
                    .0 as i64
            }))
        }
        n => Err(Error::InvalidArgument(format!(
            "velocity output has {} dimensions after the batch axis",
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array, IxDyn};

    #[test]
    fn test_velocity_logits_are_arg_maxed() {
        // batch 1, 2 frames, 1 pitch, 3 classes
        let logits = Array::from_shape_vec(IxDyn(&[1, 2, 1, 3]), vec![0.1, 0.9, 0.0, 2.0, 1.0, 0.5]).unwrap();
        let classes = velocity_classes(logits.view()).unwrap();
        assert_eq!(classes, Array2::from_shape_vec((2, 1), vec![1, 0]).unwrap());
    }

    #[test]
    fn test_velocity_values_are_rounded() {
        let values = Array::from_shape_vec(IxDyn(&[1, 1, 2]), vec![63.6, 10.2]).unwrap();
        let classes = velocity_classes(values.view()).unwrap();
        assert_eq!(classes.row(0).to_vec(), vec![64, 10]);
    }

    #[test]
    fn test_concat_trims_padding() {
        let block = |v: f32| FrameOutput {
            onset: Array2::from_elem((3, 2), v),
            offset: Array2::from_elem((3, 2), v),
            frame: Array2::from_elem((3, 2), v),
            velocity: Array2::from_elem((3, 2), v as i64),
        };
        let joined = FrameOutput::concat(&[block(1.0), block(2.0)], 4, 2).unwrap();
        assert_eq!(joined.num_frames(), 4);
        assert_eq!(joined.frame.column(0).to_vec(), vec![1.0, 1.0, 1.0, 2.0]);
        assert_eq!(joined.velocity[[3, 1]], 2);
    }

    #[test]
    fn test_concat_of_nothing_is_empty() {
        let joined = FrameOutput::concat(&[], 0, 88).unwrap();
        assert_eq!(joined.onset.dim(), (0, 88));
    }
}
