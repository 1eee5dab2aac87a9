//! Neural network inference.
//!
//! Networks are ONNX files executed on the CPU with `tract`. [`Cnn`] wraps a network that takes a
//! single image and takes care of turning an [`ImageView`] into its input tensor.

pub mod tensor;

use std::{
    ops::{Index, RangeInclusive},
    path::Path,
    sync::Arc,
};

use anyhow::Context;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TVec, TypedFact, TypedOp,
};

use crate::config;
use crate::image::{AsImageView, Color, ImageView, Resolution};
pub use tensor::{Tensor, TensorView};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A convolutional neural network (CNN) that operates on image data.
///
/// Like the underlying [`NeuralNetwork`], this is a cheaply [`Clone`]able handle.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
    image_map: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync>,
}

impl Cnn {
    /// Creates a CNN wrapper from a [`NeuralNetwork`].
    ///
    /// The network must have exactly one input with a shape matching `shape`.
    pub fn new(
        nn: NeuralNetwork,
        shape: CnnInputShape,
        color_mapper: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = Self::get_input_res(&nn, shape)?;
        let (h, w) = (input_res.height() as usize, input_res.width() as usize);

        fn sample(view: &ImageView<'_>, u: f32, v: f32) -> Color {
            let x = (u * view.width() as f32) as u32;
            let y = (v * view.height() as f32) as u32;
            view.get(x, y)
        }

        // One closure per layout, so the per-pixel loop is monomorphic.
        let image_map: Arc<dyn Fn(ImageView<'_>) -> Tensor + Send + Sync> = match shape {
            CnnInputShape::NCHW => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
            CnnInputShape::NHWC => Arc::new(move |view| {
                Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| {
                    color_mapper.map(sample(&view, x as f32 / w as f32, y as f32 / h as f32))[c]
                })
            }),
        };

        Ok(Self {
            nn,
            input_res,
            image_map,
        })
    }

    fn get_input_res(nn: &NeuralNetwork, shape: CnnInputShape) -> anyhow::Result<Resolution> {
        let dims = nn.input_shape()?;
        let (w, h) = match (shape, dims) {
            (CnnInputShape::NCHW, [1, 3, h, w]) | (CnnInputShape::NHWC, [1, h, w, 3]) => (*w, *h),
            _ => anyhow::bail!("{shape:?} network has input shape {dims:?}"),
        };
        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on an image.
    ///
    /// The image is stretched to the network's input resolution. Callers that care about the
    /// aspect ratio pass a view of the right shape.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let tensor = (self.image_map)(image.as_view());
        self.nn.estimate(&tensor)
    }
}

/// Maps sRGB pixel values to the range a network expects as input.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    target_range: RangeInclusive<f32>,
}

impl ColorMapper {
    /// Maps the 0-255 range of each sRGB channel linearly onto `target_range`.
    pub fn linear(target_range: RangeInclusive<f32>) -> Self {
        assert!(target_range.end() > target_range.start());
        Self { target_range }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        let start = *self.target_range.start();
        let end = *self.target_range.end();

        let adjust_range = (end - start) / 255.0;
        [color.r(), color.g(), color.b()].map(|col| col as f32 * adjust_range + start)
    }
}

/// In what order a CNN expects its input image data.
///
/// `N` is the number of images (always 1 here), `C` the color channels, `H` and `W` height and
/// width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum CnnInputShape {
    /// Shape is `[N, C, H, W]`.
    NCHW,
    /// Shape is `[N, H, W, C]`.
    NHWC,
}

/// Reads and optimizes the ONNX model `file_name` from the model directory (see
/// [`config::model_dir`]).
pub fn model_file(file_name: &str) -> anyhow::Result<NeuralNetwork> {
    let path = config::model_dir().join(file_name);
    NeuralNetwork::load(&path).with_context(|| {
        format!(
            "failed to load model {} (set {} to the directory containing the models)",
            path.display(),
            config::MODEL_DIR_VAR,
        )
    })
}

/// An optimized ONNX network, shared between clones.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Model>);

impl NeuralNetwork {
    /// Loads a `.onnx` file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if path.extension().map_or(true, |ext| ext != "onnx") {
            anyhow::bail!("{} is not an `.onnx` file", path.display());
        }
        let data = std::fs::read(path)?;
        let graph = tract_onnx::onnx()
            .model_for_read(&mut &data[..])?
            .into_optimized()?;
        let plan = SimplePlan::new(graph)?;
        Ok(Self(Arc::new(plan)))
    }

    /// Shape of the network's only input.
    fn input_shape(&self) -> anyhow::Result<&[usize]> {
        let model = self.0.model();
        match model.inputs.len() {
            1 => model
                .input_fact(0)?
                .shape
                .as_concrete()
                .context("network input has a symbolic shape"),
            n => anyhow::bail!("expected a network with 1 input, this one has {n}"),
        }
    }

    /// Runs one inference pass.
    pub fn estimate(&self, input: &Tensor) -> anyhow::Result<Outputs> {
        let input = TValue::from_const(Arc::new(input.to_tract()?));
        self.0
            .run(tvec![input])?
            .iter()
            .map(|tract| Tensor::from_tract(tract))
            .collect()
    }
}

/// The tensors produced by one inference pass, in output node order.
#[derive(Debug)]
pub struct Outputs {
    inner: TVec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<T: IntoIterator<Item = Tensor>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mapper() {
        let mapper = ColorMapper::linear(-1.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [-1.0, -1.0, -1.0]);
        assert_eq!(mapper.map(Color::WHITE), [1.0, 1.0, 1.0]);

        let mapper = ColorMapper::linear(0.0..=1.0);
        assert_eq!(mapper.map(Color::BLACK), [0.0, 0.0, 0.0]);
        assert_eq!(mapper.map(Color::RED), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn rejects_non_onnx_files() {
        let err = NeuralNetwork::load("models/palm.tflite").err().unwrap();
        assert!(err.to_string().contains(".onnx"), "{err}");
    }

    #[test]
    fn missing_model_mentions_variable() {
        let err = model_file("does_not_exist.onnx").err().unwrap();
        assert!(
            format!("{err:#}").contains(config::MODEL_DIR_VAR),
            "{err:#}"
        );
    }

    #[test]
    fn outputs_from_tensors() {
        let outputs: Outputs = [Tensor::from([1.0]), Tensor::from([2.0, 3.0])]
            .into_iter()
            .collect();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[1].as_slice(), &[2.0, 3.0]);
    }
}
