//! Dense `f32` tensors passed to and returned from networks.

use std::fmt;

use tinyvec::TinyVec;

type Shape = TinyVec<[usize; 4]>;

/// Number of elements in a row-major array of shape `shape`.
fn elements(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// A dynamically shaped, row-major tensor of `f32`s.
///
/// Data is read through [`Tensor::index`], which fixes a prefix of the dimensions and returns a
/// [`TensorView`] of the rest, and through [`Tensor::as_slice`] / [`Tensor::as_singular`] on 1-
/// and 0-dimensional tensors.
#[derive(Clone)]
pub struct Tensor {
    shape: Shape,
    data: Box<[f32]>,
}

/// A borrowed view of the trailing dimensions of a [`Tensor`].
#[derive(Clone)]
pub struct TensorView<'a> {
    shape: &'a [usize],
    data: &'a [f32],
}

impl Tensor {
    /// Creates a tensor of the given shape by calling `f` with each index, in row-major order.
    pub fn from_array_shape_fn<const N: usize, F: FnMut([usize; N]) -> f32>(
        shape: [usize; N],
        mut f: F,
    ) -> Self {
        let len = elements(&shape);
        let mut data = Vec::with_capacity(len);
        let mut index = [0; N];
        for _ in 0..len {
            data.push(f(index));
            for (i, size) in index.iter_mut().zip(shape).rev() {
                *i += 1;
                if *i < size {
                    break;
                }
                *i = 0;
            }
        }

        Self {
            shape: shape.iter().copied().collect(),
            data: data.into_boxed_slice(),
        }
    }

    /// Creates a tensor of the given shape by pulling elements from an iterator.
    ///
    /// # Panics
    ///
    /// Panics if `iter` does not yield exactly as many elements as `shape` describes.
    #[track_caller]
    pub fn from_iter<I: IntoIterator<Item = f32>>(shape: &[usize], iter: I) -> Self {
        let data: Box<[f32]> = iter.into_iter().collect();
        assert_eq!(
            data.len(),
            elements(shape),
            "element count does not match tensor shape {:?}",
            shape
        );
        Self {
            shape: shape.iter().copied().collect(),
            data,
        }
    }

    pub(super) fn from_tract(tract: &tract_onnx::prelude::Tensor) -> anyhow::Result<Self> {
        let data = tract.as_slice::<f32>()?;
        Ok(Self::from_iter(tract.shape(), data.iter().copied()))
    }

    pub(super) fn to_tract(&self) -> anyhow::Result<tract_onnx::prelude::Tensor> {
        Ok(tract_onnx::prelude::Tensor::from_shape(
            &self.shape,
            &self.data,
        )?)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Indexes a prefix of the tensor's dimensions.
    ///
    /// Indexing a tensor of shape `[1, 896, 18]` with `[0, 5]` yields a view of shape `[18]`.
    ///
    /// # Panics
    ///
    /// Panics if `indices` has more entries than `self` has dimensions, or if any index is out of
    /// bounds.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'_> {
        self.as_view().index(indices)
    }

    /// Iterates over the outermost dimension.
    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'_>> {
        let view = self.as_view();
        assert!(view.rank() > 0, "attempted to iterate over 0-dimensional tensor");
        (0..self.shape[0]).map(move |index| view.index([index]))
    }

    /// Returns the values of a 1-dimensional tensor.
    #[track_caller]
    pub fn as_slice(&self) -> &[f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor of shape {:?} as slice",
            self.shape()
        );
        &self.data
    }

    /// Returns the value of a 0-dimensional tensor.
    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        self.as_view().as_singular()
    }

    fn as_view(&self) -> TensorView<'_> {
        TensorView {
            shape: &self.shape,
            data: &self.data,
        }
    }
}

impl<const N: usize> From<[f32; N]> for Tensor {
    fn from(arr: [f32; N]) -> Self {
        Tensor::from_iter(&[N], arr)
    }
}

impl<'a> TensorView<'a> {
    pub fn shape(&self) -> &[usize] {
        self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Indexes a prefix of the view's dimensions.
    #[track_caller]
    pub fn index<const N: usize>(&self, indices: [usize; N]) -> TensorView<'a> {
        assert!(
            N <= self.rank(),
            "attempted to index tensor of shape {:?} with {:?}",
            self.shape,
            indices
        );

        let mut data = self.data;
        for (dim, &index) in indices.iter().enumerate() {
            assert!(
                index < self.shape[dim],
                "attempted to index tensor of shape {:?} with {:?}",
                self.shape,
                indices
            );
            let stride = elements(&self.shape[dim + 1..]);
            data = &data[index * stride..(index + 1) * stride];
        }

        TensorView {
            shape: &self.shape[N..],
            data,
        }
    }

    #[track_caller]
    pub fn iter(&self) -> impl Iterator<Item = TensorView<'a>> + '_ {
        assert!(self.rank() > 0, "attempted to iterate over 0-dimensional tensor");
        (0..self.shape[0]).map(|index| self.index([index]))
    }

    #[track_caller]
    pub fn as_slice(&self) -> &'a [f32] {
        assert_eq!(
            self.rank(),
            1,
            "attempted to access tensor view of shape {:?} as slice",
            self.shape
        );
        self.data
    }

    #[track_caller]
    pub fn as_singular(&self) -> f32 {
        assert_eq!(
            self.rank(),
            0,
            "attempted to access tensor view of shape {:?} as singular element",
            self.shape,
        );
        self.data[0]
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape())
            .finish()
    }
}

impl fmt::Debug for TensorView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorView")
            .field("shape", &self.shape())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_shape_fn_order() {
        let indices = [
            [0, 0, 0],
            [0, 0, 1],
            [0, 0, 2],
            [0, 1, 0],
            [0, 1, 1],
            [0, 1, 2],
        ];

        let mut iter = indices.into_iter();
        let tensor = Tensor::from_array_shape_fn([1, 2, 3], |index| {
            assert_eq!(iter.next(), Some(index));
            0.0
        });
        assert_eq!(iter.next(), None);
        assert_eq!(tensor.shape(), &[1, 2, 3]);
    }

    #[test]
    fn empty() {
        let tensor = Tensor::from_array_shape_fn([1, 2, 0, 3], |idx| unreachable!("{idx:?}"));
        assert_eq!(tensor.shape(), &[1, 2, 0, 3]);
        assert_eq!(tensor.iter().count(), 1);

        let view = tensor.index([0, 1]);
        assert_eq!(view.shape(), &[0, 3]);
        assert_eq!(view.iter().count(), 0);
    }

    #[test]
    fn singular() {
        let mut hits = 0;
        let tensor = Tensor::from_array_shape_fn([], |[]| {
            hits += 1;
            1.0
        });
        assert_eq!(hits, 1);
        assert_eq!(tensor.rank(), 0);
        assert_eq!(tensor.as_singular(), 1.0);
    }

    #[test]
    fn index_detection_output() {
        // shaped like a `[1, anchors, values]` SSD box output
        let tensor = Tensor::from_iter(&[1, 3, 2], (0..6).map(|v| v as f32));
        assert_eq!(tensor.index([0]).shape(), &[3, 2]);
        assert_eq!(tensor.index([0, 2]).as_slice(), &[4.0, 5.0]);
        assert_eq!(tensor.index([0, 1, 1]).as_singular(), 3.0);

        let rows: Vec<_> = tensor.index([0]).iter().map(|row| row.as_slice()[0]).collect();
        assert_eq!(rows, [0.0, 2.0, 4.0]);
    }

    #[test]
    fn from_array() {
        let array = Tensor::from([0.0, 1.0, 2.0]);
        assert_eq!(array.shape(), &[3]);
        assert_eq!(array.as_slice(), &[0.0, 1.0, 2.0]);
        assert_eq!(array.index([2]).as_singular(), 2.0);
    }

    #[test]
    #[should_panic(expected = "attempted to index tensor")]
    fn index_out_of_bounds() {
        Tensor::from([0.0, 1.0]).index([2]);
    }

    #[test]
    fn tract_conversion() {
        let tensor = Tensor::from_iter(&[2, 2], [1.0, 2.0, 3.0, 4.0]);
        let tract = tensor.to_tract().unwrap();
        assert_eq!(tract.shape(), &[2, 2]);
        let back = Tensor::from_tract(&tract).unwrap();
        assert_eq!(back.index([1, 0]).as_singular(), 3.0);
    }
}
