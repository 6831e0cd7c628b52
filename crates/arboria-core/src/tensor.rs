use crate::dtype::Float;
use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use serde::{Deserialize, Serialize};

/// Dense row-major tensor — the feature-matrix representation shared by
/// every arboria model.
///
/// Stores data in a flat contiguous `Vec<T>`; rows are examples, columns
/// are features for the 2-D case the tree engine actually uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "T: Float")]
pub struct Tensor<T: Float> {
    data: Vec<T>,
    shape: Shape,
}

impl<T: Float> Tensor<T> {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<T>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Vec<usize>) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![T::ZERO; s.numel()],
            shape: s,
        }
    }

    /// Create a 1-D tensor from a slice.
    pub fn from_slice(data: &[T]) -> Self {
        Tensor {
            data: data.to_vec(),
            shape: Shape::new(vec![data.len()]),
        }
    }

    /// Create a 2-D tensor from a nested slice (rows of equal length).
    pub fn from_vec2d(data: &[Vec<T>]) -> TensorResult<Self> {
        if data.is_empty() {
            return Ok(Tensor::zeros(vec![0, 0]));
        }
        let rows = data.len();
        let cols = data[0].len();
        for row in data {
            if row.len() != cols {
                return Err(TensorError::InvalidOperation(
                    "All rows must have the same number of columns".to_string(),
                ));
            }
        }
        let flat: Vec<T> = data.iter().flat_map(|r| r.iter().copied()).collect();
        Tensor::new(flat, vec![rows, cols])
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.ndim()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Multi-dimensional indexing: compute flat offset from indices.
    pub fn get(&self, indices: &[usize]) -> TensorResult<T> {
        let strides = self.shape.strides();
        if indices.len() != self.ndim() {
            return Err(TensorError::DimensionMismatch(format!(
                "Expected {} indices, got {}",
                self.ndim(),
                indices.len()
            )));
        }
        let mut offset = 0;
        for (i, &idx) in indices.iter().enumerate() {
            let dim_size = self.shape.dim(i)?;
            if idx >= dim_size {
                return Err(TensorError::IndexOutOfBounds {
                    index: idx,
                    axis: i,
                    size: dim_size,
                });
            }
            offset += idx * strides[i];
        }
        Ok(self.data[offset])
    }

    /// Borrow one row of a 2-D tensor as a contiguous slice.
    pub fn row_slice(&self, row: usize) -> TensorResult<&[T]> {
        let n_rows = self.shape.dim(0)?;
        let n_cols = self.shape.dim(1)?;
        if row >= n_rows {
            return Err(TensorError::IndexOutOfBounds {
                index: row,
                axis: 0,
                size: n_rows,
            });
        }
        let start = row * n_cols;
        Ok(&self.data[start..start + n_cols])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_construction() {
        let t: Tensor<f32> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(t.shape().dims(), &[2, 2]);
        assert_eq!(t.numel(), 4);
        assert_eq!(t.get(&[1, 0]).unwrap(), 3.0);
    }

    #[test]
    fn test_tensor_shape_mismatch() {
        let err = Tensor::new(vec![1.0f32, 2.0, 3.0], vec![2, 2]).unwrap_err();
        matches!(err, TensorError::ShapeMismatch { .. });
    }

    #[test]
    fn test_row_slice() {
        let t: Tensor<f32> = Tensor::from_vec2d(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(t.row_slice(1).unwrap(), &[3.0, 4.0]);
        assert!(t.row_slice(3).is_err());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Tensor::from_vec2d(&[vec![1.0f32, 2.0], vec![3.0]]).unwrap_err();
        matches!(err, TensorError::InvalidOperation(_));
    }
}
