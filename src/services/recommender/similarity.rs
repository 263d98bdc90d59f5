//! Cosine similarity between entity rows
//!
//! Formula: cos(θ) = (A · B) / (||A|| ||B||). A zero row has no direction, so its
//! similarity with anything (itself included) is 0.

use ndarray::{Array2, ArrayView2};

use crate::{
    error::{AppError, AppResult},
    services::embedding::Embedding,
};

/// Pairwise cosine similarity between the rows of `rows`
///
/// The result is square with one row and column per input row. Each unordered
/// pair is computed once and mirrored, so the matrix is exactly symmetric. The
/// diagonal is 1.0 for nonzero rows and 0.0 for zero rows.
pub fn cosine_similarity_matrix(rows: ArrayView2<'_, f64>) -> Array2<f64> {
    let n = rows.nrows();
    let norms: Vec<f64> = rows.rows().into_iter().map(|r| r.dot(&r).sqrt()).collect();

    let mut similarity = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        if norms[i] == 0.0 {
            continue;
        }
        similarity[[i, i]] = 1.0;

        for j in (i + 1)..n {
            if norms[j] == 0.0 {
                continue;
            }
            let cosine = rows.row(i).dot(&rows.row(j)) / (norms[i] * norms[j]);
            let cosine = cosine.clamp(-1.0, 1.0);
            similarity[[i, j]] = cosine;
            similarity[[j, i]] = cosine;
        }
    }

    similarity
}

/// Stacks embeddings into a course × dimension matrix
///
/// All vectors must share one length and hold only finite values; zero-length
/// vectors (every description blank) are accepted and produce a zero-width matrix.
pub fn embeddings_to_matrix(embeddings: &[Embedding]) -> AppResult<Array2<f64>> {
    let dimensions = embeddings.first().map(Embedding::dimensions).unwrap_or(0);

    if let Some(bad) = embeddings.iter().find(|e| e.dimensions() != dimensions) {
        return Err(AppError::Embedding(format!(
            "Embedding dimensions differ ({} and {})",
            dimensions,
            bad.dimensions()
        )));
    }

    if let Some(position) = embeddings
        .iter()
        .position(|e| e.as_slice().iter().any(|v| !v.is_finite()))
    {
        return Err(AppError::Embedding(format!(
            "Embedding {} contains a non-finite component",
            position
        )));
    }

    let mut matrix = Array2::<f64>::zeros((embeddings.len(), dimensions));
    for (mut row, embedding) in matrix.rows_mut().into_iter().zip(embeddings) {
        for (cell, value) in row.iter_mut().zip(embedding.as_slice()) {
            *cell = f64::from(*value);
        }
    }

    Ok(matrix)
}
