//! Vector math shared by both indexes: dot product, L2 norm, cosine similarity
//! and unit-length normalization.
//!
//! Sums are accumulated in f64 so finite f32 inputs never underflow to a zero
//! norm or overflow to infinity; only final results are narrowed to f32.

fn dot_f64(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum()
}

fn norm_f64(v: &[f32]) -> f64 {
    v.iter().map(|x| f64::from(*x) * f64::from(*x)).sum::<f64>().sqrt()
}

/// Inner product over the common prefix of `a` and `b`.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    dot_f64(a, b) as f32
}

/// Euclidean (L2) length.
pub fn l2_norm(v: &[f32]) -> f32 {
    norm_f64(v) as f32
}

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
/// Returns exactly 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let na = norm_f64(a);
    let nb = norm_f64(b);
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot_f64(a, b) / (na * nb)) as f32
}

/// Returns `v / |v|`. A zero vector stays all zeros.
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let mut out = v.to_vec();
    normalize_in_place(&mut out);
    out
}

/// In-place variant of [`normalize`], used on the batch insert path.
pub fn normalize_in_place(v: &mut [f32]) {
    let norm = norm_f64(v);
    if norm > 0.0 {
        let inv = norm.recip();
        for x in v.iter_mut() {
            *x = (f64::from(*x) * inv) as f32;
        }
    }
}
