pub fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
	v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in [-1, 1]; zero vectors compare as 0.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let denom = l2_norm(a) * l2_norm(b);
	if denom <= f32::EPSILON { return 0.0; }
	dot(a, b) / denom
}
