//! Shared embedding-vector helpers.

/// L2-normalize a vector in place (by value). Zero vectors pass through
/// unchanged rather than dividing by zero.
#[must_use]
pub fn normalize_vector(mut vector: Vec<f32>) -> Vec<f32> {
    let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut vector {
            *x /= magnitude;
        }
    }
    vector
}

/// Stable hash of a text + model name pair, used as the embedding cache key
/// so the same text embedded with two different models doesn't collide.
#[must_use]
pub fn cache_key_hash(text: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_vector_produces_unit_length() {
        let v = normalize_vector(vec![3.0, 4.0]);
        let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_vector_leaves_zero_vector_unchanged() {
        let v = normalize_vector(vec![0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn cache_key_hash_is_stable() {
        assert_eq!(cache_key_hash("hello"), cache_key_hash("hello"));
        assert_ne!(cache_key_hash("hello"), cache_key_hash("world"));
    }
}
