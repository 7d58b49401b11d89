//! Weight initialization ranges.

use super::layer::Dense;

/// Half-width of the uniform range used for output-layer weights, so that
/// freshly built networks start close to a zero output.
pub const OUTPUT_WEIGHT_BOUND: f32 = 3e-3;

/// `1 / sqrt(fan_in)`.
pub fn fan_in_bound(fan_in: usize) -> f32 {
    1.0 / (fan_in as f32).sqrt()
}

/// Symmetric range `(-1/sqrt(fan_in), 1/sqrt(fan_in))` for a layer, where the
/// fan-in is the layer's input width.
pub fn fan_in_range(layer: &Dense) -> (f32, f32) {
    let bound = fan_in_bound(layer.fan_in());
    (-bound, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fan_in_range_is_symmetric() {
        let layer = Dense::new(8, 256, &mut StdRng::seed_from_u64(0)).unwrap();
        let (low, high) = fan_in_range(&layer);

        assert!((high - 1.0 / 8f32.sqrt()).abs() < 1e-7);
        assert_eq!(low, -high);
    }

    #[test]
    fn test_fan_in_uses_input_width() {
        let wide_out = Dense::new(4, 100, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(fan_in_range(&wide_out), (-0.5, 0.5));
    }

    #[test]
    fn test_fan_in_bound_values() {
        assert_eq!(fan_in_bound(1), 1.0);
        assert!((fan_in_bound(256) - 0.0625).abs() < 1e-7);
    }
}
