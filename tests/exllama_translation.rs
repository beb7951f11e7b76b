//! End-to-end test: calibrate a layer, quantize it to 4-bit codes, and run
//! the state dict through the exllama compressor.

use apretar::compress::exllama::{unpack_row, CODES_PER_WORD};
use apretar::compress::{CompressionFormat, Compressor};
use apretar::quant::{calculate_qparams, calculate_range, QuantizationArgs};
use apretar::{Error, NamedTensorMap, TensorData};

/// Quantize real weights to signed 4-bit codes with a per-tensor policy
fn quantize_to_codes(weights: &[f32], args: &QuantizationArgs) -> (Vec<i32>, f32, i32) {
    let min = weights.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = weights.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let params = calculate_qparams(&[min], &[max], args).unwrap();
    let scale = params.scales[0];
    let zero_point = params.zero_points.as_int().unwrap()[0];
    let (q_min, q_max) = calculate_range(args).unwrap();

    let codes = weights
        .iter()
        .map(|&w| ((w / scale).round() + zero_point as f32).clamp(q_min, q_max) as i32)
        .collect();
    (codes, scale, zero_point)
}

fn fake_quantized_layer(base: &str, rows: usize, cols: usize) -> Vec<(String, TensorData)> {
    let args = QuantizationArgs {
        num_bits: 4,
        symmetric: true,
        ..Default::default()
    };
    let weights: Vec<f32> = (0..rows * cols)
        .map(|i| ((i * 7 % 13) as f32 - 6.0) * 0.05)
        .collect();
    let (codes, _scale, zero_point) = quantize_to_codes(&weights, &args);

    // Scales in this wire format are themselves reduced-precision codes,
    // one per group of eight input channels once packed.
    let scale_codes: Vec<i32> = (0..cols).map(|i| (i % 16) as i32).collect();
    let zero_points = vec![zero_point; cols / CODES_PER_WORD];

    vec![
        (
            format!("{base}.weight"),
            TensorData::from_i32(codes, vec![rows, cols]).unwrap(),
        ),
        (
            format!("{base}.scale"),
            TensorData::from_i32(scale_codes, vec![cols]).unwrap(),
        ),
        (
            format!("{base}.zero_point"),
            TensorData::from_i32(zero_points, vec![cols / CODES_PER_WORD]).unwrap(),
        ),
        (
            format!("{base}.observer_min"),
            TensorData::from_f32(vec![-0.3], vec![1]).unwrap(),
        ),
    ]
}

#[test]
fn translates_full_model_state() {
    let mut entries = fake_quantized_layer("model.layers.0.proj", 4, 32);
    entries.extend(fake_quantized_layer("model.layers.1.proj", 8, 16));
    let source = NamedTensorMap::from(entries);
    let source_codes: Vec<i32> = source
        .get("model.layers.0.proj.weight")
        .unwrap()
        .as_i32()
        .unwrap()
        .to_vec();

    let compressor = Compressor::from_format(CompressionFormat::Exllama4Bit);
    let packed = compressor.compress(source).unwrap();

    // Four sibling keys per layer, nothing else
    assert_eq!(packed.len(), 8);
    for base in ["model.layers.0.proj", "model.layers.1.proj"] {
        assert!(packed.contains_key(&format!("{base}.qweight")));
        assert!(packed.contains_key(&format!("{base}.qscale")));
        assert!(packed.contains_key(&format!("{base}.qzero_point")));
        assert!(packed.contains_key(&format!("{base}.g_idx")));
        assert!(!packed.contains_key(&format!("{base}.weight")));
        assert!(!packed.contains_key(&format!("{base}.observer_min")));
    }

    // [4, 32] packs to [4, 4]; scale [32] to [1, 4]; zero-point [4] to [1, 4]
    let qweight = packed.get("model.layers.0.proj.qweight").unwrap();
    assert_eq!(qweight.shape(), &[4, 4]);
    assert_eq!(
        packed.get("model.layers.0.proj.qscale").unwrap().shape(),
        &[1, 4]
    );
    assert_eq!(
        packed
            .get("model.layers.0.proj.qzero_point")
            .unwrap()
            .shape(),
        &[1, 4]
    );

    // Packing is information-preserving: the words unpack to the same codes
    let unpacked = unpack_row(qweight.as_u32().unwrap(), true);
    assert_eq!(unpacked, source_codes);

    // Group index covers every unpacked input channel and is all zeros
    let g_idx = packed.get("model.layers.0.proj.g_idx").unwrap();
    assert_eq!(g_idx.shape(), &[32]);
    assert!(g_idx.as_i32().unwrap().iter().all(|&v| v == 0));
}

#[test]
fn malformed_group_aborts_whole_translation() {
    let mut entries = fake_quantized_layer("good", 2, 8);
    // second layer is missing its scale tensor
    entries.push((
        "bad.weight".to_string(),
        TensorData::from_i32(vec![0; 16], vec![2, 8]).unwrap(),
    ));

    let compressor = Compressor::from_format(CompressionFormat::Exllama4Bit);
    let err = compressor.compress(NamedTensorMap::from(entries));
    assert!(matches!(err, Err(Error::MalformedState(_))));
}

#[test]
fn decompression_is_an_explicit_gap() {
    let compressor = Compressor::from_format(CompressionFormat::Exllama4Bit);
    let err = compressor.decompress(NamedTensorMap::new());
    assert!(matches!(err, Err(Error::Unsupported(_))));
}
