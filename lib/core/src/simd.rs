// Inner-product kernels for embedding scans.
// Four independent accumulators keep the loop free of a serial dependency
// chain, which is enough for LLVM to emit packed SSE/AVX/NEON code.

const LANES: usize = 4;

/// Dot product of two equally sized slices.
/// Returns 0.0 when the lengths differ.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut acc = [0.0f32; LANES];
    let chunks_a = a.chunks_exact(LANES);
    let chunks_b = b.chunks_exact(LANES);
    let tail: f32 = chunks_a
        .remainder()
        .iter()
        .zip(chunks_b.remainder())
        .map(|(x, y)| x * y)
        .sum();

    for (ca, cb) in chunks_a.zip(chunks_b) {
        for lane in 0..LANES {
            acc[lane] += ca[lane] * cb[lane];
        }
    }

    (acc[0] + acc[1]) + (acc[2] + acc[3]) + tail
}

#[inline]
pub fn norm_squared(v: &[f32]) -> f32 {
    dot(v, v)
}

#[inline]
pub fn norm(v: &[f32]) -> f32 {
    norm_squared(v).sqrt()
}
