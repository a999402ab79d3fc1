//! WGSL compute shaders of the GPU backend.
//!
//! Every shader shares the `Params` uniform layout of
//! `ops::gpu::KernelParams`:
//!
//! ```text
//! area: x, y, w, h          (destination rectangle)
//! dims: width, height, channels, 0
//! code: op, sub-op, extra, 0
//! p:    4 x vec4 parameters
//! ```
//!
//! One invocation handles one pixel of `area`. Storage is normalized `f32`,
//! stores clamp to [0,1].

/// Shared declarations.
const PARAMS: &str = r#"
struct Params {
    area: vec4<i32>,
    dims: vec4<u32>,
    code: vec4<u32>,
    p: array<vec4<f32>, 4>,
}

fn invocation(id: vec3<u32>, nwg: vec3<u32>) -> u32 {
    return id.x + id.y * nwg.x * 256u;
}

fn pixel_count() -> u32 {
    return u32(params.area.z * params.area.w);
}

fn pixel_coord(i: u32) -> vec2<i32> {
    let w = u32(params.area.z);
    return vec2<i32>(params.area.x + i32(i % w), params.area.y + i32(i / w));
}

fn pixel_base(xy: vec2<i32>) -> u32 {
    return (u32(xy.y) * params.dims.x + u32(xy.x)) * params.dims.z;
}

fn overlay(i: f32, m: f32) -> f32 {
    return i * (i + 2.0 * m * (1.0 - i));
}
"#;

/// Fill and fill-channel. Bindings: dst, params.
const FILL_BODY: &str = r#"
@group(0) @binding(0) var<storage, read_write> dst: array<f32>;
@group(0) @binding(1) var<uniform> params: Params;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = invocation(id, nwg);
    if i >= pixel_count() { return; }
    let base = pixel_base(pixel_coord(i));
    let c = params.dims.z;

    if params.code.x == 0u {
        for (var ch = 0u; ch < c; ch++) {
            dst[base + ch] = clamp(params.p[0][ch], 0.0, 1.0);
        }
    } else {
        dst[base + params.code.y] = clamp(params.p[0].x, 0.0, 1.0);
    }
}
"#;

/// One-source operations. Bindings: dst, src, params, lut.
///
/// Codes: 0 scalar, 1 negate, 2 curve, 3 brightness scale, 4 monochrome,
/// 5 vignette, 6 split-tone, 7 horizontal blur, 8 vertical blur.
const UNARY_BODY: &str = r#"
@group(0) @binding(0) var<storage, read_write> dst: array<f32>;
@group(0) @binding(1) var<storage, read> src: array<f32>;
@group(0) @binding(2) var<uniform> params: Params;
@group(0) @binding(3) var<storage, read> lut: array<f32>;

fn lookup(v: f32) -> f32 {
    let last = arrayLength(&lut) - 1u;
    let idx = u32(floor(clamp(v, 0.0, 1.0) * f32(last) + 0.5));
    return lut[min(idx, last)];
}

fn wrap(v: i32, n: i32) -> i32 {
    return ((v % n) + n) % n;
}

fn scalar_op(a: f32, v: f32, kind: u32) -> f32 {
    var r = a;
    switch kind {
        case 0u: { r = a + v; }
        case 1u: { r = a - v; }
        case 2u: { r = a * v; }
        case 3u: { r = select(a / v, 1.0, v == 0.0); }
        case 4u: { r = min(a, v); }
        case 5u: { r = max(a, v); }
        default: { r = (a - 0.5) * v + 0.5; }
    }
    return r;
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = invocation(id, nwg);
    if i >= pixel_count() { return; }
    let xy = pixel_coord(i);
    let base = pixel_base(xy);
    let w = params.dims.x;
    let h = params.dims.y;
    let c = params.dims.z;
    let p0 = params.p[0];
    let p1 = params.p[1];

    switch params.code.x {
        case 0u: {
            for (var ch = 0u; ch < c; ch++) {
                dst[base + ch] = clamp(scalar_op(src[base + ch], p0.x, params.code.y), 0.0, 1.0);
            }
        }
        case 1u: {
            for (var ch = 0u; ch < c; ch++) {
                dst[base + ch] = clamp(1.0 - src[base + ch], 0.0, 1.0);
            }
        }
        case 2u: {
            for (var ch = 0u; ch < c; ch++) {
                dst[base + ch] = clamp(lookup(src[base + ch]), 0.0, 1.0);
            }
        }
        case 3u: {
            for (var ch = 0u; ch < c; ch++) {
                dst[base + ch] = clamp(min(src[base + ch] * p0.x, 1.0), 0.0, 1.0);
            }
        }
        case 4u: {
            let m = clamp(src[base] * p0.x + src[base + 1u] * p0.y + src[base + 2u] * p0.z, 0.0, 1.0);
            dst[base] = m;
            dst[base + 1u] = m;
            dst[base + 2u] = m;
            if c == 4u { dst[base + 3u] = src[base + 3u]; }
        }
        case 5u: {
            // p0: center x, center y, max distance, strength / 100
            let d = distance(vec2<f32>(xy), p0.xy);
            let v = select(0.0, p0.w * d / p0.z, p0.z > 0.0);
            for (var ch = 0u; ch < c; ch++) {
                let s = src[base + ch];
                dst[base + ch] = clamp((1.0 - v) * s + v * s * s, 0.0, 1.0);
            }
        }
        case 6u: {
            // p0: highlights rgb + balance, p1: shadows rgb
            let intensity = src[base];
            let hi = intensity * p0.w;
            let rest = 1.0 - hi;
            let sh = rest * rest;
            let orig = 1.0 - hi - sh;
            for (var ch = 0u; ch < 3u; ch++) {
                let s = src[base + ch];
                let v = overlay(s, p0[ch]) * hi + overlay(s, p1[ch]) * sh + intensity * orig;
                dst[base + ch] = clamp(v, 0.0, 1.0);
            }
            if c == 4u { dst[base + 3u] = src[base + 3u]; }
        }
        case 7u: {
            let half = i32(params.code.y);
            let taps = 2u * params.code.y + 1u;
            for (var ch = 0u; ch < c; ch++) {
                var acc = 0.0;
                for (var k = 0u; k < taps; k++) {
                    let sx = wrap(xy.x + i32(k) - half, i32(w));
                    acc += src[(u32(xy.y) * w + u32(sx)) * c + ch] * lut[k];
                }
                dst[base + ch] = clamp(acc, 0.0, 1.0);
            }
        }
        case 8u: {
            let half = i32(params.code.y);
            let taps = 2u * params.code.y + 1u;
            for (var ch = 0u; ch < c; ch++) {
                var acc = 0.0;
                for (var k = 0u; k < taps; k++) {
                    let sy = wrap(xy.y + i32(k) - half, i32(h));
                    acc += src[(u32(sy) * w + u32(xy.x)) * c + ch] * lut[k];
                }
                dst[base + ch] = clamp(acc, 0.0, 1.0);
            }
        }
        default: {}
    }
}
"#;

/// Two-source operations. Bindings: dst, a, b, params, lut.
///
/// Codes: 0 binary (sub-op selects), 1 alpha blend, 2 film grain.
const BINARY_BODY: &str = r#"
@group(0) @binding(0) var<storage, read_write> dst: array<f32>;
@group(0) @binding(1) var<storage, read> src_a: array<f32>;
@group(0) @binding(2) var<storage, read> src_b: array<f32>;
@group(0) @binding(3) var<uniform> params: Params;
@group(0) @binding(4) var<storage, read> lut: array<f32>;

fn lookup(v: f32) -> f32 {
    let last = arrayLength(&lut) - 1u;
    let idx = u32(floor(clamp(v, 0.0, 1.0) * f32(last) + 0.5));
    return lut[min(idx, last)];
}

fn binary_op(a: f32, b: f32, kind: u32) -> f32 {
    var r = a;
    switch kind {
        case 0u: { r = a + b; }
        case 1u: { r = a - b; }
        case 2u: { r = a * b; }
        case 3u: { r = select(a / b, 1.0, b == 0.0); }
        case 4u: { r = min(a, b); }
        case 5u: { r = max(a, b); }
        case 6u: { r = a - b + 0.5; }
        case 7u: { r = a + b - 0.5; }
        case 8u: { r = overlay(a, b); }
        case 9u: { r = 1.0 - (1.0 - a) * (1.0 - b); }
        default: { r = abs(a - b); }
    }
    return r;
}

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = invocation(id, nwg);
    if i >= pixel_count() { return; }
    let base = pixel_base(pixel_coord(i));
    let c = params.dims.z;
    let alpha = params.p[0].x;

    for (var ch = 0u; ch < c; ch++) {
        let a = src_a[base + ch];
        let b = src_b[base + ch];
        var r = 0.0;
        switch params.code.x {
            case 0u: { r = binary_op(a, b, params.code.y); }
            case 1u: { r = a * (1.0 - alpha) + b * alpha; }
            default: {
                let weight = lookup(a);
                r = a * (1.0 - weight) + overlay(a, b) * weight;
            }
        }
        dst[base + ch] = clamp(r, 0.0, 1.0);
    }
}
"#;

/// Fused four-cascade sharpen. Bindings: dst, base, blur0..blur3, params.
///
/// p0: strengths in percent, p1.x: threshold in percent.
const SHARPEN_BODY: &str = r#"
@group(0) @binding(0) var<storage, read_write> dst: array<f32>;
@group(0) @binding(1) var<storage, read> base_img: array<f32>;
@group(0) @binding(2) var<storage, read> blur0: array<f32>;
@group(0) @binding(3) var<storage, read> blur1: array<f32>;
@group(0) @binding(4) var<storage, read> blur2: array<f32>;
@group(0) @binding(5) var<storage, read> blur3: array<f32>;
@group(0) @binding(6) var<uniform> params: Params;

@compute @workgroup_size(256)
fn main(@builtin(global_invocation_id) id: vec3<u32>, @builtin(num_workgroups) nwg: vec3<u32>) {
    let i = invocation(id, nwg);
    if i >= pixel_count() { return; }
    let base = pixel_base(pixel_coord(i));
    let c = params.dims.z;
    let factor = 1.0 - max(params.p[1].x / 100.0, 0.01);

    for (var ch = 0u; ch < c; ch++) {
        let idx = base + ch;
        let b = base_img[idx];
        var blurred = array<f32, 4>(blur0[idx], blur1[idx], blur2[idx], blur3[idx]);
        var sum = 0.0;
        var peak = 0.5;
        var last = 0.0;
        for (var k = 0u; k < 4u; k++) {
            let raw = blurred[k] - b;
            sum += (raw - last) * params.p[0][k] / 100.0;
            peak = max(peak, raw + 0.5);
            last = raw;
        }
        let overall = clamp(peak * factor, 0.0, 1.0);
        dst[idx] = clamp(overall * (b - sum) + (1.0 - overall) * b, 0.0, 1.0);
    }
}
"#;

/// Full source of a shader body with the shared declarations prepended.
fn with_params(body: &str) -> String {
    format!("{PARAMS}\n{body}")
}

/// Fill shader source.
pub(crate) fn fill() -> String {
    with_params(FILL_BODY)
}

/// One-source shader source.
pub(crate) fn unary() -> String {
    with_params(UNARY_BODY)
}

/// Two-source shader source.
pub(crate) fn binary() -> String {
    with_params(BINARY_BODY)
}

/// Fused sharpen shader source.
pub(crate) fn sharpen() -> String {
    with_params(SHARPEN_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_declare_entry_and_params() {
        for source in [fill(), unary(), binary(), sharpen()] {
            assert!(source.contains("fn main("));
            assert!(source.contains("struct Params"));
            assert!(source.contains("var<uniform> params: Params"));
        }
    }
}
