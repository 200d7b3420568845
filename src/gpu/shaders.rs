/// WGSL for the readback pass of the wgpu device.
///
/// A full-screen triangle covers the RGBA8 target and each fragment copies
/// exactly one texel of the source layer with `textureLoad`, so there is no
/// filtering and no coordinate rounding. Block compressed sources are
/// decompressed by the texture unit on load.
pub const COPY_SHADER: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;

    // Vertices (-1,-1), (3,-1), (-1,3) cover the whole viewport
    let x = f32(i32(vertex_index & 1u) * 4 - 1);
    let y = f32(i32(vertex_index >> 1u) * 4 - 1);
    output.clip_position = vec4<f32>(x, y, 0.0, 1.0);

    return output;
}

@group(0) @binding(0)
var source: texture_2d<f32>;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    // pos.xy is the pixel centre in framebuffer space, top-left origin
    let texel = vec2<i32>(floor(pos.xy));
    return textureLoad(source, texel, 0);
}
"#;

pub fn get_shader() -> &'static str {
    COPY_SHADER
}
