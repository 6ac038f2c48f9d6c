// ============================================================================
// GPU SHADERS — all WGSL code kept inline for containment
// ============================================================================

// ============================================================================
// GRAYSCALE COMPUTE KERNEL
// ============================================================================
//
// Reads the BGRA input texture (channels arrive in rgba order through the
// sampled view) and writes Rec.709 luma into the rgba8unorm storage output.
// The workgroup size placeholders are filled in by `grayscale_shader`.
const GRAYSCALE_TEMPLATE: &str = r#"
@group(0) @binding(0) var input_tex: texture_2d<f32>;
@group(0) @binding(1) var output_tex: texture_storage_2d<rgba8unorm, write>;

const REC709_LUMA: vec3<f32> = vec3<f32>(0.2126, 0.7152, 0.0722);

@compute @workgroup_size({{WG_X}}, {{WG_Y}}, 1)
fn cs_grayscale(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(output_tex);
    // Threadgroups overhang the texture edge when the extent is not a multiple
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let coord = vec2<i32>(gid.xy);
    let color = textureLoad(input_tex, coord, 0);
    let gray = dot(color.rgb, REC709_LUMA);
    textureStore(output_tex, coord, vec4<f32>(gray, gray, gray, 1.0));
}
"#;

/// Grayscale kernel source with the workgroup size baked in.
pub fn grayscale_shader(wg_x: u32, wg_y: u32) -> String {
    GRAYSCALE_TEMPLATE
        .replace("{{WG_X}}", &wg_x.to_string())
        .replace("{{WG_Y}}", &wg_y.to_string())
}

// ============================================================================
// QUAD SHADER — draws the processed texture centred in the viewport
// ============================================================================
//
// Vertices are generated from `vertex_index`; no vertex buffer.  Positions
// are computed in pixel space (origin at the viewport centre) and divided by
// half the viewport size to reach NDC.
pub const QUAD_SHADER: &str = r#"
struct QuadUniforms {
    viewport_size: vec2<f32>,
    image_size: vec2<f32>,
    scale: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0) var<uniform> u: QuadUniforms;
@group(0) @binding(1) var quad_tex: texture_2d<f32>;
@group(0) @binding(2) var quad_samp: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_quad(@builtin(vertex_index) vi: u32) -> VertexOutput {
    var corners = array<vec2<f32>, 6>(
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0, -1.0),
        vec2<f32>(-1.0,  1.0),
        vec2<f32>( 1.0,  1.0),
    );
    let corner = corners[vi];

    let half_size = u.image_size * u.scale * 0.5;
    let pixel_pos = corner * half_size;

    var out: VertexOutput;
    out.position = vec4<f32>(pixel_pos / (u.viewport_size * 0.5), 0.0, 1.0);
    // Texture rows run top to bottom; NDC y runs bottom to top
    out.uv = vec2<f32>((corner.x + 1.0) * 0.5, (1.0 - corner.y) * 0.5);
    return out;
}

@fragment
fn fs_quad(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(quad_tex, quad_samp, in.uv);
}
"#;
