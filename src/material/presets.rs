//! Materials with built-in shaders.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::Material;
use crate::device::GraphicsDevice;
use crate::error::Result;
use crate::scene::LightKind;
use crate::texture::Sampler2D;
use crate::uniform::UniformMap;

pub const BASE_COLOR: &str = "u_BaseColor";
pub const USE_VERTEX_COLOR: &str = "u_UseVertexColor";
pub const USE_TEXTURE: &str = "u_UseTexture";
pub const TEXTURE: &str = "u_Texture";
pub const REPEAT_UV: &str = "u_RepeatUV";
pub const OFFSET_UV: &str = "u_OffsetUV";
pub const LIGHTS: &str = "lights";
pub const LIGHT_COUNT: &str = "lightCount";

/// Length of the light array declared by the lit shaders.
pub const MAX_LIGHTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicOptions {
    pub base_color: Vec3,
    pub use_vertex_colors: bool,
    pub point_size: f32,
    pub double_sided: bool,
}

impl Default for BasicOptions {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            use_vertex_colors: false,
            point_size: 1.0,
            double_sided: false,
        }
    }
}

/// Unlit colour, optionally modulated by the `a_color_0` vertex stream.
pub fn basic(device: &mut dyn GraphicsDevice, options: &BasicOptions) -> Result<Material> {
    let vertex = format!(
        r#"
in vec4 a_position;
in vec4 a_color_0;

uniform mat4 u_ProjectionMatrix;
uniform mat4 u_ViewMatrix;
uniform mat4 u_ModelMatrix;

out vec4 v_Color;

void main() {{
    gl_PointSize = {:?};
    gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position;
    v_Color = a_color_0;
}}
"#,
        options.point_size
    );
    let uniforms = UniformMap::new()
        .with(BASE_COLOR, options.base_color)
        .with(USE_VERTEX_COLOR, options.use_vertex_colors);
    Material::new(
        device,
        &vertex,
        BASIC_FRAGMENT,
        uniforms,
        options.double_sided,
    )
}

const BASIC_FRAGMENT: &str = r#"
in vec4 v_Color;

uniform vec3 u_BaseColor;
uniform bool u_UseVertexColor;

out vec4 fragColor;

void main() {
    vec4 color = vec4(u_BaseColor, 1.0);
    if (u_UseVertexColor) {
        color *= v_Color;
    }
    fragColor = color;
}
"#;

/// Per-vertex diffuse lighting from up to [`MAX_LIGHTS`] scene lights.
pub fn flat(
    device: &mut dyn GraphicsDevice,
    texture: Option<Sampler2D>,
    base_color: Vec3,
) -> Result<Material> {
    let mut uniforms = UniformMap::new()
        .with(BASE_COLOR, base_color)
        .with(USE_TEXTURE, texture.is_some());
    if let Some(sampler) = texture {
        uniforms.insert(TEXTURE, sampler);
    }
    Material::new(device, &flat_vertex(), FLAT_FRAGMENT, uniforms, true)
}

fn flat_vertex() -> String {
    format!(
        r#"
{declarations}

struct Light {{
    int lightType;
    vec3 color;
    vec3 direction;
    vec3 position;
    vec3 attenuation;
}};

in vec4 a_position;
in vec2 a_texcoord_0;
in vec3 a_normal;

uniform mat4 u_ProjectionMatrix;
uniform mat4 u_ViewMatrix;
uniform mat4 u_ModelMatrix;

uniform Light lights[{max_lights}];
uniform int lightCount;

out vec2 v_Texcoord_0;
out vec3 v_Light;

float falloff(vec3 attenuation, float x) {{
    return 1.0 / (attenuation[0] + attenuation[1] * x + attenuation[2] * x * x);
}}

vec3 shade(Light light, vec3 position, vec3 normal) {{
    if (light.lightType == AMBIENT) {{
        return light.color;
    }}
    vec3 direction = vec3(0.0);
    float strength = 1.0;
    if (light.lightType == DIRECTIONAL) {{
        direction = normalize(light.direction);
    }} else if (light.lightType == POINT) {{
        direction = normalize(position - light.position);
        strength = falloff(light.attenuation, length(light.position - position));
    }} else {{
        return vec3(0.0);
    }}
    return light.color * max(dot(normal, -direction), 0.0) * strength;
}}

void main() {{
    gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position;
    v_Texcoord_0 = a_texcoord_0;
    vec3 position = vec3(u_ModelMatrix * a_position);
    vec3 normal = normalize(mat3(u_ModelMatrix) * a_normal);
    v_Light = vec3(0.0);
    for (int i = 0; i < lightCount; i++) {{
        v_Light += shade(lights[i], position, normal);
    }}
}}
"#,
        declarations = LightKind::glsl_declarations(),
        max_lights = MAX_LIGHTS,
    )
}

const FLAT_FRAGMENT: &str = r#"
uniform vec3 u_BaseColor;
uniform bool u_UseTexture;
uniform sampler2D u_Texture;

in vec2 v_Texcoord_0;
in vec3 v_Light;

out vec4 fragColor;

void main() {
    vec4 color = vec4(u_BaseColor, 1.0);
    if (u_UseTexture) {
        color *= texture(u_Texture, v_Texcoord_0);
    }
    fragColor = color * vec4(v_Light, 1.0);
}
"#;

/// Colours surfaces by their model-space normal.
pub fn normal(device: &mut dyn GraphicsDevice) -> Result<Material> {
    Material::new(
        device,
        NORMAL_VERTEX,
        NORMAL_FRAGMENT,
        UniformMap::new(),
        false,
    )
}

const NORMAL_VERTEX: &str = r#"
in vec4 a_position;
in vec3 a_normal;

uniform mat4 u_ProjectionMatrix;
uniform mat4 u_ViewMatrix;
uniform mat4 u_ModelMatrix;

out vec3 v_Normal;

void main() {
    gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position;
    v_Normal = mat3(u_ModelMatrix) * a_normal;
}
"#;

const NORMAL_FRAGMENT: &str = r#"
in vec3 v_Normal;

out vec4 fragColor;

void main() {
    fragColor = vec4((normalize(v_Normal) + vec3(1.0)) / 2.0, 1.0);
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureOptions {
    pub base_color: Vec3,
    pub repeat_uv: Vec2,
    pub offset_uv: Vec2,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            repeat_uv: Vec2::ONE,
            offset_uv: Vec2::ZERO,
        }
    }
}

/// Unlit texture lookup with tiling and offset; nearly transparent texels are discarded.
pub fn texture(
    device: &mut dyn GraphicsDevice,
    sampler: Sampler2D,
    options: &TextureOptions,
) -> Result<Material> {
    let uniforms = UniformMap::new()
        .with(TEXTURE, sampler)
        .with(BASE_COLOR, options.base_color)
        .with(REPEAT_UV, options.repeat_uv)
        .with(OFFSET_UV, options.offset_uv);
    Material::new(device, TEXTURE_VERTEX, TEXTURE_FRAGMENT, uniforms, true)
}

const TEXTURE_VERTEX: &str = r#"
in vec4 a_position;
in vec2 a_texcoord_0;

uniform mat4 u_ProjectionMatrix;
uniform mat4 u_ViewMatrix;
uniform mat4 u_ModelMatrix;
uniform vec2 u_RepeatUV;
uniform vec2 u_OffsetUV;

out vec2 v_Texcoord_0;

void main() {
    gl_Position = u_ProjectionMatrix * u_ViewMatrix * u_ModelMatrix * a_position;
    v_Texcoord_0 = a_texcoord_0 * u_RepeatUV + u_OffsetUV;
}
"#;

const TEXTURE_FRAGMENT: &str = r#"
uniform vec3 u_BaseColor;
uniform sampler2D u_Texture;

in vec2 v_Texcoord_0;

out vec4 fragColor;

void main() {
    vec4 color = vec4(u_BaseColor, 1.0) * texture(u_Texture, v_Texcoord_0);
    if (color.a < 0.1) {
        discard;
    }
    fragColor = color;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Capability, GlslType, RecordingDevice, TextureId};

    #[test]
    fn basic_bakes_point_size() {
        let mut device = RecordingDevice::default();
        let material = basic(
            &mut device,
            &BasicOptions {
                point_size: 4.0,
                ..BasicOptions::default()
            },
        )
        .unwrap();
        assert_eq!(material.uniform::<bool>(USE_VERTEX_COLOR), Some(false));
        assert!(material.program().attribute("a_color_0").is_some());
        assert!(!material.double_sided());
        assert!(device.program_diagnostics(material.program().id()).is_none());
    }

    #[test]
    fn flat_declares_full_light_array() {
        let mut device = RecordingDevice::default();
        let material = flat(&mut device, None, Vec3::ONE).unwrap();
        let last = format!("{LIGHTS}[{}].attenuation", MAX_LIGHTS - 1);
        assert!(material.has_uniform(&last));
        assert_eq!(
            material.program().uniform(LIGHT_COUNT).unwrap().data_type,
            GlslType::Int
        );
        assert_eq!(material.uniform::<bool>(USE_TEXTURE), Some(false));
        assert!(material.uniform::<Sampler2D>(TEXTURE).is_none());
        material.update_render_settings(&mut device);
        assert!(!device.is_enabled(Capability::CullFace));
    }

    #[test]
    fn flat_with_texture_enables_sampling() {
        let mut device = RecordingDevice::default();
        let sampler = Sampler2D {
            texture: TextureId(0),
            unit: 0,
        };
        let material = flat(&mut device, Some(sampler), Vec3::ONE).unwrap();
        assert_eq!(material.uniform::<bool>(USE_TEXTURE), Some(true));
        assert_eq!(material.uniform::<Sampler2D>(TEXTURE), Some(sampler));
    }

    #[test]
    fn texture_options_default_to_identity_mapping() {
        let mut device = RecordingDevice::default();
        let sampler = Sampler2D {
            texture: TextureId(1),
            unit: 0,
        };
        let material = texture(&mut device, sampler, &TextureOptions::default()).unwrap();
        assert_eq!(material.uniform::<Vec2>(REPEAT_UV), Some(Vec2::ONE));
        assert!(material.has_uniform(OFFSET_UV));
    }

    #[test]
    fn normal_uses_only_matrices() {
        let mut device = RecordingDevice::default();
        let material = normal(&mut device).unwrap();
        assert_eq!(material.uniform_names().count(), 3);
        assert!(material.program().attribute("a_normal").is_some());
    }
}
