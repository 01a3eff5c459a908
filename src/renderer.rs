//! WebGL2 drawing of layer renderables with per-object clip planes.

use nalgebra::{Matrix4, Point3, Vector3};
use glow::{Context, HasContext as _};

use crate::error::{Result, ViewerError};
use crate::geometry::{Bounds, RenderObject, Representation, Style, Topology};
use crate::layers::RenderableId;

/// Most planes the fragment shader tests per object.
pub const MAX_CLIP_PLANES: usize = 8;

const DEFAULT_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

/// Current state of one renderable, as seen by the renderer on a redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameObject {
    pub id: RenderableId,
    pub visible: bool,
    pub opacity: f32,
    pub style: Style,
    /// Equations of the clip planes attached to this object.
    pub clip_planes: Vec<[f32; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub objects: Vec<FrameObject>,
}

/// The drawing backend behind the scene.
pub trait SceneRenderer {
    fn add_object(&mut self, object: &RenderObject) -> Result<RenderableId>;

    /// Draws every visible object of `frame`.
    fn render(&mut self, frame: &Frame);

    /// Frames everything added so far.
    fn reset_camera(&mut self);

    /// Drawing-buffer size in pixels; sets the aspect ratio of the camera.
    fn set_viewport(&mut self, width: u32, height: u32);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    Lines,
    Triangles,
}

impl Primitive {
    fn gl_mode(self) -> u32 {
        match self {
            Primitive::Points => glow::POINTS,
            Primitive::Lines => glow::LINES,
            Primitive::Triangles => glow::TRIANGLES,
        }
    }
}

/// Interleaved `xyz rgb` vertices ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexData {
    pub primitive: Primitive,
    pub vertices: Vec<f32>,
}

impl VertexData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 6
    }
}

/// Expands an object into the vertex stream its representation needs.
///
/// Indices outside the point list are skipped; an object without usable
/// connectivity is drawn as points.
pub fn build_vertices(object: &RenderObject) -> VertexData {
    let color_of = |i: usize| -> [f32; 3] {
        match (&object.colors, object.style.color) {
            (Some(colors), _) if i < colors.len() => {
                let [r, g, b] = colors[i];
                [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
            }
            (_, Some(c)) => c,
            _ => DEFAULT_COLOR,
        }
    };
    let n = object.points.len();
    let mut out = Vec::new();
    let mut push = |i: u32| {
        let i = i as usize;
        let p = object.points[i];
        out.extend_from_slice(&[p.x, p.y, p.z]);
        out.extend_from_slice(&color_of(i));
    };
    let valid = |i: &u32| (*i as usize) < n;

    let primitive = match (&object.topology, object.representation) {
        (Topology::Polygons(faces), Representation::Surface) => {
            for face in faces {
                let face: Vec<u32> = face.iter().copied().filter(valid).collect();
                for k in 1..face.len().saturating_sub(1) {
                    push(face[0]);
                    push(face[k]);
                    push(face[k + 1]);
                }
            }
            Primitive::Triangles
        }
        (Topology::Polygons(faces), Representation::Wireframe) => {
            for face in faces {
                let face: Vec<u32> = face.iter().copied().filter(valid).collect();
                if face.len() < 2 {
                    continue;
                }
                for k in 0..face.len() {
                    push(face[k]);
                    push(face[(k + 1) % face.len()]);
                }
            }
            Primitive::Lines
        }
        (Topology::Polyline(line), rep) if rep != Representation::Points => {
            let line: Vec<u32> = line.iter().copied().filter(valid).collect();
            for seg in line.windows(2) {
                push(seg[0]);
                push(seg[1]);
            }
            Primitive::Lines
        }
        (Topology::Vertices(ids), _) => {
            for i in ids.iter().copied().filter(valid) {
                push(i);
            }
            Primitive::Points
        }
        (Topology::Polyline(ids), Representation::Points) => {
            for i in ids.iter().copied().filter(valid) {
                push(i);
            }
            Primitive::Points
        }
        _ => {
            for i in 0..n as u32 {
                push(i);
            }
            Primitive::Points
        }
    };
    VertexData { primitive, vertices: out }
}

/// Build an MVP matrix that keeps the whole of `bounds` in front of the camera.
pub fn mvp(bounds: &Bounds, aspect: f32) -> Matrix4<f32> {
    let radius = bounds.radius().max(1.0e-3);
    let target = bounds.center();
    // far enough for a 60° FOV
    let eye = target + Vector3::new(0.0, 0.0, radius * 3.0);

    let proj = Matrix4::new_perspective(aspect.max(1.0e-3), 60_f32.to_radians(), radius * 0.01, radius * 10.0);
    let view = Matrix4::look_at_rh(&eye, &target, &Vector3::y());
    proj * view
}

struct GpuObject {
    vao: glow::VertexArray,
    _vbo: glow::Buffer,
    primitive: Primitive,
    vertex_count: i32,
    bounds: Option<Bounds>,
}

struct Uniforms {
    mvp: Option<glow::UniformLocation>,
    point_size: Option<glow::UniformLocation>,
    opacity: Option<glow::UniformLocation>,
    planes: Option<glow::UniformLocation>,
    plane_count: Option<glow::UniformLocation>,
}

/// WebGL2 implementation of [`SceneRenderer`].
pub struct GlSceneRenderer {
    gl: Context,
    program: glow::Program,
    uniforms: Uniforms,
    objects: Vec<GpuObject>,
    mvp: Matrix4<f32>,
    viewport: (i32, i32),
    background: [f32; 3],
}

impl GlSceneRenderer {
    pub fn new(gl: Context, viewport: (i32, i32), background: [f32; 3]) -> Result<Self> {
        let program = unsafe { compile_program(&gl)? };
        let uniforms = unsafe {
            Uniforms {
                mvp: gl.get_uniform_location(program, "u_mvp"),
                point_size: gl.get_uniform_location(program, "u_point_size"),
                opacity: gl.get_uniform_location(program, "u_opacity"),
                planes: gl.get_uniform_location(program, "u_planes"),
                plane_count: gl.get_uniform_location(program, "u_plane_count"),
            }
        };
        Ok(Self {
            gl,
            program,
            uniforms,
            objects: Vec::new(),
            mvp: Matrix4::identity(),
            viewport,
            background,
        })
    }

    fn aspect(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    unsafe fn upload(&self, data: &VertexData) -> Result<(glow::VertexArray, glow::Buffer)> {
        let gl = &self.gl;
        unsafe {
            let vao = gl.create_vertex_array().map_err(ViewerError::Render)?;
            let vbo = gl.create_buffer().map_err(ViewerError::Render)?;
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(&data.vertices),
                glow::STATIC_DRAW,
            );
            // 6 floats per vertex: xyz rgb
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 24, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, 24, 12);
            gl.bind_vertex_array(None);
            Ok((vao, vbo))
        }
    }
}

impl SceneRenderer for GlSceneRenderer {
    fn add_object(&mut self, object: &RenderObject) -> Result<RenderableId> {
        let data = build_vertices(object);
        let (vao, vbo) = unsafe { self.upload(&data)? };
        let id = RenderableId(self.objects.len() as u32);
        log::debug!(
            "uploaded '{}' as {:?} ({} vertices)",
            object.name,
            data.primitive,
            data.vertex_count()
        );
        self.objects.push(GpuObject {
            vao,
            _vbo: vbo,
            primitive: data.primitive,
            vertex_count: data.vertex_count() as i32,
            bounds: object.bounds(),
        });
        Ok(id)
    }

    fn render(&mut self, frame: &Frame) {
        let gl = &self.gl;
        unsafe {
            gl.viewport(0, 0, self.viewport.0, self.viewport.1);
            let [r, g, b] = self.background;
            gl.clear_color(r, g, b, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
            gl.enable(glow::DEPTH_TEST);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.use_program(Some(self.program));
            gl.uniform_matrix_4_f32_slice(self.uniforms.mvp.as_ref(), false, self.mvp.as_slice());

            for entry in frame.objects.iter().filter(|o| o.visible && o.opacity > 0.0) {
                let Some(obj) = self.objects.get(entry.id.0 as usize) else {
                    log::warn!("frame references unknown renderable {:?}", entry.id);
                    continue;
                };
                if obj.vertex_count == 0 {
                    continue;
                }
                if entry.clip_planes.len() > MAX_CLIP_PLANES {
                    log::warn!(
                        "{:?} has {} clip planes, only {MAX_CLIP_PLANES} are applied",
                        entry.id,
                        entry.clip_planes.len()
                    );
                }
                let planes: Vec<f32> = entry
                    .clip_planes
                    .iter()
                    .take(MAX_CLIP_PLANES)
                    .flatten()
                    .copied()
                    .collect();
                let plane_count = (planes.len() / 4) as i32;
                if plane_count > 0 {
                    gl.uniform_4_f32_slice(self.uniforms.planes.as_ref(), &planes);
                }
                gl.uniform_1_i32(self.uniforms.plane_count.as_ref(), plane_count);
                gl.uniform_1_f32(self.uniforms.opacity.as_ref(), entry.opacity);
                gl.uniform_1_f32(
                    self.uniforms.point_size.as_ref(),
                    entry.style.point_size.unwrap_or(2.0),
                );
                if obj.primitive == Primitive::Lines {
                    gl.line_width(entry.style.line_width.unwrap_or(1.0));
                }
                gl.depth_mask(entry.opacity >= 1.0);
                gl.bind_vertex_array(Some(obj.vao));
                gl.draw_arrays(obj.primitive.gl_mode(), 0, obj.vertex_count);
            }
            gl.depth_mask(true);
            gl.bind_vertex_array(None);
        }
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        let clamp = |v: u32| v.clamp(1, i32::MAX as u32) as i32;
        self.viewport = (clamp(width), clamp(height));
    }

    fn reset_camera(&mut self) {
        let bounds = self
            .objects
            .iter()
            .filter_map(|o| o.bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(Bounds { min: Point3::origin(), max: Point3::new(1.0, 1.0, 1.0) });
        log::info!("scene extents: {:?} .. {:?}", bounds.min, bounds.max);
        self.mvp = mvp(&bounds, self.aspect());
    }
}

unsafe fn compile_program(gl: &Context) -> Result<glow::Program> {
    let vertex_src = r#"#version 300 es
        precision highp float;
        uniform mat4 u_mvp;
        uniform float u_point_size;
        layout(location = 0) in vec3 a_pos;
        layout(location = 1) in vec3 a_col;
        out vec3 v_col;
        out vec3 v_world;
        void main() {
            v_col = a_col;
            v_world = a_pos;
            gl_PointSize = u_point_size;
            gl_Position = u_mvp * vec4(a_pos, 1.0);
        }"#;
    let fragment_src = format!(
        r#"#version 300 es
        precision highp float;
        uniform vec4 u_planes[{MAX_CLIP_PLANES}];
        uniform int u_plane_count;
        uniform float u_opacity;
        in vec3 v_col;
        in vec3 v_world;
        out vec4 o_col;
        void main() {{
            for (int i = 0; i < {MAX_CLIP_PLANES}; ++i) {{
                if (i >= u_plane_count) break;
                if (dot(u_planes[i].xyz, v_world) + u_planes[i].w < 0.0) discard;
            }}
            o_col = vec4(v_col, u_opacity);
        }}"#
    );

    unsafe {
        let program = gl.create_program().map_err(ViewerError::Render)?;
        let mut shaders = Vec::with_capacity(2);
        for (kind, src) in [(glow::VERTEX_SHADER, vertex_src), (glow::FRAGMENT_SHADER, fragment_src.as_str())] {
            let shader = gl.create_shader(kind).map_err(ViewerError::Render)?;
            gl.shader_source(shader, src);
            gl.compile_shader(shader);
            if !gl.get_shader_compile_status(shader) {
                return Err(ViewerError::Render(gl.get_shader_info_log(shader)));
            }
            gl.attach_shader(program, shader);
            shaders.push(shader);
        }
        gl.link_program(program);
        if !gl.get_program_link_status(program) {
            return Err(ViewerError::Render(gl.get_program_info_log(program)));
        }
        for shader in shaders {
            gl.detach_shader(program, shader);
            gl.delete_shader(shader);
        }
        Ok(program)
    }
}
