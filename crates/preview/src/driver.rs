//! The seam between the preview core and the graphics API.
//!
//! [`GraphicsDriver`] mirrors the small slice of OpenGL the preview needs:
//! the shader compile/link protocol, one vertex buffer + vertex array, a
//! handful of uniforms, and a triangle-list draw. [`GlowDriver`] implements it
//! on top of [`glow`]; tests use a recording fake.

use std::fmt;

use glow::HasContext;

use crate::format::ShaderDialect;
use crate::types::ShaderStage;

/// Driver-level operations used by the compilation helper and controller.
///
/// Handles are plain values owned by whoever created them; every `create_*`
/// must eventually be matched by the corresponding `delete_*`.
pub trait GraphicsDriver {
    type Shader: Copy + Eq + fmt::Debug;
    type Program: Copy + Eq + fmt::Debug;
    type Buffer: Copy + Eq + fmt::Debug;
    type VertexArray: Copy + Eq + fmt::Debug;
    type UniformLocation: Clone + fmt::Debug;

    /// GLSL dialect accepted by the context, when the driver knows it.
    fn dialect(&self) -> Option<ShaderDialect> {
        None
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: Self::Shader);
    fn shader_compile_status(&mut self, shader: Self::Shader) -> bool;
    fn shader_info_log(&mut self, shader: Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader);
    fn link_program(&mut self, program: Self::Program);
    /// Whether compile + link of `program` has finished. Drivers without
    /// parallel compilation always report `true`.
    fn program_ready(&mut self, _program: Self::Program) -> bool {
        true
    }
    fn program_link_status(&mut self, program: Self::Program) -> bool;
    fn program_info_log(&mut self, program: Self::Program) -> String;
    fn delete_program(&mut self, program: Self::Program);
    fn use_program(&mut self, program: Option<Self::Program>);

    fn attribute_location(&mut self, program: Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(
        &mut self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn set_uniform_f32(&mut self, location: &Self::UniformLocation, value: f32);
    fn set_uniform_vec2(&mut self, location: &Self::UniformLocation, value: [f32; 2]);

    fn create_buffer(&mut self) -> Result<Self::Buffer, String>;
    fn upload_vertices(&mut self, buffer: Self::Buffer, vertices: &[f32]);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn create_vertex_array(&mut self) -> Result<Self::VertexArray, String>;
    /// Binds `buffer` to attribute `location` of `vertex_array` as tightly
    /// packed `components`-wide float vectors.
    fn configure_vertex_array(
        &mut self,
        vertex_array: Self::VertexArray,
        buffer: Self::Buffer,
        location: u32,
        components: i32,
    );
    fn bind_vertex_array(&mut self, vertex_array: Option<Self::VertexArray>);
    fn delete_vertex_array(&mut self, vertex_array: Self::VertexArray);

    fn viewport(&mut self, width: i32, height: i32);
    fn clear(&mut self, color: [f32; 4]);
    fn draw_triangles(&mut self, vertex_count: i32);
}

/// [`GraphicsDriver`] backed by a [`glow::Context`].
pub struct GlowDriver {
    gl: glow::Context,
    dialect: ShaderDialect,
    parallel_compile: bool,
}

impl GlowDriver {
    /// Wraps a loaded GL context.
    ///
    /// # Safety
    ///
    /// The context behind `gl` must be current on the calling thread for as
    /// long as the driver is alive, and the driver must only be used from
    /// that thread.
    pub unsafe fn new(gl: glow::Context, dialect: ShaderDialect) -> Self {
        let parallel_compile = gl
            .supported_extensions()
            .iter()
            .any(|ext| ext.ends_with("_parallel_shader_compile"));
        tracing::debug!(?dialect, parallel_compile, "wrapped GL context");
        Self {
            gl,
            dialect,
            parallel_compile,
        }
    }
}

impl GraphicsDriver for GlowDriver {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type Buffer = glow::Buffer;
    type VertexArray = glow::VertexArray;
    type UniformLocation = glow::UniformLocation;

    fn dialect(&self) -> Option<ShaderDialect> {
        Some(self.dialect)
    }

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe { self.gl.create_shader(kind) }
    }

    fn shader_source(&mut self, shader: Self::Shader, source: &str) {
        unsafe { self.gl.shader_source(shader, source) }
    }

    fn compile_shader(&mut self, shader: Self::Shader) {
        unsafe { self.gl.compile_shader(shader) }
    }

    fn shader_compile_status(&mut self, shader: Self::Shader) -> bool {
        unsafe { self.gl.get_shader_compile_status(shader) }
    }

    fn shader_info_log(&mut self, shader: Self::Shader) -> String {
        unsafe { self.gl.get_shader_info_log(shader) }
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        unsafe { self.gl.delete_shader(shader) }
    }

    fn create_program(&mut self) -> Result<Self::Program, String> {
        unsafe { self.gl.create_program() }
    }

    fn attach_shader(&mut self, program: Self::Program, shader: Self::Shader) {
        unsafe { self.gl.attach_shader(program, shader) }
    }

    fn link_program(&mut self, program: Self::Program) {
        unsafe { self.gl.link_program(program) }
    }

    fn program_ready(&mut self, program: Self::Program) -> bool {
        if !self.parallel_compile {
            return true;
        }
        unsafe { self.gl.get_program_completion_status(program) }
    }

    fn program_link_status(&mut self, program: Self::Program) -> bool {
        unsafe { self.gl.get_program_link_status(program) }
    }

    fn program_info_log(&mut self, program: Self::Program) -> String {
        unsafe { self.gl.get_program_info_log(program) }
    }

    fn delete_program(&mut self, program: Self::Program) {
        unsafe { self.gl.delete_program(program) }
    }

    fn use_program(&mut self, program: Option<Self::Program>) {
        unsafe { self.gl.use_program(program) }
    }

    fn attribute_location(&mut self, program: Self::Program, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn uniform_location(
        &mut self,
        program: Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        unsafe { self.gl.get_uniform_location(program, name) }
    }

    fn set_uniform_f32(&mut self, location: &Self::UniformLocation, value: f32) {
        unsafe { self.gl.uniform_1_f32(Some(location), value) }
    }

    fn set_uniform_vec2(&mut self, location: &Self::UniformLocation, value: [f32; 2]) {
        unsafe { self.gl.uniform_2_f32(Some(location), value[0], value[1]) }
    }

    fn create_buffer(&mut self) -> Result<Self::Buffer, String> {
        unsafe { self.gl.create_buffer() }
    }

    fn upload_vertices(&mut self, buffer: Self::Buffer, vertices: &[f32]) {
        unsafe {
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        unsafe { self.gl.delete_buffer(buffer) }
    }

    fn create_vertex_array(&mut self) -> Result<Self::VertexArray, String> {
        unsafe { self.gl.create_vertex_array() }
    }

    fn configure_vertex_array(
        &mut self,
        vertex_array: Self::VertexArray,
        buffer: Self::Buffer,
        location: u32,
        components: i32,
    ) {
        unsafe {
            self.gl.bind_vertex_array(Some(vertex_array));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.gl.enable_vertex_attrib_array(location);
            self.gl
                .vertex_attrib_pointer_f32(location, components, glow::FLOAT, false, 0, 0);
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<Self::VertexArray>) {
        unsafe { self.gl.bind_vertex_array(vertex_array) }
    }

    fn delete_vertex_array(&mut self, vertex_array: Self::VertexArray) {
        unsafe { self.gl.delete_vertex_array(vertex_array) }
    }

    fn viewport(&mut self, width: i32, height: i32) {
        unsafe { self.gl.viewport(0, 0, width, height) }
    }

    fn clear(&mut self, color: [f32; 4]) {
        unsafe {
            self.gl.clear_color(color[0], color[1], color[2], color[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    fn draw_triangles(&mut self, vertex_count: i32) {
        unsafe { self.gl.draw_arrays(glow::TRIANGLES, 0, vertex_count) }
    }
}
