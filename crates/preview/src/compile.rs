//! Shader compilation helper.
//!
//! Wraps the driver's compile/link protocol so that every failure path
//! releases what it created and produces a non-empty diagnostic. Successful
//! results are owned wrappers that must be released through the driver that
//! created them.

use std::fmt;

use crate::driver::GraphicsDriver;
use crate::error::PreviewError;
use crate::types::ShaderStage;

/// A successfully compiled shader stage.
pub struct CompiledShader<D: GraphicsDriver> {
    handle: D::Shader,
    stage: ShaderStage,
}

impl<D: GraphicsDriver> CompiledShader<D> {
    pub fn handle(&self) -> D::Shader {
        self.handle
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn release(self, driver: &mut D) {
        driver.delete_shader(self.handle);
    }
}

impl<D: GraphicsDriver> fmt::Debug for CompiledShader<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledShader")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish()
    }
}

/// A successfully linked program.
pub struct LinkedProgram<D: GraphicsDriver> {
    handle: D::Program,
}

impl<D: GraphicsDriver> LinkedProgram<D> {
    pub fn handle(&self) -> D::Program {
        self.handle
    }

    pub fn release(self, driver: &mut D) {
        driver.delete_program(self.handle);
    }
}

impl<D: GraphicsDriver> fmt::Debug for LinkedProgram<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkedProgram")
            .field("handle", &self.handle)
            .finish()
    }
}

/// A linked program together with the two stages it was built from.
///
/// The stages stay alive for as long as the program does and are released
/// with it.
pub struct ProgramBuild<D: GraphicsDriver> {
    vertex: CompiledShader<D>,
    fragment: CompiledShader<D>,
    program: LinkedProgram<D>,
}

impl<D: GraphicsDriver> ProgramBuild<D> {
    pub fn program(&self) -> D::Program {
        self.program.handle()
    }

    pub fn vertex(&self) -> &CompiledShader<D> {
        &self.vertex
    }

    pub fn fragment(&self) -> &CompiledShader<D> {
        &self.fragment
    }

    pub fn release(self, driver: &mut D) {
        self.program.release(driver);
        self.vertex.release(driver);
        self.fragment.release(driver);
    }
}

impl<D: GraphicsDriver> fmt::Debug for ProgramBuild<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramBuild")
            .field("vertex", &self.vertex)
            .field("fragment", &self.fragment)
            .field("program", &self.program)
            .finish()
    }
}

/// Compiles one stage, returning the driver diagnostic on failure.
pub fn compile_stage<D: GraphicsDriver>(
    driver: &mut D,
    stage: ShaderStage,
    source: &str,
) -> Result<CompiledShader<D>, PreviewError> {
    let handle = submit_stage(driver, stage, source)?;
    finish_stage(driver, handle, stage)
}

/// Links two compiled stages. The stages are left untouched either way.
pub fn link_program<D: GraphicsDriver>(
    driver: &mut D,
    vertex: &CompiledShader<D>,
    fragment: &CompiledShader<D>,
) -> Result<LinkedProgram<D>, PreviewError> {
    let program = driver.create_program().map_err(PreviewError::Resource)?;
    driver.attach_shader(program, vertex.handle());
    driver.attach_shader(program, fragment.handle());
    driver.link_program(program);
    finish_link(driver, program)
}

/// Compiles both stages and links them, blocking on the driver.
///
/// When both stages fail the fragment diagnostic is reported first.
pub fn build_program<D: GraphicsDriver>(
    driver: &mut D,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramBuild<D>, PreviewError> {
    let vertex = compile_stage(driver, ShaderStage::Vertex, vertex_source);
    let fragment = compile_stage(driver, ShaderStage::Fragment, fragment_source);

    let (vertex, fragment) = match (vertex, fragment) {
        (Ok(vertex), Ok(fragment)) => (vertex, fragment),
        (Ok(vertex), Err(err)) => {
            vertex.release(driver);
            return Err(err);
        }
        (Err(err), Ok(fragment)) => {
            fragment.release(driver);
            return Err(err);
        }
        (Err(vertex_err), Err(fragment_err)) => {
            return Err(merge_stage_failures(fragment_err, vertex_err));
        }
    };

    match link_program(driver, &vertex, &fragment) {
        Ok(program) => Ok(ProgramBuild {
            vertex,
            fragment,
            program,
        }),
        Err(err) => {
            vertex.release(driver);
            fragment.release(driver);
            Err(err)
        }
    }
}

/// Result of polling a [`PendingBuild`].
pub enum BuildPoll<D: GraphicsDriver> {
    /// The driver is still compiling; poll again on a later frame.
    Pending(PendingBuild<D>),
    Ready(ProgramBuild<D>),
}

/// Compile + link submitted to the driver but not yet inspected.
///
/// Drivers exposing `KHR_parallel_shader_compile` finish the work in the
/// background; querying status early would block. [`PendingBuild::poll`]
/// only inspects results once [`GraphicsDriver::program_ready`] says so.
pub struct PendingBuild<D: GraphicsDriver> {
    vertex: D::Shader,
    fragment: D::Shader,
    program: D::Program,
}

impl<D: GraphicsDriver> PendingBuild<D> {
    /// Submits both stages and the link without waiting for the result.
    pub fn begin(
        driver: &mut D,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<Self, PreviewError> {
        let vertex = submit_stage(driver, ShaderStage::Vertex, vertex_source)?;
        let fragment = match submit_stage(driver, ShaderStage::Fragment, fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                driver.delete_shader(vertex);
                return Err(err);
            }
        };
        let program = match driver.create_program() {
            Ok(program) => program,
            Err(err) => {
                driver.delete_shader(vertex);
                driver.delete_shader(fragment);
                return Err(PreviewError::Resource(err));
            }
        };
        driver.attach_shader(program, vertex);
        driver.attach_shader(program, fragment);
        driver.link_program(program);

        Ok(Self {
            vertex,
            fragment,
            program,
        })
    }

    /// Checks whether the driver has finished. On failure every handle of
    /// the build has been released before the error is returned.
    pub fn poll(self, driver: &mut D) -> Result<BuildPoll<D>, PreviewError> {
        if !driver.program_ready(self.program) {
            return Ok(BuildPoll::Pending(self));
        }

        let vertex_ok = driver.shader_compile_status(self.vertex);
        let fragment_ok = driver.shader_compile_status(self.fragment);
        if !(vertex_ok && fragment_ok) {
            let err = if fragment_ok {
                stage_failure(driver, self.vertex, ShaderStage::Vertex)
            } else {
                let fragment = stage_failure(driver, self.fragment, ShaderStage::Fragment);
                if vertex_ok {
                    fragment
                } else {
                    let vertex = stage_failure(driver, self.vertex, ShaderStage::Vertex);
                    merge_stage_failures(fragment, vertex)
                }
            };
            self.abandon(driver);
            return Err(err);
        }

        if !driver.program_link_status(self.program) {
            let log = driver.program_info_log(self.program);
            self.abandon(driver);
            return Err(PreviewError::Link {
                log: non_empty_log(log, "program link"),
            });
        }

        Ok(BuildPoll::Ready(ProgramBuild {
            vertex: CompiledShader {
                handle: self.vertex,
                stage: ShaderStage::Vertex,
            },
            fragment: CompiledShader {
                handle: self.fragment,
                stage: ShaderStage::Fragment,
            },
            program: LinkedProgram {
                handle: self.program,
            },
        }))
    }

    /// Releases an in-flight build without inspecting it.
    pub fn abandon(self, driver: &mut D) {
        driver.delete_program(self.program);
        driver.delete_shader(self.vertex);
        driver.delete_shader(self.fragment);
    }
}

impl<D: GraphicsDriver> fmt::Debug for PendingBuild<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingBuild")
            .field("vertex", &self.vertex)
            .field("fragment", &self.fragment)
            .field("program", &self.program)
            .finish()
    }
}

fn submit_stage<D: GraphicsDriver>(
    driver: &mut D,
    stage: ShaderStage,
    source: &str,
) -> Result<D::Shader, PreviewError> {
    if source.trim().is_empty() {
        return Err(PreviewError::EmptySource);
    }
    let handle = driver.create_shader(stage).map_err(PreviewError::Resource)?;
    driver.shader_source(handle, source);
    driver.compile_shader(handle);
    Ok(handle)
}

fn finish_stage<D: GraphicsDriver>(
    driver: &mut D,
    handle: D::Shader,
    stage: ShaderStage,
) -> Result<CompiledShader<D>, PreviewError> {
    if driver.shader_compile_status(handle) {
        return Ok(CompiledShader { handle, stage });
    }
    let err = stage_failure(driver, handle, stage);
    driver.delete_shader(handle);
    Err(err)
}

fn finish_link<D: GraphicsDriver>(
    driver: &mut D,
    program: D::Program,
) -> Result<LinkedProgram<D>, PreviewError> {
    if driver.program_link_status(program) {
        return Ok(LinkedProgram { handle: program });
    }
    let log = driver.program_info_log(program);
    driver.delete_program(program);
    Err(PreviewError::Link {
        log: non_empty_log(log, "program link"),
    })
}

/// Reads the diagnostic of a failed stage. Does not release the handle.
fn stage_failure<D: GraphicsDriver>(
    driver: &mut D,
    handle: D::Shader,
    stage: ShaderStage,
) -> PreviewError {
    let log = driver.shader_info_log(handle);
    PreviewError::Compilation {
        stage,
        log: non_empty_log(log, &format!("{stage} shader compilation")),
    }
}

fn merge_stage_failures(fragment: PreviewError, vertex: PreviewError) -> PreviewError {
    let fragment_log = fragment.diagnostic().unwrap_or_default();
    let vertex_log = vertex.diagnostic().unwrap_or_default();
    PreviewError::Compilation {
        stage: ShaderStage::Fragment,
        log: format!("{fragment_log}\n\nvertex shader:\n{vertex_log}"),
    }
}

fn non_empty_log(log: String, what: &str) -> String {
    if log.trim().is_empty() {
        format!("{what} failed but the driver reported no diagnostic")
    } else {
        log.trim_end().to_string()
    }
}
