//! Recording fakes for the driver, scheduler and drawable seams.
//!
//! The fake driver "compiles" a shader by checking that its braces balance,
//! which is enough to exercise every success and failure path of the
//! controller without a GPU.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::controller::Drawable;
use crate::driver::GraphicsDriver;
use crate::schedule::{CancellationToken, FrameRequestId, FrameScheduler};
use crate::types::{ShaderStage, SurfaceSize};

#[derive(Debug)]
struct FakeShader {
    stage: ShaderStage,
    source: String,
    compiled: Option<bool>,
}

#[derive(Debug, Default)]
struct FakeProgram {
    attached: Vec<u32>,
    linked: Option<bool>,
    log: String,
    polls_remaining: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    pub program: u32,
    pub vertex_array: u32,
    pub vertex_count: i32,
    pub time: Option<f32>,
    pub resolution: Option<[f32; 2]>,
}

#[derive(Debug, Default)]
struct FakeGpu {
    next_handle: u32,
    shaders: BTreeMap<u32, FakeShader>,
    programs: BTreeMap<u32, FakeProgram>,
    buffers: BTreeSet<u32>,
    vertex_arrays: BTreeSet<u32>,
    created_shaders: usize,
    compiled: Vec<(ShaderStage, String)>,
    uploads: Vec<Vec<f32>>,
    current_program: Option<u32>,
    bound_vertex_array: Option<u32>,
    time: Option<f32>,
    resolution: Option<[f32; 2]>,
    draws: Vec<DrawRecord>,
    clears: usize,
    viewports: Vec<(i32, i32)>,
    invalid_uses: usize,
    silent_logs: bool,
    next_link_failure: Option<String>,
    parallel_polls: u32,
}

impl FakeGpu {
    fn allocate(&mut self) -> u32 {
        self.next_handle += 1;
        self.next_handle
    }
}

/// In-memory [`GraphicsDriver`]. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    gpu: Rc<RefCell<FakeGpu>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every failing compile/link report an empty info log.
    pub fn silence_logs(&self) {
        self.gpu.borrow_mut().silent_logs = true;
    }

    pub fn fail_next_link(&self, log: &str) {
        self.gpu.borrow_mut().next_link_failure = Some(log.to_string());
    }

    /// Number of `program_ready` polls that report "still compiling" for
    /// each new program.
    pub fn set_parallel_polls(&self, polls: u32) {
        self.gpu.borrow_mut().parallel_polls = polls;
    }

    pub fn live_shaders(&self) -> usize {
        self.gpu.borrow().shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.gpu.borrow().programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.gpu.borrow().buffers.len()
    }

    pub fn live_vertex_arrays(&self) -> usize {
        self.gpu.borrow().vertex_arrays.len()
    }

    /// Total number of live driver objects of any kind.
    pub fn live_handles(&self) -> usize {
        self.live_shaders() + self.live_programs() + self.live_buffers() + self.live_vertex_arrays()
    }

    pub fn created_shaders(&self) -> usize {
        self.gpu.borrow().created_shaders
    }

    /// Sources handed to `compile_shader` for `stage`, in order.
    pub fn compiled_sources(&self, stage: ShaderStage) -> Vec<String> {
        self.gpu
            .borrow()
            .compiled
            .iter()
            .filter(|(compiled_stage, _)| *compiled_stage == stage)
            .map(|(_, source)| source.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<Vec<f32>> {
        self.gpu.borrow().uploads.clone()
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.gpu.borrow().draws.clone()
    }

    pub fn clears(&self) -> usize {
        self.gpu.borrow().clears
    }

    pub fn viewports(&self) -> Vec<(i32, i32)> {
        self.gpu.borrow().viewports.clone()
    }

    /// Calls that referenced a handle which was never created or already
    /// deleted.
    pub fn invalid_uses(&self) -> usize {
        self.gpu.borrow().invalid_uses
    }

    fn with_gpu<R>(&self, f: impl FnOnce(&mut FakeGpu) -> R) -> R {
        f(&mut self.gpu.borrow_mut())
    }
}

fn braces_balance(source: &str) -> bool {
    let mut depth: i64 = 0;
    for ch in source.chars() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

impl GraphicsDriver for FakeDriver {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type VertexArray = u32;
    type UniformLocation = String;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<u32, String> {
        self.with_gpu(|gpu| {
            let handle = gpu.allocate();
            gpu.created_shaders += 1;
            gpu.shaders.insert(
                handle,
                FakeShader {
                    stage,
                    source: String::new(),
                    compiled: None,
                },
            );
            Ok(handle)
        })
    }

    fn shader_source(&mut self, shader: u32, source: &str) {
        self.with_gpu(|gpu| match gpu.shaders.get_mut(&shader) {
            Some(entry) => entry.source = source.to_string(),
            None => gpu.invalid_uses += 1,
        })
    }

    fn compile_shader(&mut self, shader: u32) {
        self.with_gpu(|gpu| match gpu.shaders.get_mut(&shader) {
            Some(entry) => {
                entry.compiled = Some(braces_balance(&entry.source));
                gpu.compiled.push((entry.stage, entry.source.clone()));
            }
            None => gpu.invalid_uses += 1,
        })
    }

    fn shader_compile_status(&mut self, shader: u32) -> bool {
        self.with_gpu(|gpu| match gpu.shaders.get(&shader) {
            Some(entry) => entry.compiled == Some(true),
            None => {
                gpu.invalid_uses += 1;
                false
            }
        })
    }

    fn shader_info_log(&mut self, shader: u32) -> String {
        self.with_gpu(|gpu| match gpu.shaders.get(&shader) {
            Some(entry) if entry.compiled == Some(false) && !gpu.silent_logs => {
                "ERROR: 0:1: '{' : syntax error: unbalanced braces\n".to_string()
            }
            Some(_) => String::new(),
            None => {
                gpu.invalid_uses += 1;
                String::new()
            }
        })
    }

    fn delete_shader(&mut self, shader: u32) {
        self.with_gpu(|gpu| {
            if gpu.shaders.remove(&shader).is_none() {
                gpu.invalid_uses += 1;
            }
        })
    }

    fn create_program(&mut self) -> Result<u32, String> {
        self.with_gpu(|gpu| {
            let handle = gpu.allocate();
            let polls_remaining = gpu.parallel_polls;
            gpu.programs.insert(
                handle,
                FakeProgram {
                    polls_remaining,
                    ..FakeProgram::default()
                },
            );
            Ok(handle)
        })
    }

    fn attach_shader(&mut self, program: u32, shader: u32) {
        self.with_gpu(|gpu| {
            if !gpu.shaders.contains_key(&shader) {
                gpu.invalid_uses += 1;
                return;
            }
            match gpu.programs.get_mut(&program) {
                Some(entry) => entry.attached.push(shader),
                None => gpu.invalid_uses += 1,
            }
        })
    }

    fn link_program(&mut self, program: u32) {
        self.with_gpu(|gpu| {
            let stages_ok = match gpu.programs.get(&program) {
                Some(entry) => entry.attached.iter().all(|shader| {
                    gpu.shaders
                        .get(shader)
                        .is_some_and(|s| s.compiled == Some(true))
                }),
                None => {
                    gpu.invalid_uses += 1;
                    return;
                }
            };
            let forced = if stages_ok {
                gpu.next_link_failure.take()
            } else {
                None
            };
            let silent = gpu.silent_logs;
            if let Some(entry) = gpu.programs.get_mut(&program) {
                match (stages_ok, forced) {
                    (true, None) => entry.linked = Some(true),
                    (true, Some(log)) => {
                        entry.linked = Some(false);
                        entry.log = if silent { String::new() } else { log };
                    }
                    (false, _) => {
                        entry.linked = Some(false);
                        if !silent {
                            entry.log =
                                "ERROR: one or more attached shaders not successfully compiled"
                                    .to_string();
                        }
                    }
                }
            }
        })
    }

    fn program_ready(&mut self, program: u32) -> bool {
        self.with_gpu(|gpu| match gpu.programs.get_mut(&program) {
            Some(entry) if entry.polls_remaining > 0 => {
                entry.polls_remaining -= 1;
                false
            }
            Some(_) => true,
            None => {
                gpu.invalid_uses += 1;
                true
            }
        })
    }

    fn program_link_status(&mut self, program: u32) -> bool {
        self.with_gpu(|gpu| match gpu.programs.get(&program) {
            Some(entry) => entry.linked == Some(true),
            None => {
                gpu.invalid_uses += 1;
                false
            }
        })
    }

    fn program_info_log(&mut self, program: u32) -> String {
        self.with_gpu(|gpu| match gpu.programs.get(&program) {
            Some(entry) => entry.log.clone(),
            None => {
                gpu.invalid_uses += 1;
                String::new()
            }
        })
    }

    fn delete_program(&mut self, program: u32) {
        self.with_gpu(|gpu| {
            if gpu.programs.remove(&program).is_none() {
                gpu.invalid_uses += 1;
            }
            if gpu.current_program == Some(program) {
                gpu.current_program = None;
            }
        })
    }

    fn use_program(&mut self, program: Option<u32>) {
        self.with_gpu(|gpu| {
            if let Some(handle) = program {
                if !gpu.programs.contains_key(&handle) {
                    gpu.invalid_uses += 1;
                }
            }
            gpu.current_program = program;
        })
    }

    fn attribute_location(&mut self, program: u32, name: &str) -> Option<u32> {
        self.with_gpu(|gpu| match gpu.programs.get(&program) {
            Some(entry) if entry.linked == Some(true) && name == "position" => Some(0),
            Some(_) => None,
            None => {
                gpu.invalid_uses += 1;
                None
            }
        })
    }

    fn uniform_location(&mut self, program: u32, name: &str) -> Option<String> {
        self.with_gpu(|gpu| match gpu.programs.get(&program) {
            Some(entry)
                if entry.linked == Some(true)
                    && matches!(name, "time" | "resolution" | "pointer") =>
            {
                Some(name.to_string())
            }
            Some(_) => None,
            None => {
                gpu.invalid_uses += 1;
                None
            }
        })
    }

    fn set_uniform_f32(&mut self, location: &String, value: f32) {
        self.with_gpu(|gpu| {
            if gpu.current_program.is_none() {
                gpu.invalid_uses += 1;
            }
            if location == "time" {
                gpu.time = Some(value);
            }
        })
    }

    fn set_uniform_vec2(&mut self, location: &String, value: [f32; 2]) {
        self.with_gpu(|gpu| {
            if gpu.current_program.is_none() {
                gpu.invalid_uses += 1;
            }
            if location == "resolution" {
                gpu.resolution = Some(value);
            }
        })
    }

    fn create_buffer(&mut self) -> Result<u32, String> {
        self.with_gpu(|gpu| {
            let handle = gpu.allocate();
            gpu.buffers.insert(handle);
            Ok(handle)
        })
    }

    fn upload_vertices(&mut self, buffer: u32, vertices: &[f32]) {
        self.with_gpu(|gpu| {
            if !gpu.buffers.contains(&buffer) {
                gpu.invalid_uses += 1;
            }
            gpu.uploads.push(vertices.to_vec());
        })
    }

    fn delete_buffer(&mut self, buffer: u32) {
        self.with_gpu(|gpu| {
            if !gpu.buffers.remove(&buffer) {
                gpu.invalid_uses += 1;
            }
        })
    }

    fn create_vertex_array(&mut self) -> Result<u32, String> {
        self.with_gpu(|gpu| {
            let handle = gpu.allocate();
            gpu.vertex_arrays.insert(handle);
            Ok(handle)
        })
    }

    fn configure_vertex_array(&mut self, vertex_array: u32, buffer: u32, _location: u32, _components: i32) {
        self.with_gpu(|gpu| {
            if !gpu.vertex_arrays.contains(&vertex_array) || !gpu.buffers.contains(&buffer) {
                gpu.invalid_uses += 1;
            }
        })
    }

    fn bind_vertex_array(&mut self, vertex_array: Option<u32>) {
        self.with_gpu(|gpu| {
            if let Some(handle) = vertex_array {
                if !gpu.vertex_arrays.contains(&handle) {
                    gpu.invalid_uses += 1;
                }
            }
            gpu.bound_vertex_array = vertex_array;
        })
    }

    fn delete_vertex_array(&mut self, vertex_array: u32) {
        self.with_gpu(|gpu| {
            if !gpu.vertex_arrays.remove(&vertex_array) {
                gpu.invalid_uses += 1;
            }
            if gpu.bound_vertex_array == Some(vertex_array) {
                gpu.bound_vertex_array = None;
            }
        })
    }

    fn viewport(&mut self, width: i32, height: i32) {
        self.with_gpu(|gpu| gpu.viewports.push((width, height)))
    }

    fn clear(&mut self, _color: [f32; 4]) {
        self.with_gpu(|gpu| gpu.clears += 1)
    }

    fn draw_triangles(&mut self, vertex_count: i32) {
        self.with_gpu(|gpu| {
            let (Some(program), Some(vertex_array)) = (gpu.current_program, gpu.bound_vertex_array)
            else {
                gpu.invalid_uses += 1;
                return;
            };
            let record = DrawRecord {
                program,
                vertex_array,
                vertex_count,
                time: gpu.time,
                resolution: gpu.resolution,
            };
            gpu.draws.push(record);
        })
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next_id: u64,
    pending: Vec<(FrameRequestId, CancellationToken)>,
    requested: usize,
    revoked: usize,
}

/// Scheduler that queues requests until the test pumps them.
#[derive(Debug, Clone, Default)]
pub struct FakeScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl FakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of frame requests ever made.
    pub fn requested(&self) -> usize {
        self.state.borrow().requested
    }

    pub fn revoked(&self) -> usize {
        self.state.borrow().revoked
    }

    /// Requests still queued, including ones whose token was cancelled.
    pub fn queued(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Drains the queue the way a host would at a frame boundary, dropping
    /// callbacks whose token has been cancelled.
    pub fn due(&self) -> Vec<FrameRequestId> {
        let drained: Vec<_> = self.state.borrow_mut().pending.drain(..).collect();
        drained
            .into_iter()
            .filter(|(_, token)| !token.is_cancelled())
            .map(|(id, _)| id)
            .collect()
    }
}

impl FrameScheduler for FakeScheduler {
    fn request_frame(&mut self, token: CancellationToken) -> FrameRequestId {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.requested += 1;
        let id = FrameRequestId::from_raw(state.next_id);
        state.pending.push((id, token));
        id
    }

    fn cancel_frame(&mut self, id: FrameRequestId) {
        let mut state = self.state.borrow_mut();
        let before = state.pending.len();
        state.pending.retain(|(pending, _)| *pending != id);
        if state.pending.len() != before {
            state.revoked += 1;
        }
    }
}

/// Drawable that hands out clones of one fake driver, or nothing at all.
#[derive(Debug)]
pub struct FakeDrawable {
    driver: Option<FakeDriver>,
    size: SurfaceSize,
    acquisitions: usize,
}

impl FakeDrawable {
    pub fn new(driver: FakeDriver) -> Self {
        Self {
            driver: Some(driver),
            size: SurfaceSize::new(640, 480),
            acquisitions: 0,
        }
    }

    pub fn without_context() -> Self {
        Self {
            driver: None,
            size: SurfaceSize::new(640, 480),
            acquisitions: 0,
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }
}

impl Drawable for FakeDrawable {
    type Driver = FakeDriver;

    fn acquire(&mut self) -> Result<FakeDriver, String> {
        self.acquisitions += 1;
        self.driver
            .clone()
            .ok_or_else(|| "no OpenGL ES 3.0 context available".to_string())
    }

    fn size(&self) -> SurfaceSize {
        self.size
    }
}
