//! The top-level frame state machine.
//!
//! A [`RenderPipeline`] is an ordered list of [`Stage`]s. Executing it walks
//! the list once: each stage fires its pre-callback, runs the built-in pass
//! named by its [`PassId`] against a [`FrameTarget`], then fires its
//! post-callback. Post-processing stages replay a named
//! [`PostProcessingStack`] registered on the pipeline.
//!
//! Ordering between passes (shadows before solids, lighting before
//! post-processing) is a property of the stage list, not something the
//! executor enforces. [`RenderPipeline::deferred`] builds the usual order.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::PrismError;
use crate::renderer::pass_id::{Attachment, Pass, PassId};
use crate::renderer::postprocess::effect::{ColorSource, PostEffect};
use crate::renderer::postprocess::stack::PostProcessingStack;

/// Zero-argument hook run around a stage's pass.
pub type StageCallback = Box<dyn FnMut()>;

/// A post-processing stack shared between the host and the pipeline.
pub type SharedStack = Rc<RefCell<PostProcessingStack>>;

/// The operations a stage can trigger. [`DeferredRenderer`] implements this
/// for a real frame; tests drive the pipeline with a recording mock.
///
/// [`DeferredRenderer`]: crate::renderer::frame::DeferredRenderer
pub trait FrameTarget {
    /// Opaque geometry into the G-Buffer.
    fn draw_solid(&mut self);
    /// Skybox into the G-Buffer.
    fn draw_skybox(&mut self);
    /// Transparent geometry into the OIT accumulation targets.
    fn draw_transparent(&mut self);
    /// Deferred lighting into the lit attachment.
    fn draw_lighting(&mut self);
    /// Depth-only redraw per shadow-casting light.
    fn shadow_pass(&mut self);
    /// Clear every G-Buffer attachment.
    fn clear_g_buffer(&mut self);
    /// Copy one attachment into the post-processing buffer, which the next
    /// stack replay then reads first.
    fn copy_g_to_pp(&mut self, attachment: Attachment);
    /// Start a stack replay. Flushes any pending transparency resolve and
    /// returns where the first effect reads from.
    fn begin_post_processing(&mut self) -> ColorSource;
    /// Draw `effect` into the default target, reading `source`.
    fn apply_effect(&mut self, effect: &dyn PostEffect, source: ColorSource);
    /// Copy the default target into the post-processing buffer.
    fn copy_output_to_post_buffer(&mut self);
    /// Copy `source` unchanged into the default target.
    fn copy_to_output(&mut self, source: ColorSource);
}

/// One step of a [`RenderPipeline`].
pub struct Stage {
    name: String,
    pass: PassId,
    pre_callback: Option<StageCallback>,
    post_callback: Option<StageCallback>,
    stack_name: Option<String>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("name", &self.name)
            .field("pass", &self.pass)
            .field("pre_callback", &self.pre_callback.is_some())
            .field("post_callback", &self.post_callback.is_some())
            .field("stack_name", &self.stack_name)
            .finish()
    }
}

impl Stage {
    /// A stage running `pass` with no callbacks.
    pub fn new(name: impl Into<String>, pass: PassId) -> Self {
        Self {
            name: name.into(),
            pass,
            pre_callback: None,
            post_callback: None,
            stack_name: None,
        }
    }

    /// A post-processing stage replaying the stack registered as
    /// `stack_name`.
    pub fn post_processing(
        name: impl Into<String>,
        stack_name: impl Into<String>,
    ) -> Self {
        Self {
            stack_name: Some(stack_name.into()),
            ..Self::new(name, PassId::POST_PROCESSING)
        }
    }

    /// Run `callback` before the stage's pass.
    #[must_use]
    pub fn with_pre_callback(mut self, callback: impl FnMut() + 'static) -> Self {
        self.pre_callback = Some(Box::new(callback));
        self
    }

    /// Run `callback` after the stage's pass.
    #[must_use]
    pub fn with_post_callback(
        mut self,
        callback: impl FnMut() + 'static,
    ) -> Self {
        self.post_callback = Some(Box::new(callback));
        self
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pass identifier.
    pub fn pass(&self) -> PassId {
        self.pass
    }

    /// Change the pass identifier.
    pub fn set_pass(&mut self, pass: PassId) {
        self.pass = pass;
    }

    /// Name of the stack a post-processing stage replays.
    pub fn stack_name(&self) -> Option<&str> {
        self.stack_name.as_deref()
    }

    /// Replace or remove the pre-pass hook.
    pub fn set_pre_callback(&mut self, callback: Option<StageCallback>) {
        self.pre_callback = callback;
    }

    /// Replace or remove the post-pass hook.
    pub fn set_post_callback(&mut self, callback: Option<StageCallback>) {
        self.post_callback = callback;
    }

    fn is_post_processing(&self) -> bool {
        self.pass.decode() == Some(Pass::PostProcessing)
    }
}

/// Observable "is the pipeline executing" state. Clones share the flag, so
/// a callback can capture one and read it mid-frame.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFlag(Rc<Cell<bool>>);

impl ExecutionFlag {
    /// `true` only while [`RenderPipeline::execute`] runs.
    pub fn get(&self) -> bool {
        self.0.get()
    }
}

/// Clears the flag on drop, including during unwinding.
struct ExecutionGuard(ExecutionFlag);

impl ExecutionGuard {
    fn start(flag: &ExecutionFlag) -> Self {
        flag.0.set(true);
        Self(flag.clone())
    }
}

impl Drop for ExecutionGuard {
    fn drop(&mut self) {
        self.0 .0.set(false);
    }
}

/// Ordered stages plus the post-processing stacks they reference.
#[derive(Default)]
pub struct RenderPipeline {
    stages: Vec<Stage>,
    stacks: FxHashMap<String, SharedStack>,
    executing: ExecutionFlag,
}

impl fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stacks: Vec<&str> =
            self.stacks.keys().map(String::as_str).collect();
        stacks.sort_unstable();
        f.debug_struct("RenderPipeline")
            .field("stages", &self.stages)
            .field("stacks", &stacks)
            .field("executing", &self.executing.get())
            .finish()
    }
}

impl RenderPipeline {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard deferred frame: shadows, clear, solids, skybox,
    /// lighting, transparents, then the post-processing stack registered
    /// as `stack_name`.
    pub fn deferred(stack_name: &str) -> Self {
        let mut pipeline = Self::new();
        for (name, pass) in [
            ("shadows", PassId::SHADOWS),
            ("clear", PassId::CLEAR_G_BUFFER),
            ("solid", PassId::DRAW_SOLID),
            ("skybox", PassId::DRAW_SKYBOX),
            ("lighting", PassId::LIGHTING),
            ("transparent", PassId::DRAW_TRANSPARENT),
        ] {
            pipeline.set_stage(name, Stage::new(name, pass));
        }
        pipeline.set_stage(
            "post_processing",
            Stage::post_processing("post_processing", stack_name),
        );
        pipeline
    }

    /// Overwrite the stage called `name`, or append `stage` under that name.
    pub fn set_stage(&mut self, name: &str, mut stage: Stage) {
        name.clone_into(&mut stage.name);
        if let Some(existing) = self.stages.iter_mut().find(|s| s.name == name)
        {
            *existing = stage;
        } else {
            self.stages.push(stage);
        }
    }

    /// First stage called `name`.
    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Mutable access to the first stage called `name`.
    pub fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.name == name)
    }

    /// Stage at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end of the list.
    pub fn stage_at(&self, index: usize) -> Result<&Stage, PrismError> {
        self.stages.get(index).ok_or(PrismError::IndexOutOfRange {
            index,
            len: self.stages.len(),
        })
    }

    /// Every stage in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Register `stack` as `name`. If `stage` is given, that stage must be a
    /// post-processing stage and is pointed at `name`. Nothing changes on
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::StageNotFound`] if `stage` names no stage and
    /// [`PrismError::NotPostProcessingStage`] if it is not a
    /// post-processing stage.
    pub fn set_pp_stage_pps(
        &mut self,
        stage: Option<&str>,
        stack: SharedStack,
        name: &str,
    ) -> Result<(), PrismError> {
        if let Some(stage_name) = stage {
            let target = self
                .stages
                .iter_mut()
                .find(|s| s.name == stage_name)
                .ok_or_else(|| PrismError::StageNotFound(stage_name.to_owned()))?;
            if !target.is_post_processing() {
                return Err(PrismError::NotPostProcessingStage(
                    stage_name.to_owned(),
                ));
            }
            target.stack_name = Some(name.to_owned());
        }
        let _ = self.stacks.insert(name.to_owned(), stack);
        Ok(())
    }

    /// The stack the post-processing stage `stage` replays.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::StageNotFound`],
    /// [`PrismError::NotPostProcessingStage`], or
    /// [`PrismError::StackNotFound`] if the stage points at no registered
    /// stack.
    pub fn pp_stage_pps(&self, stage: &str) -> Result<SharedStack, PrismError> {
        let target = self
            .stage(stage)
            .ok_or_else(|| PrismError::StageNotFound(stage.to_owned()))?;
        if !target.is_post_processing() {
            return Err(PrismError::NotPostProcessingStage(stage.to_owned()));
        }
        let name = target.stack_name.as_deref().unwrap_or_default();
        self.stacks
            .get(name)
            .cloned()
            .ok_or_else(|| PrismError::StackNotFound(name.to_owned()))
    }

    /// Stack registered as `name`.
    pub fn stack(&self, name: &str) -> Option<&SharedStack> {
        self.stacks.get(name)
    }

    /// Unregister the stack called `name`. Stages still naming it are
    /// skipped with a warning.
    pub fn remove_stack(&mut self, name: &str) -> Option<SharedStack> {
        self.stacks.remove(name)
    }

    /// `true` only while [`Self::execute`] runs.
    pub fn is_executing(&self) -> bool {
        self.executing.get()
    }

    /// A handle that observes [`Self::is_executing`] from inside callbacks.
    pub fn execution_flag(&self) -> ExecutionFlag {
        self.executing.clone()
    }

    /// Run every stage once, in order, against `frame`.
    pub fn execute<F: FrameTarget + ?Sized>(&mut self, frame: &mut F) {
        let _guard = ExecutionGuard::start(&self.executing);
        for stage in &mut self.stages {
            if let Some(callback) = stage.pre_callback.as_mut() {
                callback();
            }
            match stage.pass.decode() {
                Some(pass) => run_pass(
                    pass,
                    &stage.name,
                    stage.stack_name.as_deref(),
                    &self.stacks,
                    frame,
                ),
                None => log::warn!(
                    "stage '{}': unrecognised pass id {:?}, running as NONE",
                    stage.name,
                    stage.pass
                ),
            }
            if let Some(callback) = stage.post_callback.as_mut() {
                callback();
            }
        }
    }
}

fn run_pass<F: FrameTarget + ?Sized>(
    pass: Pass,
    stage_name: &str,
    stack_name: Option<&str>,
    stacks: &FxHashMap<String, SharedStack>,
    frame: &mut F,
) {
    match pass {
        Pass::None => {}
        Pass::DrawSolid => frame.draw_solid(),
        Pass::DrawSkybox => frame.draw_skybox(),
        Pass::DrawTransparent => frame.draw_transparent(),
        Pass::Lighting => frame.draw_lighting(),
        Pass::Shadows => frame.shadow_pass(),
        Pass::ClearGBuffer => frame.clear_g_buffer(),
        Pass::CopyGToPp(attachment) => frame.copy_g_to_pp(attachment),
        Pass::PostProcessing => {
            let stack = stack_name.and_then(|name| stacks.get(name));
            let Some(stack) = stack else {
                log::warn!(
                    "stage '{stage_name}': no post-processing stack named \
                     {stack_name:?}, skipped"
                );
                return;
            };
            replay(stage_name, stack, frame);
        }
    }
}

/// Replay a stack. The first effect reads the lit output (or a primed post
/// buffer), every later one the previous effect's output, copied out of the
/// default target so no texture is read and written in one pass. An empty
/// stack still copies its source to the default target once.
fn replay<F: FrameTarget + ?Sized>(
    stage_name: &str,
    stack: &SharedStack,
    frame: &mut F,
) {
    let effects = match stack.try_borrow() {
        Ok(stack) => stack.snapshot(),
        Err(_) => {
            log::warn!(
                "stage '{stage_name}': stack is mutably borrowed, skipped"
            );
            return;
        }
    };

    let mut source = frame.begin_post_processing();
    if effects.is_empty() {
        frame.copy_to_output(source);
        return;
    }
    for effect in &effects {
        let shader = effect.resolve(source);
        frame.apply_effect(shader.as_ref(), source);
        frame.copy_output_to_post_buffer();
        source = ColorSource::PostProcessBuffer;
    }
    log::debug!("stage '{stage_name}': replayed {} effects", effects.len());
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use super::*;
    use crate::renderer::postprocess::effect::ShaderHandle;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Named(String);

    impl PostEffect for Named {
        fn label(&self) -> &str {
            &self.0
        }

        fn encode(&self, _pass: &mut wgpu::RenderPass<'_>) {}
    }

    fn shader(name: &str) -> ShaderHandle {
        Rc::new(Named(name.to_owned()))
    }

    /// Records every call; `begin_post_processing` reports a primed buffer
    /// after `copy_g_to_pp`.
    struct Recorder {
        log: Log,
        primed: bool,
    }

    impl Recorder {
        fn new(log: &Log) -> Self {
            Self {
                log: Rc::clone(log),
                primed: false,
            }
        }

        fn push(&self, event: impl Into<String>) {
            self.log.borrow_mut().push(event.into());
        }
    }

    impl FrameTarget for Recorder {
        fn draw_solid(&mut self) {
            self.push("solid");
        }

        fn draw_skybox(&mut self) {
            self.push("skybox");
        }

        fn draw_transparent(&mut self) {
            self.push("transparent");
        }

        fn draw_lighting(&mut self) {
            self.push("lighting");
        }

        fn shadow_pass(&mut self) {
            self.push("shadows");
        }

        fn clear_g_buffer(&mut self) {
            self.push("clear");
        }

        fn copy_g_to_pp(&mut self, attachment: Attachment) {
            self.primed = true;
            self.push(format!("copy {}", attachment.label()));
        }

        fn begin_post_processing(&mut self) -> ColorSource {
            self.push("begin pp");
            if std::mem::take(&mut self.primed) {
                ColorSource::PostProcessBuffer
            } else {
                ColorSource::LitOutput
            }
        }

        fn apply_effect(&mut self, effect: &dyn PostEffect, source: ColorSource) {
            self.push(format!("apply {} <- {source:?}", effect.label()));
        }

        fn copy_output_to_post_buffer(&mut self) {
            self.push("store");
        }

        fn copy_to_output(&mut self, source: ColorSource) {
            self.push(format!("output <- {source:?}"));
        }
    }

    fn logger(log: &Log, event: &'static str) -> impl FnMut() + 'static {
        let log = Rc::clone(log);
        move || log.borrow_mut().push(event.to_owned())
    }

    fn shared(stack: PostProcessingStack) -> SharedStack {
        Rc::new(RefCell::new(stack))
    }

    fn run(pipeline: &mut RenderPipeline) -> Vec<String> {
        let log = Log::default();
        pipeline.execute(&mut Recorder::new(&log));
        log.take()
    }

    #[test]
    fn deferred_preset_orders_the_frame() {
        let mut pipeline = RenderPipeline::deferred("main");
        pipeline
            .set_pp_stage_pps(
                Some("post_processing"),
                shared(PostProcessingStack::new()),
                "main",
            )
            .unwrap();
        assert_eq!(
            run(&mut pipeline),
            [
                "shadows",
                "clear",
                "solid",
                "skybox",
                "lighting",
                "transparent",
                "begin pp",
                "output <- LitOutput",
            ]
        );
    }

    #[test]
    fn callbacks_wrap_their_pass() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage(
            "solid",
            Stage::new("", PassId::DRAW_SOLID)
                .with_pre_callback(logger(&log, "pre solid"))
                .with_post_callback(logger(&log, "post solid")),
        );
        pipeline.set_stage(
            "hook",
            Stage::new("", PassId::NONE)
                .with_post_callback(logger(&log, "hook")),
        );
        pipeline.execute(&mut Recorder::new(&log));
        assert_eq!(log.take(), ["pre solid", "solid", "post solid", "hook"]);
    }

    #[test]
    fn executing_flag_is_set_only_during_execute() {
        let mut pipeline = RenderPipeline::new();
        let flag = pipeline.execution_flag();
        let seen = Rc::new(Cell::new(false));
        let seen_in_callback = Rc::clone(&seen);
        pipeline.set_stage(
            "probe",
            Stage::new("probe", PassId::NONE)
                .with_pre_callback(move || seen_in_callback.set(flag.get())),
        );

        assert!(!pipeline.is_executing());
        let _ = run(&mut pipeline);
        assert!(seen.get());
        assert!(!pipeline.is_executing());
    }

    #[test]
    fn executing_flag_clears_when_a_callback_panics() {
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage(
            "boom",
            Stage::new("boom", PassId::NONE)
                .with_pre_callback(|| std::panic::panic_any("callback failed")),
        );
        let result = catch_unwind(AssertUnwindSafe(|| run(&mut pipeline)));
        assert!(result.is_err());
        assert!(!pipeline.is_executing());
    }

    #[test]
    fn empty_stack_copies_lit_output_exactly_once() {
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage("pp", Stage::post_processing("pp", "empty"));
        pipeline
            .set_pp_stage_pps(None, shared(PostProcessingStack::new()), "empty")
            .unwrap();
        let log = run(&mut pipeline);
        assert_eq!(log, ["begin pp", "output <- LitOutput"]);
    }

    #[test]
    fn replay_chains_through_the_post_buffer() {
        let mut stack = PostProcessingStack::new();
        let _ = stack.add_shader_stage(shader("a"), "first");
        let _ = stack.add_function_stage(
            |source| match source {
                ColorSource::LitOutput => shader("from-lit"),
                ColorSource::PostProcessBuffer => shader("from-buffer"),
            },
            "second",
        );
        let _ = stack.add_shader_stage(shader("c"), "third");

        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage("pp", Stage::post_processing("pp", "fx"));
        pipeline.set_pp_stage_pps(None, shared(stack), "fx").unwrap();

        assert_eq!(
            run(&mut pipeline),
            [
                "begin pp",
                "apply a <- LitOutput",
                "store",
                "apply from-buffer <- PostProcessBuffer",
                "store",
                "apply c <- PostProcessBuffer",
                "store",
            ]
        );
    }

    #[test]
    fn copy_g_to_pp_primes_the_next_replay() {
        let mut stack = PostProcessingStack::new();
        let _ = stack.add_shader_stage(shader("view"), "view");
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage(
            "copy",
            Stage::new("copy", PassId::COPY_G_TO_PP | Attachment::Normal),
        );
        pipeline.set_stage("pp", Stage::post_processing("pp", "fx"));
        pipeline.set_pp_stage_pps(None, shared(stack), "fx").unwrap();

        assert_eq!(
            run(&mut pipeline),
            [
                "copy Normal",
                "begin pp",
                "apply view <- PostProcessBuffer",
                "store",
            ]
        );
    }

    #[test]
    fn unknown_pass_ids_degrade_to_none() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage(
            "bare copy",
            Stage::new("", PassId::COPY_G_TO_PP)
                .with_pre_callback(logger(&log, "pre copy")),
        );
        pipeline.set_stage(
            "garbage",
            Stage::new("", PassId::from_raw(0x42))
                .with_post_callback(logger(&log, "post garbage")),
        );
        pipeline.set_stage(
            "two attachments",
            Stage::new(
                "",
                PassId::COPY_G_TO_PP | Attachment::Albedo | Attachment::Lit,
            ),
        );
        pipeline.set_stage("solid", Stage::new("", PassId::DRAW_SOLID));

        pipeline.execute(&mut Recorder::new(&log));
        assert_eq!(log.take(), ["pre copy", "post garbage", "solid"]);
    }

    #[test]
    fn missing_stack_skips_the_replay_but_not_callbacks() {
        let log = Log::default();
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage(
            "pp",
            Stage::post_processing("pp", "nowhere")
                .with_post_callback(logger(&log, "post pp")),
        );
        pipeline.set_stage("lighting", Stage::new("", PassId::LIGHTING));
        pipeline.execute(&mut Recorder::new(&log));
        assert_eq!(log.take(), ["post pp", "lighting"]);
    }

    #[test]
    fn stack_registration_validates_the_stage() {
        let mut pipeline = RenderPipeline::deferred("main");
        let stack = shared(PostProcessingStack::new());

        assert!(matches!(
            pipeline.set_pp_stage_pps(Some("solid"), Rc::clone(&stack), "x"),
            Err(PrismError::NotPostProcessingStage(_))
        ));
        assert!(matches!(
            pipeline.set_pp_stage_pps(Some("nope"), Rc::clone(&stack), "x"),
            Err(PrismError::StageNotFound(_))
        ));
        assert!(pipeline.stack("x").is_none());
        assert_eq!(pipeline.stage("solid").unwrap().stack_name(), None);

        assert!(matches!(
            pipeline.pp_stage_pps("post_processing"),
            Err(PrismError::StackNotFound(_))
        ));
        assert!(matches!(
            pipeline.pp_stage_pps("lighting"),
            Err(PrismError::NotPostProcessingStage(_))
        ));

        pipeline
            .set_pp_stage_pps(Some("post_processing"), Rc::clone(&stack), "x")
            .unwrap();
        assert_eq!(
            pipeline.stage("post_processing").unwrap().stack_name(),
            Some("x")
        );
        assert!(Rc::ptr_eq(
            &pipeline.pp_stage_pps("post_processing").unwrap(),
            &stack
        ));
    }

    #[test]
    fn set_stage_overwrites_in_place_or_appends() {
        let mut pipeline = RenderPipeline::deferred("main");
        let count = pipeline.stage_count();

        pipeline.set_stage("skybox", Stage::new("ignored", PassId::NONE));
        assert_eq!(pipeline.stage_count(), count);
        let skybox = pipeline.stage_at(3).unwrap();
        assert_eq!(skybox.name(), "skybox");
        assert_eq!(skybox.pass(), PassId::NONE);

        pipeline.set_stage("overlay", Stage::new("renamed", PassId::DRAW_SOLID));
        assert_eq!(pipeline.stage_count(), count + 1);
        assert_eq!(pipeline.stage_at(count).unwrap().name(), "overlay");
        assert!(pipeline.stage("renamed").is_none());

        assert!(matches!(
            pipeline.stage_at(count + 1),
            Err(PrismError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn function_effect_may_edit_its_own_stack() {
        let stack = shared(PostProcessingStack::new());
        let weak = Rc::downgrade(&stack);
        let grown = Rc::new(Cell::new(false));
        let _ = stack.borrow_mut().add_function_stage(
            move |_| {
                if !grown.replace(true) {
                    if let Some(stack) = weak.upgrade() {
                        let _ = stack
                            .borrow_mut()
                            .add_shader_stage(shader("late"), "late");
                    }
                }
                shader("grow")
            },
            "grow",
        );

        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage("pp", Stage::post_processing("pp", "fx"));
        pipeline.set_pp_stage_pps(None, Rc::clone(&stack), "fx").unwrap();

        assert_eq!(
            run(&mut pipeline),
            ["begin pp", "apply grow <- LitOutput", "store"]
        );
        assert_eq!(
            run(&mut pipeline),
            [
                "begin pp",
                "apply grow <- LitOutput",
                "store",
                "apply late <- PostProcessBuffer",
                "store",
            ]
        );
    }

    #[test]
    fn borrowed_stack_is_skipped() {
        let stack = shared(PostProcessingStack::new());
        let mut pipeline = RenderPipeline::new();
        pipeline.set_stage("pp", Stage::post_processing("pp", "fx"));
        pipeline.set_pp_stage_pps(None, Rc::clone(&stack), "fx").unwrap();

        let _held = stack.borrow_mut();
        assert!(run(&mut pipeline).is_empty());
    }
}
