//! Ordered, named post-processing stages.
//!
//! A stack keeps two pools, one of shader handles and one of effect
//! functions, and an ordered stage list whose entries point into them. Pools
//! are compacted whenever a stage stops referencing an entry, and every
//! remaining stage of the same kind is re-indexed so it keeps resolving to
//! the same effect.

use std::fmt;
use std::rc::Rc;

use crate::error::PrismError;
use crate::renderer::postprocess::effect::{
    ColorSource, EffectFn, ShaderHandle,
};

/// Which pool a stage draws from, and where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSlot {
    /// Index into the shader pool.
    Shader(usize),
    /// Index into the function pool.
    Function(usize),
}

impl PoolSlot {
    /// Index into the stage's pool.
    pub const fn index(self) -> usize {
        match self {
            Self::Shader(i) | Self::Function(i) => i,
        }
    }

    /// `true` for function-backed stages.
    pub const fn is_function(self) -> bool {
        matches!(self, Self::Function(_))
    }

    /// Slot after removing entry `removed` from a pool: same-kind slots past
    /// it move down by one.
    const fn after_removal(self, removed: Self) -> Self {
        match (self, removed) {
            (Self::Shader(i), Self::Shader(r)) if i > r => Self::Shader(i - 1),
            (Self::Function(i), Self::Function(r)) if i > r => {
                Self::Function(i - 1)
            }
            _ => self,
        }
    }
}

/// A named entry of a [`PostProcessingStack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessingStage {
    name: String,
    slot: PoolSlot,
}

impl PostProcessingStage {
    /// Stage name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pool and index the stage resolves through.
    pub fn slot(&self) -> PoolSlot {
        self.slot
    }

    /// Index into the stage's pool.
    pub fn pool_index(&self) -> usize {
        self.slot.index()
    }

    /// `true` for function-backed stages.
    pub fn is_function(&self) -> bool {
        self.slot.is_function()
    }
}

/// What a stage resolves to at replay time.
#[derive(Clone)]
pub(crate) enum StageEffect {
    Shader(ShaderHandle),
    Function(EffectFn),
}

impl StageEffect {
    /// The effect to draw when fed from `source`.
    pub(crate) fn resolve(&self, source: ColorSource) -> ShaderHandle {
        match self {
            Self::Shader(shader) => Rc::clone(shader),
            Self::Function(func) => func(source),
        }
    }
}

/// An ordered list of post-processing stages.
#[derive(Default)]
pub struct PostProcessingStack {
    stages: Vec<PostProcessingStage>,
    shaders: Vec<ShaderHandle>,
    functions: Vec<EffectFn>,
}

impl fmt::Debug for PostProcessingStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcessingStack")
            .field("stages", &self.stages)
            .field("shaders", &self.shaders.len())
            .field("functions", &self.functions.len())
            .finish()
    }
}

impl PostProcessingStack {
    /// An empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage drawing `shader`. Returns the stage index.
    pub fn add_shader_stage(
        &mut self,
        shader: ShaderHandle,
        name: impl Into<String>,
    ) -> usize {
        self.shaders.push(shader);
        self.push_stage(name.into(), PoolSlot::Shader(self.shaders.len() - 1))
    }

    /// Append a stage that asks `func` for its effect on every replay.
    /// Returns the stage index.
    pub fn add_function_stage<F>(
        &mut self,
        func: F,
        name: impl Into<String>,
    ) -> usize
    where
        F: Fn(ColorSource) -> ShaderHandle + 'static,
    {
        self.functions.push(Rc::new(func));
        self.push_stage(
            name.into(),
            PoolSlot::Function(self.functions.len() - 1),
        )
    }

    fn push_stage(&mut self, name: String, slot: PoolSlot) -> usize {
        self.stages.push(PostProcessingStage { name, slot });
        self.stages.len() - 1
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// `true` when the stack has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Stages in replay order.
    pub fn stages(&self) -> &[PostProcessingStage] {
        &self.stages
    }

    /// Live entries in the shader pool.
    pub fn shader_pool_len(&self) -> usize {
        self.shaders.len()
    }

    /// Live entries in the function pool.
    pub fn function_pool_len(&self) -> usize {
        self.functions.len()
    }

    /// First stage called `name`.
    pub fn stage(&self, name: &str) -> Option<&PostProcessingStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Bounds-checked stage access.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end.
    pub fn stage_at(
        &self,
        index: usize,
    ) -> Result<&PostProcessingStage, PrismError> {
        self.stages.get(index).ok_or(PrismError::IndexOutOfRange {
            index,
            len: self.stages.len(),
        })
    }

    /// Index of the first stage called `name`.
    pub fn index_of_stage(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    /// Name of the stage at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end.
    pub fn name_of_stage(&self, index: usize) -> Result<&str, PrismError> {
        self.stage_at(index).map(PostProcessingStage::name)
    }

    /// Shader drawn by the stage at `index`; `None` for function stages or
    /// out-of-range indices.
    pub fn shader_of_stage(&self, index: usize) -> Option<&ShaderHandle> {
        match self.stages.get(index)?.slot {
            PoolSlot::Shader(i) => self.shaders.get(i),
            PoolSlot::Function(_) => None,
        }
    }

    /// Function behind the stage at `index`; `None` for shader stages or
    /// out-of-range indices.
    pub fn function_of_stage(&self, index: usize) -> Option<&EffectFn> {
        match self.stages.get(index)?.slot {
            PoolSlot::Function(i) => self.functions.get(i),
            PoolSlot::Shader(_) => None,
        }
    }

    /// Remove the stage at `index` and release its pool entry.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end; the stack is
    /// unchanged.
    pub fn delete_stage(
        &mut self,
        index: usize,
    ) -> Result<PostProcessingStage, PrismError> {
        let _ = self.stage_at(index)?;
        let stage = self.stages.remove(index);
        self.release(stage.slot);
        Ok(stage)
    }

    /// Remove the first stage called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::StageNotFound`] if no stage has that name.
    pub fn delete_stage_named(
        &mut self,
        name: &str,
    ) -> Result<PostProcessingStage, PrismError> {
        let index = self.require_index(name)?;
        self.delete_stage(index)
    }

    /// Exchange two stages.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] if either index is past the
    /// end.
    pub fn swap_stages(&mut self, a: usize, b: usize) -> Result<(), PrismError> {
        let _ = self.stage_at(a)?;
        let _ = self.stage_at(b)?;
        self.stages.swap(a, b);
        Ok(())
    }

    /// Exchange two stages by name.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::StageNotFound`] if either name is unknown.
    pub fn swap_stages_named(
        &mut self,
        a: &str,
        b: &str,
    ) -> Result<(), PrismError> {
        let a = self.require_index(a)?;
        let b = self.require_index(b)?;
        self.swap_stages(a, b)
    }

    /// Move the stage at `from` to `to`, shifting the stages in between.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] if either index is past the
    /// end.
    pub fn move_stage(
        &mut self,
        from: usize,
        to: usize,
    ) -> Result<(), PrismError> {
        let _ = self.stage_at(from)?;
        let _ = self.stage_at(to)?;
        if from < to {
            self.stages[from..=to].rotate_left(1);
        } else {
            self.stages[to..=from].rotate_right(1);
        }
        Ok(())
    }

    /// Move the stage called `name` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::StageNotFound`] for an unknown name and
    /// [`PrismError::IndexOutOfRange`] for an invalid target.
    pub fn move_stage_named(
        &mut self,
        name: &str,
        to: usize,
    ) -> Result<(), PrismError> {
        let from = self.require_index(name)?;
        self.move_stage(from, to)
    }

    /// Replace the shader drawn by the stage at `index`.
    ///
    /// A function-backed stage is only converted when `force` is set;
    /// otherwise nothing changes and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end.
    pub fn set_shader_of_stage(
        &mut self,
        index: usize,
        shader: ShaderHandle,
        force: bool,
    ) -> Result<bool, PrismError> {
        match self.stage_at(index)?.slot {
            PoolSlot::Shader(i) => {
                self.shaders[i] = shader;
                Ok(true)
            }
            old @ PoolSlot::Function(_) => {
                if !force {
                    return Ok(false);
                }
                self.release(old);
                self.shaders.push(shader);
                self.stages[index].slot =
                    PoolSlot::Shader(self.shaders.len() - 1);
                Ok(true)
            }
        }
    }

    /// Replace the function behind the stage at `index`.
    ///
    /// A shader-backed stage is only converted when `force` is set;
    /// otherwise nothing changes and `Ok(false)` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PrismError::IndexOutOfRange`] past the end.
    pub fn set_function_of_stage<F>(
        &mut self,
        index: usize,
        func: F,
        force: bool,
    ) -> Result<bool, PrismError>
    where
        F: Fn(ColorSource) -> ShaderHandle + 'static,
    {
        match self.stage_at(index)?.slot {
            PoolSlot::Function(i) => {
                self.functions[i] = Rc::new(func);
                Ok(true)
            }
            old @ PoolSlot::Shader(_) => {
                if !force {
                    return Ok(false);
                }
                self.release(old);
                self.functions.push(Rc::new(func));
                self.stages[index].slot =
                    PoolSlot::Function(self.functions.len() - 1);
                Ok(true)
            }
        }
    }

    /// Snapshot of what each stage resolves to, in order. Holding the
    /// snapshot keeps the effects alive even if the stack is edited.
    pub(crate) fn snapshot(&self) -> Vec<StageEffect> {
        self.stages
            .iter()
            .filter_map(|stage| match stage.slot {
                PoolSlot::Shader(i) => {
                    self.shaders.get(i).cloned().map(StageEffect::Shader)
                }
                PoolSlot::Function(i) => {
                    self.functions.get(i).cloned().map(StageEffect::Function)
                }
            })
            .collect()
    }

    fn require_index(&self, name: &str) -> Result<usize, PrismError> {
        self.index_of_stage(name)
            .ok_or_else(|| PrismError::StageNotFound(name.to_owned()))
    }

    /// Drop pool entry `slot` and shift every stage that pointed past it.
    fn release(&mut self, slot: PoolSlot) {
        match slot {
            PoolSlot::Shader(i) => drop(self.shaders.remove(i)),
            PoolSlot::Function(i) => drop(self.functions.remove(i)),
        }
        for stage in &mut self.stages {
            stage.slot = stage.slot.after_removal(slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::postprocess::effect::PostEffect;

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

    fn names(stack: &PostProcessingStack) -> Vec<&str> {
        stack.stages().iter().map(PostProcessingStage::name).collect()
    }

    fn resolved(stack: &PostProcessingStack) -> Vec<String> {
        stack
            .snapshot()
            .iter()
            .map(|e| e.resolve(ColorSource::LitOutput).label().to_owned())
            .collect()
    }

    /// Five stages: shader, function, shader, function, shader.
    fn mixed_stack() -> PostProcessingStack {
        let mut stack = PostProcessingStack::new();
        let _ = stack.add_shader_stage(shader("s0"), "a");
        let _ = stack.add_function_stage(|_| shader("f0"), "b");
        let _ = stack.add_shader_stage(shader("s1"), "c");
        let _ = stack.add_function_stage(|_| shader("f1"), "d");
        let _ = stack.add_shader_stage(shader("s2"), "e");
        stack
    }

    /// Every slot points inside its pool and every pool entry is referenced
    /// exactly once.
    fn assert_pools_consistent(stack: &PostProcessingStack) {
        let mut shader_refs = vec![0; stack.shader_pool_len()];
        let mut function_refs = vec![0; stack.function_pool_len()];
        for stage in stack.stages() {
            match stage.slot() {
                PoolSlot::Shader(i) => shader_refs[i] += 1,
                PoolSlot::Function(i) => function_refs[i] += 1,
            }
        }
        assert!(shader_refs.iter().all(|n| *n == 1));
        assert!(function_refs.iter().all(|n| *n == 1));
    }

    #[test]
    fn add_assigns_slots_in_each_pool() {
        let stack = mixed_stack();
        let slots: Vec<_> =
            stack.stages().iter().map(PostProcessingStage::slot).collect();
        assert_eq!(
            slots,
            vec![
                PoolSlot::Shader(0),
                PoolSlot::Function(0),
                PoolSlot::Shader(1),
                PoolSlot::Function(1),
                PoolSlot::Shader(2),
            ]
        );
        assert_eq!(resolved(&stack), vec!["s0", "f0", "s1", "f1", "s2"]);
        assert_pools_consistent(&stack);
    }

    #[test]
    fn lookups_by_name_and_index() {
        let stack = mixed_stack();
        assert_eq!(stack.index_of_stage("c"), Some(2));
        assert_eq!(stack.index_of_stage("zz"), None);
        assert_eq!(stack.name_of_stage(3).unwrap(), "d");
        assert!(stack.stage("e").is_some_and(|s| !s.is_function()));
        assert!(matches!(
            stack.stage_at(5),
            Err(PrismError::IndexOutOfRange { index: 5, len: 5 })
        ));
        assert_eq!(stack.shader_of_stage(2).unwrap().label(), "s1");
        assert!(stack.shader_of_stage(1).is_none());
        assert!(stack.function_of_stage(1).is_some());
        assert!(stack.function_of_stage(9).is_none());
    }

    #[test]
    fn delete_compacts_and_reindexes() {
        let mut stack = mixed_stack();
        let removed = stack.delete_stage(0).unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(stack.shader_pool_len(), 2);
        assert_eq!(stack.stage("c").unwrap().slot(), PoolSlot::Shader(0));
        assert_eq!(stack.stage("e").unwrap().slot(), PoolSlot::Shader(1));
        assert_eq!(resolved(&stack), vec!["f0", "s1", "f1", "s2"]);

        let _ = stack.delete_stage_named("b").unwrap();
        assert_eq!(stack.function_pool_len(), 1);
        assert_eq!(stack.stage("d").unwrap().slot(), PoolSlot::Function(0));
        assert_eq!(resolved(&stack), vec!["s1", "f1", "s2"]);
        assert_pools_consistent(&stack);

        assert!(stack.delete_stage(3).is_err());
        assert!(matches!(
            stack.delete_stage_named("a"),
            Err(PrismError::StageNotFound(_))
        ));
        assert_eq!(stack.stage_count(), 3);
    }

    #[test]
    fn move_rotates_the_range_between() {
        let mut stack = mixed_stack();
        stack.move_stage(0, 3).unwrap();
        assert_eq!(names(&stack), vec!["b", "c", "d", "a", "e"]);
        stack.move_stage(4, 1).unwrap();
        assert_eq!(names(&stack), vec!["b", "e", "c", "d", "a"]);
        stack.move_stage_named("a", 0).unwrap();
        assert_eq!(names(&stack), vec!["a", "b", "e", "c", "d"]);
        stack.move_stage(2, 2).unwrap();
        assert_eq!(names(&stack), vec!["a", "b", "e", "c", "d"]);
        assert!(stack.move_stage(0, 5).is_err());
        assert_eq!(resolved(&stack), vec!["s0", "f0", "s2", "s1", "f1"]);
    }

    #[test]
    fn move_then_inverse_move_restores_order() {
        let original = names(&mixed_stack())
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        for from in 0..5 {
            for to in 0..5 {
                let mut stack = mixed_stack();
                stack.move_stage(from, to).unwrap();
                stack.move_stage(to, from).unwrap();
                assert_eq!(names(&stack), original);
            }
        }
    }

    #[test]
    fn swap_by_index_and_name() {
        let mut stack = mixed_stack();
        stack.swap_stages(0, 4).unwrap();
        assert_eq!(names(&stack), vec!["e", "b", "c", "d", "a"]);
        stack.swap_stages_named("b", "d").unwrap();
        assert_eq!(names(&stack), vec!["e", "d", "c", "b", "a"]);
        assert!(stack.swap_stages(1, 7).is_err());
        assert!(stack.swap_stages_named("b", "nope").is_err());
        assert_eq!(resolved(&stack), vec!["s2", "f1", "s1", "f0", "s0"]);
    }

    #[test]
    fn forced_conversion_keeps_other_stages_resolving() {
        let mut stack = mixed_stack();
        let changed = stack
            .set_function_of_stage(0, |_| shader("f-new"), true)
            .unwrap();
        assert!(changed);
        assert_eq!(resolved(&stack), vec!["f-new", "f0", "s1", "f1", "s2"]);
        assert_eq!(stack.shader_pool_len(), 2);
        assert_eq!(stack.function_pool_len(), 3);
        assert_eq!(stack.stage("c").unwrap().slot(), PoolSlot::Shader(0));
        assert_eq!(stack.stage("e").unwrap().slot(), PoolSlot::Shader(1));
        assert_eq!(stack.stage("a").unwrap().slot(), PoolSlot::Function(2));
        assert_pools_consistent(&stack);

        let changed = stack
            .set_shader_of_stage(1, shader("s-new"), true)
            .unwrap();
        assert!(changed);
        assert_eq!(resolved(&stack), vec!["f-new", "s-new", "s1", "f1", "s2"]);
        assert_eq!(stack.stage("d").unwrap().slot(), PoolSlot::Function(0));
        assert_eq!(stack.stage("a").unwrap().slot(), PoolSlot::Function(1));
        assert_pools_consistent(&stack);
    }

    /// Stage `i` is function-backed when bit `i` of `mask` is set. Effects
    /// are labelled by stage position so resolution can be tracked.
    fn layout_stack(len: usize, mask: u32) -> PostProcessingStack {
        let mut stack = PostProcessingStack::new();
        for i in 0..len {
            if mask & (1 << i) == 0 {
                let _ = stack.add_shader_stage(
                    shader(&format!("s{i}")),
                    format!("n{i}"),
                );
            } else {
                let label = format!("f{i}");
                let _ = stack.add_function_stage(
                    move |_| shader(&label),
                    format!("n{i}"),
                );
            }
        }
        stack
    }

    fn all_layouts() -> impl Iterator<Item = (usize, u32)> {
        (1..=6).flat_map(|len| (0..1u32 << len).map(move |mask| (len, mask)))
    }

    #[test]
    fn forced_conversion_reindexes_every_layout() {
        for (len, mask) in all_layouts() {
            for converted in 0..len {
                let mut stack = layout_stack(len, mask);
                let before_slots: Vec<_> = stack
                    .stages()
                    .iter()
                    .map(PostProcessingStage::slot)
                    .collect();
                let before = resolved(&stack);
                let old = before_slots[converted];

                let result = if old.is_function() {
                    stack.set_shader_of_stage(converted, shader("new"), true)
                } else {
                    stack.set_function_of_stage(
                        converted,
                        |_| shader("new"),
                        true,
                    )
                };
                assert!(result.unwrap());

                let after = resolved(&stack);
                assert_eq!(after[converted], "new");
                assert_eq!(
                    stack.stage_at(converted).unwrap().is_function(),
                    !old.is_function()
                );
                for i in (0..len).filter(|i| *i != converted) {
                    assert_eq!(
                        after[i], before[i],
                        "len {len} mask {mask:b} at {converted}"
                    );
                    let was = before_slots[i];
                    let now = stack.stage_at(i).unwrap().slot();
                    let same_kind = was.is_function() == old.is_function();
                    if same_kind && was.index() > old.index() {
                        assert_eq!(now.index(), was.index() - 1);
                    } else {
                        assert_eq!(now, was);
                    }
                }
                assert_pools_consistent(&stack);
            }
        }
    }

    #[test]
    fn swap_twice_restores_order() {
        for (len, mask) in all_layouts() {
            let original = layout_stack(len, mask);
            for a in 0..len {
                for b in 0..len {
                    let mut stack = layout_stack(len, mask);
                    stack.swap_stages(a, b).unwrap();
                    assert_eq!(
                        stack.name_of_stage(a).unwrap(),
                        original.name_of_stage(b).unwrap()
                    );
                    stack.swap_stages(a, b).unwrap();
                    assert_eq!(names(&stack), names(&original));
                    assert_eq!(resolved(&stack), resolved(&original));
                }
            }
        }
    }

    #[test]
    fn moved_stage_lands_at_target() {
        for (len, mask) in all_layouts() {
            let original = layout_stack(len, mask);
            let original_resolved = resolved(&original);
            for from in 0..len {
                for to in 0..len {
                    let mut stack = layout_stack(len, mask);
                    stack.move_stage(from, to).unwrap();
                    assert_eq!(
                        stack.name_of_stage(to).unwrap(),
                        original.name_of_stage(from).unwrap()
                    );
                    assert_eq!(resolved(&stack)[to], original_resolved[from]);
                    assert_eq!(stack.stage_count(), len);
                    assert_pools_consistent(&stack);
                }
            }
        }
    }

    #[test]
    fn add_then_delete_restores_stack() {
        for (len, mask) in all_layouts() {
            let original = layout_stack(len, mask);
            let slots: Vec<_> = original
                .stages()
                .iter()
                .map(PostProcessingStage::slot)
                .collect();

            let mut stack = layout_stack(len, mask);
            let index = stack.add_shader_stage(shader("extra"), "extra");
            let _ = stack.delete_stage(index).unwrap();
            assert_eq!(stack.stage_count(), len);
            assert_eq!(resolved(&stack), resolved(&original));

            let index =
                stack.add_function_stage(|_| shader("extra"), "extra");
            let _ = stack.delete_stage(index).unwrap();
            assert_eq!(stack.stage_count(), len);
            assert_eq!(resolved(&stack), resolved(&original));
            let after: Vec<_> = stack
                .stages()
                .iter()
                .map(PostProcessingStage::slot)
                .collect();
            assert_eq!(after, slots);
            assert_eq!(stack.shader_pool_len(), original.shader_pool_len());
            assert_eq!(
                stack.function_pool_len(),
                original.function_pool_len()
            );
        }
    }

    #[test]
    fn unforced_kind_change_is_a_no_op() {
        let mut stack = mixed_stack();
        assert!(!stack.set_shader_of_stage(1, shader("x"), false).unwrap());
        assert!(!stack
            .set_function_of_stage(0, |_| shader("y"), false)
            .unwrap());
        assert_eq!(resolved(&stack), vec!["s0", "f0", "s1", "f1", "s2"]);

        assert!(stack.set_shader_of_stage(2, shader("s1b"), false).unwrap());
        assert!(stack
            .set_function_of_stage(3, |_| shader("f1b"), false)
            .unwrap());
        assert_eq!(resolved(&stack), vec!["s0", "f0", "s1b", "f1b", "s2"]);
        assert!(stack.set_shader_of_stage(5, shader("z"), true).is_err());
    }

    #[test]
    fn function_stage_sees_its_source() {
        let mut stack = PostProcessingStack::new();
        let _ = stack.add_function_stage(
            |source| match source {
                ColorSource::LitOutput => shader("from-lit"),
                ColorSource::PostProcessBuffer => shader("from-buffer"),
            },
            "pick",
        );
        let effects = stack.snapshot();
        assert_eq!(
            effects[0].resolve(ColorSource::LitOutput).label(),
            "from-lit"
        );
        assert_eq!(
            effects[0].resolve(ColorSource::PostProcessBuffer).label(),
            "from-buffer"
        );
    }
}
