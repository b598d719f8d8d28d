use std::cell::RefCell;
use std::hint::black_box;
use std::rc::Rc;

use criterion::{criterion_group, criterion_main, Criterion};
use prism::renderer::pass_id::Attachment;
use prism::renderer::pipeline::{FrameTarget, RenderPipeline};
use prism::renderer::postprocess::effect::{
    ColorSource, PostEffect, ShaderHandle,
};
use prism::renderer::postprocess::stack::PostProcessingStack;

/// Frame target that only counts what it is asked to do.
#[derive(Default)]
struct CountingTarget {
    passes: u64,
    effects: u64,
}

impl FrameTarget for CountingTarget {
    fn draw_solid(&mut self) {
        self.passes += 1;
    }
    fn draw_skybox(&mut self) {
        self.passes += 1;
    }
    fn draw_transparent(&mut self) {
        self.passes += 1;
    }
    fn draw_lighting(&mut self) {
        self.passes += 1;
    }
    fn shadow_pass(&mut self) {
        self.passes += 1;
    }
    fn clear_g_buffer(&mut self) {
        self.passes += 1;
    }
    fn copy_g_to_pp(&mut self, _attachment: Attachment) {
        self.passes += 1;
    }
    fn begin_post_processing(&mut self) -> ColorSource {
        ColorSource::LitOutput
    }
    fn apply_effect(&mut self, _effect: &dyn PostEffect, _source: ColorSource) {
        self.effects += 1;
    }
    fn copy_output_to_post_buffer(&mut self) {}
    fn copy_to_output(&mut self, _source: ColorSource) {}
}

struct NoopEffect(&'static str);

impl PostEffect for NoopEffect {
    fn label(&self) -> &str {
        self.0
    }

    fn encode(&self, _pass: &mut wgpu::RenderPass<'_>) {}
}

fn stack_of(len: usize) -> PostProcessingStack {
    let effect: ShaderHandle = Rc::new(NoopEffect("noop"));
    let mut stack = PostProcessingStack::new();
    for i in 0..len {
        if i % 2 == 0 {
            let _ = stack.add_shader_stage(effect.clone(), format!("s{i}"));
        } else {
            let handle = effect.clone();
            let _ = stack
                .add_function_stage(move |_| handle.clone(), format!("f{i}"));
        }
    }
    stack
}

fn stack_editing_benchmark(c: &mut Criterion) {
    c.bench_function("stack_add_move_delete_32", |b| {
        b.iter(|| {
            let mut stack = stack_of(32);
            for i in 0..16 {
                let _ = stack.move_stage(i, 31 - i);
            }
            while stack.delete_stage(0).is_ok() {}
            black_box(stack.shader_pool_len())
        });
    });
}

fn pipeline_execute_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline_execute");

    for len in [0, 4, 16, 64] {
        let stack = Rc::new(RefCell::new(stack_of(len)));
        let mut pipeline = RenderPipeline::deferred("main");
        let _ = pipeline.set_pp_stage_pps(None, stack, "main");
        let mut target = CountingTarget::default();

        group.bench_function(format!("{len}_effects"), |b| {
            b.iter(|| {
                pipeline.execute(&mut target);
                black_box(target.effects + target.passes)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    stack_editing_benchmark,
    pipeline_execute_benchmark
);
criterion_main!(benches);
