use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use rime_graphics::{
    GraphicsConfig, GraphicsDevice, Material, MaterialInstance, ShaderSource, ShaderStage,
};

const MATERIAL_WGSL: &str = r#"
struct Material {
    Roughness: f32,
    Albedo: vec3<f32>,
    Emission: vec4<f32>,
}
@group(0) @binding(0) var<uniform> material: Material;

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(material.Albedo, material.Roughness) + material.Emission;
}
"#;

fn setup() -> (Arc<GraphicsDevice>, Arc<Material>) {
    let device = GraphicsDevice::new(GraphicsConfig::dummy()).unwrap();
    let shader = device.create_shader(
        "bench",
        &[ShaderSource::wgsl(ShaderStage::Fragment, MATERIAL_WGSL, "fs_main")],
    );
    let material = device.create_material(&shader).unwrap();
    (device, material)
}

// ---------------------------------------------------------------------------
// Shader compilation
// ---------------------------------------------------------------------------

fn bench_shader_compile(c: &mut Criterion) {
    let device = GraphicsDevice::new(GraphicsConfig::dummy()).unwrap();
    c.bench_function("shader_compile_wgsl", |b| {
        b.iter(|| {
            black_box(device.create_shader(
                "bench",
                &[ShaderSource::wgsl(ShaderStage::Fragment, MATERIAL_WGSL, "fs_main")],
            ))
        });
    });
}

// ---------------------------------------------------------------------------
// Material updates
// ---------------------------------------------------------------------------

fn bench_material_set_no_instances(c: &mut Criterion) {
    let (_device, material) = setup();
    c.bench_function("material_set_f32_0_instances", |b| {
        b.iter(|| material.set("Roughness", black_box(0.5f32)).unwrap());
    });
}

fn bench_material_set_propagate(c: &mut Criterion) {
    let (device, material) = setup();
    let instances: Vec<Arc<MaterialInstance>> = (0..64)
        .map(|_| device.create_material_instance(&material))
        .collect();
    // Half of the instances ignore the update.
    for instance in instances.iter().step_by(2) {
        instance.set("Roughness", 1.0f32).unwrap();
    }

    c.bench_function("material_set_f32_64_instances", |b| {
        b.iter(|| material.set("Roughness", black_box(0.5f32)).unwrap());
    });
    black_box(&instances);
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

fn bench_instance_bind(c: &mut Criterion) {
    let (device, material) = setup();
    let instance = device.create_material_instance(&material);
    let mut ctx = device.create_bind_context().with_journaling(false);

    c.bench_function("material_instance_bind", |b| {
        b.iter(|| instance.bind(black_box(&mut ctx)).unwrap());
    });
}

criterion_group!(
    benches,
    bench_shader_compile,
    bench_material_set_no_instances,
    bench_material_set_propagate,
    bench_instance_bind,
);
criterion_main!(benches);
