//! Shader, texture and buffer integration tests.
//!
//! ```bash
//! cargo test --test resource_tests
//! ```

mod common;

use rstest::rstest;

use common::{Backend, MATERIAL_GLSL, TestContext};
use rime_graphics::{
    BindCommand, GraphicsError, MATERIAL_BLOCK, ShaderSource, ShaderStage, TextureDescriptor,
    TextureFormat, UploadOrigin,
};

// ============================================================================
// Shaders
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_glsl_stages_share_material_block(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let shader = ctx.material_shader_glsl();
    assert_eq!(shader.stages().len(), 2);
    assert!(shader.stages().iter().all(|stage| stage.entry_point == "main"));

    let block = shader.uniform_block(MATERIAL_BLOCK).unwrap();
    assert_eq!(block.fields().len(), 2);
    assert_eq!(block.field("Albedo").unwrap().offset, 16);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_broken_shader_is_inert(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let broken = MATERIAL_GLSL.replace("o_Color = vec4(Albedo, Roughness);", "o_Color = ;");
    let shader = ctx.device.create_shader(
        "broken",
        &[ShaderSource::glsl(ShaderStage::Fragment, broken).with_path("shaders/broken.glsl")],
    );

    assert!(!shader.is_ready());
    assert!(shader.diagnostic().unwrap().contains("shaders/broken.glsl"));
    assert!(matches!(
        ctx.device.create_material(&shader),
        Err(GraphicsError::NoMaterialBlock { .. })
    ));

    let mut bind = ctx.bind_context();
    assert!(matches!(
        shader.bind(&mut bind),
        Err(GraphicsError::ShaderNotReady { .. })
    ));
    assert!(bind.commands().is_empty());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_set_uniform_buffer_data(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let shader = ctx.material_shader();
    let mut bind = ctx.bind_context();
    shader.bind(&mut bind).unwrap();
    shader
        .set_uniform_buffer_data(&mut bind, MATERIAL_BLOCK, &[1u8; 32])
        .unwrap();

    let (origin, data) = bind.last_upload(MATERIAL_BLOCK).unwrap();
    assert_eq!(origin, UploadOrigin::Direct);
    assert_eq!(data, &[1u8; 32]);

    assert!(matches!(
        shader.set_uniform_buffer_data(&mut bind, MATERIAL_BLOCK, &[0u8; 31]),
        Err(GraphicsError::LayoutMismatch {
            expected: 32,
            actual: 31,
            ..
        })
    ));
}

// ============================================================================
// Textures
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_texture_lock_resize_upload(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let texture = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::Rgb8))
        .unwrap();
    texture.set_data(&[7; 48]).unwrap();

    let mut lock = texture.lock().unwrap();
    lock.resize(8, 2).unwrap();
    assert!(lock.as_bytes().iter().all(|b| *b == 0));
    lock.as_bytes_mut()[0] = 42;
    lock.unlock().unwrap();

    assert_eq!((texture.width(), texture.height()), (8, 2));
    assert_eq!(texture.data().size(), 48);
    assert_eq!(texture.data()[0], 42);

    let mut bind = ctx.bind_context();
    texture.bind(&mut bind, 3);
    assert_eq!(bind.bound_texture(3), Some(texture.id()));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_texture_resize_rejects_invalid_extent(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let max = ctx.device.capabilities().max_texture_dimension;
    let texture = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(2, 2, TextureFormat::Rgba8))
        .unwrap();
    let mut lock = texture.lock().unwrap();
    assert!(lock.resize(0, 0).is_err());
    assert!(lock.resize(max + 1, 1).is_err());
    lock.unlock().unwrap();
    assert_eq!((texture.width(), texture.height()), (2, 2));

    let cube = ctx
        .device
        .create_texture(&TextureDescriptor::new_cube(2, TextureFormat::Rgba8))
        .unwrap();
    let mut lock = cube.lock().unwrap();
    assert!(matches!(
        lock.resize(4, 2),
        Err(GraphicsError::InvalidParameter(_))
    ));
    lock.resize(4, 4).unwrap();
    lock.unlock().unwrap();
    assert_eq!((cube.width(), cube.height()), (4, 4));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_texture_set_data_size_checked(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let texture = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(3, 3, TextureFormat::Rgba16Float))
        .unwrap();
    assert!(texture.set_data(&[0; 72]).is_ok());
    assert!(matches!(
        texture.set_data(&[0; 36]),
        Err(GraphicsError::InvalidParameter(_))
    ));
}

// ============================================================================
// Buffers
// ============================================================================

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_geometry_buffers(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let vertices: [f32; 9] = [0.0, 0.5, 0.0, -0.5, -0.5, 0.0, 0.5, -0.5, 0.0];
    let vertex_buffer = ctx
        .device
        .create_vertex_buffer(bytemuck::cast_slice(&vertices))
        .unwrap();
    let index_buffer = ctx.device.create_index_buffer(&[0, 1, 2]).unwrap();

    assert_eq!(vertex_buffer.size(), 36);
    assert_eq!(index_buffer.count(), 3);

    index_buffer.set_data(&[0, 1, 2, 2, 1, 0]).unwrap();
    assert_eq!(index_buffer.count(), 6);

    let mut bind = ctx.bind_context();
    vertex_buffer.bind(&mut bind);
    index_buffer.bind(&mut bind);
    assert_eq!(
        bind.commands(),
        &[
            BindCommand::BindVertexBuffer {
                buffer: vertex_buffer.id()
            },
            BindCommand::BindIndexBuffer {
                buffer: index_buffer.id()
            },
        ]
    );

    bind.reset();
    assert!(bind.state().vertex_buffer.is_none());
}
