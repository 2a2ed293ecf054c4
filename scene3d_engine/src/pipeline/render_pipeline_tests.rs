use super::*;
use glam::{Quat, Vec3};
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::scene::SceneLight;

// ============================================================================
// Helpers
// ============================================================================

fn build(config: &SceneConfig) -> (RenderPipeline, MockGraphicsDevice, SceneWorld) {
    let mut device = MockGraphicsDevice::new();
    let pipeline = RenderPipeline::new(&mut device, config).unwrap();
    (pipeline, device, SceneWorld::new(config.clone()))
}

fn run_frame(pipeline: &mut RenderPipeline, device: &mut MockGraphicsDevice, world: &mut SceneWorld) {
    world.begin_frame();
    let mut commands = device.create_command_list().unwrap();
    let mut ctx = FrameContext { device, commands: commands.as_mut() };
    pipeline.run(&mut ctx, world).unwrap();
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_stages_run_in_fixed_order() {
    let (pipeline, _, _) = build(&SceneConfig::default());
    assert_eq!(
        pipeline.stage_names(),
        vec!["gbuffer", "sky", "shadow_map", "lighting", "transparency", "particles", "bloom", "final"]
    );
}

#[test]
fn test_ambient_occlusion_runs_before_final() {
    let config = SceneConfig { ambient_occlusion: true, ..Default::default() };
    let (pipeline, _, _) = build(&config);
    let names = pipeline.stage_names();
    assert_eq!(names[names.len() - 2], "ambient_occlusion");
    assert_eq!(pipeline.graph().consumers(slots::AMBIENT_OCCLUSION), vec!["final"]);
}

#[test]
fn test_programs_created_at_construction() {
    let (_, mut device, _) = build(&SceneConfig::default());
    let programs = device.get_created_programs();
    for name in ["gbuffer", "gbuffer_skinned", "lighting_render_tiles", "transparency", "final"] {
        assert!(programs.iter().any(|p| p == name), "missing program {}", name);
    }
    assert!(device.count_textures("gbuffer_diffuse") == 0);

    device.clear_logs();
    assert!(device.get_created_programs().is_empty());
}

#[test]
fn test_every_output_is_consumed() {
    let (pipeline, _, _) = build(&SceneConfig::default());
    assert!(pipeline.graph().unconsumed().is_empty());

    let config = SceneConfig { ambient_occlusion: true, ..Default::default() };
    let (pipeline, _, _) = build(&config);
    assert!(pipeline.graph().unconsumed().is_empty());
}

#[test]
fn test_scene_slots_are_produced_by_scene() {
    let (pipeline, _, _) = build(&SceneConfig::default());
    assert_eq!(pipeline.graph().producer(slots::VIEWPORT), Some(slots::SCENE));
    assert_eq!(pipeline.graph().producer(slots::FINAL_COLOR), Some("lighting"));
}

// ============================================================================
// Run
// ============================================================================

#[test]
fn test_each_stage_is_timed() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);

    assert_eq!(device.count_commands("begin_timer"), 8);
    assert_eq!(device.count_commands("end_timer"), 8);
    assert_eq!(device.get_commands()[0], "begin_timer gbuffer");
}

#[test]
fn test_final_stage_draws_to_default_frame_buffer() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);

    let commands = device.get_commands();
    let start = commands.iter().position(|c| c == "begin_timer final").unwrap();
    assert_eq!(commands[start + 1], "set_frame_buffer default");
    assert!(commands[start..].contains(&"draw 3 0".to_string()));
}

#[test]
fn test_lighting_dispatches_tile_passes() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);

    // 640x480 in 16 pixel tiles: 40 x 30 tiles, 1200 / 16 culling groups
    assert_eq!(device.count_commands("dispatch 40 30 1"), 2);
    assert_eq!(device.count_commands("dispatch 75 1 1"), 1);
}

#[test]
fn test_degenerate_viewport_touches_nothing() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    pipeline.publish(Rect2D::from_size(0, 480), 60.0, Mat4::IDENTITY);
    run_frame(&mut pipeline, &mut device, &mut world);

    assert!(device.get_created_textures().is_empty());
    assert_eq!(device.count_commands("draw"), 0);
    assert_eq!(device.count_commands("dispatch"), 0);
    assert_eq!(device.count_commands("begin_timer"), 8);
}

// ============================================================================
// Render target reallocation
// ============================================================================

#[test]
fn test_targets_survive_unchanged_viewport() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);
    pipeline.publish(Rect2D::from_size(640, 480), 60.0, Mat4::IDENTITY);
    run_frame(&mut pipeline, &mut device, &mut world);

    assert_eq!(device.count_textures("gbuffer_diffuse"), 1);
    assert_eq!(device.count_textures("final_color"), 1);
    assert_eq!(device.count_textures("bloom"), 1);
}

#[test]
fn test_viewport_change_reallocates_once() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);

    pipeline.publish(Rect2D::from_size(800, 600), 60.0, Mat4::IDENTITY);
    run_frame(&mut pipeline, &mut device, &mut world);
    run_frame(&mut pipeline, &mut device, &mut world);

    assert_eq!(device.count_textures("gbuffer_diffuse"), 2);
    assert_eq!(device.count_textures("gbuffer_z_buffer"), 2);
    assert_eq!(device.count_textures("final_color"), 2);
    assert_eq!(device.count_textures("bloom"), 2);
    assert!(device.get_commands().contains(&"set_viewport 800x600".to_string()));
}

#[test]
fn test_field_of_view_change_keeps_targets() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    run_frame(&mut pipeline, &mut device, &mut world);
    pipeline.publish(Rect2D::from_size(640, 480), 90.0, Mat4::IDENTITY);
    run_frame(&mut pipeline, &mut device, &mut world);

    assert_eq!(device.count_textures("gbuffer_diffuse"), 1);
}

// ============================================================================
// Shadow maps
// ============================================================================

#[test]
fn test_shadow_maps_allocated_only_for_casters() {
    let (mut pipeline, mut device, mut world) = build(&SceneConfig::default());
    world.insert_light(SceneLight::omni(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE, 20.0));
    run_frame(&mut pipeline, &mut device, &mut world);
    assert_eq!(device.count_textures("shadow_maps"), 0);

    let mut spot = SceneLight::spot(Vec3::new(0.0, 0.0, 10.0), Quat::IDENTITY, Vec3::ONE, 20.0, 45.0);
    spot.casts_shadows = true;
    world.insert_light(spot);
    run_frame(&mut pipeline, &mut device, &mut world);
    run_frame(&mut pipeline, &mut device, &mut world);

    assert_eq!(device.count_textures("shadow_maps"), 1);
    assert!(device.get_commands().contains(&"set_frame_buffer 512x512".to_string()));
}
