use super::*;
use glam::Quat;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::model::test_scene_cache::{cube_model, TestSceneCache};
use crate::model::{MeshDraw, ModelDataLight, Track};
use crate::scene::LightType;

// ============================================================================
// Helpers
// ============================================================================

/// Records every draw it is offered and accepts them all
#[derive(Default)]
struct RecordingVisitor {
    /// (lod, mesh, material, first instance, instance count)
    draws: Vec<(usize, usize, usize, u32, u32)>,
}

impl ModelMeshVisitor for RecordingVisitor {
    fn render(&mut self, commands: &mut dyn CommandList, draw: &MeshDraw) -> Result<bool> {
        self.draws.push((draw.lod, draw.mesh, draw.material_index, draw.first_instance, draw.instance_count));
        draw.record(commands)?;
        Ok(true)
    }
}

struct Fixture {
    world: SceneWorld,
    device: MockGraphicsDevice,
    model: ModelKey,
    data: Arc<ModelData>,
}

impl Fixture {
    fn new(data: ModelData) -> Self {
        let mut device = MockGraphicsDevice::new();
        let mut world = SceneWorld::new(SceneConfig::default());
        let mut cache = TestSceneCache::new().with_model(data.clone());
        let model = world
            .models
            .get_or_load(&mut device, &mut cache, &mut world.materials, &data.name)
            .unwrap();
        let data = world.models.get(model).unwrap().data().clone();
        world.begin_frame();
        Self { world, device, model, data }
    }

    fn add_object(&mut self, position: Vec3) -> ObjectKey {
        let object = SceneObject::new(self.model, self.data.clone(), position, Quat::IDENTITY, Vec3::ONE);
        self.world.insert_object(object)
    }

    /// 100 objects on a 10 x 10 grid, 50 units in front of the camera
    fn add_grid(&mut self) -> Vec<ObjectKey> {
        (0..100)
            .map(|i| {
                let x = (i % 10) as f32 * 3.0 - 13.5;
                let y = (i / 10) as f32 * 2.0 - 9.0;
                self.add_object(Vec3::new(x, y, 50.0))
            })
            .collect()
    }

    fn visit(&mut self, view: &ViewParams) -> RecordingVisitor {
        let mut visitor = RecordingVisitor::default();
        let mut commands = self.device.create_command_list().unwrap();
        let mut ctx = FrameContext { device: &mut self.device, commands: commands.as_mut() };
        self.world.visit(&mut ctx, view, &mut visitor).unwrap();
        visitor
    }
}

fn looking_back(world: &SceneWorld) -> ViewParams {
    let world_to_eye = Mat4::from_quat(Quat::from_rotation_y(std::f32::consts::PI).inverse());
    ViewParams::new(world_to_eye, world.camera_view(1000.0).eye_to_projection)
}

fn light_model() -> ModelData {
    let mut data = cube_model("lamp", 1, 1, 1);
    data.lights.push(ModelDataLight {
        kind: LightType::Omni,
        casts_shadows: false,
        rectangle_shape: false,
        bone: None,
        position: Track::constant(Vec3::new(0.0, 2.0, 0.0)),
        orientation: Track::constant(Quat::IDENTITY),
        color: Track::constant(Vec3::new(1.0, 0.5, 0.25)),
        attenuation_start: Track::constant(1.0),
        attenuation_end: Track::constant(8.0),
        falloff: Track::constant(45.0),
        hotspot: Track::constant(30.0),
        ambient_illumination: Track::constant(0.0),
    });
    data
}

// ============================================================================
// Instance consolidation
// ============================================================================

#[test]
fn test_objects_sharing_a_model_are_consolidated() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 2, 3));
    fixture.add_grid();
    let view = fixture.world.camera_view(1000.0);
    let visitor = fixture.visit(&view);

    let stats = fixture.world.stats();
    assert_eq!(stats.models_drawn, 1);
    assert_eq!(stats.objects_drawn, 100);
    assert_eq!(stats.draw_calls, 2 * 3);
    assert_eq!(stats.triangles, 2 * 3 * 4 * 100);
    assert_eq!(stats.visits, 1);

    assert_eq!(visitor.draws.len(), 6);
    assert!(visitor.draws.iter().all(|&(lod, _, _, first, count)| lod == 0 && first == 0 && count == 100));
    assert_eq!(fixture.device.count_commands("draw_indexed_instanced 12 12 100 0"), 2);
}

#[test]
fn test_instance_region_covers_every_instance() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 3));
    fixture.add_grid();
    let view = fixture.world.camera_view(1000.0);
    fixture.visit(&view);

    // 15 base vectors plus 14 per material
    assert_eq!(fixture.world.instances().visit_len(), 100 * (15 + 3 * 14));
    assert!(fixture.world.instances().buffer().is_some());
}

#[test]
fn test_lods_split_draws_by_distance() {
    let mut fixture = Fixture::new(cube_model("crate", 2, 1, 2));
    for i in 0..3 {
        fixture.add_object(Vec3::new(i as f32, 0.0, 5.0));
    }
    for i in 0..7 {
        fixture.add_object(Vec3::new(i as f32, 0.0, 50.0));
    }
    let view = fixture.world.camera_view(1000.0);
    let visitor = fixture.visit(&view);

    assert_eq!(fixture.world.stats().draw_calls, 2 * 2);
    assert_eq!(fixture.world.stats().models_drawn, 1);
    let near: Vec<_> = visitor.draws.iter().filter(|d| d.0 == 0).collect();
    let far: Vec<_> = visitor.draws.iter().filter(|d| d.0 == 1).collect();
    assert!(near.iter().all(|d| d.3 == 0 && d.4 == 3));
    assert!(far.iter().all(|d| d.3 == 3 && d.4 == 7));
}

#[test]
fn test_excluding_frustum_draws_nothing() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    fixture.add_grid();
    let view = looking_back(&fixture.world);
    let visitor = fixture.visit(&view);

    assert!(visitor.draws.is_empty());
    assert_eq!(fixture.world.stats().objects_drawn, 0);
    assert_eq!(fixture.world.stats().models_drawn, 0);
    assert_eq!(fixture.world.stats().visits, 1);
}

#[test]
fn test_objects_counted_once_per_frame() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    fixture.add_grid();
    let view = fixture.world.camera_view(1000.0);
    fixture.visit(&view);
    fixture.visit(&view);

    let stats = fixture.world.stats();
    assert_eq!(stats.objects_drawn, 100);
    assert_eq!(stats.models_drawn, 1);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.visits, 2);
    assert_eq!(fixture.world.visit_epoch(), 2);
}

#[test]
fn test_moved_object_leaves_the_view() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    let key = fixture.add_object(Vec3::new(0.0, 0.0, 20.0));
    let view = fixture.world.camera_view(1000.0);
    assert_eq!(fixture.visit(&view).draws.len(), 1);

    fixture.world.object_mut(key).unwrap().set_position(Vec3::new(0.0, 0.0, -20.0));
    fixture.world.begin_frame();
    fixture.world.reset_stats();
    assert!(fixture.visit(&view).draws.is_empty());
    assert_eq!(fixture.world.stats().objects_drawn, 0);
}

// ============================================================================
// Lights, emitters and probes
// ============================================================================

#[test]
fn test_lights_and_emitters_only() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    for i in 0..3 {
        fixture.world.insert_light(SceneLight::omni(Vec3::new(i as f32, 0.0, 30.0), Vec3::ONE, 5.0));
    }
    fixture.world.insert_light(SceneLight::omni(Vec3::new(0.0, 0.0, -300.0), Vec3::ONE, 5.0));
    for i in 0..2 {
        let emitter = SceneParticleEmitter { position: Vec3::new(i as f32, 0.0, 30.0), ..Default::default() };
        fixture.world.insert_emitter(emitter);
    }

    let view = fixture.world.camera_view(1000.0);
    let mut lights = 0;
    fixture.world.visit_lights(&view.frustum, |_, _| { lights += 1; Ok(()) }).unwrap();
    let mut emitters = 0;
    fixture.world.visit_emitters(&view.frustum, |_, _| { emitters += 1; Ok(()) }).unwrap();
    let visitor = fixture.visit(&view);

    assert_eq!(lights, 3);
    assert_eq!(emitters, 2);
    assert!(visitor.draws.is_empty());
    assert_eq!(fixture.world.stats().objects_drawn, 0);
    assert_eq!(fixture.world.stats().models_drawn, 0);
    assert_eq!(fixture.world.stats().visits, 3);
}

#[test]
fn test_unbounded_lights_always_visible() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    fixture.world.insert_light(SceneLight::sun(Quat::IDENTITY, Vec3::ONE));
    fixture.world.insert_light(SceneLight::ambient(Vec3::splat(0.1)));

    let view = looking_back(&fixture.world);
    let mut kinds = Vec::new();
    fixture.world.visit_lights(&view.frustum, |_, light| { kinds.push(light.kind); Ok(()) }).unwrap();
    assert_eq!(kinds.len(), 2);
}

#[test]
fn test_light_probes_are_visited() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    let inside = fixture.world.insert_probe(SceneLightProbe::new(Vec3::new(0.0, 0.0, 10.0), 2.0, Vec3::ONE));
    fixture.world.insert_probe(SceneLightProbe::new(Vec3::new(0.0, 0.0, -10.0), 2.0, Vec3::ONE));

    let view = fixture.world.camera_view(1000.0);
    let mut seen = Vec::new();
    fixture.world.visit_light_probes(&view.frustum, |key, _| { seen.push(key); Ok(()) }).unwrap();
    assert_eq!(seen, vec![inside]);
}

#[test]
fn test_visitor_error_ends_the_visit() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    fixture.world.insert_light(SceneLight::omni(Vec3::new(0.0, 0.0, 30.0), Vec3::ONE, 5.0));
    let view = fixture.world.camera_view(1000.0);

    let result = fixture.world.visit_lights(&view.frustum, |_, _| Err(crate::error::Error::OutOfMemory));
    assert!(result.is_err());
    // The visit was closed: another one can start
    assert!(fixture.world.visit_lights(&view.frustum, |_, _| Ok(())).is_ok());
}

// ============================================================================
// Query cache
// ============================================================================

#[test]
fn test_identical_frusta_share_one_query() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    fixture.add_grid();
    let view = fixture.world.camera_view(1000.0);
    fixture.visit(&view);
    fixture.world.visit_lights(&view.frustum, |_, _| Ok(())).unwrap();
    assert_eq!(fixture.world.cached_queries(), 1);

    let near = fixture.world.camera_view(150.0);
    fixture.world.visit_lights(&near.frustum, |_, _| Ok(())).unwrap();
    assert_eq!(fixture.world.cached_queries(), 2);

    fixture.world.begin_frame();
    assert_eq!(fixture.world.cached_queries(), 0);
}

#[test]
fn test_entity_changes_invalidate_cached_queries() {
    let mut fixture = Fixture::new(cube_model("crate", 1, 1, 1));
    let view = fixture.world.camera_view(1000.0);
    fixture.visit(&view);
    assert_eq!(fixture.world.cached_queries(), 1);

    fixture.add_object(Vec3::new(0.0, 0.0, 20.0));
    assert_eq!(fixture.world.cached_queries(), 0);
    assert_eq!(fixture.visit(&view).draws.len(), 1);
}

// ============================================================================
// Object lights
// ============================================================================

#[test]
fn test_object_spawns_model_lights() {
    let mut fixture = Fixture::new(light_model());
    let key = fixture.add_object(Vec3::new(5.0, 0.0, 20.0));

    let lights = fixture.world.object(key).unwrap().lights().to_vec();
    assert_eq!(lights.len(), 1);
    let light = fixture.world.light(lights[0]).unwrap();
    assert_eq!(light.owner, Some((key, 0)));
    assert!(light.position.abs_diff_eq(Vec3::new(5.0, 2.0, 20.0), 1e-5));
    assert_eq!(light.attenuation_end, 8.0);
    assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.25));
}

#[test]
fn test_object_lights_follow_the_object() {
    let mut fixture = Fixture::new(light_model());
    let key = fixture.add_object(Vec3::new(5.0, 0.0, 20.0));
    fixture.world.object_mut(key).unwrap().set_position(Vec3::new(0.0, 0.0, 30.0));

    let light_key = fixture.world.object(key).unwrap().lights()[0];
    let light = fixture.world.light(light_key).unwrap();
    assert!(light.position.abs_diff_eq(Vec3::new(0.0, 2.0, 30.0), 1e-5));
}

#[test]
fn test_removing_object_removes_its_lights() {
    let mut fixture = Fixture::new(light_model());
    let key = fixture.add_object(Vec3::new(0.0, 0.0, 20.0));
    let light_key = fixture.world.object(key).unwrap().lights()[0];

    assert!(fixture.world.remove_object(key));
    assert!(fixture.world.object(key).is_none());
    assert!(fixture.world.light(light_key).is_none());
    assert!(!fixture.world.remove_object(key));

    let view = fixture.world.camera_view(1000.0);
    let mut lights = 0;
    fixture.world.visit_lights(&view.frustum, |_, _| { lights += 1; Ok(()) }).unwrap();
    assert_eq!(lights, 0);
}
