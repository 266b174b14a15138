//! End-to-end session behavior driven through the public API.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use garment_studio::resvg::usvg::fontdb::Database;
use garment_studio::{
    AssetLoader, BaseColor, Catalog, Direction, Frame, GarmentFrame, GarmentId, GarmentSession,
    ImageSource, ImmediateLoader, LayerField, LayerKind, MeshData, NodeId, Result, SceneNode,
    SessionState, Side, StudioConfig, StudioError, TextRasterizer,
};
use glam::{Mat4, Vec3};
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::oneshot::{self, Receiver, Sender};

// ============================================================================
// Fixtures
// ============================================================================

/// A garment-shaped box: wide and tall, shallow in z.
fn body(size: Vec3) -> MeshData {
    let h = size * 0.5;
    let positions = vec![
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
        Vec3::new(h.x, h.y, h.z),
    ];
    let indices = vec![
        0, 2, 1, 1, 2, 3, 4, 5, 6, 5, 7, 6, 0, 1, 4, 1, 5, 4, 2, 6, 3, 3, 6, 7, 0, 4, 2, 2, 4, 6,
        1, 3, 5, 3, 7, 5,
    ];
    MeshData::new(positions, indices)
}

fn garment_scene(scale: f32) -> SceneNode {
    SceneNode::group(
        NodeId::new(0),
        Mat4::IDENTITY,
        vec![
            SceneNode::mesh(NodeId::new(1), Mat4::IDENTITY, body(Vec3::new(0.05, 0.05, 0.05) * scale)),
            SceneNode::mesh(NodeId::new(2), Mat4::IDENTITY, body(Vec3::new(0.6, 0.7, 0.25) * scale)),
        ],
    )
}

fn rasterizer(config: &StudioConfig) -> TextRasterizer {
    TextRasterizer::new(Arc::new(Database::new()), config.text, 1.0)
}

fn immediate_session() -> GarmentSession<ImmediateLoader> {
    let config = StudioConfig::default();
    let loader = ImmediateLoader::new()
        .with_mesh("shirt.glb", garment_scene(1.0))
        .with_mesh("hoodie.glb", garment_scene(100.0))
        .with_mesh("cap.glb", garment_scene(1.0));
    let rasterizer = rasterizer(&config);
    GarmentSession::new(config, Catalog::builtin(), loader, rasterizer)
}

fn garment_frame(frame: Frame) -> GarmentFrame {
    match frame {
        Frame::Garment(frame) => frame,
        other => panic!("expected a garment frame, got {other:?}"),
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Loader whose requests are answered by the test, in any order.
#[derive(Clone, Default)]
struct ManualLoader {
    meshes: Rc<RefCell<Vec<(String, Sender<Result<SceneNode>>)>>>,
    images: Rc<RefCell<HashMap<u64, Sender<Result<RgbaImage>>>>>,
}

impl ManualLoader {
    fn complete_mesh(&self, asset: &str, scene: SceneNode) {
        let mut meshes = self.meshes.borrow_mut();
        let index = meshes
            .iter()
            .position(|(name, _)| name == asset)
            .expect("mesh was requested");
        let (_, tx) = meshes.remove(index);
        let _ = tx.send(Ok(scene));
    }

    fn fail_mesh(&self, asset: &str) {
        let mut meshes = self.meshes.borrow_mut();
        let index = meshes
            .iter()
            .position(|(name, _)| name == asset)
            .expect("mesh was requested");
        let (_, tx) = meshes.remove(index);
        let _ = tx.send(Err(StudioError::EmptyAsset(asset.to_string())));
    }

    fn complete_image(&self, source: &ImageSource) {
        let tx = self
            .images
            .borrow_mut()
            .remove(&source.digest())
            .expect("image was requested");
        let _ = tx.send(source.decode());
    }

    fn requested_meshes(&self) -> usize {
        self.meshes.borrow().len()
    }
}

impl AssetLoader for ManualLoader {
    fn load_mesh(&self, asset: &str) -> Receiver<Result<SceneNode>> {
        let (tx, rx) = oneshot::channel();
        self.meshes.borrow_mut().push((asset.to_string(), tx));
        rx
    }

    fn decode_image(&self, source: &ImageSource) -> Receiver<Result<RgbaImage>> {
        let (tx, rx) = oneshot::channel();
        self.images.borrow_mut().insert(source.digest(), tx);
        rx
    }
}

fn manual_session() -> (GarmentSession<ManualLoader>, ManualLoader) {
    let config = StudioConfig::default();
    let loader = ManualLoader::default();
    let rasterizer = rasterizer(&config);
    let session = GarmentSession::new(config, Catalog::builtin(), loader.clone(), rasterizer);
    (session, loader)
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn price_follows_layer_count() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    for text in ["uno", "dos", "tres"] {
        session.add_text_layer(text, "sans-serif", BaseColor::BLACK).unwrap();
    }
    assert_eq!(session.total_price(), Some(20_015));

    let first = session.layers().iter().next().unwrap().id();
    session.delete_layer(first);
    assert_eq!(session.total_price(), Some(20_010));
}

#[test]
fn switching_garments_always_clears_layers() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    for i in 0..5 {
        session
            .add_text_layer(&format!("L{i}"), "serif", BaseColor::WHITE)
            .unwrap();
    }
    session.set_draft_text("half typed");
    session.frame(0.016);

    session.select_garment(GarmentId::Hoodie);
    assert!(session.layers().is_empty());
    assert!(session.draft().text.is_empty());
    assert_eq!(session.state(), SessionState::Configuring);
    assert_eq!(session.total_price(), Some(45_000));

    session.add_text_layer("again", "serif", BaseColor::WHITE).unwrap();
    session.select_garment(GarmentId::Hoodie);
    assert!(session.layers().is_empty());
}

#[test]
fn active_side_only_affects_new_layers() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    let front = session.add_text_layer("F", "serif", BaseColor::BLACK).unwrap();
    session.set_active_side(Side::Back);
    let back = session.add_text_layer("B", "serif", BaseColor::BLACK).unwrap();

    let layers = session.layers();
    assert_eq!(layers.get(front).unwrap().side(), Side::Front);
    assert_eq!(layers.get(back).unwrap().side(), Side::Back);
    assert!(layers.get(back).unwrap().transform().position.z < 0.0);
}

#[test]
fn scale_edits_follow_layer_kind() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    let text = session.add_text_layer("T", "serif", BaseColor::BLACK).unwrap();
    let image = session
        .add_image_layer(ImageSource::from_bytes(png(8, 8)))
        .unwrap();

    assert!(session.update_layer(text, LayerField::Scale, 0.6));
    assert!(session.update_layer(image, LayerField::Scale, 0.6));

    let layers = session.layers();
    assert_eq!(layers.get(text).unwrap().kind(), LayerKind::Text);
    assert_eq!(layers.get(text).unwrap().transform().scale, Vec3::new(0.6, 0.3, 0.6));
    assert_eq!(layers.get(image).unwrap().transform().scale, Vec3::splat(0.6));
}

#[test]
fn reorder_and_delete_keep_editor_consistent() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    let ids: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|t| session.add_text_layer(t, "serif", BaseColor::BLACK).unwrap())
        .collect();

    assert!(!session.reorder_index(0, Direction::Up));
    assert!(!session.reorder_index(2, Direction::Down));
    assert!(session.reorder_layer(ids[2], Direction::Up));
    let order: Vec<_> = session.layers().iter().map(|l| l.id()).collect();
    assert_eq!(order, vec![ids[0], ids[2], ids[1]]);

    assert!(session.open_editor(ids[2]));
    assert!(session.delete_layer(ids[2]));
    assert_eq!(session.editing(), None);
}

#[test]
fn decals_render_in_layer_order_on_the_body() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    let a = session.add_text_layer("A", "serif", BaseColor::BLACK).unwrap();
    session.set_active_side(Side::Back);
    let b = session.add_text_layer("B", "serif", BaseColor::BLACK).unwrap();

    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.garment, GarmentId::Shirt);
    let ids: Vec<_> = frame.decals.iter().map(|d| d.layer_id).collect();
    assert_eq!(ids, vec![a, b]);
    for patch in &frame.decals {
        assert_eq!(patch.target, NodeId::new(2));
        assert!(!patch.mesh.is_empty());
        assert!(patch.plane.is_none());
    }
}

#[test]
fn normalized_garments_project_in_garment_space() {
    let mut session = immediate_session();
    // The hoodie asset is authored 100x too large and scaled by 0.01.
    session.select_garment(GarmentId::Hoodie);
    session.add_text_layer("H", "serif", BaseColor::BLACK).unwrap();

    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.decals.len(), 1);
    let patch = &frame.decals[0];
    assert!(!patch.mesh.is_empty());
    for p in &patch.mesh.positions {
        let garment_space = patch.mesh_to_garment.transform_point3(*p);
        assert!((garment_space.z - 0.125).abs() < 1e-3);
    }
}

#[test]
fn placeholder_until_mesh_arrives() {
    let (mut session, loader) = manual_session();
    session.select_garment(GarmentId::Shirt);
    session.add_text_layer("wait", "serif", BaseColor::BLACK).unwrap();

    match session.frame(0.016) {
        Frame::Loading { progress } => assert_eq!(progress.percent(), 0),
        other => panic!("expected placeholder, got {other:?}"),
    }

    loader.complete_mesh("shirt.glb", garment_scene(1.0));
    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.decals.len(), 1);
    assert_eq!(session.progress().percent(), 100);
}

#[test]
fn stale_mesh_results_are_discarded() {
    let (mut session, loader) = manual_session();
    session.select_garment(GarmentId::Shirt);
    session.select_garment(GarmentId::Cap);
    assert_eq!(loader.requested_meshes(), 2);

    // The shirt answers late: it must not become the cap's mesh.
    loader.complete_mesh("shirt.glb", garment_scene(1.0));
    assert!(matches!(session.frame(0.016), Frame::Loading { .. }));

    loader.complete_mesh("cap.glb", garment_scene(1.0));
    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.garment, GarmentId::Cap);
    assert!(frame.scene.is_some());
}

#[test]
fn layers_survive_a_failed_load() {
    let (mut session, loader) = manual_session();
    session.select_garment(GarmentId::Shirt);
    let id = session.add_text_layer("kept", "serif", BaseColor::BLACK).unwrap();

    loader.fail_mesh("shirt.glb");
    let frame = garment_frame(session.frame(0.016));
    assert!(frame.scene.is_none());
    assert!(frame.decals.is_empty());
    assert!(session.load_failed());
    assert_eq!(session.layers().len(), 1);

    assert!(session.retry_load());
    assert!(matches!(session.frame(0.016), Frame::Loading { .. }));
    loader.complete_mesh("shirt.glb", garment_scene(1.0));
    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.decals.len(), 1);
    assert_eq!(frame.decals[0].layer_id, id);
}

#[test]
fn reference_planes_follow_config() {
    let config = StudioConfig {
        reference_planes: true,
        ..StudioConfig::default()
    };
    let loader = ImmediateLoader::new().with_mesh("shirt.glb", garment_scene(1.0));
    let rasterizer = rasterizer(&config);
    let mut session = GarmentSession::new(config, Catalog::builtin(), loader, rasterizer);
    session.select_garment(GarmentId::Shirt);
    session.add_text_layer("P", "serif", BaseColor::BLACK).unwrap();

    let frame = garment_frame(session.frame(0.016));
    assert!(frame.decals[0].plane.is_some());
}

#[test]
fn image_decals_wait_for_their_texture() {
    let (mut session, loader) = manual_session();
    session.select_garment(GarmentId::Shirt);
    loader.complete_mesh("shirt.glb", garment_scene(1.0));
    session.frame(0.016);

    let source = ImageSource::from_bytes(png(16, 8));
    let id = session.add_image_layer(source.clone()).unwrap();
    let frame = garment_frame(session.frame(0.016));
    assert!(frame.decals.is_empty());
    assert_eq!(frame.pending_textures, 1);

    loader.complete_image(&source);
    let frame = garment_frame(session.frame(0.016));
    assert_eq!(frame.pending_textures, 0);
    assert_eq!(frame.decals.len(), 1);
    assert_eq!(frame.decals[0].layer_id, id);
    assert_eq!(frame.decals[0].texture.dimensions(), (16, 8));
}

#[test]
fn stale_image_results_are_discarded() {
    let (mut session, loader) = manual_session();
    session.select_garment(GarmentId::Shirt);
    loader.complete_mesh("shirt.glb", garment_scene(1.0));
    session.frame(0.016);

    let source = ImageSource::from_bytes(png(4, 4));
    session.add_image_layer(source.clone()).unwrap();
    session.select_garment(GarmentId::Cap);
    loader.complete_image(&source);
    loader.complete_mesh("cap.glb", garment_scene(1.0));

    let frame = garment_frame(session.frame(0.016));
    assert!(frame.decals.is_empty());
    assert_eq!(frame.pending_textures, 0);
    assert!(session.layers().is_empty());
}

#[test]
fn malformed_inputs_leave_state_unchanged() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    session.add_text_layer("keep", "serif", BaseColor::BLACK).unwrap();
    let before: Vec<_> = session.layers().iter().cloned().collect();

    assert!(session.add_text_layer("   ", "serif", BaseColor::BLACK).is_none());
    assert!(
        session
            .add_image_layer(ImageSource::from_data_uri("data:text/html,<b>x</b>"))
            .is_none()
    );
    let after: Vec<_> = session.layers().iter().cloned().collect();
    assert_eq!(before, after);
}

#[test]
fn base_color_eases_toward_target() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Shirt);
    session.frame(0.0);
    session.set_base_color(BaseColor::BLACK);

    let first = garment_frame(session.frame(1.0 / 60.0));
    let red = first.materials[0].1[0];
    assert!(red > 0.0 && red < BaseColor::parse("#e639a8").unwrap().to_linear().red);

    let settled = garment_frame(session.frame(5.0));
    assert!(settled.materials.iter().all(|(_, rgba)| rgba[0] < 1e-3));
}

#[test]
fn summary_serializes_for_checkout() {
    let mut session = immediate_session();
    session.select_garment(GarmentId::Cap);
    session.set_base_color(BaseColor::parse("#10b981").unwrap());
    session.add_text_layer("Cap crew", "serif", BaseColor::WHITE).unwrap();

    let summary = session.summary().unwrap();
    assert_eq!(summary.total_price, 12_005);
    let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();
    assert_eq!(json["garment"], "cap");
    assert_eq!(json["baseColor"], "#10b981");
    assert_eq!(json["layers"][0]["text"], "Cap crew");
}
