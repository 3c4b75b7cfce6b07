// ============================================================================
// RPD PROJECT FILE FORMAT
// ============================================================================
//
// Layered project persistence via serde + bincode. Layer pixels travel as one
// PNG blob per layer; scalar layer state rides alongside. Loading validates
// the whole file before any state is constructed, so a malformed file never
// leaves a half-built document behind.
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::{ImageFormat, ImageOutputFormat};
use serde::{Deserialize, Serialize};

use crate::canvas::{BlendMode, CanvasState, Layer, Surface};
use crate::error::EditError;

/// Magic header for the legacy format (v0, no layer transforms).
const RPD_MAGIC_V0: &str = "RPD0";
/// Magic header for the current format (v1).
const RPD_MAGIC_V1: &str = "RPD1";

/// Maximum supported dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted project files.
const MAX_CANVAS_DIM: u32 = 32_768;
/// Maximum number of layers in a project file.
const MAX_LAYERS: usize = 256;

/// V1 serializable project file.
#[derive(Serialize, Deserialize)]
pub struct ProjectFile {
    magic: String,
    width: u32,
    height: u32,
    active_layer_id: u32,
    layer_counter: u32,
    layers: Vec<LayerData>,
}

/// V1 serializable layer — scalar state plus PNG-encoded pixels.
#[derive(Serialize, Deserialize)]
struct LayerData {
    id: u32,
    name: String,
    visible: bool,
    opacity: f32,
    blend_mode: u8,
    x: f32,
    y: f32,
    scale_x: f32,
    scale_y: f32,
    rotation: f32,
    png: Vec<u8>,
}

/// V0 (legacy) project file — predates per-layer transforms; loading one
/// gives every layer the identity transform.
#[derive(Serialize, Deserialize)]
struct ProjectFileV0 {
    magic: String,
    width: u32,
    height: u32,
    active_layer_id: u32,
    layer_counter: u32,
    layers: Vec<LayerDataV0>,
}

#[derive(Serialize, Deserialize)]
struct LayerDataV0 {
    id: u32,
    name: String,
    visible: bool,
    opacity: f32,
    blend_mode: u8,
    png: Vec<u8>,
}

/// Build the serializable project data from canvas state. Copies pixels;
/// safe to hand the result to a background thread for the disk write.
pub fn build_project(state: &CanvasState) -> Result<ProjectFile, EditError> {
    let mut layers = Vec::with_capacity(state.layers.len());
    for layer in &state.layers {
        let mut png = Vec::new();
        layer
            .surface
            .as_image()
            .write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .map_err(|e| EditError::MalformedProject(format!("PNG encode failed: {e}")))?;
        layers.push(LayerData {
            id: layer.id,
            name: layer.name.clone(),
            visible: layer.visible,
            opacity: layer.opacity,
            blend_mode: layer.blend_mode.to_u8(),
            x: layer.x,
            y: layer.y,
            scale_x: layer.scale_x,
            scale_y: layer.scale_y,
            rotation: layer.rotation,
            png,
        });
    }
    Ok(ProjectFile {
        magic: RPD_MAGIC_V1.to_string(),
        width: state.width,
        height: state.height,
        active_layer_id: state.active_layer_id,
        layer_counter: state.layer_counter,
        layers,
    })
}

/// Save a CanvasState as a .rpd project file (v1).
pub fn save_project(state: &CanvasState, path: &Path) -> Result<(), EditError> {
    let project = build_project(state)?;
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &project)
        .map_err(|e| EditError::MalformedProject(e.to_string()))?;
    Ok(())
}

/// Load a .rpd project file (v0 or v1).
pub fn load_project(path: &Path) -> Result<CanvasState, EditError> {
    let raw = std::fs::read(path)?;
    decode_project(&raw)
}

/// Load any supported input into a [`CanvasState`]: `.rpd` projects keep all
/// their layers, every other raster format becomes a single-layer document
/// named after the file stem.
pub fn load_document(path: &Path) -> Result<CanvasState, EditError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if ext == "rpd" {
        return load_project(path);
    }

    let img = image::open(path)
        .map_err(|e| EditError::MalformedProject(format!("image decode failed: {e}")))?
        .to_rgba8();
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Background")
        .to_string();

    let mut state = CanvasState::new(img.width(), img.height());
    if let Some(layer) = state.active_layer_mut() {
        layer.name = name;
        layer.surface = Surface::from_image(img);
    }
    Ok(state)
}

/// Decode project bytes. Dispatches on the magic string: bincode encodes a
/// String as an 8-byte length prefix plus UTF-8 data, so with a 4-char magic
/// the version tag sits at bytes 8..12.
pub fn decode_project(raw: &[u8]) -> Result<CanvasState, EditError> {
    if raw.len() < 12 {
        return Err(EditError::MalformedProject("file too small".into()));
    }
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    match magic {
        RPD_MAGIC_V1 => {
            let project: ProjectFile =
                bincode::deserialize(raw).map_err(|e| EditError::MalformedProject(e.to_string()))?;
            project_to_state(project)
        }
        RPD_MAGIC_V0 => {
            let project: ProjectFileV0 =
                bincode::deserialize(raw).map_err(|e| EditError::MalformedProject(e.to_string()))?;
            project_to_state(upgrade_v0(project))
        }
        other => Err(EditError::MalformedProject(format!(
            "unknown magic '{other}'"
        ))),
    }
}

fn upgrade_v0(project: ProjectFileV0) -> ProjectFile {
    ProjectFile {
        magic: RPD_MAGIC_V1.to_string(),
        width: project.width,
        height: project.height,
        active_layer_id: project.active_layer_id,
        layer_counter: project.layer_counter,
        layers: project
            .layers
            .into_iter()
            .map(|ld| LayerData {
                id: ld.id,
                name: ld.name,
                visible: ld.visible,
                opacity: ld.opacity,
                blend_mode: ld.blend_mode,
                x: 0.0,
                y: 0.0,
                scale_x: 1.0,
                scale_y: 1.0,
                rotation: 0.0,
                png: ld.png,
            })
            .collect(),
    }
}

/// Validate a deserialized project and build the live canvas state.
fn project_to_state(project: ProjectFile) -> Result<CanvasState, EditError> {
    if project.width == 0 || project.height == 0 {
        return Err(EditError::MalformedProject(
            "canvas dimensions cannot be zero".into(),
        ));
    }
    if project.width > MAX_CANVAS_DIM || project.height > MAX_CANVAS_DIM {
        return Err(EditError::MalformedProject(format!(
            "canvas size {}x{} exceeds maximum {}x{}",
            project.width, project.height, MAX_CANVAS_DIM, MAX_CANVAS_DIM
        )));
    }
    if project.layers.is_empty() {
        return Err(EditError::MalformedProject("project has no layers".into()));
    }
    if project.layers.len() > MAX_LAYERS {
        return Err(EditError::MalformedProject(format!(
            "project has {} layers, maximum is {}",
            project.layers.len(),
            MAX_LAYERS
        )));
    }

    let mut layers = Vec::with_capacity(project.layers.len());
    for ld in project.layers {
        let img = image::load_from_memory_with_format(&ld.png, ImageFormat::Png)
            .map_err(|e| {
                EditError::MalformedProject(format!("layer '{}': PNG decode failed: {e}", ld.name))
            })?
            .to_rgba8();
        // Cropped documents keep full-size layer surfaces, so surfaces may
        // be larger than the document. Only the hard cap applies.
        if img.width() == 0
            || img.height() == 0
            || img.width() > MAX_CANVAS_DIM
            || img.height() > MAX_CANVAS_DIM
        {
            return Err(EditError::MalformedProject(format!(
                "layer '{}' has invalid size {}x{}",
                ld.name,
                img.width(),
                img.height()
            )));
        }

        let mut layer = Layer::new(ld.id, ld.name, 1, 1);
        layer.visible = ld.visible;
        layer.opacity = ld.opacity.clamp(0.0, 1.0);
        layer.blend_mode = BlendMode::from_u8(ld.blend_mode);
        layer.x = ld.x;
        layer.y = ld.y;
        layer.scale_x = ld.scale_x;
        layer.scale_y = ld.scale_y;
        layer.rotation = ld.rotation;
        layer.surface = Surface::from_image(img);
        layers.push(layer);
    }

    // Repair references rather than reject: a stale active id falls back to
    // the bottom layer, and the id counter never trails an existing id.
    let active_layer_id = if layers.iter().any(|l| l.id == project.active_layer_id) {
        project.active_layer_id
    } else {
        layers[0].id
    };
    let max_id = layers.iter().map(|l| l.id).max().unwrap_or(0);
    let layer_counter = project.layer_counter.max(max_id);

    Ok(CanvasState {
        layers,
        active_layer_id,
        layer_counter,
        width: project.width,
        height: project.height,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn encode(project: &ProjectFile) -> Vec<u8> {
        bincode::serialize(project).unwrap()
    }

    fn sample_state() -> CanvasState {
        let mut state = CanvasState::new(12, 10);
        state.active_layer_mut().unwrap().surface.fill(Rgba([10, 20, 30, 255]));
        state.add_layer(Some("Ink"));
        {
            let layer = state.active_layer_mut().unwrap();
            layer.surface.set_pixel(3, 4, Rgba([200, 0, 0, 128]));
            layer.x = 2.5;
            layer.y = -1.0;
            layer.scale_x = 2.0;
            layer.rotation = 0.25;
            layer.opacity = 0.5;
            layer.blend_mode = BlendMode::Multiply;
        }
        state
    }

    #[test]
    fn round_trip_preserves_layers_and_transforms() {
        let state = sample_state();
        let raw = encode(&build_project(&state).unwrap());
        let loaded = decode_project(&raw).unwrap();

        assert_eq!(loaded.width, 12);
        assert_eq!(loaded.height, 10);
        assert_eq!(loaded.layers.len(), 2);
        assert_eq!(loaded.active_layer_id, state.active_layer_id);
        assert_eq!(loaded.layer_counter, state.layer_counter);

        let ink = &loaded.layers[1];
        assert_eq!(ink.name, "Ink");
        assert_eq!(ink.surface.pixel(3, 4), Rgba([200, 0, 0, 128]));
        assert_eq!((ink.x, ink.y), (2.5, -1.0));
        assert_eq!((ink.scale_x, ink.scale_y), (2.0, 1.0));
        assert_eq!(ink.rotation, 0.25);
        assert_eq!(ink.opacity, 0.5);
        assert_eq!(ink.blend_mode, BlendMode::Multiply);
        assert_eq!(
            loaded.layers[0].surface.pixel(0, 0),
            Rgba([10, 20, 30, 255])
        );
    }

    #[test]
    fn v0_files_load_with_identity_transforms() {
        let state = sample_state();
        let mut v1 = build_project(&state).unwrap();
        v1.magic = RPD_MAGIC_V0.to_string();
        let v0 = ProjectFileV0 {
            magic: v1.magic.clone(),
            width: v1.width,
            height: v1.height,
            active_layer_id: v1.active_layer_id,
            layer_counter: v1.layer_counter,
            layers: v1
                .layers
                .into_iter()
                .map(|ld| LayerDataV0 {
                    id: ld.id,
                    name: ld.name,
                    visible: ld.visible,
                    opacity: ld.opacity,
                    blend_mode: ld.blend_mode,
                    png: ld.png,
                })
                .collect(),
        };
        let raw = bincode::serialize(&v0).unwrap();
        let loaded = decode_project(&raw).unwrap();

        let ink = &loaded.layers[1];
        assert_eq!((ink.x, ink.y), (0.0, 0.0));
        assert_eq!((ink.scale_x, ink.scale_y), (1.0, 1.0));
        assert_eq!(ink.rotation, 0.0);
        // Non-transform state still round-trips.
        assert_eq!(ink.opacity, 0.5);
        assert_eq!(ink.surface.pixel(3, 4), Rgba([200, 0, 0, 128]));
    }

    #[test]
    fn unknown_magic_is_rejected() {
        let mut project = build_project(&sample_state()).unwrap();
        project.magic = "XYZ9".to_string();
        let raw = encode(&project);
        assert!(matches!(
            decode_project(&raw),
            Err(EditError::MalformedProject(_))
        ));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let mut project = build_project(&sample_state()).unwrap();
        project.width = 0;
        let raw = encode(&project);
        assert!(decode_project(&raw).is_err());
    }

    #[test]
    fn corrupt_layer_png_is_rejected() {
        let mut project = build_project(&sample_state()).unwrap();
        project.layers[0].png = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let raw = encode(&project);
        assert!(matches!(
            decode_project(&raw),
            Err(EditError::MalformedProject(_))
        ));
    }

    #[test]
    fn truncated_files_are_rejected() {
        let raw = encode(&build_project(&sample_state()).unwrap());
        assert!(decode_project(&raw[..20]).is_err());
        assert!(decode_project(&raw[..4]).is_err());
    }

    #[test]
    fn stale_active_id_falls_back_to_the_bottom_layer() {
        let mut project = build_project(&sample_state()).unwrap();
        project.active_layer_id = 999;
        let raw = encode(&project);
        let loaded = decode_project(&raw).unwrap();
        assert_eq!(loaded.active_layer_id, loaded.layers[0].id);
    }
}
