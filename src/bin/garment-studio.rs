//! Command-line front end for the decal engine.
//!
//! ```text
//! garment-studio rasterize --text "Team 42" --color "#ffffff" --out team.png
//! garment-studio inspect public/shirt.glb
//! garment-studio project public/shirt.glb --garment shirt --text "10" --side back
//! garment-studio --config studio.json project --garment hoodie --text "Crew"
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use garment_studio::scene::{import, mesh_volumes};
use garment_studio::{
    AssetLoader, BaseColor, Catalog, Frame, GarmentId, GarmentSession, GltfAssetLoader,
    ImageSource, ImmediateLoader, Side, StudioConfig, StudioError, TextRasterizer, select_surface,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "garment-studio", version, about = "Garment decal engine tools")]
struct Cli {
    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a text layer to a PNG.
    Rasterize {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "sans-serif")]
        font: String,
        #[arg(long, default_value = "#000000")]
        color: String,
        #[arg(long)]
        out: PathBuf,
        /// Overrides the configured pixel ratio.
        #[arg(long)]
        pixel_ratio: Option<f32>,
    },
    /// List the mesh nodes of an asset and the surface chosen for decals.
    Inspect { asset: PathBuf },
    /// Run a session against a garment and report the decals.
    ///
    /// Without an explicit asset the garment's mesh is loaded from the
    /// configured asset root.
    Project {
        asset: Option<PathBuf>,
        #[arg(long, default_value = "shirt")]
        garment: String,
        #[arg(long)]
        text: Vec<String>,
        #[arg(long)]
        image: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = SideArg::Front)]
        side: SideArg,
        #[arg(long, default_value = "sans-serif")]
        font: String,
        #[arg(long, default_value = "#ffffff")]
        color: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SideArg {
    Front,
    Back,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Front => Side::Front,
            SideArg::Back => Side::Back,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StudioError> {
    let config = match &cli.config {
        Some(path) => StudioConfig::load(path)?,
        None => StudioConfig::default(),
    };

    match cli.command {
        Command::Rasterize {
            text,
            font,
            color,
            out,
            pixel_ratio,
        } => rasterize(&config, &text, &font, &color, &out, pixel_ratio),
        Command::Inspect { asset } => inspect(&asset),
        Command::Project {
            asset,
            garment,
            text,
            image,
            side,
            font,
            color,
        } => project(
            config,
            asset.as_deref(),
            &garment,
            &text,
            &image,
            side.into(),
            &font,
            &color,
        ),
    }
}

fn rasterize(
    config: &StudioConfig,
    text: &str,
    font: &str,
    color: &str,
    out: &Path,
    pixel_ratio: Option<f32>,
) -> Result<(), StudioError> {
    let color = BaseColor::parse(color)?;
    let rasterizer =
        TextRasterizer::with_system_fonts(config.text, pixel_ratio.unwrap_or(config.pixel_ratio));
    let raster = rasterizer.rasterize(text, font, color)?;
    raster.image.save(out)?;
    println!(
        "{}: {}x{} logical, {}x{} pixels",
        out.display(),
        raster.logical_width,
        raster.logical_height,
        raster.image.width(),
        raster.image.height()
    );
    Ok(())
}

fn inspect(asset: &Path) -> Result<(), StudioError> {
    let scene = import::load_path(asset)?;
    let root = glam::Mat4::IDENTITY;
    let volumes = mesh_volumes(&scene, root);
    let selected = select_surface(&scene, root);

    for (world, mesh) in scene.meshes(root) {
        let volume = volumes
            .iter()
            .find(|(id, _)| *id == mesh.id)
            .map(|(_, v)| *v)
            .unwrap_or(0.0);
        let marker = if selected.is_some_and(|s| s.node == mesh.id) {
            "*"
        } else {
            " "
        };
        let origin = world.transform_point3(glam::Vec3::ZERO);
        println!(
            "{marker} {:>5} {:<24} tris={:<7} volume={:<12.6} origin=({:.3}, {:.3}, {:.3})",
            mesh.id.to_string(),
            mesh.name.as_deref().unwrap_or("-"),
            mesh.mesh.triangle_count(),
            volume,
            origin.x,
            origin.y,
            origin.z
        );
    }
    if selected.is_none() {
        println!("no surface suitable for decals");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn project(
    config: StudioConfig,
    asset: Option<&Path>,
    garment: &str,
    texts: &[String],
    images: &[PathBuf],
    side: Side,
    font: &str,
    color: &str,
) -> Result<(), StudioError> {
    let garment: GarmentId = garment.parse()?;
    let color = BaseColor::parse(color)?;
    let layers = Layers {
        texts,
        images,
        side,
        font,
        color,
    };

    match asset {
        Some(asset) => {
            let mesh_asset = Catalog::builtin()
                .get(garment)
                .map(|g| g.mesh_asset.clone())
                .ok_or_else(|| StudioError::UnknownGarment(garment.to_string()))?;
            let scene = import::load_path(asset)?;
            let loader = ImmediateLoader::new().with_mesh(mesh_asset, scene);
            report(GarmentSession::with_system_fonts(config, loader), garment, &layers)
        }
        None => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .map_err(|source| StudioError::Io {
                    path: config.asset_root.clone(),
                    source,
                })?;
            let loader = GltfAssetLoader::from_config(&config, runtime.handle().clone());
            report(GarmentSession::with_system_fonts(config, loader), garment, &layers)
        }
    }
}

struct Layers<'a> {
    texts: &'a [String],
    images: &'a [PathBuf],
    side: Side,
    font: &'a str,
    color: BaseColor,
}

const FRAME: Duration = Duration::from_millis(16);
const MAX_FRAMES: u32 = 600;

fn report<L: AssetLoader>(
    mut session: GarmentSession<L>,
    garment: GarmentId,
    layers: &Layers<'_>,
) -> Result<(), StudioError> {
    session.select_garment(garment);
    session.set_active_side(layers.side);
    for text in layers.texts {
        if session.add_text_layer(text, layers.font, layers.color).is_none() {
            eprintln!("skipped blank text layer");
        }
    }
    for image in layers.images {
        if session.add_image_layer(ImageSource::from_path(image)).is_none() {
            eprintln!("skipped unreadable image {}", image.display());
        }
    }

    // Loads finish off-thread; step frames until nothing is outstanding.
    let mut frame = session.frame(0.0);
    for _ in 0..MAX_FRAMES {
        let waiting = match &frame {
            Frame::Loading { .. } => true,
            Frame::Garment(f) => f.pending_textures > 0,
            Frame::Unselected => false,
        };
        if !waiting {
            break;
        }
        std::thread::sleep(FRAME);
        frame = session.frame(FRAME.as_secs_f32());
    }

    match frame {
        Frame::Garment(frame) => {
            if frame.scene.is_none() {
                println!("garment mesh failed to load");
            }
            for patch in &frame.decals {
                let (w, h) = patch.texture.dimensions();
                println!(
                    "{} on {:?} -> node {}: {} triangles, texture {}x{}",
                    patch.layer_id,
                    patch.side,
                    patch.target,
                    patch.mesh.triangle_count(),
                    w,
                    h
                );
            }
            if frame.pending_textures > 0 {
                println!("{} textures still pending", frame.pending_textures);
            }
        }
        Frame::Loading { progress } => println!("still loading ({}%)", progress.percent()),
        Frame::Unselected => println!("no garment selected"),
    }

    if let Some(total) = session.total_price() {
        println!("total price: {total}");
    }
    Ok(())
}
