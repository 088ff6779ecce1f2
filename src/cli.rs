use crate::bitmap::Bitmap;
use crate::canvas::Color;
use crate::config::{Config, load_config};
use crate::frame_dump::{FrameDump, write_frame_dump};
use crate::host::RedrawSignal;
use crate::labels::{LabelClassRegistry, LabelEngine, PlaceFeature, StaticLabelSource};
use crate::magnification::MagnificationConfig;
use crate::map::{FrameStats, MapRenderer};
use crate::overlay::{Corner, TextOverlayDrawer};
use crate::scale_bar::ScaleBarDrawer;
use crate::tiles::{MemoryTileCache, TileKey, TileRenderer};
use crate::viewport::Viewport;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "raster")]
use crate::raster::{PixmapCanvas as FrameCanvas, SvgRasterizer};
#[cfg(not(feature = "raster"))]
use crate::{canvas::RecordingCanvas as FrameCanvas, labels::LabelClass, labels::Rasterizer};

#[derive(Parser, Debug)]
#[command(name = "mlr", version, about = "Render map tiles with collision-free labels")]
pub struct Args {
    /// Place feature file (JSON5 array) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. JSON goes to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "png")]
    pub output_format: OutputFormat,

    /// Config JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Width
    #[arg(short = 'w', long = "width")]
    pub width: Option<u32>,

    /// Height
    #[arg(short = 'H', long = "height")]
    pub height: Option<u32>,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub lon: f64,

    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub lat: f64,

    #[arg(short = 'z', long, default_value_t = 2.0)]
    pub zoom: f64,

    /// Overrides the density derived magnification
    #[arg(short = 'm', long)]
    pub magnification: Option<f32>,

    /// Display density
    #[arg(long)]
    pub density: Option<f32>,

    /// Give up waiting for labels after this many frames
    #[arg(long, default_value_t = 50)]
    pub frames: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Json,
}

const FRAME_WAIT: Duration = Duration::from_secs(2);

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    apply_args(&mut config, &args);

    let input = read_input(args.input.as_deref())?;
    let features: Vec<PlaceFeature> = json5::from_str(&input).context("invalid place feature file")?;
    info!(target: "labels", features = features.len(), "loaded place features");

    let magnification = config
        .labels
        .magnification
        .unwrap_or_else(|| MagnificationConfig::for_display(&config.display).base_factor());
    let classes =
        LabelClassRegistry::from_configs(&config.classes, magnification, config.labels.fast_text_metrics)?;

    let fonts = load_fonts();
    let signal = Arc::new(RedrawSignal::new());
    let mut engine = LabelEngine::start(
        classes,
        StaticLabelSource::from_features(features),
        rasterizer(&fonts),
        signal.clone(),
    )?;
    engine.configure(&config.labels);

    let cache = Arc::new(MemoryTileCache::new(64));
    let mut tiles = TileRenderer::new(Arc::clone(&cache), &config.tiles, config.display);
    tiles.set_magnification(magnification);
    let mut map = MapRenderer::new(tiles, engine);
    if config.scale_bar.enabled {
        map.set_scale_bar(Some(ScaleBarDrawer::new(
            &config.scale_bar,
            config.labels.fast_text_metrics,
        )));
    }

    let viewport = Viewport::from_lon_lat(
        args.lon,
        args.lat,
        args.zoom,
        config.render.width,
        config.render.height,
    );
    let background = Color::from_hex(&config.render.background).unwrap_or(Color::WHITE);
    let (mut canvas, stats) =
        render_until_settled(&mut map, &cache, &signal, &viewport, background, &fonts, args.frames)?;
    if let Some(attribution) = &config.render.attribution {
        let overlay = TextOverlayDrawer::new(
            &config.text_overlay,
            config.display.density,
            config.labels.fast_text_metrics,
        );
        overlay.draw(&mut canvas, Corner::BottomRight, attribution, config.text_overlay.margin, 0);
    }

    match args.output_format {
        OutputFormat::Json => {
            let dump = FrameDump::capture(map.labels(), &map.effective_viewport(&viewport), stats);
            match args.output.as_deref() {
                Some(path) => write_frame_dump(path, &dump)?,
                None => println!("{}", serde_json::to_string_pretty(&dump)?),
            }
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&canvas, &output)?;
        }
    }
    Ok(())
}

fn apply_args(config: &mut Config, args: &Args) {
    if let Some(width) = args.width {
        config.render.width = width;
    }
    if let Some(height) = args.height {
        config.render.height = height;
    }
    if let Some(density) = args.density {
        config.display.density = density;
    }
    if args.magnification.is_some() {
        config.labels.magnification = args.magnification;
    }
}

/// Paints frames, answering tile requests in between, until neither tiles nor
/// labels have anything left to deliver.
fn render_until_settled(
    map: &mut MapRenderer<Arc<MemoryTileCache>>,
    cache: &MemoryTileCache,
    signal: &RedrawSignal,
    viewport: &Viewport,
    background: Color,
    fonts: &Fonts,
    max_frames: usize,
) -> Result<(FrameCanvas, FrameStats)> {
    let mut frame = 0;
    loop {
        frame += 1;
        let mut canvas = new_canvas(viewport.width, viewport.height, background, fonts)?;
        let stats = map.paint(viewport, &mut canvas);
        let loaded = load_pending_tiles(cache, map.tiles().tile_scale().tile_size.max(1));
        debug!(target: "display", frame, loaded, placed = stats.labels.placed, "frame done");

        if frame >= max_frames {
            info!(target: "display", frame, "frame limit reached");
            return Ok((canvas, stats));
        }
        if loaded > 0 {
            continue;
        }
        if map.labels().is_idle() && !signal.is_dirty() {
            info!(target: "display", frame, placed = stats.labels.placed, "map settled");
            return Ok((canvas, stats));
        }
        signal.wait(FRAME_WAIT);
    }
}

/// Answers every pending request with a generated tile.
fn load_pending_tiles(cache: &MemoryTileCache, tile_size: u32) -> usize {
    let pending = cache.take_pending();
    for (key, _) in &pending {
        cache.insert(*key, synthetic_tile(*key, tile_size));
    }
    pending.len()
}

/// Checkerboard tile, darker with zoom.
fn synthetic_tile(key: TileKey, size: u32) -> Bitmap {
    let shade = 235u8.saturating_sub((key.zoom.clamp(0, 20) * 3) as u8);
    let rgba = if (key.x + key.y).rem_euclid(2) == 0 {
        [shade, shade, shade.saturating_sub(12), 255]
    } else {
        [shade.saturating_sub(18), shade.saturating_sub(10), shade.saturating_sub(24), 255]
    };
    Bitmap::filled(size, size, rgba)
}

/// Fonts shared by label rasterization and overlay text.
#[cfg(feature = "raster")]
type Fonts = Arc<usvg::fontdb::Database>;

#[cfg(feature = "raster")]
fn load_fonts() -> Fonts {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    debug!(target: "display", faces = db.len(), "loaded system fonts");
    Arc::new(db)
}

#[cfg(feature = "raster")]
fn rasterizer(fonts: &Fonts) -> SvgRasterizer {
    SvgRasterizer::with_fontdb(Arc::clone(fonts))
}

#[cfg(feature = "raster")]
fn new_canvas(width: u32, height: u32, background: Color, fonts: &Fonts) -> Result<FrameCanvas> {
    let mut canvas = FrameCanvas::new(width, height)?.with_fontdb(Arc::clone(fonts));
    canvas.fill(background);
    Ok(canvas)
}

#[cfg(feature = "raster")]
fn write_png(canvas: &FrameCanvas, output: &Path) -> Result<()> {
    canvas.save_png(output)?;
    info!(target: "display", path = %output.display(), "wrote png");
    Ok(())
}

/// Solid caption-coloured boxes, enough for placement output without fonts.
#[cfg(not(feature = "raster"))]
struct BlockRasterizer;

#[cfg(not(feature = "raster"))]
impl Rasterizer for BlockRasterizer {
    fn rasterize(&self, class: &LabelClass, text: &str) -> Option<Bitmap> {
        let color = Color::from_hex(&class.style.fill_caption).unwrap_or(Color::BLACK);
        let width = class.box_width(text).max(1) as u32;
        let height = class.box_config().height.max(1) as u32;
        Some(Bitmap::filled(width, height, color.to_rgba()))
    }
}

#[cfg(not(feature = "raster"))]
type Fonts = ();

#[cfg(not(feature = "raster"))]
fn load_fonts() -> Fonts {}

#[cfg(not(feature = "raster"))]
fn rasterizer(_fonts: &Fonts) -> BlockRasterizer {
    BlockRasterizer
}

#[cfg(not(feature = "raster"))]
fn new_canvas(width: u32, height: u32, _background: Color, _fonts: &Fonts) -> Result<FrameCanvas> {
    Ok(FrameCanvas::new(width, height))
}

#[cfg(not(feature = "raster"))]
fn write_png(_canvas: &FrameCanvas, _output: &Path) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `raster` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
