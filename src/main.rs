use clap::{Parser, Subcommand};
use pixel_loupe::config;
use pixel_loupe::document::Page;
use pixel_loupe::events::{Event, Topic};
use pixel_loupe::geometry::{Dimensions, PointerEvent};
use pixel_loupe::lens::{Lens, LensCapabilities};
use pixel_loupe::output::{self, MoveReport, PreviewRun};
use pixel_loupe::raster::{ImageHandler, LoadState};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pixel-loupe")]
#[command(about = "Headless image magnifier: sample the pixels under a lens")]
#[command(long_about = "\
Headless image magnifier: sample the pixels under a lens

The image is loaded and mounted into an in-memory page, a lens is attached,
and each --at position is replayed as a pointer move. Every move writes the
pixels under the lens, copied 1:1, as a PNG preview.

  pixel-loupe preview photo.jpg --at 120,80 --at 400,300 --lens 64x64

Lens positions are pointer-centered and may run off the image; samples
outside it come back transparent.

Run 'pixel-loupe gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct PreviewArgs {
    /// Image to magnify (path or file:// URL)
    image: String,

    /// Pointer position, repeatable
    #[arg(long = "at", value_name = "X,Y", value_parser = parse_point, required = true)]
    at: Vec<PointerEvent>,

    /// Lens size, overrides the config file
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    lens: Option<Dimensions>,

    /// Config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory the preview PNGs are written to
    #[arg(long, default_value = "loupe-out")]
    out_dir: PathBuf,

    /// Also write the overlay surface for every move
    #[arg(long)]
    overlay: bool,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Replay pointer positions over an image and write the previews
    Preview(PreviewArgs),
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Preview(args) => {
            let run = preview(&args)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&run)?);
            } else {
                output::print_run(&run);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn preview(args: &PreviewArgs) -> Result<PreviewRun, Box<dyn std::error::Error>> {
    let config = config::load_config(args.config.as_deref())?;
    let lens_size = args
        .lens
        .unwrap_or(Dimensions::new(config.lens.width, config.lens.height));

    let mut handler: ImageHandler =
        ImageHandler::new(args.image.as_str(), Arc::new(config.file_loader()))
            .with_style(config.lens_style());

    let loaded = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&loaded);
    let _load = handler.on(Topic::Load, move |event| {
        if let Event::Load(info) = event {
            *sink.borrow_mut() = Some(info.clone());
        }
    });

    match handler.wait(config.load_timeout()) {
        LoadState::Loaded(_) => {}
        LoadState::Failed => {
            let reason = handler
                .load_error()
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("failed to load {}", args.image));
            return Err(reason.into());
        }
        LoadState::Pending => {
            return Err(format!(
                "{} did not load within {:?}",
                args.image,
                config.load_timeout()
            )
            .into());
        }
    }
    let info = loaded
        .borrow_mut()
        .take()
        .ok_or("image loaded without a load event")?;

    let mut page = Page::new();
    page.add_container(".container");
    page.add_container(".preview");
    handler.set_parent(&mut page, ".container")?;

    let mut lens = Lens::new(lens_size.width, lens_size.height);
    lens.output_onto(&page, ".preview")?;
    handler.attach_lens(lens)?;

    std::fs::create_dir_all(&args.out_dir)?;
    let mut moves = Vec::with_capacity(args.at.len());
    for (i, &pointer) in args.at.iter().enumerate() {
        let index = i + 1;
        let Some(rect) = handler.on_pointer_move(&mut page, pointer)? else {
            continue;
        };
        let mut report = MoveReport::new(index, pointer, rect, info.dimensions);

        if let Some(preview) = handler.preview() {
            let path = args.out_dir.join(format!("preview-{index:03}.png"));
            preview.pixels().save(&path)?;
            report.preview = Some(path);
        }
        if args.overlay {
            if let Some(overlay) = handler.overlay() {
                let path = args.out_dir.join(format!("overlay-{index:03}.png"));
                overlay.pixels().save(&path)?;
                report.overlay = Some(path);
            }
        }
        moves.push(report);
    }

    Ok(PreviewRun {
        url: info.url,
        dimensions: info.dimensions,
        lens: handler.lens().map(|l| l.dimensions()).unwrap_or(lens_size),
        moves,
    })
}

/// Parse `X,Y` into a pointer position.
fn parse_point(s: &str) -> Result<PointerEvent, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let coord = |v: &str| {
        v.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| format!("invalid coordinate {v:?}"))
    };
    Ok(PointerEvent::new(coord(x)?, coord(y)?))
}

/// Parse `WxH` into a non-empty lens size.
fn parse_size(s: &str) -> Result<Dimensions, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s:?}"))?;
    let side = |v: &str| {
        v.trim()
            .parse::<u32>()
            .ok()
            .filter(|&v| v > 0)
            .ok_or_else(|| format!("invalid lens side {v:?}"))
    };
    Ok(Dimensions::new(side(w)?, side(h)?))
}
