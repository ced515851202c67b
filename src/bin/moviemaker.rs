use std::{f64::consts::TAU, path::PathBuf, rc::Rc};

use anyhow::Context as _;
use clap::{Parser, ValueEnum};

use moviemaker::{
    Binding, CircleProperty, Clip, ClipLifecycle, Ease, EvalScope, FrameIndex, MovieMaker, Params,
    PropertySet, Rgba8, TraceSurface, Value, load_font,
};

#[derive(Parser, Debug)]
#[command(name = "moviemaker", version)]
struct Cli {
    /// Built-in scene to render.
    #[arg(long, value_enum)]
    scene: Scene,

    /// Output MJPEG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 1920)]
    width: u16,

    #[arg(long, default_value_t = 1080)]
    height: u16,

    /// Number of frames to render (defaults to the scene's own length).
    #[arg(long)]
    frames: Option<u64>,

    /// JPEG quality, 1-100.
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// TTF/OTF font file; required by scenes that draw text.
    #[arg(long)]
    font: Option<PathBuf>,

    /// Instead of encoding, print the given frame's draw ops as JSON.
    #[arg(long, value_name = "FRAME")]
    dump_trace: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Scene {
    /// An analogue clock face sweeping twelve hours.
    Clock,
    /// Rotating monochrome bars.
    Testcard,
    /// Titles dissolving into orbiting text, with a timecode overlay.
    Titles,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let scene = match cli.scene {
        Scene::Clock => clock_scene(),
        Scene::Testcard => testcard_scene()?,
        Scene::Titles => titles_scene()?,
    };

    if let Some(frame) = cli.dump_trace {
        let mut surface = TraceSurface::new(f64::from(cli.width), f64::from(cli.height));
        let mut scope = EvalScope::new();
        scene.make_frame(&mut surface, &mut scope, FrameIndex(frame))?;
        println!("{}", serde_json::to_string_pretty(surface.ops())?);
        return Ok(());
    }

    let mut maker = MovieMaker::new(cli.width, cli.height).quality(cli.quality);
    if let Some(font) = &cli.font {
        maker = maker.font_bytes(load_font(font)?);
    }
    if let Some(frames) = cli.frames {
        maker = maker.frames(frames);
    }

    let stats = maker
        .write_to(&scene, &cli.out)
        .with_context(|| format!("render scene to '{}'", cli.out.display()))?;
    eprintln!("wrote {} frames to {}", stats.frames_rendered, cli.out.display());
    Ok(())
}

/// Twelve hours of clock in one clip; pass --frames to render a slice.
fn clock_scene() -> Rc<Clip> {
    Clip::atomic(12 * 60 * 60 * 25, |surface, scope, _| {
        let seconds = 12.0 * 60.0 * 60.0 * scope.portion();
        let (w, h) = (surface.width(), surface.height());
        surface.translate(w / 2.0, h / 2.0);
        let size = w.min(h) * 0.48;
        let base = size / 50.0;

        surface.set_stroke_color(Rgba8::WHITE);

        // Face ticks, heavier on the hours.
        for tick in 0..60 {
            let x = (tick as f64 * TAU / 60.0).sin();
            let y = (tick as f64 * TAU / 60.0).cos();
            surface.begin_path();
            surface.move_to(x * size, y * size);
            if tick % 5 != 0 {
                surface.set_line_width(base);
                surface.line_to(x * (size - base * 3.0), y * (size - base * 3.0));
            } else {
                surface.set_line_width(base * 2.0);
                surface.line_to(x * (size - base * 5.0), y * (size - base * 5.0));
            }
            surface.stroke();
        }

        let hour = seconds / 60.0 / 60.0;
        let minute = seconds / 60.0 % 60.0;

        surface.set_line_width(base * 5.0);
        let xh = (hour * TAU / 12.0).sin();
        let yh = (hour * TAU / 12.0).cos();
        surface.begin_path();
        surface.move_to(-(xh * base * 5.0), yh * base * 5.0);
        surface.line_to(xh * base * 30.0, -(yh * base * 30.0));
        surface.stroke();

        surface.set_line_width(base * 2.5);
        let xm = (minute * TAU / 60.0).sin();
        let ym = (minute * TAU / 60.0).cos();
        surface.begin_path();
        surface.move_to(-(xm * base * 7.0), ym * base * 7.0);
        surface.line_to(xm * base * 43.0, -(ym * base * 43.0));
        surface.stroke();
        Ok(())
    })
}

/// Rotating black and white bars, angle bound to a computed property.
fn testcard_scene() -> anyhow::Result<Rc<Clip>> {
    let bars = PropertySet::new();
    bars.bind(
        "angle",
        Binding::computed(|scope, _| Ok(Value::Num(TAU * scope.portion()))),
    )?;

    Ok(Clip::atomic(400, move |surface, scope, _| {
        let w = surface.width() / 2.0;
        let h = surface.height() / 2.0;
        let r = (w * w + h * h).sqrt();

        surface.translate(w, h);
        surface.rotate(scope.read_num(&bars, "angle")?);

        let widths = [50.0, 50.0];
        let colors = [Rgba8::BLACK, Rgba8::WHITE];
        let mut i = 0;
        let mut x = -r;
        while x <= r {
            let ww = widths[i % widths.len()];
            surface.set_fill_color(colors[i % colors.len()]);
            surface.fill_rect(x, -r, ww, r * 2.0);
            x += ww;
            i += 1;
        }
        Ok(())
    }))
}

/// A title card dissolving into text that orbits on a circle, under a
/// timecode overlay. Requires --font.
fn titles_scene() -> anyhow::Result<Rc<Clip>> {
    let title = Clip::title("Movie Maker", 60, Params::new())?;

    let orbit = CircleProperty::new(
        Params::new()
            .with("frequency", 3.0)
            .with("scale_x", 200.0)
            .with("scale_y", 100.0),
    )?;
    let orbiting = Clip::text(
        90,
        Params::new()
            .with("text", "round and round")
            .with("size", 60.0)
            .with("color", "yellow")
            .with("offset_x", orbit.x())
            .with("offset_y", orbit.y()),
    )?;

    let movie = Clip::dissolve(title, orbiting, 20, Ease::SmoothStep)?;
    Ok(Clip::overlay([movie, Clip::timecode()]))
}
