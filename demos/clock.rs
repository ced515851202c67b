//! Renders ten seconds of an analogue clock to `clock.mjpeg`.
//!
//! Run with `cargo run --example clock`.

use std::{f64::consts::TAU, path::Path, rc::Rc};

use moviemaker::{Clip, MovieMaker, MovieResult, Rgba8};

fn clock() -> Rc<Clip> {
    Clip::atomic(12 * 60 * 60 * 25, |surface, scope, _| {
        let seconds = 12.0 * 60.0 * 60.0 * scope.portion();
        let (w, h) = (surface.width(), surface.height());
        surface.translate(w / 2.0, h / 2.0);
        let size = w.min(h) * 0.48;
        let base = size / 50.0;

        surface.set_stroke_color(Rgba8::WHITE);
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

        let minute = seconds / 60.0 % 60.0;
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

fn main() -> MovieResult<()> {
    tracing_subscriber::fmt::init();

    let stats = MovieMaker::new(400, 400)
        .frames(250)
        .write_to(&clock(), Path::new("clock.mjpeg"))?;
    eprintln!("wrote {} frames", stats.frames_rendered);
    Ok(())
}
