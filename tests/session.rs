use clap::Parser;
use eframe::egui::Pos2;
use image::{Rgba, RgbaImage};
use std::process::ExitCode;

use coloringfe::canvas::{RasterSurface, WHITE};
use coloringfe::cli::{self, CliArgs};
use coloringfe::components::tools::{BrushKind, DrawMode, FillStrategy};
use coloringfe::io::{load_cfe, save_cfe};
use coloringfe::ops::auto_color::is_white;
use coloringfe::settings::StudioSettings;
use coloringfe::{ColoringError, ColoringSession};

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn stroke(session: &mut ColoringSession, points: &[(f32, f32)]) {
    session.pointer_down(Pos2::new(points[0].0, points[0].1));
    for (x, y) in &points[1..] {
        session.pointer_move(Pos2::new(*x, *y));
    }
    assert!(session.pointer_up());
}

fn line_art_page(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        if x == 0 || y == 0 || x == w - 1 || y == h - 1 || x == w / 2 { BLACK } else { WHITE }
    })
}

#[test]
fn undo_and_redo_through_the_session() {
    let mut session = ColoringSession::new(50, 50).with_seed(1);
    stroke(&mut session, &[(5.0, 25.0), (45.0, 25.0)]);
    let painted = session.surface().pixels().clone();
    assert_ne!(session.surface().pixel(25, 25), Some(WHITE));

    assert_eq!(session.undo().as_deref(), Some("Standard Stroke"));
    assert!(session.surface().pixels().pixels().all(|p| *p == WHITE));
    assert!(session.history.can_redo());

    assert_eq!(session.redo().as_deref(), Some("Standard Stroke"));
    assert_eq!(session.surface().pixels(), &painted);

    session.undo();
    session.tools.brush = BrushKind::Blend;
    stroke(&mut session, &[(25.0, 5.0), (25.0, 45.0)]);
    assert!(!session.history.can_redo());
    assert_eq!(session.history.undo_description().as_deref(), Some("Blend Stroke"));
}

#[test]
fn tool_changes_mid_stroke_do_not_affect_it() {
    let mut session = ColoringSession::new(40, 40);
    session.pointer_down(Pos2::new(5.0, 20.0));
    session.tools.set_rgb([255, 0, 0]);
    session.pointer_move(Pos2::new(35.0, 20.0));
    session.pointer_up();
    assert_eq!(session.surface().pixel(20, 20), Some(BLACK));
}

#[test]
fn leaving_the_canvas_ends_the_stroke() {
    let mut session = ColoringSession::new(40, 40);
    session.pointer_down(Pos2::new(5.0, 20.0));
    session.pointer_move(Pos2::new(20.0, 20.0));
    assert!(session.pointer_leave());
    assert!(!session.is_stroke_active());
    assert!(session.pointer_move(Pos2::new(35.0, 20.0)).is_none());
    assert_eq!(session.surface().pixel(30, 20), Some(WHITE));
}

#[test]
fn region_fill_respects_line_art() {
    let mut session =
        ColoringSession::from_surface(RasterSurface::from_rgba_image(line_art_page(40, 20)), "page");
    session.tools.mode = DrawMode::Fill;
    session.tools.fill_strategy = FillStrategy::Region;
    session.tools.set_rgb([10, 200, 10]);

    assert!(session.click(Pos2::new(5.0, 5.0)));
    assert_eq!(session.surface().pixel(15, 15), Some(Rgba([10, 200, 10, 255])));
    assert_eq!(session.surface().pixel(30, 10), Some(WHITE));
    assert_eq!(session.surface().pixel(20, 10), Some(BLACK));
    // Clicking on line art changes nothing
    assert!(!session.click(Pos2::new(20.5, 10.5)));
}

#[test]
fn cfe_session_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("page.cfe");

    let mut session = ColoringSession::new(32, 24).with_seed(7);
    session.tools.brush = BrushKind::SmartAdjust;
    session.tools.intensity = 0.8;
    session.tools.size = 3.0;
    session.tools.set_rgb([200, 40, 90]);
    stroke(&mut session, &[(2.0, 2.0), (30.0, 20.0)]);

    save_cfe(session.surface(), &session.tools, &path).unwrap();
    let (surface, tools) = load_cfe(&path).unwrap();

    assert_eq!(surface.pixels(), session.surface().pixels());
    assert_eq!(tools, session.tools);
}

#[test]
fn cfe_with_wrong_magic_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.cfe");
    std::fs::write(&path, b"\x04\0\0\0\0\0\0\0PFE1 and then some").unwrap();
    assert!(matches!(load_cfe(&path), Err(ColoringError::InvalidFormat(_))));
}

#[test]
fn settings_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coloringfe_settings.cfg");

    let settings = StudioSettings {
        canvas_width: 1024,
        brush: BrushKind::Texture,
        color: [1, 2, 3],
        ..Default::default()
    };
    settings.save_to(&path).unwrap();
    assert_eq!(StudioSettings::load_from(&path), settings);
    assert_eq!(
        StudioSettings::load_from(&dir.path().join("missing.cfg")),
        StudioSettings::default()
    );
}

#[test]
fn cli_colors_a_template_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("cat.png");
    let output = dir.path().join("cat_colored.png");
    line_art_page(60, 40).save(&input).unwrap();

    let args = CliArgs::parse_from([
        "ColoringFE",
        "--input",
        input.to_str().unwrap(),
        "--auto-color",
        "--seed",
        "3",
        "--output",
        output.to_str().unwrap(),
    ]);
    assert_eq!(cli::run(args), ExitCode::SUCCESS);

    let result = image::open(&output).unwrap().to_rgba8();
    assert_eq!(result.dimensions(), (60, 40));
    assert!(!is_white(result.get_pixel(10, 10)));
    assert!(!is_white(result.get_pixel(45, 30)));
    assert_eq!(*result.get_pixel(30, 20), BLACK);
}

#[test]
fn cli_strokes_into_a_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("blank.png");
    let output = dir.path().join("blank.cfe");
    RgbaImage::from_pixel(50, 50, WHITE).save(&input).unwrap();

    let args = CliArgs::parse_from([
        "ColoringFE",
        "-i",
        input.to_str().unwrap(),
        "--brush",
        "shade",
        "--size",
        "4",
        "--color",
        "#ff0000",
        "--stroke",
        "5,25 45,25",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert_eq!(cli::run(args), ExitCode::SUCCESS);

    let (surface, tools) = load_cfe(&output).unwrap();
    assert_eq!(tools.brush, BrushKind::Shade);
    assert_eq!(tools.rgb(), [255, 0, 0]);
    assert_eq!(surface.pixel(25, 24), Some(Rgba([255, 0, 0, 255])));
}

#[test]
fn cli_fails_on_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope_*.png");
    let args = CliArgs::parse_from(["ColoringFE", "-i", missing.to_str().unwrap()]);
    assert_eq!(cli::run(args), ExitCode::FAILURE);
}
