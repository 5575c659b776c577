use std::path::Path;

use vista::prelude::*;

use crate::{Result, VisualTestError};

/// Scenes known to [`build_scene`].
pub const SCENES: &[&str] = &[
    "shapes",
    "nested_viewports",
    "popup_menu",
    "partial_update",
    "svg_image",
];

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

/// Build a named scene and bring it up to date.
pub fn build_scene(name: &str) -> Result<Scene> {
    let mut scene = Scene::new(
        WindowConfig::new()
            .size(WIDTH, HEIGHT)
            .title(name)
            .background(Color::from_hex(0xf0f0f0)),
    )?;
    match name {
        "shapes" => shapes(&mut scene)?,
        "nested_viewports" => nested_viewports(&mut scene)?,
        "popup_menu" => popup_menu(&mut scene)?,
        "partial_update" => partial_update(&mut scene)?,
        "svg_image" => svg_image(&mut scene)?,
        other => {
            return Err(VisualTestError::Capture(format!(
                "unknown scene '{}'",
                other
            )))
        }
    }
    scene.tick();
    Ok(scene)
}

/// Render a named scene and save the window as PNG.
pub fn capture_scene(name: &str, output: &Path) -> Result<()> {
    let scene = build_scene(name)?;
    scene.save_png(output)?;
    if !output.exists() {
        return Err(VisualTestError::Capture(format!(
            "Screenshot was not created at {}",
            output.display()
        )));
    }
    Ok(())
}

fn shapes(scene: &mut Scene) -> Result<()> {
    let root = scene.root();
    scene.add_node(
        root,
        RectShape::new(Rect::new(10.0, 10.0, 50.0, 30.0))
            .with_radius(6.0)
            .with_style(style().fill(Color::RED).stroke(Color::BLACK).stroke_width(2.0)),
    )?;
    scene.add_node(
        root,
        Circle::new(Point::new(95.0, 25.0), 16.0).with_style(style().fill(Color::BLUE)),
    )?;
    scene.add_node(
        root,
        Ellipse::new(Point::new(135.0, 25.0), 18.0, 10.0)
            .with_style(style().fill(Color::GREEN).opacity(0.5)),
    )?;
    scene.add_node(
        root,
        Polyline::new([
            Point::new(10.0, 100.0),
            Point::new(40.0, 60.0),
            Point::new(70.0, 100.0),
        ])
        .with_style(style().stroke(Color::from_hex(0x884400)).stroke_width(3.0)),
    )?;
    scene.add_node(
        root,
        PathShape::from_data("M90 60 L150 60 L120 110 Z")?
            .with_style(style().fill(Color::from_hex(0xffcc00)).stroke(Color::BLACK)),
    )?;
    scene.add_node(
        root,
        Line::new(Point::new(0.0, 115.0), Point::new(160.0, 115.0))
            .with_style(style().stroke(Color::BLACK)),
    )?;
    Ok(())
}

fn nested_viewports(scene: &mut Scene) -> Result<()> {
    let root = scene.root();
    let inner = scene.add_node(
        root,
        Viewport::new("inner", PixelSize::new(80, 60))
            .with_position(PixelPoint::new(20, 20))
            .with_background(Color::from_hex(0xc0c0ff)),
    )?;
    // Overhangs the inner buffer; the overhang is clipped.
    scene.add_node(
        inner,
        Circle::new(Point::new(70.0, 50.0), 25.0).with_style(style().fill(Color::RED)),
    )?;
    let edge = scene.add_node(
        root,
        Viewport::new("edge", PixelSize::new(60, 60))
            .with_position(PixelPoint::new(120, 80))
            .with_background(Color::from_hex(0x80c080)),
    )?;
    scene.add_node(
        edge,
        RectShape::new(Rect::new(5.0, 5.0, 20.0, 20.0)).with_style(style().fill(Color::BLACK)),
    )?;
    Ok(())
}

fn popup_menu(scene: &mut Scene) -> Result<()> {
    shapes(scene)?;
    scene.tick();

    let popup = scene.create_popup(
        Viewport::new("menu", PixelSize::new(70, 60))
            .with_position(PixelPoint::new(45, 30))
            .with_background(Color::WHITE)
            .with_flags(ViewportFlags::MENU),
    );
    let layout = scene.add_node(
        popup,
        Frame::new(Rect::new(0.0, 0.0, 70.0, 60.0))
            .with_style(style().stroke(Color::BLACK).stroke_width(2.0)),
    )?;
    for row in 0..3 {
        scene.add_node(
            layout,
            RectShape::new(Rect::new(6.0, 6.0 + row as f32 * 17.0, 58.0, 13.0))
                .with_style(style().fill(Color::from_hex(0xd0d0d0)).no_stroke()),
        )?;
    }
    scene.push_popup(popup)?;
    Ok(())
}

fn partial_update(scene: &mut Scene) -> Result<()> {
    shapes(scene)?;
    scene.tick();
    let target = scene.tree().children(scene.root())[1];
    scene.update_as::<Circle>(target, ChangeKind::Value, |circle| {
        circle.props_mut().fill = PaintSource::Solid(Color::from_hex(0x00aaaa));
    })?;
    Ok(())
}

const BADGE: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
    <circle cx="20" cy="20" r="18" fill="#2266cc"/>
    <rect x="12" y="12" width="16" height="16" fill="#ffffff"/>
</svg>"##;

fn svg_image(scene: &mut Scene) -> Result<()> {
    let root = scene.root();
    scene.add_node(root, SvgImage::from_data(BADGE, Rect::new(10.0, 10.0, 60.0, 60.0))?)?;
    scene.add_node(
        root,
        SvgImage::from_data(BADGE, Rect::new(90.0, 40.0, 40.0, 40.0))?
            .with_transform(Transform::rotate_degrees(10.0)),
    )?;
    Ok(())
}
