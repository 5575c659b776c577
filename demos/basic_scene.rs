//! Builds a small scene, renders it, then changes one shape and lets the
//! scene repaint just that shape.
//!
//! Run with `RUST_LOG=debug` to see which viewports do full and partial
//! renders. Writes `basic_scene_before.png` and `basic_scene_after.png`.

use vista::prelude::*;

fn main() -> Result<()> {
    env_logger::init();

    let mut scene = Scene::new(
        WindowConfig::new()
            .size(240, 160)
            .title("basic scene")
            .background(Color::rgb(0.95, 0.95, 0.97)),
    )?;
    let root = scene.root();

    let card = scene.add_node(
        root,
        Frame::new(Rect::new(20.0, 20.0, 120.0, 80.0))
            .with_radius(8.0)
            .with_style(style().fill(Color::WHITE).stroke(Color::rgb(0.6, 0.6, 0.6))),
    )?;
    let dot = scene.add_node(
        card,
        Circle::new(Point::new(30.0, 40.0), 15.0).with_style(style().fill(Color::RED)),
    )?;
    scene.add_node(
        card,
        PathShape::from_data("M60 25 h45 v30 h-45 z")?
            .with_style(style().fill(Color::rgb(0.2, 0.4, 0.8)).no_stroke()),
    )?;

    // A nested viewport with its own buffer, partly outside the window.
    let badge = scene.add_node(
        root,
        Viewport::new("badge", PixelSize::new(80, 80))
            .with_position(PixelPoint::new(180, 100))
            .with_background(Color::rgb(0.2, 0.7, 0.3)),
    )?;
    scene.add_node(
        badge,
        Circle::new(Point::new(20.0, 20.0), 12.0).with_style(style().fill(Color::WHITE)),
    )?;

    scene.tick();
    scene.save_png("basic_scene_before.png")?;

    scene.update_as::<Circle>(dot, ChangeKind::Value, |circle| {
        circle.props_mut().fill = PaintSource::Solid(Color::rgb(1.0, 0.6, 0.0));
    })?;
    scene.tick();
    scene.save_png("basic_scene_after.png")?;

    let counts = scene.with_viewport(root, |vp| vp.counts());
    println!("main viewport: {:?}", counts);
    Ok(())
}
