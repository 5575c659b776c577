//! Opens a popup menu over a scene, closes it again and reuses the menu
//! items in a second popup.
//!
//! Writes `popup_open.png`, `popup_closed.png` and `popup_reopened.png`.

use vista::prelude::*;

fn menu(scene: &mut Scene, at: PixelPoint) -> Result<(NodeId, NodeId)> {
    let popup = scene.create_popup(
        Viewport::new("menu", PixelSize::new(90, 70))
            .with_position(at)
            .with_background(Color::WHITE)
            .with_flags(ViewportFlags::MENU),
    );
    let layout = scene.add_node(
        popup,
        Frame::new(Rect::new(0.0, 0.0, 90.0, 70.0)).with_style(style().stroke(Color::BLACK)),
    )?;
    Ok((popup, layout))
}

fn main() -> Result<()> {
    env_logger::init();

    let mut scene = Scene::new(WindowConfig::new().size(200, 150).title("popup menu"))?;
    let root = scene.root();
    scene.add_node(
        root,
        RectShape::new(Rect::new(0.0, 0.0, 200.0, 24.0))
            .with_style(style().fill(Color::rgb(0.2, 0.2, 0.3))),
    )?;
    scene.tick();

    let (popup, layout) = menu(&mut scene, PixelPoint::new(20, 24))?;
    for row in 0..3 {
        scene.add_node(
            layout,
            RectShape::new(Rect::new(5.0, 5.0 + row as f32 * 21.0, 80.0, 17.0))
                .with_style(style().fill(Color::rgb(0.85, 0.85, 0.9)).no_stroke()),
        )?;
    }
    scene.push_popup(popup)?;
    scene.tick();
    scene.save_png("popup_open.png")?;

    // The items survive the popup and can be placed in another one.
    let items = scene.close_popup(popup)?;
    scene.tick();
    scene.save_png("popup_closed.png")?;

    let (second, second_layout) = menu(&mut scene, PixelPoint::new(100, 60))?;
    for item in items {
        scene.attach(item, second_layout)?;
    }
    scene.push_popup(second)?;
    scene.tick();
    scene.save_png("popup_reopened.png")?;
    Ok(())
}
