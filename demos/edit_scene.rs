//! Edits an existing image with a text instruction.
//!
//! Run with: `cargo run --example edit_scene -- <input_image.png> "add jellyfish"`
//!
//! Requires `API_KEY` or `GOOGLE_API_KEY` environment variable.

use aquatica::{ServiceConfig, Session};

#[tokio::main(flavor = "current_thread")]
async fn main() -> aquatica::Result<()> {
    let mut args = std::env::args().skip(1);
    let input_path = args
        .next()
        .expect("Usage: edit_scene <input_image.png> [instruction]");
    let instruction = args.next().unwrap_or_default();

    let mut session = Session::from_config(ServiceConfig::from_env());
    let base = session.upload_base_image(std::fs::read(&input_path)?)?;

    session.submit_prompt(instruction);
    session.settle().await;

    match session.active_image() {
        Some(scene) if scene.id != base => {
            scene.image.save("edited.png")?;
            println!("Edited image saved to edited.png ({} bytes)", scene.image.size());
        }
        _ => println!("The model did not return an edited image."),
    }

    Ok(())
}
