//! Creates a scene from a prompt and prints the advice that follows.
//!
//! Run with: `cargo run --example create_scene -- "coral reef at dawn"`
//!
//! Requires `API_KEY` or `GOOGLE_API_KEY` environment variable.

use aquatica::{ServiceConfig, Session};

#[tokio::main(flavor = "current_thread")]
async fn main() -> aquatica::Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "coral reef at dawn".to_string());

    let mut session = Session::from_config(ServiceConfig::from_env());
    session.submit_prompt(prompt);
    session.settle().await;

    match session.active_image() {
        Some(scene) => {
            scene.image.save("scene.png")?;
            println!("Scene saved to scene.png ({} bytes)", scene.image.size());
            println!("\n{}", session.advice_text());
        }
        None if session.has_credential_error() => println!("The API key was rejected."),
        None => println!("No image was produced."),
    }

    Ok(())
}
