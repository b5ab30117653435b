//! Minimal embedding of the assistant engine against a live backend.
//!
//! Requires the prediction/chat backend from `VDLAB_API_URL` (defaults to
//! the local dev server) and, for the chat half, a provider key in
//! `VDLAB_DEMO_KEY`.

use vdlab_client::{Assistant, Config, HttpChatGateway, HttpPredictionGateway, Phase};
use vdlab_client::store::MemoryCredentialStore;
use vdlab_core::context::PredictionContext;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let predictions = HttpPredictionGateway::new(&config.api_base_url);

    let models = predictions.models().await?;
    println!("available models:");
    for model in &models {
        println!("  {} ({})", model.display, model.name);
    }

    let model = models.first().ok_or("backend returned no models")?;
    let input = predictions.random().await?;
    let raw = predictions.predict(&model.name, &input).await?;
    let context = PredictionContext::from_response(input, raw);
    println!(
        "\n{} predicted \"{}\" with confidence {:.1}%",
        context.prediction.model_name,
        context.prediction.label,
        context.prediction.confidence * 100.0
    );

    let Ok(key) = std::env::var("VDLAB_DEMO_KEY") else {
        println!("\nset VDLAB_DEMO_KEY to try the chat assistant");
        return Ok(());
    };

    let mut assistant = Assistant::new(
        HttpChatGateway::new(&config.api_base_url),
        MemoryCredentialStore::new(),
    );
    assistant.submit_credential(key).await;
    if assistant.phase() == Phase::NoCredential {
        match assistant.controller().notice() {
            Some(err) => println!("key rejected: {err}"),
            None => println!("key rejected"),
        }
        return Ok(());
    }

    assistant.observe_prediction(context).await;
    assistant.accept_explanation().await;
    assistant.send("¿Cuáles son los factores clave?").await;

    println!();
    for turn in assistant.controller().conversation().turns() {
        println!("[{:?}] {}", turn.role, turn.content);
    }
    Ok(())
}
