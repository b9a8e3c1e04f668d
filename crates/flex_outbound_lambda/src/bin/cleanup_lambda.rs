use std::sync::Arc;

use flex_outbound_lambda::adapters::twilio::TwilioClient;
use flex_outbound_lambda::config::FunctionConfig;
use flex_outbound_lambda::handlers::cleanup::{handle_cleanup_event, CleanupConfig};
use flex_outbound_lambda::logging::init_tracing;
use flex_outbound_lambda::response::ApiGatewayResponse;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

#[derive(Clone)]
struct RuntimeDependencies {
    config: Arc<CleanupConfig>,
    platform: Arc<TwilioClient>,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    Ok(handle_cleanup_event(event.payload, &deps.config, deps.platform.as_ref()).await)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = FunctionConfig::from_env()?;
    let deps = RuntimeDependencies {
        config: Arc::new(config.cleanup_config()?),
        platform: Arc::new(config.twilio_client()?),
    };

    lambda_runtime::run(service_fn(move |event| handle_request(event, deps.clone()))).await
}
