use std::sync::Arc;

use flex_outbound_lambda::adapters::twilio::TwilioClient;
use flex_outbound_lambda::config::FunctionConfig;
use flex_outbound_lambda::handlers::initiate::{
    handle_initiate_event_with_uuid_identity, InitiateConfig,
};
use flex_outbound_lambda::logging::init_tracing;
use flex_outbound_lambda::response::ApiGatewayResponse;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

#[derive(Clone)]
struct RuntimeDependencies {
    config: Arc<InitiateConfig>,
    platform: Arc<TwilioClient>,
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    Ok(
        handle_initiate_event_with_uuid_identity(
            event.payload,
            &deps.config,
            deps.platform.as_ref(),
        )
        .await,
    )
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = FunctionConfig::from_env()?;
    let deps = RuntimeDependencies {
        config: Arc::new(config.initiate_config()),
        platform: Arc::new(config.twilio_client()?),
    };

    lambda_runtime::run(service_fn(move |event| handle_request(event, deps.clone()))).await
}
