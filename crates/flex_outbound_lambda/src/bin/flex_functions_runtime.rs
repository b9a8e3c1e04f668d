use std::sync::Arc;

use flex_outbound_lambda::adapters::twilio::TwilioClient;
use flex_outbound_lambda::config::FunctionConfig;
use flex_outbound_lambda::handlers::cleanup::handle_cleanup_event;
use flex_outbound_lambda::handlers::initiate::handle_initiate_event_with_uuid_identity;
use flex_outbound_lambda::logging::init_tracing;
use flex_outbound_lambda::response::{message_response, ApiGatewayResponse};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;

const CLEANUP_ROUTE: &str = "flex-cleanup-all-proxy-sessions";
const INITIATE_ROUTE: &str = "flex-initiate-outbound-sms-task";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Cleanup,
    Initiate,
}

#[derive(Clone)]
struct RuntimeDependencies {
    config: Arc<FunctionConfig>,
    platform: Arc<TwilioClient>,
}

fn request_path(event: &Value) -> Option<&str> {
    event
        .get("rawPath")
        .or_else(|| event.get("path"))
        .and_then(Value::as_str)
}

fn resolve_route(event: &Value) -> Option<Route> {
    let path = request_path(event)?.trim_end_matches('/');
    if path.ends_with(CLEANUP_ROUTE) {
        Some(Route::Cleanup)
    } else if path.ends_with(INITIATE_ROUTE) {
        Some(Route::Initiate)
    } else {
        None
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: RuntimeDependencies,
) -> Result<ApiGatewayResponse, Error> {
    let payload = event.payload;
    let response = match resolve_route(&payload) {
        Some(Route::Cleanup) => match deps.config.cleanup_config() {
            Ok(config) => handle_cleanup_event(payload, &config, deps.platform.as_ref()).await,
            Err(error) => message_response(500, error.to_string()),
        },
        Some(Route::Initiate) => {
            handle_initiate_event_with_uuid_identity(
                payload,
                &deps.config.initiate_config(),
                deps.platform.as_ref(),
            )
            .await
        }
        None => {
            let path = request_path(&payload).unwrap_or("<none>");
            tracing::warn!(
                component = "flex_functions_runtime",
                event = "route_not_found",
                path
            );
            message_response(404, format!("No function at path '{path}'"))
        }
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = FunctionConfig::from_env()?;
    let platform = config.twilio_client()?;
    let deps = RuntimeDependencies {
        config: Arc::new(config),
        platform: Arc::new(platform),
    };

    lambda_runtime::run(service_fn(move |event| handle_request(event, deps.clone()))).await
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn routes_http_api_raw_path() {
        let event = json!({"rawPath": "/prod/flex-initiate-outbound-sms-task"});
        assert_eq!(resolve_route(&event), Some(Route::Initiate));
    }

    #[test]
    fn routes_rest_api_path_with_trailing_slash() {
        let event = json!({"path": "/flex-cleanup-all-proxy-sessions/"});
        assert_eq!(resolve_route(&event), Some(Route::Cleanup));
    }

    #[test]
    fn unknown_or_missing_path_has_no_route() {
        assert_eq!(resolve_route(&json!({"rawPath": "/flex-unknown"})), None);
        assert_eq!(resolve_route(&json!({"body": "{}"})), None);
    }
}
