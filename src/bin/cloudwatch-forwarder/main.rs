#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]

use cloudwatch_forwarder::{
    FORWARDER_NAME,
    config::{self, Config},
    http_client, logger,
    logs::{
        dispatcher::Dispatcher,
        payload::CloudWatchLogsEvent,
        sender::{HttpSender, LogsSender},
    },
    secrets::cache::SecretCache,
};
use lambda_runtime::{LambdaEvent, service_fn};
use std::{env, path::Path, sync::Arc};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let config = load_configs()?;
    enable_logging_subsystem(&config)?;

    let client = http_client::get_client(&config);
    let secrets = Arc::new(SecretCache::from_config(&config, &client)?);
    let sender: Arc<dyn LogsSender> = Arc::new(HttpSender::new(client));
    let dispatcher = Arc::new(Dispatcher::new(&config, secrets, sender));
    info!(
        "Starting {} in {:?} mode",
        FORWARDER_NAME,
        dispatcher.mode()
    );

    lambda_runtime::run(service_fn(|event: LambdaEvent<CloudWatchLogsEvent>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move {
            debug!("Received invocation {}", event.context.request_id);
            let outcome = dispatcher.dispatch(&event.payload.aws_logs.data).await?;
            Ok::<String, lambda_runtime::Error>(outcome.to_string())
        }
    }))
    .await
}

fn load_configs() -> Result<Config, lambda_runtime::Error> {
    let lambda_directory = env::var("LAMBDA_TASK_ROOT").unwrap_or_else(|_| "/var/task".to_string());
    let config = config::get_config(Path::new(&lambda_directory))?;
    Ok(config)
}

fn enable_logging_subsystem(config: &Config) -> Result<(), lambda_runtime::Error> {
    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", config.log_level.as_ref());
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(env_filter)?)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(false)
        .without_time()
        .event_format(logger::Formatter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    debug!("Logging subsystem enabled");
    Ok(())
}
