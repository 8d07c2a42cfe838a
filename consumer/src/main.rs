use activemq_consumer::config::{Config, get_aws_config};
use activemq_consumer::{DynamoStore, Process};
use aws_sdk_dynamodb as dynamodb;
use lambda_runtime::tracing;

async fn handle(
    request: lambda_runtime::LambdaEvent<serde_json::Value>,
) -> Result<String, lambda_runtime::Error> {
    let config = Config::from_env();
    let store = match config.write_table() {
        Some(table) => {
            let aws_config = get_aws_config().await;
            let ddb_client = dynamodb::Client::new(&aws_config);
            let store = DynamoStore::new(ddb_client, table.to_owned());
            tracing::info!("Destination table: {}", store.table());
            Some(store)
        }
        None => {
            tracing::info!("No destination table or running locally, records will not be written");
            None
        }
    };

    let process = Process::new(store);
    Ok(process.handle(&request.payload).await.to_owned())
}

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let service_fn = lambda_runtime::service_fn(handle);
    lambda_runtime::run(service_fn).await
}
