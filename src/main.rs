use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    mailwise_lib::run().await
}
