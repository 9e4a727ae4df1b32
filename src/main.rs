use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    report_ingest_lib::run().await
}
